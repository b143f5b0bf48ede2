//! Sliding-window activity counters.

use std::collections::BTreeSet;

use contracts::snapshot::{ChunkKeyV1, StatsBucketV1, StatsV1};

use crate::mathx::floor_div;
use crate::terrain::{ChunkKey, CHUNK_SIZE};

pub const DEFAULT_BUCKET_TICKS: u64 = 300;
pub const DEFAULT_WINDOW_TICKS: u64 = 72_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsBucket {
    pub trades: i64,
    pub denied: i64,
    pub chunks_discovered: i64,
    pub blueprints_complete: i64,
}

impl StatsBucket {
    fn add(&mut self, other: &Self) {
        self.trades += other.trades;
        self.denied += other.denied;
        self.chunks_discovered += other.chunks_discovered;
        self.blueprints_complete += other.blueprints_complete;
    }
}

/// Ring of `window / bucket` buckets; `cur_base` is the tick the current bucket began.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldStats {
    bucket_ticks: u64,
    window_ticks: u64,
    buckets: Vec<StatsBucket>,
    cur_idx: usize,
    cur_base: u64,
    seen_chunks: BTreeSet<ChunkKey>,
}

impl Default for WorldStats {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_TICKS, DEFAULT_WINDOW_TICKS)
    }
}

impl WorldStats {
    pub fn new(bucket_ticks: u64, window_ticks: u64) -> Self {
        let bucket_ticks = if bucket_ticks == 0 {
            DEFAULT_BUCKET_TICKS
        } else {
            bucket_ticks
        };
        let window_ticks = window_ticks.max(bucket_ticks);
        let n = (window_ticks / bucket_ticks).max(1);
        Self {
            bucket_ticks,
            window_ticks: n * bucket_ticks,
            buckets: vec![StatsBucket::default(); n as usize],
            cur_idx: 0,
            cur_base: 0,
            seen_chunks: BTreeSet::new(),
        }
    }

    pub fn bucket_ticks(&self) -> u64 {
        self.bucket_ticks
    }

    pub fn window_ticks(&self) -> u64 {
        self.window_ticks
    }

    pub fn rotate(&mut self, now_tick: u64) {
        while now_tick >= self.cur_base + self.bucket_ticks {
            self.cur_idx = (self.cur_idx + 1) % self.buckets.len();
            self.buckets[self.cur_idx] = StatsBucket::default();
            self.cur_base += self.bucket_ticks;
        }
    }

    fn current(&mut self, now_tick: u64) -> &mut StatsBucket {
        self.rotate(now_tick);
        &mut self.buckets[self.cur_idx]
    }

    pub fn record_trade(&mut self, now_tick: u64) {
        self.current(now_tick).trades += 1;
    }

    pub fn record_denied(&mut self, now_tick: u64) {
        self.current(now_tick).denied += 1;
    }

    pub fn record_blueprint_complete(&mut self, now_tick: u64) {
        self.current(now_tick).blueprints_complete += 1;
    }

    /// Counts the chunk under `(x, z)` the first time anything is seen there.
    pub fn observe_pos(&mut self, now_tick: u64, x: i32, z: i32) {
        self.rotate(now_tick);
        let size = i64::from(CHUNK_SIZE);
        let key = ChunkKey::new(
            floor_div(i64::from(x), size) as i32,
            floor_div(i64::from(z), size) as i32,
        );
        if self.seen_chunks.insert(key) {
            self.buckets[self.cur_idx].chunks_discovered += 1;
        }
    }

    pub fn summarize(&mut self, now_tick: u64) -> StatsBucket {
        self.rotate(now_tick);
        let mut out = StatsBucket::default();
        for bucket in &self.buckets {
            out.add(bucket);
        }
        out
    }

    pub fn seen_chunk_count(&self) -> usize {
        self.seen_chunks.len()
    }

    pub fn to_v1(&self) -> StatsV1 {
        StatsV1 {
            bucket_ticks: self.bucket_ticks,
            window_ticks: self.window_ticks,
            cur_idx: self.cur_idx as i64,
            cur_base: self.cur_base,
            buckets: self
                .buckets
                .iter()
                .map(|b| StatsBucketV1 {
                    trades: b.trades,
                    denied: b.denied,
                    chunks_discovered: b.chunks_discovered,
                    blueprints_complete: b.blueprints_complete,
                })
                .collect(),
            seen_chunks: self
                .seen_chunks
                .iter()
                .map(|k| ChunkKeyV1 { cx: k.cx, cz: k.cz })
                .collect(),
        }
    }

    /// Degenerate documents fall back to the default ring.
    pub fn from_v1(v1: &StatsV1) -> Self {
        if v1.buckets.is_empty() || v1.bucket_ticks == 0 {
            return Self::default();
        }
        let cur_idx = usize::try_from(v1.cur_idx)
            .ok()
            .filter(|idx| *idx < v1.buckets.len())
            .unwrap_or(0);
        Self {
            bucket_ticks: v1.bucket_ticks,
            window_ticks: v1.window_ticks,
            buckets: v1
                .buckets
                .iter()
                .map(|b| StatsBucket {
                    trades: b.trades,
                    denied: b.denied,
                    chunks_discovered: b.chunks_discovered,
                    blueprints_complete: b.blueprints_complete,
                })
                .collect(),
            cur_idx,
            cur_base: v1.cur_base,
            seen_chunks: v1
                .seen_chunks
                .iter()
                .map(|k| ChunkKey::new(k.cx, k.cz))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_normalises_window() {
        let s = WorldStats::new(0, 0);
        assert_eq!((s.bucket_ticks(), s.window_ticks()), (300, 300));
        let s = WorldStats::new(100, 250);
        assert_eq!(s.window_ticks(), 200);
        assert_eq!(WorldStats::default().window_ticks(), 72_000);
    }

    #[test]
    fn buckets_expire_as_the_ring_rotates() {
        let mut s = WorldStats::new(10, 30);
        s.record_trade(0);
        s.record_trade(5);
        s.record_denied(12);
        assert_eq!(s.summarize(12).trades, 2);
        assert_eq!(s.summarize(29).denied, 1);
        // Tick 30 reuses the first bucket.
        assert_eq!(s.summarize(30).trades, 0);
        assert_eq!(s.summarize(30).denied, 1);
        assert_eq!(s.summarize(100), StatsBucket::default());
    }

    #[test]
    fn chunks_are_discovered_once() {
        let mut s = WorldStats::default();
        s.observe_pos(1, 3, 4);
        s.observe_pos(2, 15, 15);
        s.observe_pos(3, -1, 0);
        assert_eq!(s.summarize(3).chunks_discovered, 2);
        assert_eq!(s.seen_chunk_count(), 2);
    }

    #[test]
    fn snapshot_shape_restores_state() {
        let mut s = WorldStats::new(10, 40);
        s.record_blueprint_complete(25);
        s.observe_pos(25, 100, -100);
        let restored = WorldStats::from_v1(&s.to_v1());
        assert_eq!(restored, s);
    }

    #[test]
    fn degenerate_snapshot_shapes_fall_back() {
        assert_eq!(WorldStats::from_v1(&StatsV1::default()), WorldStats::default());
        let mut v1 = WorldStats::new(10, 20).to_v1();
        v1.cur_idx = 9;
        assert_eq!(WorldStats::from_v1(&v1).to_v1().cur_idx, 0);
    }
}
