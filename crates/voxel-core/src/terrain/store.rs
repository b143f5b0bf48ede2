use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::catalog::BlockId;
use crate::mathx::{floor_div, modulo};
use crate::terrain::chunk::{Chunk, ChunkKey, CHUNK_SIZE};
use crate::terrain::gen::WorldGen;

/// Lazily generated chunks keyed by chunk coordinates.
///
/// Chunks come into existence the first time a cell inside them is read or
/// written; out-of-bounds access never creates one.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    gen: WorldGen,
    chunks: BTreeMap<ChunkKey, Chunk>,
}

fn split(x: i32, z: i32) -> (ChunkKey, i32, i32) {
    let size = i64::from(CHUNK_SIZE);
    let (x, z) = (i64::from(x), i64::from(z));
    let key = ChunkKey::new(floor_div(x, size) as i32, floor_div(z, size) as i32);
    (key, modulo(x, size) as i32, modulo(z, size) as i32)
}

impl ChunkStore {
    pub fn new(gen: WorldGen) -> Self {
        Self {
            gen,
            chunks: BTreeMap::new(),
        }
    }

    pub fn gen(&self) -> &WorldGen {
        &self.gen
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn in_bounds(&self, x: i32, y: i32, z: i32) -> bool {
        if y != 0 {
            return false;
        }
        let r = self.gen.boundary_r;
        r <= 0 || ((-r..=r).contains(&x) && (-r..=r).contains(&z))
    }

    pub fn get_block(&mut self, x: i32, y: i32, z: i32) -> BlockId {
        if !self.in_bounds(x, y, z) {
            return self.gen.palette.air;
        }
        let (key, lx, lz) = split(x, z);
        self.get_or_gen(key).get(lx, lz)
    }

    /// Reads a cell only if its chunk is already resident.
    pub fn peek_block(&self, x: i32, y: i32, z: i32) -> Option<BlockId> {
        if !self.in_bounds(x, y, z) {
            return None;
        }
        let (key, lx, lz) = split(x, z);
        self.chunks.get(&key).map(|chunk| chunk.get(lx, lz))
    }

    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: BlockId) {
        if !self.in_bounds(x, y, z) {
            return;
        }
        let (key, lx, lz) = split(x, z);
        self.get_or_gen(key).set(lx, lz, block);
    }

    pub fn get_or_gen(&mut self, key: ChunkKey) -> &mut Chunk {
        let gen = &self.gen;
        self.chunks
            .entry(key)
            .or_insert_with(|| generate_chunk(gen, key))
    }

    /// Sorted by `(cx, cz)`.
    pub fn loaded_chunk_keys(&self) -> Vec<ChunkKey> {
        self.chunks.keys().copied().collect()
    }

    pub fn chunk(&self, key: ChunkKey) -> Option<&Chunk> {
        self.chunks.get(&key)
    }

    /// Raw cells of a loaded chunk, row-major by `z * 16 + x`.
    pub fn chunk_blocks(&self, key: ChunkKey) -> Option<&[BlockId]> {
        self.chunks.get(&key).map(Chunk::blocks)
    }

    pub fn chunk_digest(&mut self, key: ChunkKey) -> Option<[u8; 32]> {
        self.chunks.get_mut(&key).map(Chunk::digest)
    }

    /// Digests of every loaded chunk in key order.
    pub fn digests(&mut self) -> Vec<(ChunkKey, [u8; 32])> {
        self.chunks
            .iter_mut()
            .map(|(key, chunk)| (*key, chunk.digest()))
            .collect()
    }

    /// Generates every missing chunk within `radius` chunks of `center` in parallel.
    /// Returns how many chunks were created.
    pub fn preload_area(&mut self, center: ChunkKey, radius: i32) -> usize {
        let radius = radius.max(0);
        let missing: Vec<ChunkKey> = (center.cx - radius..=center.cx + radius)
            .flat_map(|cx| (center.cz - radius..=center.cz + radius).map(move |cz| ChunkKey::new(cx, cz)))
            .filter(|key| self.key_in_bounds(*key) && !self.chunks.contains_key(key))
            .collect();

        let gen = &self.gen;
        let mut generated: Vec<Chunk> = missing
            .into_par_iter()
            .map(|key| generate_chunk(gen, key))
            .collect();
        generated.sort_by_key(|chunk| chunk.key);

        let created = generated.len();
        for chunk in generated {
            self.chunks.insert(chunk.key, chunk);
        }
        created
    }

    // A chunk is loadable when any of its cells is in bounds.
    fn key_in_bounds(&self, key: ChunkKey) -> bool {
        let r = self.gen.boundary_r;
        if r <= 0 {
            return true;
        }
        let lo = |c: i32| c.saturating_mul(CHUNK_SIZE);
        let hi = |c: i32| lo(c).saturating_add(CHUNK_SIZE - 1);
        hi(key.cx) >= -r && lo(key.cx) <= r && hi(key.cz) >= -r && lo(key.cz) <= r
    }

    /// Replaces (or installs) a chunk wholesale; used by snapshot import.
    pub fn insert_chunk(&mut self, mut chunk: Chunk) {
        chunk.digest();
        self.chunks.insert(chunk.key, chunk);
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }
}

pub fn generate_chunk(gen: &WorldGen, key: ChunkKey) -> Chunk {
    let mut chunk = Chunk::generated(key, gen.generate_blocks(key.cx, key.cz));
    chunk.digest();
    chunk
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    fn store(boundary_r: i32) -> ChunkStore {
        ChunkStore::new(WorldGen {
            seed: 7,
            boundary_r,
            ..WorldGen::default()
        })
    }

    #[test]
    fn out_of_bounds_reads_are_air_and_create_nothing() {
        let mut s = store(100);
        assert_eq!(s.get_block(200, 0, 0), catalog::AIR);
        assert_eq!(s.get_block(0, 1, 0), catalog::AIR);
        assert_eq!(s.len(), 0);

        s.get_block(50, 0, 50);
        assert_eq!(s.loaded_chunk_keys(), vec![ChunkKey::new(3, 3)]);
    }

    #[test]
    fn boundary_is_inclusive() {
        let s = store(100);
        assert!(s.in_bounds(100, 0, -100));
        assert!(!s.in_bounds(101, 0, 0));
        assert!(store(0).in_bounds(1_000_000, 0, -1_000_000));
    }

    #[test]
    fn out_of_bounds_writes_are_ignored() {
        let mut s = store(10);
        s.set_block(11, 0, 0, catalog::STONE);
        s.set_block(0, 2, 0, catalog::STONE);
        assert!(s.is_empty());
    }

    #[test]
    fn negative_coordinates_use_floor_division() {
        let mut s = store(0);
        s.set_block(-1, 0, -17, catalog::CHEST);
        assert_eq!(s.loaded_chunk_keys(), vec![ChunkKey::new(-1, -2)]);
        let chunk = s.chunk(ChunkKey::new(-1, -2)).expect("chunk");
        assert_eq!(chunk.get(15, 15), catalog::CHEST);
        assert_eq!(s.get_block(-1, 0, -17), catalog::CHEST);
        let cells = s.chunk_blocks(ChunkKey::new(-1, -2)).expect("cells");
        assert_eq!(cells[15 * 16 + 15], catalog::CHEST);
        assert!(s.chunk_blocks(ChunkKey::new(9, 9)).is_none());
    }

    #[test]
    fn generated_chunks_are_digested_on_creation() {
        let mut s = store(0);
        let chunk = s.get_or_gen(ChunkKey::new(4, 4));
        assert!(!chunk.is_dirty());
    }

    #[test]
    fn writes_change_the_chunk_digest() {
        let mut s = store(0);
        s.get_block(40, 0, 40);
        let key = ChunkKey::new(2, 2);
        let before = s.chunk_digest(key).expect("digest");
        let current = s.get_block(40, 0, 40);
        let replacement = if current == catalog::PLANK { catalog::TORCH } else { catalog::PLANK };
        s.set_block(40, 0, 40, replacement);
        assert_ne!(s.chunk_digest(key).expect("digest"), before);
    }

    #[test]
    fn preload_matches_lazy_generation() {
        let mut eager = store(0);
        let created = eager.preload_area(ChunkKey::new(0, 0), 2);
        assert_eq!(created, 25);
        assert_eq!(eager.preload_area(ChunkKey::new(0, 0), 2), 0);

        let mut lazy = store(0);
        for cx in -2..=2 {
            for cz in -2..=2 {
                lazy.get_or_gen(ChunkKey::new(cx, cz));
            }
        }
        assert_eq!(eager.digests(), lazy.digests());
    }

    #[test]
    fn preload_skips_chunks_outside_the_boundary() {
        let mut s = store(20);
        // Chunks -2..=1 on each axis overlap [-20, 20].
        s.preload_area(ChunkKey::new(0, 0), 5);
        assert_eq!(s.len(), 16);
    }
}
