//! Writer primitives for the canonical digest stream.

use sha2::{Digest, Sha256};

use crate::model::{ItemMap, Vec3i};

pub fn bool_byte(value: bool) -> u8 {
    u8::from(value)
}

/// Streaming writer over a single SHA-256 state.
#[derive(Debug, Clone, Default)]
pub struct DigestWriter {
    hasher: Sha256,
}

impl DigestWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.write_u64(value as u64);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.write_u64(value.to_bits());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.hasher.update([bool_byte(value)]);
    }

    pub fn write_str(&mut self, value: &str) {
        self.hasher.update(value.as_bytes());
    }

    pub fn write_bytes(&mut self, value: &[u8]) {
        self.hasher.update(value);
    }

    /// Three signed components, x then y then z.
    pub fn write_pos(&mut self, pos: Vec3i) {
        self.write_i64(i64::from(pos.x));
        self.write_i64(i64::from(pos.y));
        self.write_i64(i64::from(pos.z));
    }

    /// Key bytes then the count, ascending by key; zero entries are skipped.
    pub fn write_sorted_non_zero_map(&mut self, map: &ItemMap) {
        for (key, count) in map {
            if *count == 0 {
                continue;
            }
            self.write_str(key);
            self.write_i64(*count);
        }
    }

    pub fn finish(self) -> [u8; 32] {
        self.hasher.finalize().into()
    }

    pub fn finish_hex(self) -> String {
        hex::encode(self.finish())
    }
}
