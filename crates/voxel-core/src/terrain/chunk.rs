use sha2::{Digest, Sha256};

use crate::catalog::BlockId;

pub const CHUNK_SIZE: i32 = 16;
pub const CHUNK_BLOCKS: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;

/// Chunk coordinates; ordered by `cx` then `cz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub cx: i32,
    pub cz: i32,
}

impl ChunkKey {
    pub fn new(cx: i32, cz: i32) -> Self {
        Self { cx, cz }
    }
}

/// A 16x16 column of blocks with a lazily refreshed SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub key: ChunkKey,
    blocks: Vec<BlockId>,
    dirty: bool,
    hash: [u8; 32],
}

fn index(lx: i32, lz: i32) -> usize {
    (lx + lz * CHUNK_SIZE) as usize
}

impl Chunk {
    /// Returns `None` unless `blocks` holds exactly one chunk's worth of cells.
    pub fn from_blocks(key: ChunkKey, blocks: Vec<BlockId>) -> Option<Self> {
        if blocks.len() != CHUNK_BLOCKS {
            return None;
        }
        Some(Self {
            key,
            blocks,
            dirty: true,
            hash: [0; 32],
        })
    }

    pub(crate) fn generated(key: ChunkKey, mut blocks: Vec<BlockId>) -> Self {
        blocks.resize(CHUNK_BLOCKS, 0);
        Self {
            key,
            blocks,
            dirty: true,
            hash: [0; 32],
        }
    }

    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    pub fn get(&self, lx: i32, lz: i32) -> BlockId {
        self.blocks[index(lx, lz)]
    }

    /// Writing the value already present leaves the digest cache untouched.
    pub fn set(&mut self, lx: i32, lz: i32, block: BlockId) {
        let i = index(lx, lz);
        if self.blocks[i] == block {
            return;
        }
        self.blocks[i] = block;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn digest(&mut self) -> [u8; 32] {
        if self.dirty || self.hash == [0; 32] {
            self.hash = digest_blocks(&self.blocks);
            self.dirty = false;
        }
        self.hash
    }
}

/// SHA-256 over the cells as little-endian `u16`, in index order.
pub fn digest_blocks(blocks: &[BlockId]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for block in blocks {
        hasher.update(block.to_le_bytes());
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    fn blank() -> Chunk {
        Chunk::from_blocks(ChunkKey::new(0, 0), vec![catalog::AIR; CHUNK_BLOCKS]).expect("chunk")
    }

    #[test]
    fn from_blocks_requires_full_chunk() {
        assert!(Chunk::from_blocks(ChunkKey::new(0, 0), vec![0; 255]).is_none());
        assert!(Chunk::from_blocks(ChunkKey::new(0, 0), vec![0; 257]).is_none());
    }

    #[test]
    fn cells_are_indexed_x_fastest() {
        let mut chunk = blank();
        chunk.set(3, 2, catalog::STONE);
        assert_eq!(chunk.blocks()[3 + 2 * 16], catalog::STONE);
        assert_eq!(chunk.get(3, 2), catalog::STONE);
        assert_eq!(chunk.get(2, 3), catalog::AIR);
    }

    #[test]
    fn digest_tracks_content_changes() {
        let mut chunk = blank();
        let before = chunk.digest();
        assert!(!chunk.is_dirty());

        chunk.set(0, 0, catalog::AIR);
        assert!(!chunk.is_dirty(), "same value must not dirty the chunk");

        chunk.set(0, 0, catalog::LOG);
        assert!(chunk.is_dirty());
        let after = chunk.digest();
        assert_ne!(before, after);

        chunk.set(0, 0, catalog::AIR);
        assert_eq!(chunk.digest(), before);
    }

    #[test]
    fn digest_is_sha256_of_little_endian_cells() {
        let mut chunk = blank();
        chunk.set(1, 0, 0x0102);
        let mut bytes = vec![0u8; CHUNK_BLOCKS * 2];
        bytes[2] = 0x02;
        bytes[3] = 0x01;
        let expected: [u8; 32] = Sha256::digest(&bytes).into();
        assert_eq!(chunk.digest(), expected);
    }

    #[test]
    fn keys_order_by_cx_then_cz() {
        let mut keys = vec![ChunkKey::new(1, -5), ChunkKey::new(0, 9), ChunkKey::new(1, -6)];
        keys.sort();
        assert_eq!(
            keys,
            vec![ChunkKey::new(0, 9), ChunkKey::new(1, -6), ChunkKey::new(1, -5)]
        );
    }
}
