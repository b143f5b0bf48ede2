//! Procedural 2-D terrain: the generator and the lazy chunk store it feeds.

pub mod chunk;
pub mod gen;
pub mod store;

pub use chunk::{Chunk, ChunkKey, CHUNK_BLOCKS, CHUNK_SIZE};
pub use gen::{Biome, BlockPalette, WorldGen};
pub use store::ChunkStore;
