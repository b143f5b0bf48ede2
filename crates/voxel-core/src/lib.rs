//! Deterministic voxel world-state core.
//!
//! A [`World`] owns a lazily generated single-layer terrain, the land claims,
//! laws and organisations that govern it, and the entity records that feed the
//! state digest and the v1 snapshot document. Every operation is synchronous
//! and every traversal that reaches the digest or an audit record is sorted.

pub mod catalog;
pub mod digest;
pub mod governance;
pub mod ids;
pub mod mathx;
pub mod model;
pub mod rules;
pub mod stats;
pub mod structure;
pub mod terrain;
pub mod world;

pub use governance::{LandClaim, Law, LawError, LawStatus, OrgKind, OrgRole, Organization, Rejection};
pub use model::{ItemMap, Vec3i};
pub use terrain::{ChunkKey, ChunkStore, WorldGen};
pub use world::{chunk_key_of, ConfigError, SnapshotError, StepOutcome, World};
