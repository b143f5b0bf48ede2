//! Canonical byte encoding fed to the world state hash.
//!
//! Integers are little-endian `u64`; signed values are bit-cast first. Floats
//! are written as their IEEE-754 bits and booleans as one byte. Strings are raw
//! bytes with no length prefix or terminator, so callers must keep field order
//! fixed for the stream to stay unambiguous.

mod codec;
mod state;

pub use codec::{bool_byte, DigestWriter};
pub use state::{state_digest, StateInput};
