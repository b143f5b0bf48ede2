//! Land claims, laws and organisations.
//!
//! The functions here are pure over their inputs; the world aggregate owns the
//! maps and sequences checks, mutations and audit records around them.

pub mod claims;
pub mod laws;
pub mod orgs;

use std::fmt;

use contracts::ErrorCode;

pub use claims::{LandClaim, Permissions};
pub use laws::{Law, LawError, LawStatus};
pub use orgs::{OrgKind, OrgRole, Organization};

/// A player-facing refusal: a closed error code plus a human message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub code: ErrorCode,
    pub message: String,
}

impl Rejection {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

pub fn reject<T>(code: ErrorCode, message: impl Into<String>) -> Result<T, Rejection> {
    Err(Rejection::new(code, message))
}

/// Shared gate for claim administration: the land must exist and the actor must administer it.
pub fn validate_land_admin(land_exists: bool, is_admin: bool) -> Result<(), Rejection> {
    if !land_exists {
        return reject(ErrorCode::InvalidTarget, "land not found");
    }
    if !is_admin {
        return reject(ErrorCode::NoPermission, "not land admin");
    }
    Ok(())
}
