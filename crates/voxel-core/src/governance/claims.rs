//! Land claims: Chebyshev squares around a totem block.

use std::collections::{BTreeMap, BTreeSet};

use contracts::ErrorCode;

use crate::governance::{reject, Rejection};
use crate::model::{ItemMap, Vec3i};
use crate::rules::{ClaimFlags, ClaimType};

pub const DEFAULT_CLAIM_RADIUS: i32 = 32;
pub const MAX_CLAIM_RADIUS: i32 = 128;
pub const DEFAULT_CORE_RADIUS: i32 = 16;
pub const MAX_MAINTENANCE_STAGE: u8 = 2;

/// Items consumed when a claim is placed.
pub const CLAIM_COST: [(&str, i64); 2] = [("BATTERY", 1), ("CRYSTAL_SHARD", 1)];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Curfew {
    pub enabled: bool,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FineBreak {
    pub enabled: bool,
    pub item: String,
    pub per_block: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPass {
    pub enabled: bool,
    pub item: String,
    pub cost: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandClaim {
    pub land_id: String,
    /// Agent id, or an org id for org-owned land.
    pub owner: String,
    pub claim_type: ClaimType,
    pub anchor: Vec3i,
    pub radius: i32,
    pub flags: ClaimFlags,
    pub members: BTreeSet<String>,

    pub market_tax: f64,
    pub curfew: Curfew,
    pub fine_break: FineBreak,
    pub access_pass: AccessPass,

    pub maintenance_due_tick: u64,
    /// 0 healthy, 1 late (no expansion), 2 unprotected.
    pub maintenance_stage: u8,
}

impl LandClaim {
    pub fn contains(&self, pos: Vec3i) -> bool {
        chebyshev_within(self.anchor, pos, i64::from(self.radius))
    }

    pub fn core_radius(&self, configured: i32) -> i32 {
        core_radius(self.radius, configured)
    }

    pub fn core_contains(&self, pos: Vec3i, configured: i32) -> bool {
        core_contains(self.anchor, pos, self.core_radius(configured))
    }
}

fn chebyshev_within(anchor: Vec3i, pos: Vec3i, r: i64) -> bool {
    let dx = (i64::from(pos.x) - i64::from(anchor.x)).abs();
    let dz = (i64::from(pos.z) - i64::from(anchor.z)).abs();
    dx <= r && dz <= r
}

/// Non-positive requests get the default radius; everything is capped at 128.
pub fn clamp_claim_radius(requested: i32) -> i32 {
    if requested <= 0 {
        DEFAULT_CLAIM_RADIUS
    } else {
        requested.min(MAX_CLAIM_RADIUS)
    }
}

pub fn core_radius(land_radius: i32, configured: i32) -> i32 {
    let r = if configured <= 0 {
        DEFAULT_CORE_RADIUS
    } else {
        configured
    };
    r.min(land_radius).max(0)
}

pub fn core_contains(anchor: Vec3i, pos: Vec3i, core_radius: i32) -> bool {
    core_radius > 0 && chebyshev_within(anchor, pos, i64::from(core_radius))
}

/// True when a square of `radius` at `anchor` touches any claim other than `exclude`.
pub fn overlaps_any<'a>(
    anchor: Vec3i,
    radius: i32,
    exclude: Option<&str>,
    claims: impl IntoIterator<Item = &'a LandClaim>,
) -> bool {
    claims.into_iter().any(|other| {
        if other.radius <= 0 || Some(other.land_id.as_str()) == exclude {
            return false;
        }
        let reach = i64::from(radius) + i64::from(other.radius);
        chebyshev_within(anchor, other.anchor, reach)
    })
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    pub can_build: bool,
    pub can_break: bool,
    pub can_damage: bool,
    pub can_trade: bool,
}

impl Permissions {
    /// Unclaimed land.
    pub const WILD: Self = Self {
        can_build: true,
        can_break: true,
        can_damage: false,
        can_trade: true,
    };
}

pub fn resolve_permissions(is_member: bool, stage: u8, flags: ClaimFlags) -> Permissions {
    if is_member {
        return Permissions {
            can_build: true,
            can_break: true,
            can_damage: flags.allow_damage,
            can_trade: true,
        };
    }
    if stage >= MAX_MAINTENANCE_STAGE {
        return Permissions::WILD;
    }
    Permissions {
        can_build: flags.allow_build,
        can_break: flags.allow_break,
        can_damage: flags.allow_damage,
        can_trade: flags.allow_trade,
    }
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

pub fn validate_set_permissions_input(
    land_id: &str,
    policy: Option<&BTreeMap<String, bool>>,
) -> Result<(), Rejection> {
    if land_id.trim().is_empty() || policy.is_none() {
        return reject(ErrorCode::BadRequest, "missing land_id/policy");
    }
    Ok(())
}

/// Overrides only the keys present in `policy`.
pub fn apply_policy_flags(flags: ClaimFlags, policy: &BTreeMap<String, bool>) -> ClaimFlags {
    let pick = |key: &str, current: bool| policy.get(key).copied().unwrap_or(current);
    ClaimFlags {
        allow_build: pick("allow_build", flags.allow_build),
        allow_break: pick("allow_break", flags.allow_break),
        allow_damage: pick("allow_damage", flags.allow_damage),
        allow_trade: pick("allow_trade", flags.allow_trade),
    }
}

pub fn validate_member_mutation_input(land_id: &str, member_id: &str) -> Result<(), Rejection> {
    if land_id.trim().is_empty() || member_id.trim().is_empty() {
        return reject(ErrorCode::BadRequest, "missing land_id/member_id");
    }
    Ok(())
}

pub fn validate_deed_input(land_id: &str, new_owner: &str) -> Result<(), Rejection> {
    if land_id.trim().is_empty() || new_owner.trim().is_empty() {
        return reject(ErrorCode::BadRequest, "missing land_id/new_owner");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Upgrades
// ---------------------------------------------------------------------------

pub fn validate_upgrade_input(land_id: &str, radius: i32) -> Result<(), Rejection> {
    if land_id.trim().is_empty() || radius <= 0 {
        return reject(ErrorCode::BadRequest, "missing land_id/radius");
    }
    Ok(())
}

pub fn validate_upgrade_radius(current: i32, target: i32) -> Result<(), Rejection> {
    if target != 64 && target != 128 {
        return reject(ErrorCode::BadRequest, "radius must be 64 or 128");
    }
    if target <= current {
        return reject(ErrorCode::BadRequest, "radius must increase");
    }
    Ok(())
}

/// Every threshold crossed on the way from `current` to `target` adds its price.
pub fn upgrade_cost(current: i32, target: i32) -> ItemMap {
    let mut cost = ItemMap::new();
    let mut add = |item: &str, n: i64| *cost.entry(item.to_string()).or_insert(0) += n;
    if current < 64 && target >= 64 {
        add("BATTERY", 1);
        add("CRYSTAL_SHARD", 2);
    }
    if current < 128 && target >= 128 {
        add("BATTERY", 2);
        add("CRYSTAL_SHARD", 4);
    }
    cost
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceStatus {
    Paid,
    Late,
}

impl MaintenanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "PAID",
            Self::Late => "LATE",
        }
    }
}

pub fn initial_maintenance_due(now_tick: u64, day_ticks: i64) -> u64 {
    if day_ticks > 0 {
        now_tick + day_ticks as u64
    } else {
        0
    }
}

/// Schedules unscheduled claims and reports whether a payment is owed now.
pub fn maintenance_due(claim: &mut LandClaim, now_tick: u64, day_ticks: u64) -> bool {
    if claim.maintenance_due_tick == 0 {
        claim.maintenance_due_tick = now_tick + day_ticks;
        return false;
    }
    now_tick >= claim.maintenance_due_tick
}

/// Resolves one due payment: a paid day resets the stage, a missed one bumps it.
pub fn settle_maintenance(claim: &mut LandClaim, paid: bool, day_ticks: u64) -> MaintenanceStatus {
    let status = if paid {
        claim.maintenance_stage = 0;
        MaintenanceStatus::Paid
    } else {
        claim.maintenance_stage = (claim.maintenance_stage + 1).min(MAX_MAINTENANCE_STAGE);
        MaintenanceStatus::Late
    };
    claim.maintenance_due_tick += day_ticks;
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn claim(id: &str, x: i32, z: i32, radius: i32) -> LandClaim {
        LandClaim {
            land_id: id.to_string(),
            owner: "A1".to_string(),
            anchor: Vec3i::new(x, 0, z),
            radius,
            ..LandClaim::default()
        }
    }

    #[test]
    fn radius_clamps_to_default_and_cap() {
        assert_eq!(clamp_claim_radius(0), 32);
        assert_eq!(clamp_claim_radius(-5), 32);
        assert_eq!(clamp_claim_radius(12), 12);
        assert_eq!(clamp_claim_radius(500), 128);
    }

    #[test]
    fn contains_is_chebyshev() {
        let c = claim("LAND_1", 10, 10, 5);
        assert!(c.contains(Vec3i::new(15, 0, 5)));
        assert!(!c.contains(Vec3i::new(16, 0, 10)));
    }

    #[test]
    fn overlap_skips_self_and_degenerate_claims() {
        let claims = [claim("LAND_1", 10, 10, 32), claim("LAND_2", 500, 500, 0)];
        assert!(overlaps_any(Vec3i::new(20, 0, 20), 32, None, &claims));
        assert!(!overlaps_any(Vec3i::new(10, 0, 10), 64, Some("LAND_1"), &claims));
        assert!(!overlaps_any(Vec3i::new(500, 0, 500), 1, None, &claims));
        assert!(!overlaps_any(Vec3i::new(75, 0, 10), 32, None, &claims));
        assert!(overlaps_any(Vec3i::new(74, 0, 10), 32, None, &claims));
    }

    #[test]
    fn core_radius_defaults_and_caps() {
        assert_eq!(core_radius(32, 0), 16);
        assert_eq!(core_radius(8, 0), 8);
        assert_eq!(core_radius(64, 24), 24);
        assert_eq!(core_radius(-1, 4), 0);
        assert!(!core_contains(Vec3i::default(), Vec3i::default(), 0));
        assert!(core_contains(Vec3i::default(), Vec3i::new(3, 0, -3), 3));
    }

    #[test]
    fn member_permissions_keep_damage_flag() {
        let flags = ClaimFlags {
            allow_damage: true,
            ..ClaimFlags::default()
        };
        let p = resolve_permissions(true, 2, flags);
        assert!(p.can_build && p.can_break && p.can_trade && p.can_damage);
    }

    #[test]
    fn lapsed_land_is_wild_for_visitors() {
        assert_eq!(resolve_permissions(false, 2, ClaimFlags::default()), Permissions::WILD);
        let visitor = resolve_permissions(false, 1, ClaimFlags::default());
        assert!(!visitor.can_build && !visitor.can_break && !visitor.can_trade);
    }

    #[test]
    fn upgrade_radius_validation() {
        assert_eq!(
            validate_upgrade_radius(64, 64).map_err(|r| r.code),
            Err(ErrorCode::BadRequest)
        );
        assert!(validate_upgrade_radius(32, 64).is_ok());
        assert!(validate_upgrade_radius(32, 100).is_err());
        assert!(validate_upgrade_input("", 64).is_err());
        assert!(validate_upgrade_input("LAND_1", 0).is_err());
    }

    #[test]
    fn upgrade_cost_accumulates_thresholds() {
        let full = upgrade_cost(32, 128);
        assert_eq!(full.get("BATTERY"), Some(&3));
        assert_eq!(full.get("CRYSTAL_SHARD"), Some(&6));
        let half = upgrade_cost(64, 128);
        assert_eq!(half.get("BATTERY"), Some(&2));
        assert!(upgrade_cost(128, 128).is_empty());
    }

    #[test]
    fn policy_flags_override_only_present_keys() {
        let policy = BTreeMap::from([("allow_build".to_string(), true), ("allow_trade".to_string(), false)]);
        let base = ClaimFlags {
            allow_break: true,
            allow_trade: true,
            ..ClaimFlags::default()
        };
        let next = apply_policy_flags(base, &policy);
        assert!(next.allow_build && next.allow_break && !next.allow_trade && !next.allow_damage);
        assert!(validate_set_permissions_input("LAND_1", None).is_err());
        assert!(validate_set_permissions_input(" ", Some(&policy)).is_err());
    }

    #[test]
    fn maintenance_schedules_then_settles() {
        let mut c = claim("LAND_1", 0, 0, 32);
        assert!(!maintenance_due(&mut c, 100, 6000));
        assert_eq!(c.maintenance_due_tick, 6100);
        assert!(!maintenance_due(&mut c, 6099, 6000));
        assert!(maintenance_due(&mut c, 6100, 6000));

        assert_eq!(settle_maintenance(&mut c, false, 6000), MaintenanceStatus::Late);
        assert_eq!((c.maintenance_stage, c.maintenance_due_tick), (1, 12100));
        settle_maintenance(&mut c, false, 6000);
        settle_maintenance(&mut c, false, 6000);
        assert_eq!(c.maintenance_stage, 2);
        assert_eq!(settle_maintenance(&mut c, true, 6000), MaintenanceStatus::Paid);
        assert_eq!(c.maintenance_stage, 0);
        assert_eq!(initial_maintenance_due(100, 0), 0);
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(
            ax in -300i32..300, az in -300i32..300, ar in 1i32..128,
            bx in -300i32..300, bz in -300i32..300, br in 1i32..128,
        ) {
            let a = claim("LAND_1", ax, az, ar);
            let b = claim("LAND_2", bx, bz, br);
            prop_assert_eq!(
                overlaps_any(a.anchor, a.radius, None, [&b]),
                overlaps_any(b.anchor, b.radius, None, [&a])
            );
        }
    }
}
