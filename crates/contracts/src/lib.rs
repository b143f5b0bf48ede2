//! v1 cross-boundary contracts for the world core, API facade, persistence, and CLI.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod serde_i64_string;
pub mod snapshot;

pub const SNAPSHOT_VERSION_V1: i64 = 1;
pub const ACTION_RESULT_TYPE: &str = "ACTION_RESULT";
pub const GLOBAL_WORLD_ID: &str = "GLOBAL";

/// Wire position: `[x, y, z]`.
pub type Pos3 = [i32; 3];

// ---------------------------------------------------------------------------
// Error codes and action results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorCode {
    #[serde(rename = "E_BAD_REQUEST")]
    BadRequest,
    #[serde(rename = "E_INVALID_TARGET")]
    InvalidTarget,
    #[serde(rename = "E_NO_PERMISSION")]
    NoPermission,
    #[serde(rename = "E_NO_RESOURCE")]
    NoResource,
    #[serde(rename = "E_CONFLICT")]
    Conflict,
    #[serde(rename = "E_BLOCKED")]
    Blocked,
    #[serde(rename = "E_INTERNAL")]
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "E_BAD_REQUEST",
            Self::InvalidTarget => "E_INVALID_TARGET",
            Self::NoPermission => "E_NO_PERMISSION",
            Self::NoResource => "E_NO_RESOURCE",
            Self::Conflict => "E_CONFLICT",
            Self::Blocked => "E_BLOCKED",
            Self::Internal => "E_INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope emitted for every mutating request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionResult {
    pub t: u64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "ref")]
    pub ref_id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub payload: BTreeMap<String, Value>,
}

impl ActionResult {
    pub fn ok(tick: u64, ref_id: impl Into<String>) -> Self {
        Self {
            t: tick,
            kind: ACTION_RESULT_TYPE.to_string(),
            ref_id: ref_id.into(),
            ok: true,
            code: None,
            message: None,
            payload: BTreeMap::new(),
        }
    }

    pub fn fail(
        tick: u64,
        ref_id: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            t: tick,
            kind: ACTION_RESULT_TYPE.to_string(),
            ref_id: ref_id.into(),
            ok: false,
            code: Some(code),
            message: Some(message.into()),
            payload: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// Action requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    ClaimLand {
        anchor: Pos3,
        #[serde(default)]
        radius: i32,
    },
    UpgradeClaim {
        land_id: String,
        radius: i32,
    },
    SetPermissions {
        land_id: String,
        #[serde(default)]
        policy: Option<BTreeMap<String, bool>>,
    },
    AddMember {
        land_id: String,
        member_id: String,
    },
    RemoveMember {
        land_id: String,
        member_id: String,
    },
    DeedLand {
        land_id: String,
        new_owner: String,
    },
    ProposeLaw {
        land_id: String,
        template_id: String,
        #[serde(default)]
        title: String,
        #[serde(default)]
        params: Option<BTreeMap<String, Value>>,
    },
    Vote {
        law_id: String,
        choice: String,
    },
    CreateOrg {
        org_kind: String,
        org_name: String,
    },
    JoinOrg {
        org_id: String,
    },
    OrgDeposit {
        org_id: String,
        item: String,
        count: i64,
    },
    OrgWithdraw {
        org_id: String,
        item: String,
        count: i64,
    },
    LeaveOrg,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClaimLand { .. } => "CLAIM_LAND",
            Self::UpgradeClaim { .. } => "UPGRADE_CLAIM",
            Self::SetPermissions { .. } => "SET_PERMISSIONS",
            Self::AddMember { .. } => "ADD_MEMBER",
            Self::RemoveMember { .. } => "REMOVE_MEMBER",
            Self::DeedLand { .. } => "DEED_LAND",
            Self::ProposeLaw { .. } => "PROPOSE_LAW",
            Self::Vote { .. } => "VOTE",
            Self::CreateOrg { .. } => "CREATE_ORG",
            Self::JoinOrg { .. } => "JOIN_ORG",
            Self::OrgDeposit { .. } => "ORG_DEPOSIT",
            Self::OrgWithdraw { .. } => "ORG_WITHDRAW",
            Self::LeaveOrg => "LEAVE_ORG",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionRequest {
    #[serde(rename = "ref")]
    pub ref_id: String,
    pub actor: String,
    #[serde(flatten)]
    pub kind: ActionKind,
}

impl ActionRequest {
    pub fn new(ref_id: impl Into<String>, actor: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            ref_id: ref_id.into(),
            actor: actor.into(),
            kind,
        }
    }
}

// ---------------------------------------------------------------------------
// Audit trail and outbound events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditRecord {
    pub tick: u64,
    pub actor: String,
    pub action: String,
    pub pos: Pos3,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default)]
    pub details: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum WorldEvent {
    Broadcast {
        tick: u64,
        event: String,
        #[serde(default)]
        details: BTreeMap<String, Value>,
    },
    Agent {
        tick: u64,
        agent_id: String,
        event: String,
        #[serde(default)]
        details: BTreeMap<String, Value>,
    },
}

impl WorldEvent {
    pub fn tick(&self) -> u64 {
        match self {
            Self::Broadcast { tick, .. } | Self::Agent { tick, .. } => *tick,
        }
    }

    pub fn event(&self) -> &str {
        match self {
            Self::Broadcast { event, .. } | Self::Agent { event, .. } => event,
        }
    }
}

// ---------------------------------------------------------------------------
// World configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub say_window_ticks: i64,
    pub say_max: i64,
    pub market_say_window_ticks: i64,
    pub market_say_max: i64,
    pub whisper_window_ticks: i64,
    pub whisper_max: i64,
    pub offer_trade_window_ticks: i64,
    pub offer_trade_max: i64,
    pub post_board_window_ticks: i64,
    pub post_board_max: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            say_window_ticks: 50,
            say_max: 5,
            market_say_window_ticks: 50,
            market_say_max: 2,
            whisper_window_ticks: 50,
            whisper_max: 5,
            offer_trade_window_ticks: 50,
            offer_trade_max: 3,
            post_board_window_ticks: 600,
            post_board_max: 1,
        }
    }
}

impl RateLimitConfig {
    fn normalized(mut self) -> Self {
        let defaults = Self::default();
        fill(&mut self.say_window_ticks, defaults.say_window_ticks);
        fill(&mut self.say_max, defaults.say_max);
        fill(&mut self.market_say_window_ticks, defaults.market_say_window_ticks);
        fill(&mut self.market_say_max, defaults.market_say_max);
        fill(&mut self.whisper_window_ticks, defaults.whisper_window_ticks);
        fill(&mut self.whisper_max, defaults.whisper_max);
        fill(&mut self.offer_trade_window_ticks, defaults.offer_trade_window_ticks);
        fill(&mut self.offer_trade_max, defaults.offer_trade_max);
        fill(&mut self.post_board_window_ticks, defaults.post_board_window_ticks);
        fill(&mut self.post_board_max, defaults.post_board_max);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    pub id: String,
    pub world_type: String,
    #[serde(with = "serde_i64_string")]
    pub seed: i64,
    pub tick_rate_hz: i64,
    pub day_ticks: i64,
    pub season_length_ticks: i64,
    pub obs_radius: i64,
    pub height: i64,
    pub boundary_r: i32,

    pub allow_claims: bool,
    pub allow_laws: bool,

    pub biome_region_size: i32,
    pub spawn_clear_radius: i32,
    pub ore_cluster_prob_scale_permille: i32,
    pub terrain_cluster_prob_scale_permille: i32,
    pub sprinkle_stone_permille: i32,
    pub sprinkle_dirt_permille: i32,
    pub sprinkle_log_permille: i32,

    pub starter_items: BTreeMap<String, i64>,
    pub snapshot_every_ticks: i64,
    pub director_every_ticks: i64,
    pub rate_limits: RateLimitConfig,

    pub law_notice_ticks: i64,
    pub law_vote_ticks: i64,

    pub blueprint_auto_pull_range: i64,
    pub blueprint_blocks_per_tick: i64,

    pub access_pass_core_radius: i32,
    pub maintenance_cost: BTreeMap<String, i64>,

    pub fun_decay_window_ticks: i64,
    pub fun_decay_base: f64,
    pub structure_survival_ticks: i64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            id: "OVERWORLD".to_string(),
            world_type: "OVERWORLD".to_string(),
            seed: 1337,
            tick_rate_hz: 5,
            day_ticks: 6000,
            season_length_ticks: 6000 * 7,
            obs_radius: 7,
            height: 1,
            boundary_r: 4000,
            allow_claims: true,
            allow_laws: true,
            biome_region_size: 64,
            spawn_clear_radius: 6,
            ore_cluster_prob_scale_permille: 1000,
            terrain_cluster_prob_scale_permille: 1000,
            sprinkle_stone_permille: 12,
            sprinkle_dirt_permille: 4,
            sprinkle_log_permille: 2,
            starter_items: default_starter_items(),
            snapshot_every_ticks: 3000,
            director_every_ticks: 3000,
            rate_limits: RateLimitConfig::default(),
            law_notice_ticks: 3000,
            law_vote_ticks: 3000,
            blueprint_auto_pull_range: 32,
            blueprint_blocks_per_tick: 2,
            access_pass_core_radius: 16,
            maintenance_cost: default_maintenance_cost(),
            fun_decay_window_ticks: 3000,
            fun_decay_base: 0.70,
            structure_survival_ticks: 3000,
        }
    }
}

impl WorldConfig {
    /// Fills every non-positive knob with its default. Permille knobs are clamped to `[0, 1000]`.
    pub fn normalized(mut self) -> Self {
        fill(&mut self.tick_rate_hz, 5);
        fill(&mut self.day_ticks, 6000);
        let season = self.day_ticks.saturating_mul(7);
        fill(&mut self.season_length_ticks, season);
        fill(&mut self.obs_radius, 7);
        fill(&mut self.height, 1);
        fill(&mut self.boundary_r, 4000);
        fill(&mut self.biome_region_size, 64);
        fill(&mut self.spawn_clear_radius, 6);
        fill(&mut self.ore_cluster_prob_scale_permille, 1000);
        fill(&mut self.terrain_cluster_prob_scale_permille, 1000);
        fill(&mut self.sprinkle_stone_permille, 12);
        fill(&mut self.sprinkle_dirt_permille, 4);
        fill(&mut self.sprinkle_log_permille, 2);
        for knob in [
            &mut self.ore_cluster_prob_scale_permille,
            &mut self.terrain_cluster_prob_scale_permille,
            &mut self.sprinkle_stone_permille,
            &mut self.sprinkle_dirt_permille,
            &mut self.sprinkle_log_permille,
        ] {
            *knob = (*knob).clamp(0, 1000);
        }
        fill(&mut self.snapshot_every_ticks, 3000);
        fill(&mut self.director_every_ticks, 3000);
        self.rate_limits = self.rate_limits.normalized();
        fill(&mut self.law_notice_ticks, 3000);
        fill(&mut self.law_vote_ticks, 3000);
        fill(&mut self.blueprint_auto_pull_range, 32);
        fill(&mut self.blueprint_blocks_per_tick, 2);
        fill(&mut self.access_pass_core_radius, 16);
        if self.maintenance_cost.is_empty() {
            self.maintenance_cost = default_maintenance_cost();
        }
        fill(&mut self.fun_decay_window_ticks, 3000);
        if self.fun_decay_base <= 0.0 || self.fun_decay_base > 1.0 {
            self.fun_decay_base = 0.70;
        }
        fill(&mut self.structure_survival_ticks, 3000);
        self
    }

    /// Treasury key for this world; an empty id maps to `GLOBAL`.
    pub fn treasury_world_id(&self) -> &str {
        if self.id.trim().is_empty() {
            GLOBAL_WORLD_ID
        } else {
            &self.id
        }
    }
}

pub fn default_maintenance_cost() -> BTreeMap<String, i64> {
    BTreeMap::from([("IRON_INGOT".to_string(), 1), ("COAL".to_string(), 1)])
}

fn default_starter_items() -> BTreeMap<String, i64> {
    BTreeMap::from([
        ("PLANK".to_string(), 20),
        ("COAL".to_string(), 10),
        ("STONE".to_string(), 20),
        ("BERRIES".to_string(), 10),
    ])
}

fn fill<T: PartialOrd + Default>(slot: &mut T, default: T) {
    if *slot <= T::default() {
        *slot = default;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_codes_serialize_with_prefix() {
        let encoded = serde_json::to_string(&ErrorCode::NoResource).expect("serialize");
        assert_eq!(encoded, "\"E_NO_RESOURCE\"");
        let decoded: ErrorCode = serde_json::from_str("\"E_BLOCKED\"").expect("deserialize");
        assert_eq!(decoded, ErrorCode::Blocked);
    }

    #[test]
    fn action_result_flattens_payload() {
        let result = ActionResult::ok(100, "req-1").with("land_id", "LAND_1");
        let value = serde_json::to_value(&result).expect("serialize");
        assert_eq!(
            value,
            json!({"t": 100, "type": "ACTION_RESULT", "ref": "req-1", "ok": true, "land_id": "LAND_1"})
        );
        assert_eq!(result.payload_str("land_id"), Some("LAND_1"));
    }

    #[test]
    fn failed_action_result_carries_code_and_message() {
        let result = ActionResult::fail(7, "req-2", ErrorCode::Conflict, "overlaps existing land");
        let value = serde_json::to_value(&result).expect("serialize");
        assert_eq!(value["code"], json!("E_CONFLICT"));
        assert_eq!(value["message"], json!("overlaps existing land"));
        assert_eq!(value["ok"], json!(false));
    }

    #[test]
    fn action_request_uses_flat_type_tag() {
        let raw = json!({
            "ref": "r1",
            "actor": "A1",
            "type": "CLAIM_LAND",
            "anchor": [10, 0, 10],
            "radius": 32
        });
        let request: ActionRequest = serde_json::from_value(raw).expect("deserialize");
        assert_eq!(request.actor, "A1");
        assert_eq!(
            request.kind,
            ActionKind::ClaimLand {
                anchor: [10, 0, 10],
                radius: 32
            }
        );
        assert_eq!(request.kind.name(), "CLAIM_LAND");

        let leave: ActionRequest =
            serde_json::from_value(json!({"ref": "r2", "actor": "A2", "type": "LEAVE_ORG"}))
                .expect("unit variant");
        assert_eq!(leave.kind, ActionKind::LeaveOrg);
    }

    #[test]
    fn normalized_config_fills_non_positive_values() {
        let mut config = WorldConfig::default();
        config.day_ticks = 0;
        config.season_length_ticks = -1;
        config.sprinkle_log_permille = 4000;
        config.maintenance_cost.clear();
        config.fun_decay_base = 3.0;
        config.rate_limits.post_board_max = 0;

        let config = config.normalized();
        assert_eq!(config.day_ticks, 6000);
        assert_eq!(config.season_length_ticks, 42_000);
        assert_eq!(config.sprinkle_log_permille, 1000);
        assert_eq!(config.maintenance_cost, default_maintenance_cost());
        assert_eq!(config.fun_decay_base, 0.70);
        assert_eq!(config.rate_limits.post_board_max, 1);
    }

    #[test]
    fn partial_config_json_falls_back_to_defaults() {
        let config: WorldConfig =
            serde_json::from_str(r#"{"id":"CITY","seed":"42","boundary_r":100}"#).expect("config");
        assert_eq!(config.id, "CITY");
        assert_eq!(config.seed, 42);
        assert_eq!(config.boundary_r, 100);
        assert_eq!(config.day_ticks, 6000);
    }

    #[test]
    fn treasury_world_id_defaults_to_global() {
        let mut config = WorldConfig::default();
        assert_eq!(config.treasury_world_id(), "OVERWORLD");
        config.id = "  ".to_string();
        assert_eq!(config.treasury_world_id(), GLOBAL_WORLD_ID);
    }
}
