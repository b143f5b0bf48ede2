//! Snapshot V1 document shape. Field names are the wire format; every list is written sorted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Pos3;

fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

fn is_zero_i32(value: &i32) -> bool {
    *value == 0
}

fn is_zero_u64(value: &u64) -> bool {
    *value == 0
}

fn is_zero_f64(value: &f64) -> bool {
    *value == 0.0
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_origin(value: &Pos3) -> bool {
    *value == [0, 0, 0]
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: i64,
    pub world_id: String,
    pub tick: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SnapshotV1 {
    pub header: SnapshotHeader,

    pub seed: i64,
    #[serde(rename = "tick_rate_hz")]
    pub tick_rate: i64,
    pub day_ticks: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub season_length_ticks: i64,
    pub obs_radius: i64,
    pub height: i64,
    pub boundary_r: i32,

    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub biome_region_size: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub spawn_clear_radius: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub ore_cluster_prob_scale_permille: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub terrain_cluster_prob_scale_permille: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub sprinkle_stone_permille: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub sprinkle_dirt_permille: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub sprinkle_log_permille: i32,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub starter_items: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub snapshot_every_ticks: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub director_every_ticks: i64,
    #[serde(default)]
    pub rate_limits: RateLimitsV1,

    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub law_notice_ticks: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub law_vote_ticks: i64,

    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub blueprint_auto_pull_range: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub blueprint_blocks_per_tick: i64,

    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub access_pass_core_radius: i32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub maintenance_cost: BTreeMap<String, i64>,

    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub fun_decay_window_ticks: i64,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub fun_decay_base: f64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub structure_survival_ticks: i64,

    #[serde(default)]
    pub weather: String,
    #[serde(default)]
    pub weather_until_tick: u64,
    #[serde(default)]
    pub active_event_id: String,
    #[serde(rename = "active_event_start_tick", default, skip_serializing_if = "is_zero_u64")]
    pub active_event_start: u64,
    #[serde(rename = "active_event_ends_tick", default)]
    pub active_event_ends: u64,
    #[serde(default, skip_serializing_if = "is_origin")]
    pub active_event_center: Pos3,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub active_event_radius: i64,

    #[serde(default)]
    pub chunks: Vec<ChunkV1>,
    #[serde(default)]
    pub agents: Vec<AgentV1>,
    #[serde(default)]
    pub claims: Vec<ClaimV1>,
    #[serde(default)]
    pub containers: Vec<ContainerV1>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ItemEntityV1>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signs: Vec<SignV1>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conveyors: Vec<ConveyorV1>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub switches: Vec<SwitchV1>,
    #[serde(default)]
    pub trades: Vec<TradeV1>,
    #[serde(default)]
    pub boards: Vec<BoardV1>,
    #[serde(default)]
    pub contracts: Vec<ContractV1>,
    #[serde(default)]
    pub laws: Vec<LawV1>,
    #[serde(default)]
    pub orgs: Vec<OrgV1>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structures: Vec<StructureV1>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsV1>,

    #[serde(default)]
    pub counters: CountersV1,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RateLimitsV1 {
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub say_window_ticks: i64,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub say_max: i64,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub market_say_window_ticks: i64,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub market_say_max: i64,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub whisper_window_ticks: i64,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub whisper_max: i64,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub offer_trade_window_ticks: i64,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub offer_trade_max: i64,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub post_board_window_ticks: i64,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub post_board_max: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CountersV1 {
    pub next_agent: u64,
    pub next_task: u64,
    pub next_land: u64,
    pub next_trade: u64,
    pub next_post: u64,
    pub next_contract: u64,
    pub next_law: u64,
    pub next_org: u64,
    pub next_item: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkV1 {
    pub cx: i32,
    pub cz: i32,
    pub height: i64,
    pub blocks: Vec<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentV1 {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub org_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_world_id: String,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub world_switch_cooldown_until_tick: u64,
    pub pos: Pos3,
    #[serde(default)]
    pub yaw: i64,

    #[serde(default)]
    pub hp: i64,
    #[serde(default)]
    pub hunger: i64,
    #[serde(default)]
    pub stamina_milli: i64,
    #[serde(default)]
    pub rep_trade: i64,
    #[serde(default)]
    pub rep_build: i64,
    #[serde(default)]
    pub rep_social: i64,
    #[serde(default)]
    pub rep_law: i64,
    #[serde(default)]
    pub fun_novelty: i64,
    #[serde(default)]
    pub fun_creation: i64,
    #[serde(default)]
    pub fun_social: i64,
    #[serde(default)]
    pub fun_influence: i64,
    #[serde(default)]
    pub fun_narrative: i64,
    #[serde(default)]
    pub fun_risk_rescue: i64,
    #[serde(default)]
    pub inventory: BTreeMap<String, i64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub memory: BTreeMap<String, MemoryEntryV1>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rate_windows: BTreeMap<String, RateWindowV1>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seen_biomes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seen_recipes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seen_events: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fun_decay: BTreeMap<String, FunDecayV1>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment: Option<EquipmentV1>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_task: Option<MovementTaskV1>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_task: Option<WorkTaskV1>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryEntryV1 {
    pub value: String,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub expiry_tick: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateWindowV1 {
    pub start_tick: u64,
    pub count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunDecayV1 {
    pub start_tick: u64,
    pub count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EquipmentV1 {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub main_hand: String,
    #[serde(default)]
    pub armor: [String; 4],
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MovementTaskV1 {
    pub task_id: String,
    pub kind: String,
    pub target: Pos3,
    pub tolerance: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target_id: String,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub distance: f64,
    pub start_pos: Pos3,
    pub started_tick: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkTaskV1 {
    pub task_id: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "is_origin")]
    pub block_pos: Pos3,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub recipe_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub item_id: String,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub count: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub blueprint_id: String,
    #[serde(default, skip_serializing_if = "is_origin")]
    pub anchor: Pos3,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub rotation: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub build_index: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub src_container: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dst_container: String,
    pub started_tick: u64,
    pub work_ticks: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClaimV1 {
    pub land_id: String,
    pub owner: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub claim_type: String,
    pub anchor: Pos3,
    pub radius: i32,
    pub flags: ClaimFlagsV1,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,

    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub market_tax: f64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub curfew_enabled: bool,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub curfew_start: f64,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub curfew_end: f64,

    #[serde(default, skip_serializing_if = "is_false")]
    pub fine_break_enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fine_break_item: String,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub fine_break_per_block: i64,

    #[serde(default, skip_serializing_if = "is_false")]
    pub access_pass_enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access_ticket_item: String,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub access_ticket_cost: i64,

    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub maintenance_due_tick: u64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub maintenance_stage: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimFlagsV1 {
    pub allow_build: bool,
    pub allow_break: bool,
    pub allow_damage: bool,
    pub allow_trade: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerV1 {
    #[serde(rename = "type")]
    pub kind: String,
    pub pos: Pos3,
    #[serde(default)]
    pub inventory: BTreeMap<String, i64>,
    #[serde(default)]
    pub reserved: BTreeMap<String, i64>,
    #[serde(default)]
    pub owed: BTreeMap<String, BTreeMap<String, i64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemEntityV1 {
    pub entity_id: String,
    pub pos: Pos3,
    pub item: String,
    pub count: i64,
    pub created_tick: u64,
    pub expires_tick: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignV1 {
    pub pos: Pos3,
    pub text: String,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub updated_tick: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub updated_by: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConveyorV1 {
    pub pos: Pos3,
    pub dx: i32,
    pub dz: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SwitchV1 {
    pub pos: Pos3,
    pub on: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TradeV1 {
    pub trade_id: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub offer: BTreeMap<String, i64>,
    #[serde(default)]
    pub request: BTreeMap<String, i64>,
    #[serde(default)]
    pub created_tick: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardV1 {
    pub board_id: String,
    #[serde(default)]
    pub posts: Vec<BoardPostV1>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardPostV1 {
    pub post_id: String,
    pub author: String,
    pub title: String,
    pub body: String,
    pub tick: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContractV1 {
    pub contract_id: String,
    pub terminal_pos: Pos3,
    pub poster: String,
    #[serde(default)]
    pub acceptor: String,
    pub kind: String,
    pub state: String,
    #[serde(default)]
    pub requirements: BTreeMap<String, i64>,
    #[serde(default)]
    pub reward: BTreeMap<String, i64>,
    #[serde(default)]
    pub deposit: BTreeMap<String, i64>,
    #[serde(default)]
    pub blueprint_id: String,
    #[serde(default)]
    pub anchor: Pos3,
    #[serde(default)]
    pub rotation: i64,
    pub created_tick: u64,
    pub deadline_tick: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LawV1 {
    pub law_id: String,
    pub land_id: String,
    pub template_id: String,
    pub title: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    pub status: String,

    pub proposed_by: String,
    pub proposed_tick: u64,
    pub notice_ends_tick: u64,
    pub vote_ends_tick: u64,
    #[serde(default)]
    pub votes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrgV1 {
    pub org_id: String,
    pub kind: String,
    pub name: String,
    pub created_tick: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub meta_version: u64,
    #[serde(default)]
    pub members: BTreeMap<String, String>,
    #[serde(default)]
    pub treasury: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub treasury_by_world: BTreeMap<String, BTreeMap<String, i64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructureV1 {
    pub structure_id: String,
    pub blueprint_id: String,
    pub builder_id: String,
    pub anchor: Pos3,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub rotation: i64,
    pub min: Pos3,
    pub max: Pos3,

    pub completed_tick: u64,
    pub award_due_tick: u64,
    pub awarded: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub used_by: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub last_influence_day: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsV1 {
    pub bucket_ticks: u64,
    pub window_ticks: u64,
    pub cur_idx: i64,
    pub cur_base: u64,
    pub buckets: Vec<StatsBucketV1>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seen_chunks: Vec<ChunkKeyV1>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsBucketV1 {
    pub trades: i64,
    pub denied: i64,
    pub chunks_discovered: i64,
    pub blueprints_complete: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChunkKeyV1 {
    pub cx: i32,
    pub cz: i32,
}
