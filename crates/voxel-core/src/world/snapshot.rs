//! Snapshot V1 export and import.
//!
//! Export walks every map in key order so two worlds with equal state produce
//! equal documents. Import validates the whole document before touching the
//! running world, then swaps the rebuilt world in.

use std::collections::BTreeMap;

use contracts::snapshot::{
    AgentV1, BoardPostV1, BoardV1, ChunkV1, ClaimFlagsV1, ClaimV1, ContainerV1, ContractV1, ConveyorV1,
    EquipmentV1, FunDecayV1, ItemEntityV1, LawV1, MemoryEntryV1, MovementTaskV1, OrgV1, RateLimitsV1,
    RateWindowV1, SignV1, SnapshotHeader, SnapshotV1, StructureV1, SwitchV1, TradeV1, WorkTaskV1,
};
use contracts::{RateLimitConfig, WorldConfig, SNAPSHOT_VERSION_V1};
use thiserror::Error;
use tracing::info;

use super::World;
use crate::catalog::{self, BlockId};
use crate::governance::claims::{AccessPass, Curfew, FineBreak, LandClaim, MAX_MAINTENANCE_STAGE};
use crate::governance::laws::{Law, LawStatus};
use crate::governance::orgs::{OrgKind, OrgRole, Organization};
use crate::ids::{self, IdCounters};
use crate::model::{
    positive_items, Agent, Board, BoardPost, Container, Contract, ConveyorMeta, Environment, Equipment,
    FunDecayWindow, FunScore, ItemEntity, MemoryEntry, MovementTask, RateWindow, Sign, Structure, Trade,
    Vec3i, WorkTask,
};
use crate::rules::{ClaimFlags, ClaimType};
use crate::stats::WorldStats;
use crate::terrain::{Chunk, ChunkKey, ChunkStore, WorldGen, CHUNK_BLOCKS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(i64),
    #[error("snapshot belongs to world {found:?}, expected {expected:?}")]
    WorldMismatch { expected: String, found: String },
    #[error("unsupported snapshot height {0}")]
    UnsupportedHeight(i64),
    #[error("invalid tick rate {0}")]
    InvalidTickRate(i64),
    #[error("invalid day length {0}")]
    InvalidDayTicks(i64),
    #[error("invalid observation radius {0}")]
    InvalidObsRadius(i64),
    #[error("chunk ({cx}, {cz}) has height {height}")]
    ChunkHeight { cx: i32, cz: i32, height: i64 },
    #[error("chunk ({cx}, {cz}) has {len} blocks, expected {CHUNK_BLOCKS}")]
    ChunkSize { cx: i32, cz: i32, len: usize },
}

impl World {
    pub fn export_snapshot(&self) -> SnapshotV1 {
        let c = &self.config;
        let env = &self.env;
        let snap = SnapshotV1 {
            header: SnapshotHeader {
                version: SNAPSHOT_VERSION_V1,
                world_id: c.id.clone(),
                tick: self.tick,
            },
            seed: c.seed,
            tick_rate: c.tick_rate_hz,
            day_ticks: c.day_ticks,
            season_length_ticks: c.season_length_ticks,
            obs_radius: c.obs_radius,
            height: c.height,
            boundary_r: c.boundary_r,
            biome_region_size: c.biome_region_size,
            spawn_clear_radius: c.spawn_clear_radius,
            ore_cluster_prob_scale_permille: c.ore_cluster_prob_scale_permille,
            terrain_cluster_prob_scale_permille: c.terrain_cluster_prob_scale_permille,
            sprinkle_stone_permille: c.sprinkle_stone_permille,
            sprinkle_dirt_permille: c.sprinkle_dirt_permille,
            sprinkle_log_permille: c.sprinkle_log_permille,
            starter_items: c.starter_items.clone(),
            snapshot_every_ticks: c.snapshot_every_ticks,
            director_every_ticks: c.director_every_ticks,
            rate_limits: rate_limits_v1(&c.rate_limits),
            law_notice_ticks: c.law_notice_ticks,
            law_vote_ticks: c.law_vote_ticks,
            blueprint_auto_pull_range: c.blueprint_auto_pull_range,
            blueprint_blocks_per_tick: c.blueprint_blocks_per_tick,
            access_pass_core_radius: c.access_pass_core_radius,
            maintenance_cost: c.maintenance_cost.clone(),
            fun_decay_window_ticks: c.fun_decay_window_ticks,
            fun_decay_base: c.fun_decay_base,
            structure_survival_ticks: c.structure_survival_ticks,

            weather: env.weather.clone(),
            weather_until_tick: env.weather_until_tick,
            active_event_id: env.active_event_id.clone(),
            active_event_start: env.active_event_start,
            active_event_ends: env.active_event_ends,
            active_event_center: env.active_event_center.to_array(),
            active_event_radius: env.active_event_radius,

            chunks: self
                .store
                .chunks()
                .map(|chunk| ChunkV1 {
                    cx: chunk.key.cx,
                    cz: chunk.key.cz,
                    height: 1,
                    blocks: chunk.blocks().to_vec(),
                })
                .collect(),
            agents: self.agents.values().map(agent_to_v1).collect(),
            claims: self.claims.values().map(claim_to_v1).collect(),
            containers: self
                .containers
                .values()
                .map(|ct| ContainerV1 {
                    kind: ct.kind.clone(),
                    pos: ct.pos.to_array(),
                    inventory: positive_items(&ct.inventory),
                    reserved: positive_items(&ct.reserved),
                    owed: ct.owed.clone(),
                })
                .collect(),
            items: self
                .items
                .values()
                .filter(|it| it.is_valid() && !it.is_expired(last_processed_tick(self.tick)))
                .map(|it| ItemEntityV1 {
                    entity_id: it.entity_id.clone(),
                    pos: it.pos.to_array(),
                    item: it.item.clone(),
                    count: it.count,
                    created_tick: it.created_tick,
                    expires_tick: it.expires_tick,
                })
                .collect(),
            signs: self
                .signs
                .iter()
                .filter(|(pos, _)| self.resident_block(**pos) == Some(catalog::SIGN))
                .map(|(pos, s)| SignV1 {
                    pos: pos.to_array(),
                    text: s.text.clone(),
                    updated_tick: s.updated_tick,
                    updated_by: s.updated_by.clone(),
                })
                .collect(),
            conveyors: self
                .conveyors
                .iter()
                .filter(|(pos, _)| self.resident_block(**pos) == Some(catalog::CONVEYOR))
                .map(|(pos, m)| ConveyorV1 {
                    pos: pos.to_array(),
                    dx: m.dx,
                    dz: m.dz,
                })
                .collect(),
            switches: self
                .switches
                .iter()
                .filter(|(pos, _)| self.resident_block(**pos) == Some(catalog::SWITCH))
                .map(|(pos, on)| SwitchV1 {
                    pos: pos.to_array(),
                    on: *on,
                })
                .collect(),
            trades: self
                .trades
                .values()
                .map(|t| TradeV1 {
                    trade_id: t.trade_id.clone(),
                    from: t.from.clone(),
                    to: t.to.clone(),
                    offer: positive_items(&t.offer),
                    request: positive_items(&t.request),
                    created_tick: t.created_tick,
                })
                .collect(),
            boards: self
                .boards
                .values()
                .map(|b| BoardV1 {
                    board_id: b.board_id.clone(),
                    posts: b
                        .posts
                        .iter()
                        .map(|p| BoardPostV1 {
                            post_id: p.post_id.clone(),
                            author: p.author.clone(),
                            title: p.title.clone(),
                            body: p.body.clone(),
                            tick: p.tick,
                        })
                        .collect(),
                })
                .collect(),
            contracts: self.contracts.values().map(contract_to_v1).collect(),
            laws: self.laws.values().map(law_to_v1).collect(),
            orgs: self.orgs.values().map(org_to_v1).collect(),
            structures: self.structures.values().map(structure_to_v1).collect(),
            stats: Some(self.stats.to_v1()),
            counters: self.ids.to_v1(),
        };
        info!(
            world_id = %snap.header.world_id,
            tick = snap.header.tick,
            chunks = snap.chunks.len(),
            claims = snap.claims.len(),
            "snapshot exported"
        );
        snap
    }

    fn resident_block(&self, pos: Vec3i) -> Option<BlockId> {
        self.store.peek_block(pos.x, pos.y, pos.z)
    }

    /// Rebuilds a world from a snapshot. Config knobs present in the snapshot
    /// override `base`; the world id mismatch check only applies when both
    /// ids are non-empty.
    pub fn from_snapshot(base: WorldConfig, snap: &SnapshotV1) -> Result<Self, SnapshotError> {
        validate_header(&base, snap)?;
        let config = config_from_snapshot(base, snap);

        let mut store = ChunkStore::new(WorldGen::from_config(&config));
        for ch in &snap.chunks {
            if ch.height != 1 {
                return Err(SnapshotError::ChunkHeight {
                    cx: ch.cx,
                    cz: ch.cz,
                    height: ch.height,
                });
            }
            let key = ChunkKey::new(ch.cx, ch.cz);
            let chunk = Chunk::from_blocks(key, ch.blocks.clone()).ok_or(SnapshotError::ChunkSize {
                cx: ch.cx,
                cz: ch.cz,
                len: ch.blocks.len(),
            })?;
            store.insert_chunk(chunk);
        }

        let mut world = World::from_parts(config, store);
        world.tick = snap.header.tick;
        world.env = Environment {
            weather: snap.weather.clone(),
            weather_until_tick: snap.weather_until_tick,
            active_event_id: snap.active_event_id.clone(),
            active_event_start: snap.active_event_start,
            active_event_ends: snap.active_event_ends,
            active_event_center: Vec3i::from_array(snap.active_event_center),
            active_event_radius: snap.active_event_radius,
        };

        world.agents = snap
            .agents
            .iter()
            .filter(|a| !a.id.is_empty())
            .map(|a| (a.id.clone(), agent_from_v1(a)))
            .collect();
        world.claims = snap
            .claims
            .iter()
            .filter(|c| !c.land_id.is_empty())
            .map(|c| (c.land_id.clone(), claim_from_v1(c)))
            .collect();
        world.containers = snap
            .containers
            .iter()
            .map(|c| {
                let pos = Vec3i::from_array(c.pos);
                let container = Container {
                    kind: c.kind.clone(),
                    pos,
                    inventory: c.inventory.clone(),
                    reserved: c.reserved.clone(),
                    owed: c.owed.clone(),
                }
                .normalized();
                (pos, container)
            })
            .collect();
        let swept = last_processed_tick(world.tick);
        world.items = snap
            .items
            .iter()
            .map(|it| ItemEntity {
                entity_id: it.entity_id.clone(),
                pos: Vec3i::from_array(it.pos),
                item: it.item.clone(),
                count: it.count,
                created_tick: it.created_tick,
                expires_tick: it.expires_tick,
            })
            .filter(|it| !it.entity_id.is_empty() && it.is_valid() && !it.is_expired(swept))
            .map(|it| (it.entity_id.clone(), it))
            .collect();

        for s in &snap.signs {
            let pos = Vec3i::from_array(s.pos);
            if world.resident_block(pos) == Some(catalog::SIGN) {
                world.signs.insert(
                    pos,
                    Sign {
                        text: s.text.clone(),
                        updated_tick: s.updated_tick,
                        updated_by: s.updated_by.clone(),
                    },
                );
            }
        }
        for cv in &snap.conveyors {
            let pos = Vec3i::from_array(cv.pos);
            if world.resident_block(pos) == Some(catalog::CONVEYOR) {
                world.conveyors.insert(pos, ConveyorMeta { dx: cv.dx, dz: cv.dz });
            }
        }
        for sw in &snap.switches {
            let pos = Vec3i::from_array(sw.pos);
            if world.resident_block(pos) == Some(catalog::SWITCH) {
                world.switches.insert(pos, sw.on);
            }
        }

        world.trades = snap
            .trades
            .iter()
            .filter(|t| !t.trade_id.is_empty())
            .map(|t| {
                let trade = Trade {
                    trade_id: t.trade_id.clone(),
                    from: t.from.clone(),
                    to: t.to.clone(),
                    offer: positive_items(&t.offer),
                    request: positive_items(&t.request),
                    created_tick: t.created_tick,
                };
                (trade.trade_id.clone(), trade)
            })
            .collect();
        world.boards = snap
            .boards
            .iter()
            .filter(|b| !b.board_id.is_empty())
            .map(|b| {
                let board = Board {
                    board_id: b.board_id.clone(),
                    posts: b
                        .posts
                        .iter()
                        .map(|p| BoardPost {
                            post_id: p.post_id.clone(),
                            author: p.author.clone(),
                            title: p.title.clone(),
                            body: p.body.clone(),
                            tick: p.tick,
                        })
                        .collect(),
                };
                (board.board_id.clone(), board)
            })
            .collect();
        world.contracts = snap
            .contracts
            .iter()
            .filter(|c| !c.contract_id.is_empty())
            .map(|c| (c.contract_id.clone(), contract_from_v1(c)))
            .collect();
        world.laws = snap
            .laws
            .iter()
            .filter(|l| !l.law_id.is_empty())
            .map(|l| (l.law_id.clone(), law_from_v1(l)))
            .collect();
        let treasury_world = world.config.treasury_world_id().to_string();
        world.orgs = snap
            .orgs
            .iter()
            .filter(|o| !o.org_id.is_empty())
            .map(|o| (o.org_id.clone(), org_from_v1(o, &treasury_world)))
            .collect();
        world.structures = snap
            .structures
            .iter()
            .filter(|s| !s.structure_id.is_empty())
            .map(|s| (s.structure_id.clone(), structure_from_v1(s)))
            .collect();

        world.stats = snap
            .stats
            .as_ref()
            .map(WorldStats::from_v1)
            .unwrap_or_default();
        world.ids = restore_counters(&world, snap);

        info!(
            world_id = %world.config.id,
            tick = world.tick,
            chunks = snap.chunks.len(),
            agents = world.agents.len(),
            claims = world.claims.len(),
            "snapshot imported"
        );
        Ok(world)
    }

    /// Replaces this world's state with the snapshot's. On error nothing changes.
    pub fn import_snapshot(&mut self, snap: &SnapshotV1) -> Result<(), SnapshotError> {
        let rebuilt = World::from_snapshot(self.config.clone(), snap)?;
        *self = rebuilt;
        Ok(())
    }
}

// The header tick is the next tick to run; item expiry last swept the one before.
fn last_processed_tick(header_tick: u64) -> u64 {
    header_tick.saturating_sub(1)
}

fn validate_header(base: &WorldConfig, snap: &SnapshotV1) -> Result<(), SnapshotError> {
    if snap.header.version != SNAPSHOT_VERSION_V1 {
        return Err(SnapshotError::UnsupportedVersion(snap.header.version));
    }
    let (expected, found) = (base.id.trim(), snap.header.world_id.trim());
    if !expected.is_empty() && !found.is_empty() && expected != found {
        return Err(SnapshotError::WorldMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
    if snap.height != 1 {
        return Err(SnapshotError::UnsupportedHeight(snap.height));
    }
    if snap.tick_rate <= 0 {
        return Err(SnapshotError::InvalidTickRate(snap.tick_rate));
    }
    if snap.day_ticks <= 0 {
        return Err(SnapshotError::InvalidDayTicks(snap.day_ticks));
    }
    if snap.obs_radius < 0 {
        return Err(SnapshotError::InvalidObsRadius(snap.obs_radius));
    }
    Ok(())
}

fn set_if_positive<T: PartialOrd + Default + Copy>(slot: &mut T, value: T) {
    if value > T::default() {
        *slot = value;
    }
}

fn config_from_snapshot(mut c: WorldConfig, snap: &SnapshotV1) -> WorldConfig {
    if !snap.header.world_id.trim().is_empty() {
        c.id = snap.header.world_id.clone();
    }
    c.seed = snap.seed;
    c.tick_rate_hz = snap.tick_rate;
    c.day_ticks = snap.day_ticks;
    c.obs_radius = snap.obs_radius;
    c.height = snap.height;
    set_if_positive(&mut c.season_length_ticks, snap.season_length_ticks);
    set_if_positive(&mut c.boundary_r, snap.boundary_r);
    set_if_positive(&mut c.biome_region_size, snap.biome_region_size);
    set_if_positive(&mut c.spawn_clear_radius, snap.spawn_clear_radius);
    set_if_positive(&mut c.ore_cluster_prob_scale_permille, snap.ore_cluster_prob_scale_permille);
    set_if_positive(
        &mut c.terrain_cluster_prob_scale_permille,
        snap.terrain_cluster_prob_scale_permille,
    );
    set_if_positive(&mut c.sprinkle_stone_permille, snap.sprinkle_stone_permille);
    set_if_positive(&mut c.sprinkle_dirt_permille, snap.sprinkle_dirt_permille);
    set_if_positive(&mut c.sprinkle_log_permille, snap.sprinkle_log_permille);
    if !snap.starter_items.is_empty() {
        c.starter_items = snap.starter_items.clone();
    }
    set_if_positive(&mut c.snapshot_every_ticks, snap.snapshot_every_ticks);
    set_if_positive(&mut c.director_every_ticks, snap.director_every_ticks);
    let rl = &snap.rate_limits;
    let r = &mut c.rate_limits;
    set_if_positive(&mut r.say_window_ticks, rl.say_window_ticks);
    set_if_positive(&mut r.say_max, rl.say_max);
    set_if_positive(&mut r.market_say_window_ticks, rl.market_say_window_ticks);
    set_if_positive(&mut r.market_say_max, rl.market_say_max);
    set_if_positive(&mut r.whisper_window_ticks, rl.whisper_window_ticks);
    set_if_positive(&mut r.whisper_max, rl.whisper_max);
    set_if_positive(&mut r.offer_trade_window_ticks, rl.offer_trade_window_ticks);
    set_if_positive(&mut r.offer_trade_max, rl.offer_trade_max);
    set_if_positive(&mut r.post_board_window_ticks, rl.post_board_window_ticks);
    set_if_positive(&mut r.post_board_max, rl.post_board_max);
    set_if_positive(&mut c.law_notice_ticks, snap.law_notice_ticks);
    set_if_positive(&mut c.law_vote_ticks, snap.law_vote_ticks);
    set_if_positive(&mut c.blueprint_auto_pull_range, snap.blueprint_auto_pull_range);
    set_if_positive(&mut c.blueprint_blocks_per_tick, snap.blueprint_blocks_per_tick);
    set_if_positive(&mut c.access_pass_core_radius, snap.access_pass_core_radius);
    if !snap.maintenance_cost.is_empty() {
        c.maintenance_cost = snap.maintenance_cost.clone();
    }
    set_if_positive(&mut c.fun_decay_window_ticks, snap.fun_decay_window_ticks);
    set_if_positive(&mut c.fun_decay_base, snap.fun_decay_base);
    set_if_positive(&mut c.structure_survival_ticks, snap.structure_survival_ticks);
    c.normalized()
}

// Counters never move backwards: the larger of the stored counter and the
// highest suffix seen among restored ids wins.
fn restore_counters(world: &World, snap: &SnapshotV1) -> IdCounters {
    let mut ids = IdCounters::from_v1(&snap.counters);
    ids::track_max(&mut ids.agent, ids::AGENT_PREFIX, world.agents.keys().map(String::as_str));
    for land_id in world.claims.keys() {
        if let Some(n) = ids::parse_land_num(land_id) {
            ids.land = ids.land.max(n);
        }
    }
    ids::track_max(&mut ids.law, ids::LAW_PREFIX, world.laws.keys().map(String::as_str));
    ids::track_max(&mut ids.org, ids::ORG_PREFIX, world.orgs.keys().map(String::as_str));
    ids::track_max(&mut ids.item, ids::ITEM_PREFIX, world.items.keys().map(String::as_str));
    ids::track_max(&mut ids.trade, ids::TRADE_PREFIX, world.trades.keys().map(String::as_str));
    ids::track_max(&mut ids.contract, ids::CONTRACT_PREFIX, world.contracts.keys().map(String::as_str));
    ids::track_max(
        &mut ids.post,
        ids::POST_PREFIX,
        world
            .boards
            .values()
            .flat_map(|b| b.posts.iter().map(|p| p.post_id.as_str())),
    );
    let tasks = world.agents.values().flat_map(|a| {
        a.move_task
            .iter()
            .map(|t| t.task_id.as_str())
            .chain(a.work_task.iter().map(|t| t.task_id.as_str()))
    });
    ids::track_max(&mut ids.task, ids::TASK_PREFIX, tasks);
    ids
}

fn rate_limits_v1(r: &RateLimitConfig) -> RateLimitsV1 {
    RateLimitsV1 {
        say_window_ticks: r.say_window_ticks,
        say_max: r.say_max,
        market_say_window_ticks: r.market_say_window_ticks,
        market_say_max: r.market_say_max,
        whisper_window_ticks: r.whisper_window_ticks,
        whisper_max: r.whisper_max,
        offer_trade_window_ticks: r.offer_trade_window_ticks,
        offer_trade_max: r.offer_trade_max,
        post_board_window_ticks: r.post_board_window_ticks,
        post_board_max: r.post_board_max,
    }
}

// ---------------------------------------------------------------------------
// Record conversions
// ---------------------------------------------------------------------------

fn agent_to_v1(a: &Agent) -> AgentV1 {
    AgentV1 {
        id: a.id.clone(),
        name: a.name.clone(),
        org_id: a.org_id.clone(),
        current_world_id: a.current_world_id.clone(),
        world_switch_cooldown_until_tick: a.world_switch_cooldown_until_tick,
        pos: a.pos.to_array(),
        yaw: a.yaw,
        hp: a.hp,
        hunger: a.hunger,
        stamina_milli: a.stamina_milli,
        rep_trade: a.rep_trade,
        rep_build: a.rep_build,
        rep_social: a.rep_social,
        rep_law: a.rep_law,
        fun_novelty: a.fun.novelty,
        fun_creation: a.fun.creation,
        fun_social: a.fun.social,
        fun_influence: a.fun.influence,
        fun_narrative: a.fun.narrative,
        fun_risk_rescue: a.fun.risk_rescue,
        inventory: positive_items(&a.inventory),
        memory: a
            .memory
            .iter()
            .map(|(k, m)| {
                (
                    k.clone(),
                    MemoryEntryV1 {
                        value: m.value.clone(),
                        expiry_tick: m.expiry_tick,
                    },
                )
            })
            .collect(),
        rate_windows: a
            .rate_windows
            .iter()
            .map(|(k, w)| {
                (
                    k.clone(),
                    RateWindowV1 {
                        start_tick: w.start_tick,
                        count: w.count,
                    },
                )
            })
            .collect(),
        seen_biomes: a.seen_biomes.iter().cloned().collect(),
        seen_recipes: a.seen_recipes.iter().cloned().collect(),
        seen_events: a.seen_events.iter().cloned().collect(),
        fun_decay: a
            .fun_decay
            .iter()
            .map(|(k, w)| {
                (
                    k.clone(),
                    FunDecayV1 {
                        start_tick: w.start_tick,
                        count: w.count,
                    },
                )
            })
            .collect(),
        equipment: (!a.equipment.is_empty()).then(|| EquipmentV1 {
            main_hand: a.equipment.main_hand.clone(),
            armor: a.equipment.armor.clone(),
        }),
        move_task: a.move_task.as_ref().map(|t| MovementTaskV1 {
            task_id: t.task_id.clone(),
            kind: t.kind.clone(),
            target: t.target.to_array(),
            tolerance: t.tolerance,
            target_id: t.target_id.clone(),
            distance: t.distance,
            start_pos: t.start_pos.to_array(),
            started_tick: t.started_tick,
        }),
        work_task: a.work_task.as_ref().map(|t| WorkTaskV1 {
            task_id: t.task_id.clone(),
            kind: t.kind.clone(),
            block_pos: t.block_pos.to_array(),
            recipe_id: t.recipe_id.clone(),
            item_id: t.item_id.clone(),
            count: t.count,
            blueprint_id: t.blueprint_id.clone(),
            anchor: t.anchor.to_array(),
            rotation: t.rotation,
            build_index: t.build_index,
            target_id: t.target_id.clone(),
            src_container: t.src_container.clone(),
            dst_container: t.dst_container.clone(),
            started_tick: t.started_tick,
            work_ticks: t.work_ticks,
        }),
    }
}

fn agent_from_v1(a: &AgentV1) -> Agent {
    Agent {
        id: a.id.clone(),
        name: a.name.clone(),
        org_id: a.org_id.clone(),
        current_world_id: a.current_world_id.clone(),
        world_switch_cooldown_until_tick: a.world_switch_cooldown_until_tick,
        pos: Vec3i::from_array(a.pos),
        yaw: a.yaw,
        hp: a.hp,
        hunger: a.hunger,
        stamina_milli: a.stamina_milli,
        rep_trade: a.rep_trade,
        rep_build: a.rep_build,
        rep_social: a.rep_social,
        rep_law: a.rep_law,
        fun: FunScore {
            novelty: a.fun_novelty,
            creation: a.fun_creation,
            social: a.fun_social,
            influence: a.fun_influence,
            narrative: a.fun_narrative,
            risk_rescue: a.fun_risk_rescue,
        },
        inventory: positive_items(&a.inventory),
        memory: a
            .memory
            .iter()
            .map(|(k, m)| {
                (
                    k.clone(),
                    MemoryEntry {
                        value: m.value.clone(),
                        expiry_tick: m.expiry_tick,
                    },
                )
            })
            .collect(),
        rate_windows: a
            .rate_windows
            .iter()
            .map(|(k, w)| {
                (
                    k.clone(),
                    RateWindow {
                        start_tick: w.start_tick,
                        count: w.count,
                    },
                )
            })
            .collect(),
        seen_biomes: a.seen_biomes.iter().cloned().collect(),
        seen_recipes: a.seen_recipes.iter().cloned().collect(),
        seen_events: a.seen_events.iter().cloned().collect(),
        fun_decay: a
            .fun_decay
            .iter()
            .map(|(k, w)| {
                (
                    k.clone(),
                    FunDecayWindow {
                        start_tick: w.start_tick,
                        count: w.count,
                    },
                )
            })
            .collect(),
        equipment: a
            .equipment
            .as_ref()
            .map(|e| Equipment {
                main_hand: e.main_hand.clone(),
                armor: e.armor.clone(),
            })
            .unwrap_or_default(),
        move_task: a.move_task.as_ref().map(|t| MovementTask {
            task_id: t.task_id.clone(),
            kind: t.kind.clone(),
            target: Vec3i::from_array(t.target),
            tolerance: t.tolerance,
            target_id: t.target_id.clone(),
            distance: t.distance,
            start_pos: Vec3i::from_array(t.start_pos),
            started_tick: t.started_tick,
        }),
        work_task: a.work_task.as_ref().map(|t| WorkTask {
            task_id: t.task_id.clone(),
            kind: t.kind.clone(),
            block_pos: Vec3i::from_array(t.block_pos),
            recipe_id: t.recipe_id.clone(),
            item_id: t.item_id.clone(),
            count: t.count,
            blueprint_id: t.blueprint_id.clone(),
            anchor: Vec3i::from_array(t.anchor),
            rotation: t.rotation,
            build_index: t.build_index,
            target_id: t.target_id.clone(),
            src_container: t.src_container.clone(),
            dst_container: t.dst_container.clone(),
            started_tick: t.started_tick,
            work_ticks: t.work_ticks,
        }),
    }
}

fn claim_to_v1(c: &LandClaim) -> ClaimV1 {
    ClaimV1 {
        land_id: c.land_id.clone(),
        owner: c.owner.clone(),
        claim_type: c.claim_type.as_str().to_string(),
        anchor: c.anchor.to_array(),
        radius: c.radius,
        flags: ClaimFlagsV1 {
            allow_build: c.flags.allow_build,
            allow_break: c.flags.allow_break,
            allow_damage: c.flags.allow_damage,
            allow_trade: c.flags.allow_trade,
        },
        members: c.members.iter().cloned().collect(),
        market_tax: c.market_tax,
        curfew_enabled: c.curfew.enabled,
        curfew_start: c.curfew.start,
        curfew_end: c.curfew.end,
        fine_break_enabled: c.fine_break.enabled,
        fine_break_item: c.fine_break.item.clone(),
        fine_break_per_block: c.fine_break.per_block,
        access_pass_enabled: c.access_pass.enabled,
        access_ticket_item: c.access_pass.item.clone(),
        access_ticket_cost: c.access_pass.cost,
        maintenance_due_tick: c.maintenance_due_tick,
        maintenance_stage: i64::from(c.maintenance_stage),
    }
}

fn claim_from_v1(c: &ClaimV1) -> LandClaim {
    LandClaim {
        land_id: c.land_id.clone(),
        owner: c.owner.clone(),
        claim_type: ClaimType::parse(&c.claim_type),
        anchor: Vec3i::from_array(c.anchor),
        radius: c.radius,
        flags: ClaimFlags {
            allow_build: c.flags.allow_build,
            allow_break: c.flags.allow_break,
            allow_damage: c.flags.allow_damage,
            allow_trade: c.flags.allow_trade,
        },
        members: c
            .members
            .iter()
            .filter(|m| !m.is_empty())
            .cloned()
            .collect(),
        market_tax: c.market_tax,
        curfew: Curfew {
            enabled: c.curfew_enabled,
            start: c.curfew_start,
            end: c.curfew_end,
        },
        fine_break: FineBreak {
            enabled: c.fine_break_enabled,
            item: c.fine_break_item.clone(),
            per_block: c.fine_break_per_block,
        },
        access_pass: AccessPass {
            enabled: c.access_pass_enabled,
            item: c.access_ticket_item.clone(),
            cost: c.access_ticket_cost,
        },
        maintenance_due_tick: c.maintenance_due_tick,
        maintenance_stage: c.maintenance_stage.clamp(0, i64::from(MAX_MAINTENANCE_STAGE)) as u8,
    }
}

fn contract_to_v1(c: &Contract) -> ContractV1 {
    ContractV1 {
        contract_id: c.contract_id.clone(),
        terminal_pos: c.terminal_pos.to_array(),
        poster: c.poster.clone(),
        acceptor: c.acceptor.clone(),
        kind: c.kind.clone(),
        state: c.state.clone(),
        requirements: positive_items(&c.requirements),
        reward: positive_items(&c.reward),
        deposit: positive_items(&c.deposit),
        blueprint_id: c.blueprint_id.clone(),
        anchor: c.anchor.to_array(),
        rotation: c.rotation,
        created_tick: c.created_tick,
        deadline_tick: c.deadline_tick,
    }
}

fn contract_from_v1(c: &ContractV1) -> Contract {
    Contract {
        contract_id: c.contract_id.clone(),
        terminal_pos: Vec3i::from_array(c.terminal_pos),
        poster: c.poster.clone(),
        acceptor: c.acceptor.clone(),
        kind: c.kind.clone(),
        state: c.state.clone(),
        requirements: positive_items(&c.requirements),
        reward: positive_items(&c.reward),
        deposit: positive_items(&c.deposit),
        blueprint_id: c.blueprint_id.clone(),
        anchor: Vec3i::from_array(c.anchor),
        rotation: c.rotation,
        created_tick: c.created_tick,
        deadline_tick: c.deadline_tick,
    }
}

fn law_to_v1(l: &Law) -> LawV1 {
    LawV1 {
        law_id: l.law_id.clone(),
        land_id: l.land_id.clone(),
        template_id: l.template_id.clone(),
        title: l.title.clone(),
        params: l.params.clone(),
        status: l.status.as_str().to_string(),
        proposed_by: l.proposed_by.clone(),
        proposed_tick: l.proposed_tick,
        notice_ends_tick: l.notice_ends_tick,
        vote_ends_tick: l.vote_ends_tick,
        votes: l.votes.clone(),
    }
}

fn law_from_v1(l: &LawV1) -> Law {
    Law {
        law_id: l.law_id.clone(),
        land_id: l.land_id.clone(),
        template_id: l.template_id.clone(),
        title: l.title.clone(),
        params: l.params.clone(),
        proposed_by: l.proposed_by.clone(),
        proposed_tick: l.proposed_tick,
        notice_ends_tick: l.notice_ends_tick,
        vote_ends_tick: l.vote_ends_tick,
        status: LawStatus::parse(&l.status).unwrap_or_default(),
        votes: l.votes.clone(),
    }
}

fn org_to_v1(o: &Organization) -> OrgV1 {
    OrgV1 {
        org_id: o.org_id.clone(),
        kind: o.kind.as_str().to_string(),
        name: o.name.clone(),
        created_tick: o.created_tick,
        meta_version: o.meta_version,
        members: o
            .members
            .iter()
            .map(|(id, role)| (id.clone(), role.as_str().to_string()))
            .collect(),
        treasury: BTreeMap::new(),
        treasury_by_world: o
            .treasury_by_world
            .iter()
            .map(|(world, items)| (world.clone(), positive_items(items)))
            .filter(|(_, items)| !items.is_empty())
            .collect(),
    }
}

// A legacy flat `treasury` is credited to this world's treasury.
fn org_from_v1(o: &OrgV1, treasury_world: &str) -> Organization {
    let mut treasury_by_world: BTreeMap<String, _> = o
        .treasury_by_world
        .iter()
        .map(|(world, items)| (world.clone(), positive_items(items)))
        .filter(|(_, items)| !items.is_empty())
        .collect();
    let legacy = positive_items(&o.treasury);
    if treasury_by_world.is_empty() && !legacy.is_empty() {
        treasury_by_world.insert(treasury_world.to_string(), legacy);
    }
    Organization {
        org_id: o.org_id.clone(),
        kind: match o.kind.trim().to_ascii_uppercase().as_str() {
            "CITY" => OrgKind::City,
            _ => OrgKind::Guild,
        },
        name: o.name.clone(),
        created_tick: o.created_tick,
        meta_version: o.meta_version.max(1),
        members: o
            .members
            .iter()
            .filter(|(id, _)| !id.is_empty())
            .filter_map(|(id, role)| OrgRole::parse(role).map(|r| (id.clone(), r)))
            .collect(),
        treasury_by_world,
    }
}

fn structure_to_v1(s: &Structure) -> StructureV1 {
    StructureV1 {
        structure_id: s.structure_id.clone(),
        blueprint_id: s.blueprint_id.clone(),
        builder_id: s.builder_id.clone(),
        anchor: s.anchor.to_array(),
        rotation: s.rotation,
        min: s.min.to_array(),
        max: s.max.to_array(),
        completed_tick: s.completed_tick,
        award_due_tick: s.award_due_tick,
        awarded: s.awarded,
        used_by: s.used_by.clone(),
        last_influence_day: s.last_influence_day,
    }
}

fn structure_from_v1(s: &StructureV1) -> Structure {
    Structure {
        structure_id: s.structure_id.clone(),
        blueprint_id: s.blueprint_id.clone(),
        builder_id: s.builder_id.clone(),
        anchor: Vec3i::from_array(s.anchor),
        rotation: s.rotation,
        min: Vec3i::from_array(s.min),
        max: Vec3i::from_array(s.max),
        completed_tick: s.completed_tick,
        award_due_tick: s.award_due_tick,
        awarded: s.awarded,
        used_by: s.used_by.clone(),
        last_influence_day: s.last_influence_day,
    }
}
