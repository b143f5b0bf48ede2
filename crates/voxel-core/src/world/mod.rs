use std::collections::BTreeMap;

mod actions;
mod snapshot;
mod tick;

use contracts::{AuditRecord, WorldConfig, WorldEvent};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, trace};

use crate::catalog::{self, BlockId};
use crate::digest::{state_digest, StateInput};
use crate::governance::claims::{resolve_permissions, Permissions};
use crate::governance::{LandClaim, Law, Organization};
use crate::ids::{self, IdCounters};
use crate::model::{
    add_items, Agent, Board, BoardPost, Container, Contract, ConveyorMeta, Environment, ItemEntity,
    ItemMap, Sign, Structure, Trade, Vec3i,
};
use crate::rules::{can_action_with_curfew, time_of_day};
use crate::stats::{StatsBucket, WorldStats};
use crate::structure::{is_structure_stable, structure_id};
use crate::terrain::{ChunkKey, ChunkStore, WorldGen, CHUNK_SIZE};

pub use snapshot::SnapshotError;
pub use tick::StepOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unsupported world height {0}: the world is a single layer")]
    UnsupportedHeight(i64),
}

/// One simulated world: terrain, governance, entities and the outboxes the
/// caller drains after each tick.
#[derive(Debug, Clone)]
pub struct World {
    config: WorldConfig,
    /// Next tick to run.
    tick: u64,
    store: ChunkStore,
    env: Environment,

    claims: BTreeMap<String, LandClaim>,
    laws: BTreeMap<String, Law>,
    orgs: BTreeMap<String, Organization>,

    agents: BTreeMap<String, Agent>,
    containers: BTreeMap<Vec3i, Container>,
    items: BTreeMap<String, ItemEntity>,
    signs: BTreeMap<Vec3i, Sign>,
    conveyors: BTreeMap<Vec3i, ConveyorMeta>,
    switches: BTreeMap<Vec3i, bool>,
    contracts: BTreeMap<String, Contract>,
    trades: BTreeMap<String, Trade>,
    boards: BTreeMap<String, Board>,
    structures: BTreeMap<String, Structure>,

    stats: WorldStats,
    ids: IdCounters,

    audit_log: Vec<AuditRecord>,
    event_outbox: Vec<WorldEvent>,
}

pub(crate) fn details(value: Value) -> BTreeMap<String, Value> {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => BTreeMap::new(),
    }
}

impl World {
    pub fn new(config: WorldConfig) -> Result<Self, ConfigError> {
        let config = config.normalized();
        if config.height != 1 {
            return Err(ConfigError::UnsupportedHeight(config.height));
        }
        let store = ChunkStore::new(WorldGen::from_config(&config));
        debug!(world_id = %config.id, seed = config.seed, "world created");
        Ok(Self::from_parts(config, store))
    }

    fn from_parts(config: WorldConfig, store: ChunkStore) -> Self {
        Self {
            config,
            tick: 0,
            store,
            env: Environment::default(),
            claims: BTreeMap::new(),
            laws: BTreeMap::new(),
            orgs: BTreeMap::new(),
            agents: BTreeMap::new(),
            containers: BTreeMap::new(),
            items: BTreeMap::new(),
            signs: BTreeMap::new(),
            conveyors: BTreeMap::new(),
            switches: BTreeMap::new(),
            contracts: BTreeMap::new(),
            trades: BTreeMap::new(),
            boards: BTreeMap::new(),
            structures: BTreeMap::new(),
            stats: WorldStats::default(),
            ids: IdCounters::default(),
            audit_log: Vec::new(),
            event_outbox: Vec::new(),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn world_id(&self) -> &str {
        &self.config.id
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ChunkStore {
        &mut self.store
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn set_environment(&mut self, env: Environment) {
        self.env = env;
    }

    pub fn claims(&self) -> &BTreeMap<String, LandClaim> {
        &self.claims
    }

    pub fn claim(&self, land_id: &str) -> Option<&LandClaim> {
        self.claims.get(land_id)
    }

    pub fn laws(&self) -> &BTreeMap<String, Law> {
        &self.laws
    }

    pub fn law(&self, law_id: &str) -> Option<&Law> {
        self.laws.get(law_id)
    }

    pub fn orgs(&self) -> &BTreeMap<String, Organization> {
        &self.orgs
    }

    pub fn org(&self, org_id: &str) -> Option<&Organization> {
        self.orgs.get(org_id)
    }

    pub fn agents(&self) -> &BTreeMap<String, Agent> {
        &self.agents
    }

    pub fn agent(&self, agent_id: &str) -> Option<&Agent> {
        self.agents.get(agent_id)
    }

    pub fn items(&self) -> &BTreeMap<String, ItemEntity> {
        &self.items
    }

    pub fn structures(&self) -> &BTreeMap<String, Structure> {
        &self.structures
    }

    pub fn stats(&self) -> &WorldStats {
        &self.stats
    }

    pub fn summarize_stats(&mut self) -> StatsBucket {
        self.stats.summarize(self.tick)
    }

    pub fn id_counters(&self) -> IdCounters {
        self.ids
    }

    /// Audit records emitted since the last drain, in emission order.
    pub fn drain_audit(&mut self) -> Vec<AuditRecord> {
        std::mem::take(&mut self.audit_log)
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.event_outbox)
    }

    pub fn state_digest(&mut self) -> String {
        let chunks = self.store.digests();
        state_digest(&StateInput {
            now_tick: self.tick,
            seed: self.config.seed,
            env: &self.env,
            chunks: &chunks,
            claims: &self.claims,
            laws: &self.laws,
            orgs: &self.orgs,
            containers: &self.containers,
            items: &self.items,
            signs: &self.signs,
            conveyors: &self.conveyors,
            switches: &self.switches,
            contracts: &self.contracts,
            trades: &self.trades,
            boards: &self.boards,
            structures: &self.structures,
            agents: &self.agents,
        })
    }

    // -----------------------------------------------------------------------
    // Terrain
    // -----------------------------------------------------------------------

    pub fn block_at(&mut self, pos: Vec3i) -> BlockId {
        self.store.get_block(pos.x, pos.y, pos.z)
    }

    /// Writes a block. Sign, conveyor and switch metadata at `pos` is
    /// dropped once the cell no longer holds the matching block.
    pub fn set_block(&mut self, pos: Vec3i, block: BlockId) {
        self.store.set_block(pos.x, pos.y, pos.z, block);
        let resident = self.store.peek_block(pos.x, pos.y, pos.z);
        if resident != Some(catalog::SIGN) {
            self.signs.remove(&pos);
        }
        if resident != Some(catalog::CONVEYOR) {
            self.conveyors.remove(&pos);
        }
        if resident != Some(catalog::SWITCH) {
            self.switches.remove(&pos);
        }
    }

    pub fn in_bounds(&self, pos: Vec3i) -> bool {
        self.store.in_bounds(pos.x, pos.y, pos.z)
    }

    /// Generates the chunks around the origin ahead of the first tick.
    pub fn preload_spawn(&mut self, radius_chunks: i32) -> usize {
        let created = self.store.preload_area(ChunkKey::new(0, 0), radius_chunks);
        trace!(created, radius_chunks, "preloaded spawn chunks");
        created
    }

    // -----------------------------------------------------------------------
    // Governance lookups
    // -----------------------------------------------------------------------

    /// The claim with the smallest land id containing `pos`.
    pub fn land_at(&self, pos: Vec3i) -> Option<&LandClaim> {
        self.claims.values().find(|c| c.contains(pos))
    }

    pub fn is_org_member(&self, agent_id: &str, org_id: &str) -> bool {
        self.orgs
            .get(org_id)
            .is_some_and(|org| org.is_member(agent_id))
    }

    pub fn is_org_admin(&self, agent_id: &str, org_id: &str) -> bool {
        self.orgs
            .get(org_id)
            .is_some_and(|org| org.is_admin(agent_id))
    }

    /// Owner, listed member, or member of the owning org.
    pub fn is_land_member(&self, agent_id: &str, land: &LandClaim) -> bool {
        land.owner == agent_id
            || land.members.contains(agent_id)
            || self.is_org_member(agent_id, &land.owner)
    }

    /// Owner, or leader of the owning org.
    pub fn is_land_admin(&self, agent_id: &str, land: &LandClaim) -> bool {
        land.owner == agent_id || self.is_org_admin(agent_id, &land.owner)
    }

    pub fn permissions_for(&self, agent_id: &str, pos: Vec3i) -> (Option<&LandClaim>, Permissions) {
        match self.land_at(pos) {
            None => (None, Permissions::WILD),
            Some(land) => {
                let member = self.is_land_member(agent_id, land);
                (
                    Some(land),
                    resolve_permissions(member, land.maintenance_stage, land.flags),
                )
            }
        }
    }

    pub fn time_of_day(&self) -> f64 {
        time_of_day(self.tick, self.config.day_ticks)
    }

    pub fn can_build_at(&self, agent_id: &str, pos: Vec3i) -> bool {
        let (land, perms) = self.permissions_for(agent_id, pos);
        self.with_curfew(land, perms.can_build)
    }

    pub fn can_break_at(&self, agent_id: &str, pos: Vec3i) -> bool {
        let (land, perms) = self.permissions_for(agent_id, pos);
        self.with_curfew(land, perms.can_break)
    }

    fn with_curfew(&self, land: Option<&LandClaim>, base: bool) -> bool {
        match land {
            None => base,
            Some(land) => can_action_with_curfew(
                base,
                land.curfew.enabled,
                self.time_of_day(),
                land.curfew.start,
                land.curfew.end,
            ),
        }
    }

    // -----------------------------------------------------------------------
    // Entity registry
    // -----------------------------------------------------------------------

    /// Mints an agent at the origin with the configured starter items.
    pub fn join_agent(&mut self, name: &str) -> String {
        let id = self.ids.next_agent();
        let mut agent = Agent::new(id.clone(), name.trim(), Vec3i::default());
        agent.current_world_id = self.config.id.clone();
        for (item, count) in &self.config.starter_items {
            add_items(&mut agent.inventory, item, *count);
        }
        self.stats.observe_pos(self.tick, agent.pos.x, agent.pos.z);
        self.agents.insert(id.clone(), agent);
        id
    }

    /// Inserts a fully formed agent, keeping the id counter ahead of its suffix.
    pub fn insert_agent(&mut self, agent: Agent) {
        ids::track_max(&mut self.ids.agent, ids::AGENT_PREFIX, [agent.id.as_str()]);
        self.stats.observe_pos(self.tick, agent.pos.x, agent.pos.z);
        self.agents.insert(agent.id.clone(), agent);
    }

    pub fn give_items(&mut self, agent_id: &str, item: &str, count: i64) -> bool {
        match self.agents.get_mut(agent_id) {
            Some(agent) => {
                add_items(&mut agent.inventory, item, count);
                true
            }
            None => false,
        }
    }

    pub fn move_agent(&mut self, agent_id: &str, pos: Vec3i) -> bool {
        if !self.in_bounds(pos) {
            return false;
        }
        let Some(agent) = self.agents.get_mut(agent_id) else {
            return false;
        };
        agent.pos = pos;
        self.stats.observe_pos(self.tick, pos.x, pos.z);
        true
    }

    /// Places a container block and its inventory record. The cell must be empty.
    pub fn place_container(&mut self, kind: &str, pos: Vec3i) -> bool {
        let Some(block) = catalog::block_id(kind) else {
            return false;
        };
        if !self.in_bounds(pos) || self.block_at(pos) != catalog::AIR {
            return false;
        }
        self.set_block(pos, block);
        self.containers.insert(pos, Container::new(kind, pos));
        true
    }

    pub fn container_mut(&mut self, pos: Vec3i) -> Option<&mut Container> {
        self.containers.get_mut(&pos)
    }

    /// Drops an item entity; `ttl_ticks == 0` never expires.
    pub fn spawn_item(&mut self, pos: Vec3i, item: &str, count: i64, ttl_ticks: u64) -> Option<String> {
        if item.is_empty() || count <= 0 || !self.in_bounds(pos) {
            return None;
        }
        let id = self.ids.next_item();
        let expires_tick = if ttl_ticks == 0 { 0 } else { self.tick + ttl_ticks };
        self.items.insert(
            id.clone(),
            ItemEntity {
                entity_id: id.clone(),
                pos,
                item: item.to_string(),
                count,
                created_tick: self.tick,
                expires_tick,
            },
        );
        Some(id)
    }

    pub fn set_sign(&mut self, pos: Vec3i, text: &str, updated_by: &str) -> bool {
        if !self.place_meta_block(pos, catalog::SIGN) {
            return false;
        }
        self.signs.insert(
            pos,
            Sign {
                text: text.to_string(),
                updated_tick: self.tick,
                updated_by: updated_by.to_string(),
            },
        );
        true
    }

    pub fn place_conveyor(&mut self, pos: Vec3i, dx: i32, dz: i32) -> bool {
        if !self.place_meta_block(pos, catalog::CONVEYOR) {
            return false;
        }
        self.conveyors.insert(pos, ConveyorMeta { dx, dz });
        true
    }

    pub fn set_switch(&mut self, pos: Vec3i, on: bool) -> bool {
        if !self.place_meta_block(pos, catalog::SWITCH) {
            return false;
        }
        self.switches.insert(pos, on);
        true
    }

    // Either the cell already holds `block` or it is empty and receives it.
    fn place_meta_block(&mut self, pos: Vec3i, block: BlockId) -> bool {
        if !self.in_bounds(pos) {
            return false;
        }
        let current = self.block_at(pos);
        if current == block {
            return true;
        }
        if current != catalog::AIR {
            return false;
        }
        self.set_block(pos, block);
        true
    }

    pub fn post_to_board(&mut self, board_id: &str, author: &str, title: &str, body: &str) -> String {
        let post_id = self.ids.next_post();
        let board = self
            .boards
            .entry(board_id.to_string())
            .or_insert_with(|| Board {
                board_id: board_id.to_string(),
                posts: Vec::new(),
            });
        board.posts.push(BoardPost {
            post_id: post_id.clone(),
            author: author.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            tick: self.tick,
        });
        post_id
    }

    pub fn open_trade(&mut self, from: &str, to: &str, offer: ItemMap, request: ItemMap) -> String {
        let trade_id = self.ids.next_trade();
        self.trades.insert(
            trade_id.clone(),
            Trade {
                trade_id: trade_id.clone(),
                from: from.to_string(),
                to: to.to_string(),
                offer,
                request,
                created_tick: self.tick,
            },
        );
        trade_id
    }

    /// Removes an open trade; accepted trades count toward the activity window.
    pub fn close_trade(&mut self, trade_id: &str, accepted: bool) -> bool {
        if self.trades.remove(trade_id).is_none() {
            return false;
        }
        if accepted {
            self.stats.record_trade(self.tick);
        }
        true
    }

    /// Stores a contract under a freshly minted id, which is returned.
    pub fn post_contract(&mut self, mut contract: Contract) -> String {
        let contract_id = self.ids.next_contract();
        contract.contract_id = contract_id.clone();
        contract.created_tick = self.tick;
        self.contracts.insert(contract_id.clone(), contract);
        contract_id
    }

    /// Records a completed blueprint. `positions` are the blocks it placed.
    pub fn register_structure(
        &mut self,
        blueprint_id: &str,
        builder_id: &str,
        anchor: Vec3i,
        rotation: i64,
        positions: &[Vec3i],
    ) -> String {
        let id = structure_id(&self.config.id, self.tick, blueprint_id, anchor);
        let min = positions.iter().copied().reduce(|a, b| {
            Vec3i::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z))
        });
        let max = positions.iter().copied().reduce(|a, b| {
            Vec3i::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z))
        });
        self.structures.insert(
            id.clone(),
            Structure {
                structure_id: id.clone(),
                blueprint_id: blueprint_id.to_string(),
                builder_id: builder_id.to_string(),
                anchor,
                rotation,
                min: min.unwrap_or(anchor),
                max: max.unwrap_or(anchor),
                completed_tick: self.tick,
                award_due_tick: self.tick + self.config.structure_survival_ticks.max(0) as u64,
                ..Structure::default()
            },
        );
        self.stats.record_blueprint_complete(self.tick);
        self.audit(
            builder_id,
            "STRUCTURE_COMPLETE",
            anchor,
            "BLUEPRINT_COMPLETE",
            json!({"structure_id": id, "blueprint_id": blueprint_id}),
        );
        id
    }

    /// Flood-fill stability over the structure's bounding box, using resident
    /// solid blocks as support.
    pub fn structure_is_stable(&self, structure_id: &str) -> Option<bool> {
        let s = self.structures.get(structure_id)?;
        let mut positions = Vec::new();
        for x in s.min.x..=s.max.x {
            for y in s.min.y..=s.max.y {
                for z in s.min.z..=s.max.z {
                    let solid = self
                        .store
                        .peek_block(x, y, z)
                        .is_some_and(catalog::is_solid);
                    if solid {
                        positions.push(Vec3i::new(x, y, z));
                    }
                }
            }
        }
        let store = &self.store;
        Some(is_structure_stable(&positions, |x, y, z| {
            store.peek_block(x, y, z).is_some_and(catalog::is_solid)
        }))
    }

    // -----------------------------------------------------------------------
    // Outboxes
    // -----------------------------------------------------------------------

    pub(crate) fn audit(&mut self, actor: &str, action: &str, pos: Vec3i, reason: &str, fields: Value) {
        self.audit_log.push(AuditRecord {
            tick: self.tick,
            actor: actor.to_string(),
            action: action.to_string(),
            pos: pos.to_array(),
            reason: reason.to_string(),
            details: details(fields),
        });
    }

    pub(crate) fn notify_agent(&mut self, agent_id: &str, event: &str, fields: Value) {
        self.event_outbox.push(WorldEvent::Agent {
            tick: self.tick,
            agent_id: agent_id.to_string(),
            event: event.to_string(),
            details: details(fields),
        });
    }

    pub(crate) fn broadcast(&mut self, event: &str, fields: Value) {
        self.event_outbox.push(WorldEvent::Broadcast {
            tick: self.tick,
            event: event.to_string(),
            details: details(fields),
        });
    }
}

/// Chunk key of a world position.
pub fn chunk_key_of(pos: Vec3i) -> ChunkKey {
    let size = i64::from(CHUNK_SIZE);
    ChunkKey::new(
        crate::mathx::floor_div(i64::from(pos.x), size) as i32,
        crate::mathx::floor_div(i64::from(pos.z), size) as i32,
    )
}
