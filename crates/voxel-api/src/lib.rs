//! In-process facade over one voxel world with request queueing, replay, and SQLite persistence.

mod persistence;

use std::collections::BTreeMap;
use std::path::Path;

use contracts::snapshot::SnapshotV1;
use contracts::{ActionRequest, ActionResult, AuditRecord, WorldConfig, WorldEvent};
use thiserror::Error;
use tracing::{debug, info, warn};
use voxel_core::{ConfigError, SnapshotError, StepOutcome, World};

use persistence::{PersistDelta, SqliteWorldStore};
pub use persistence::{PersistedAction, PersistedWorldSummary, PersistenceError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("no stored state for world {0}")]
    UnknownWorld(String),
}

#[derive(Debug)]
struct PersistenceState {
    store: SqliteWorldStore,
    persisted_action_count: usize,
    persisted_audit_count: usize,
    last_snapshot_tick: Option<u64>,
}

#[derive(Debug)]
pub struct WorldApi {
    world: World,
    pending: Vec<ActionRequest>,
    action_log: Vec<PersistedAction>,
    audit_log: Vec<AuditRecord>,
    events: Vec<WorldEvent>,
    persistence: Option<PersistenceState>,
    last_persistence_error: Option<String>,
}

impl WorldApi {
    pub fn from_config(config: WorldConfig) -> Result<Self, ApiError> {
        Ok(Self::from_world(World::new(config)?))
    }

    /// Restores a world from a snapshot; `config` supplies any knob the document leaves out.
    pub fn from_snapshot(config: WorldConfig, snapshot: &SnapshotV1) -> Result<Self, ApiError> {
        Ok(Self::from_world(World::from_snapshot(config, snapshot)?))
    }

    fn from_world(world: World) -> Self {
        Self {
            world,
            pending: Vec::new(),
            action_log: Vec::new(),
            audit_log: Vec::new(),
            events: Vec::new(),
            persistence: None,
            last_persistence_error: None,
        }
    }

    pub fn attach_sqlite_store(&mut self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let store = SqliteWorldStore::open(path)?;
        self.persistence = Some(PersistenceState {
            store,
            persisted_action_count: 0,
            persisted_audit_count: 0,
            last_snapshot_tick: None,
        });
        Ok(())
    }

    /// Writes the bootstrap snapshot. Refuses to overwrite a stored world unless asked to.
    pub fn initialize_world_storage(&mut self, replace_existing: bool) -> Result<(), PersistenceError> {
        let Some(state) = self.persistence.as_mut() else {
            return Err(PersistenceError::NotAttached);
        };

        let world_id = self.world.world_id().to_string();
        if state.store.world_exists(&world_id)? {
            if !replace_existing {
                return Err(PersistenceError::WorldAlreadyExists(world_id));
            }
            state.store.delete_world(&world_id)?;
            state.persisted_action_count = 0;
            state.persisted_audit_count = 0;
            state.last_snapshot_tick = None;
        }

        let snapshot = self.world.export_snapshot();
        let digest = self.world.state_digest();
        state.store.persist_delta(PersistDelta {
            config: self.world.config(),
            current_tick: self.world.tick(),
            digest: &digest,
            actions: &[],
            audit: &[],
            snapshot: Some(&snapshot),
        })?;
        state.last_snapshot_tick = Some(snapshot.header.tick);
        self.last_persistence_error = None;
        Ok(())
    }

    /// Writes everything recorded since the last flush, plus a snapshot when the cadence is due.
    pub fn flush_persistence_checked(&mut self) -> Result<(), PersistenceError> {
        let Some(state) = self.persistence.as_mut() else {
            return Err(PersistenceError::NotAttached);
        };

        let current_tick = self.world.tick();
        let cadence = u64::try_from(self.world.config().snapshot_every_ticks)
            .unwrap_or(1)
            .max(1);
        let snapshot_due = current_tick % cadence == 0 && state.last_snapshot_tick != Some(current_tick);
        let snapshot = snapshot_due.then(|| self.world.export_snapshot());
        let digest = self.world.state_digest();

        state.store.persist_delta(PersistDelta {
            config: self.world.config(),
            current_tick,
            digest: &digest,
            actions: &self.action_log[state.persisted_action_count..],
            audit: &self.audit_log[state.persisted_audit_count..],
            snapshot: snapshot.as_ref(),
        })?;

        state.persisted_action_count = self.action_log.len();
        state.persisted_audit_count = self.audit_log.len();
        if let Some(snapshot) = snapshot {
            debug!(tick = snapshot.header.tick, "snapshot persisted");
            state.last_snapshot_tick = Some(snapshot.header.tick);
        }
        self.last_persistence_error = None;
        Ok(())
    }

    pub fn last_persistence_error(&self) -> Option<&str> {
        self.last_persistence_error.as_deref()
    }

    /// Queues a request for the next tick.
    pub fn submit(&mut self, request: ActionRequest) {
        self.pending.push(request);
    }

    pub fn pending(&self) -> &[ActionRequest] {
        &self.pending
    }

    /// Runs one tick with every queued request, in submission order.
    pub fn step(&mut self) -> StepOutcome {
        let actions = std::mem::take(&mut self.pending);
        self.step_with(&actions)
    }

    pub fn step_with(&mut self, actions: &[ActionRequest]) -> StepOutcome {
        let outcome = self.world.step(actions);
        for (request, result) in actions.iter().zip(&outcome.results) {
            self.action_log.push(PersistedAction {
                tick: outcome.tick,
                request: request.clone(),
                result: result.clone(),
            });
        }
        self.collect_outboxes();
        self.flush_persistence_if_enabled();
        outcome
    }

    /// Steps until the world clock reaches `target`. Queued requests run on the first tick.
    pub fn run_to(&mut self, target: u64) -> Option<String> {
        let mut last = None;
        while self.world.tick() < target {
            last = Some(self.step().digest);
        }
        last
    }

    pub fn digest(&mut self) -> String {
        self.world.state_digest()
    }

    pub fn tick(&self) -> u64 {
        self.world.tick()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn export_snapshot(&self) -> SnapshotV1 {
        self.world.export_snapshot()
    }

    /// Replaces the world with the snapshot's state. On error the world is untouched.
    pub fn import_snapshot(&mut self, snapshot: &SnapshotV1) -> Result<(), ApiError> {
        self.world.import_snapshot(snapshot)?;
        self.pending.clear();
        self.collect_outboxes();
        if let Some(state) = self.persistence.as_mut() {
            state.last_snapshot_tick = None;
        }
        Ok(())
    }

    pub fn action_log(&self) -> &[PersistedAction] {
        &self.action_log
    }

    pub fn audit_log(&self) -> &[AuditRecord] {
        &self.audit_log
    }

    pub fn events(&self) -> &[WorldEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    /// Rebuilds a world from `config` and a request log, returning `(tick, digest)` for
    /// every tick run before the clock reaches `to_tick`.
    pub fn replay(
        config: WorldConfig,
        actions_by_tick: &BTreeMap<u64, Vec<ActionRequest>>,
        to_tick: u64,
    ) -> Result<Vec<(u64, String)>, ApiError> {
        let mut world = World::new(config)?;
        Ok(replay_world(&mut world, actions_by_tick, to_tick))
    }

    /// Rebuilds a stored world at `to_tick` from its latest snapshot and the logged requests.
    pub fn replay_from_store(
        path: impl AsRef<Path>,
        world_id: &str,
        to_tick: u64,
    ) -> Result<Self, ApiError> {
        let store = SqliteWorldStore::open(path)?;
        let summary = store
            .load_world(world_id)?
            .ok_or_else(|| ApiError::UnknownWorld(world_id.to_string()))?;

        let mut world = match store.load_latest_snapshot_at_or_before(world_id, to_tick)? {
            Some(snapshot) => World::from_snapshot(summary.config, &snapshot)?,
            None => World::new(summary.config)?,
        };
        let start = world.tick();
        let actions = store.load_actions_range(world_id, start, to_tick.saturating_sub(1))?;
        let digests = replay_world(&mut world, &actions, to_tick);
        info!(world_id, from = start, to = to_tick, ticks = digests.len(), "world replayed from store");

        let mut api = Self::from_world(world);
        api.collect_outboxes();
        Ok(api)
    }

    fn collect_outboxes(&mut self) {
        self.audit_log.extend(self.world.drain_audit());
        self.events.extend(self.world.drain_events());
    }

    fn flush_persistence_if_enabled(&mut self) {
        if self.persistence.is_none() {
            return;
        }

        if let Err(err) = self.flush_persistence_checked() {
            warn!(error = %err, "persistence flush failed");
            self.last_persistence_error = Some(err.to_string());
        }
    }
}

fn replay_world(
    world: &mut World,
    actions_by_tick: &BTreeMap<u64, Vec<ActionRequest>>,
    to_tick: u64,
) -> Vec<(u64, String)> {
    let mut digests = Vec::new();
    while world.tick() < to_tick {
        let actions = actions_by_tick
            .get(&world.tick())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let outcome = world.step(actions);
        digests.push((outcome.tick, outcome.digest));
    }
    digests
}

/// Results that came back refused, for quick inspection.
pub fn rejected(results: &[ActionResult]) -> impl Iterator<Item = &ActionResult> {
    results.iter().filter(|result| !result.ok)
}

#[cfg(test)]
mod tests {
    use contracts::{ActionKind, ErrorCode};
    use voxel_core::catalog;
    use voxel_core::model::Agent;
    use voxel_core::Vec3i;

    use super::*;

    fn test_config() -> WorldConfig {
        WorldConfig {
            snapshot_every_ticks: 4,
            day_ticks: 10,
            ..WorldConfig::default()
        }
    }

    fn seeded_api() -> WorldApi {
        let mut api = WorldApi::from_config(test_config()).expect("valid config");
        let world = api.world_mut();
        world.insert_agent(Agent::new("A1", "A1", Vec3i::default()).with_items([("BATTERY", 2), ("CRYSTAL_SHARD", 2)]));
        world.set_block(Vec3i::new(10, 0, 10), catalog::AIR);
        api
    }

    fn claim_request() -> ActionRequest {
        ActionRequest::new(
            "r1",
            "A1",
            ActionKind::ClaimLand {
                anchor: [10, 0, 10],
                radius: 8,
            },
        )
    }

    #[test]
    fn queued_requests_run_on_the_next_step() {
        let mut api = seeded_api();
        api.submit(claim_request());
        assert_eq!(api.pending().len(), 1);

        let outcome = api.step();
        assert!(api.pending().is_empty());
        assert_eq!(outcome.tick, 0);
        assert!(outcome.results[0].ok, "{:?}", outcome.results[0]);
        assert_eq!(api.action_log().len(), 1);
        assert!(api.audit_log().iter().any(|record| record.reason == "CLAIM_LAND"));
    }

    #[test]
    fn refused_requests_are_logged_with_their_code() {
        let mut api = seeded_api();
        let outcome = api.step_with(&[ActionRequest::new(
            "r2",
            "NOBODY",
            ActionKind::LeaveOrg,
        )]);
        let refused: Vec<_> = rejected(&outcome.results).collect();
        assert_eq!(refused.len(), 1);
        assert_eq!(refused[0].code, Some(ErrorCode::InvalidTarget));
        assert!(!api.action_log()[0].result.ok);
    }

    #[test]
    fn stored_run_replays_to_the_same_digest() {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("world.sqlite");

        let mut api = seeded_api();
        api.attach_sqlite_store(&db_path).expect("attach store");
        api.initialize_world_storage(false).expect("bootstrap");
        api.submit(claim_request());
        api.run_to(6);
        let at_six = api.digest();
        api.run_to(12);
        assert!(api.last_persistence_error().is_none());

        let mut full = WorldApi::replay_from_store(&db_path, "OVERWORLD", 12).expect("replay");
        assert_eq!(full.tick(), 12);
        assert_eq!(full.digest(), api.digest());

        // Starts from the tick-4 snapshot and re-runs ticks 4 and 5.
        let mut partial = WorldApi::replay_from_store(&db_path, "OVERWORLD", 6).expect("replay");
        assert_eq!(partial.digest(), at_six);

        let missing = WorldApi::replay_from_store(&db_path, "NETHER", 3).expect_err("unknown world");
        assert!(matches!(missing, ApiError::UnknownWorld(id) if id == "NETHER"));
    }

    #[test]
    fn import_failure_leaves_the_world_alone() {
        let mut api = seeded_api();
        api.run_to(3);
        let before = api.digest();

        let mut bad = api.export_snapshot();
        bad.header.version = 2;
        let err = api.import_snapshot(&bad).expect_err("version 2 is rejected");
        assert!(matches!(err, ApiError::Snapshot(SnapshotError::UnsupportedVersion(2))));
        assert_eq!(api.digest(), before);
    }

    #[test]
    fn persists_snapshots_on_cadence_and_reloads_them() {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("world.sqlite");

        let mut api = seeded_api();
        api.attach_sqlite_store(&db_path).expect("attach store");
        api.initialize_world_storage(false).expect("bootstrap");
        api.submit(claim_request());
        api.run_to(9);
        assert!(api.last_persistence_error().is_none());

        let store = SqliteWorldStore::open(&db_path).expect("reopen");
        let ticks: Vec<u64> = store
            .snapshot_digests("OVERWORLD")
            .expect("snapshot rows")
            .into_iter()
            .map(|(tick, _)| tick)
            .collect();
        assert_eq!(ticks, vec![0, 4, 8]);

        let latest = store
            .load_latest_snapshot("OVERWORLD")
            .expect("query")
            .expect("snapshot stored");
        assert_eq!(latest.header.tick, 8);

        let audit = store.load_audit_range("OVERWORLD", 0, 9).expect("audit rows");
        assert_eq!(audit, api.audit_log());

        let summary = store.load_world("OVERWORLD").expect("query").expect("world row");
        assert_eq!(summary.current_tick, 9);
        assert_eq!(summary.last_digest, api.digest());
    }

    #[test]
    fn second_bootstrap_requires_replace() {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("world.sqlite");

        let mut api = seeded_api();
        api.attach_sqlite_store(&db_path).expect("attach store");
        api.initialize_world_storage(false).expect("bootstrap");

        let err = api.initialize_world_storage(false).expect_err("already stored");
        assert!(matches!(err, PersistenceError::WorldAlreadyExists(_)));
        api.initialize_world_storage(true).expect("replace");
    }

    #[test]
    fn flush_without_store_reports_not_attached() {
        let mut api = seeded_api();
        assert!(matches!(
            api.flush_persistence_checked(),
            Err(PersistenceError::NotAttached)
        ));
    }
}
