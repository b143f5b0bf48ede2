use std::collections::BTreeMap;
use std::path::Path;

use contracts::snapshot::SnapshotV1;
use contracts::{ActionRequest, ActionResult, AuditRecord, WorldConfig};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A request as it was applied, keyed by the tick it ran at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedAction {
    pub tick: u64,
    pub request: ActionRequest,
    pub result: ActionResult,
}

/// Summary row for one stored world.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedWorldSummary {
    pub world_id: String,
    pub config: WorldConfig,
    pub current_tick: u64,
    pub last_digest: String,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("sqlite store is not attached")]
    NotAttached,
    #[error("world {0} already has stored state")]
    WorldAlreadyExists(String),
}

/// Everything written for one flush, committed in a single transaction.
#[derive(Debug, Clone, Copy)]
pub struct PersistDelta<'a> {
    pub config: &'a WorldConfig,
    pub current_tick: u64,
    pub digest: &'a str,
    pub actions: &'a [PersistedAction],
    pub audit: &'a [AuditRecord],
    pub snapshot: Option<&'a SnapshotV1>,
}

#[derive(Debug)]
pub struct SqliteWorldStore {
    conn: Connection,
}

impl SqliteWorldStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    pub fn world_exists(&self, world_id: &str) -> Result<bool, PersistenceError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM worlds WHERE world_id = ?1",
                params![world_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn delete_world(&mut self, world_id: &str) -> Result<(), PersistenceError> {
        let tx = self.conn.transaction()?;
        for table in ["actions", "audit", "snapshots", "worlds"] {
            tx.execute(
                &format!("DELETE FROM {table} WHERE world_id = ?1"),
                params![world_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn persist_delta(&mut self, delta: PersistDelta<'_>) -> Result<(), PersistenceError> {
        let world_id = delta.config.id.as_str();
        let tx = self.conn.transaction()?;

        upsert_world(&tx, delta.config, delta.current_tick, delta.digest)?;

        for entry in delta.actions {
            let request_json = serde_json::to_string(&entry.request)?;
            let result_json = serde_json::to_string(&entry.result)?;
            tx.execute(
                "INSERT INTO actions (
                    world_id,
                    seq,
                    tick,
                    ref_id,
                    actor,
                    ok,
                    request_json,
                    result_json
                 ) VALUES (
                    ?1,
                    (SELECT COALESCE(MAX(seq), -1) + 1 FROM actions WHERE world_id = ?1),
                    ?2, ?3, ?4, ?5, ?6, ?7
                 )",
                params![
                    world_id,
                    to_sql_tick(entry.tick),
                    entry.request.ref_id.as_str(),
                    entry.request.actor.as_str(),
                    i64::from(entry.result.ok),
                    request_json,
                    result_json,
                ],
            )?;
        }

        for record in delta.audit {
            let record_json = serde_json::to_string(record)?;
            tx.execute(
                "INSERT INTO audit (
                    world_id,
                    seq,
                    tick,
                    actor,
                    action,
                    reason,
                    record_json
                 ) VALUES (
                    ?1,
                    (SELECT COALESCE(MAX(seq), -1) + 1 FROM audit WHERE world_id = ?1),
                    ?2, ?3, ?4, ?5, ?6
                 )",
                params![
                    world_id,
                    to_sql_tick(record.tick),
                    record.actor.as_str(),
                    record.action.as_str(),
                    record.reason.as_str(),
                    record_json,
                ],
            )?;
        }

        if let Some(snapshot) = delta.snapshot {
            let payload_json = serde_json::to_string(snapshot)?;
            tx.execute(
                "INSERT OR REPLACE INTO snapshots (
                    world_id,
                    tick,
                    digest,
                    payload_json,
                    created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    world_id,
                    to_sql_tick(snapshot.header.tick),
                    delta.digest,
                    payload_json,
                    tick_stamp(snapshot.header.tick),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn load_world(&self, world_id: &str) -> Result<Option<PersistedWorldSummary>, PersistenceError> {
        let row: Option<(String, i64, String)> = self
            .conn
            .query_row(
                "SELECT config_json, current_tick, last_digest FROM worlds WHERE world_id = ?1",
                params![world_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match row {
            Some((config_json, current_tick, last_digest)) => Ok(Some(PersistedWorldSummary {
                world_id: world_id.to_string(),
                config: serde_json::from_str(&config_json)?,
                current_tick: from_sql_tick(current_tick),
                last_digest,
            })),
            None => Ok(None),
        }
    }

    pub fn load_latest_snapshot(&self, world_id: &str) -> Result<Option<SnapshotV1>, PersistenceError> {
        self.load_latest_snapshot_at_or_before(world_id, u64::MAX)
    }

    pub fn load_latest_snapshot_at_or_before(
        &self,
        world_id: &str,
        tick: u64,
    ) -> Result<Option<SnapshotV1>, PersistenceError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload_json
                 FROM snapshots
                 WHERE world_id = ?1 AND tick <= ?2
                 ORDER BY tick DESC
                 LIMIT 1",
                params![world_id, to_sql_tick(tick)],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(raw) => Ok(Some(serde_json::from_str::<SnapshotV1>(&raw)?)),
            None => Ok(None),
        }
    }

    /// Stored snapshot ticks and their digests, oldest first.
    pub fn snapshot_digests(&self, world_id: &str) -> Result<Vec<(u64, String)>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT tick, digest FROM snapshots WHERE world_id = ?1 ORDER BY tick ASC",
        )?;
        let rows = stmt.query_map(params![world_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (tick, digest) = row?;
            out.push((from_sql_tick(tick), digest));
        }
        Ok(out)
    }

    pub fn load_audit_range(
        &self,
        world_id: &str,
        from_tick: u64,
        to_tick: u64,
    ) -> Result<Vec<AuditRecord>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT record_json
             FROM audit
             WHERE world_id = ?1 AND tick >= ?2 AND tick <= ?3
             ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(
            params![world_id, to_sql_tick(from_tick), to_sql_tick(to_tick)],
            |row| row.get::<_, String>(0),
        )?;

        let mut records = Vec::new();
        for row in rows {
            records.push(serde_json::from_str::<AuditRecord>(&row?)?);
        }
        Ok(records)
    }

    /// Applied requests in `[from_tick, to_tick]`, grouped by tick in submission order.
    pub fn load_actions_range(
        &self,
        world_id: &str,
        from_tick: u64,
        to_tick: u64,
    ) -> Result<BTreeMap<u64, Vec<ActionRequest>>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT tick, request_json
             FROM actions
             WHERE world_id = ?1 AND tick >= ?2 AND tick <= ?3
             ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(
            params![world_id, to_sql_tick(from_tick), to_sql_tick(to_tick)],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
        )?;

        let mut by_tick: BTreeMap<u64, Vec<ActionRequest>> = BTreeMap::new();
        for row in rows {
            let (tick, raw) = row?;
            by_tick
                .entry(from_sql_tick(tick))
                .or_default()
                .push(serde_json::from_str(&raw)?);
        }
        Ok(by_tick)
    }

    fn configure(&mut self) -> Result<(), PersistenceError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    fn migrate(&mut self) -> Result<(), PersistenceError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS worlds (
                world_id TEXT PRIMARY KEY,
                world_type TEXT NOT NULL,
                seed TEXT NOT NULL,
                config_json TEXT NOT NULL,
                current_tick INTEGER NOT NULL,
                last_digest TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS snapshots (
                world_id TEXT NOT NULL,
                tick INTEGER NOT NULL,
                digest TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (world_id, tick)
            );

            CREATE TABLE IF NOT EXISTS audit (
                world_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                tick INTEGER NOT NULL,
                actor TEXT NOT NULL,
                action TEXT NOT NULL,
                reason TEXT NOT NULL,
                record_json TEXT NOT NULL,
                PRIMARY KEY (world_id, seq)
            );

            CREATE TABLE IF NOT EXISTS actions (
                world_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                tick INTEGER NOT NULL,
                ref_id TEXT NOT NULL,
                actor TEXT NOT NULL,
                ok INTEGER NOT NULL,
                request_json TEXT NOT NULL,
                result_json TEXT NOT NULL,
                PRIMARY KEY (world_id, seq)
            );

            CREATE INDEX IF NOT EXISTS idx_snapshots_world_tick ON snapshots(world_id, tick);
            CREATE INDEX IF NOT EXISTS idx_audit_world_tick ON audit(world_id, tick);
            CREATE INDEX IF NOT EXISTS idx_audit_world_action ON audit(world_id, action, tick);
            CREATE INDEX IF NOT EXISTS idx_actions_world_tick ON actions(world_id, tick);
            ",
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO schema_migrations(version, name, applied_at)
             VALUES(1, 'initial_v1', 'tick-000000')",
            [],
        )?;

        Ok(())
    }
}

fn upsert_world(
    tx: &rusqlite::Transaction<'_>,
    config: &WorldConfig,
    current_tick: u64,
    digest: &str,
) -> Result<(), PersistenceError> {
    let config_json = serde_json::to_string(config)?;

    tx.execute(
        "INSERT INTO worlds (
            world_id,
            world_type,
            seed,
            config_json,
            current_tick,
            last_digest,
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(world_id) DO UPDATE SET
            world_type = excluded.world_type,
            seed = excluded.seed,
            config_json = excluded.config_json,
            current_tick = excluded.current_tick,
            last_digest = excluded.last_digest,
            updated_at = excluded.updated_at",
        params![
            config.id.as_str(),
            config.world_type.as_str(),
            config.seed.to_string(),
            config_json,
            to_sql_tick(current_tick),
            digest,
            tick_stamp(current_tick),
            tick_stamp(current_tick),
        ],
    )?;

    Ok(())
}

fn to_sql_tick(tick: u64) -> i64 {
    i64::try_from(tick).unwrap_or(i64::MAX)
}

fn from_sql_tick(tick: i64) -> u64 {
    u64::try_from(tick).unwrap_or(0)
}

fn tick_stamp(tick: u64) -> String {
    format!("tick-{tick:06}")
}
