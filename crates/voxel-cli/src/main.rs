use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use contracts::snapshot::SnapshotV1;
use contracts::{ActionRequest, WorldConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;
use voxel_api::WorldApi;
use voxel_core::catalog;
use voxel_core::ChunkKey;

fn print_usage() {
    println!("voxel-cli [--config <path>] <command>");
    println!("commands:");
    println!("  digest [ticks]");
    println!("    runs an empty world to the target tick and prints the state digest");
    println!("  simulate <world_id> <seed> [ticks] [sqlite_path] [actions_json]");
    println!("    runs to target tick, applying the optional request log, and persists to sqlite");
    println!("  export <out_path> [ticks]");
    println!("    writes a v1 snapshot taken at the target tick");
    println!("  import <snapshot_path>");
    println!("    validates a v1 snapshot and prints its tick and digest");
    println!("  inspect-chunk <cx> <cz> [snapshot_path]");
    println!("  replay <world_id> <tick> [sqlite_path]");
    println!("    rebuilds a stored world from its latest snapshot and request log");
    println!("env: VOXEL_LOG (log filter, default info), VOXEL_SQLITE_PATH (default database)");
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("VOXEL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_u64(value: Option<&String>, label: &str) -> Result<u64, String> {
    let raw = value.ok_or_else(|| format!("missing {label}"))?;
    raw.parse::<u64>()
        .map_err(|_| format!("invalid {label}: {raw}"))
}

fn parse_i32(value: Option<&String>, label: &str) -> Result<i32, String> {
    let raw = value.ok_or_else(|| format!("missing {label}"))?;
    raw.parse::<i32>()
        .map_err(|_| format!("invalid {label}: {raw}"))
}

fn parse_optional_ticks(value: Option<&String>, default: u64) -> Result<u64, String> {
    value
        .map(|raw| {
            raw.parse::<u64>()
                .map_err(|_| format!("invalid ticks: {raw}"))
        })
        .transpose()
        .map(|ticks| ticks.unwrap_or(default))
}

fn parse_seed(value: Option<&String>) -> Result<i64, String> {
    let raw = value.ok_or_else(|| "missing seed".to_string())?;
    raw.parse::<i64>()
        .map_err(|_| format!("invalid seed: {raw}"))
}

fn default_sqlite_path() -> String {
    env::var("VOXEL_SQLITE_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "voxel_worlds.sqlite".to_string())
}

fn parse_sqlite_path(value: Option<&String>) -> String {
    value
        .map(String::to_string)
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(default_sqlite_path)
}

/// Pulls `--config <path>` out of the argument list.
fn split_config_flag(args: Vec<String>) -> Result<(Option<PathBuf>, Vec<String>), String> {
    let mut rest = Vec::with_capacity(args.len());
    let mut config = None;
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter.next().ok_or_else(|| "--config needs a path".to_string())?;
            config = Some(PathBuf::from(path));
        } else if let Some(path) = arg.strip_prefix("--config=") {
            config = Some(PathBuf::from(path));
        } else {
            rest.push(arg);
        }
    }
    Ok((config, rest))
}

fn load_config(path: Option<&PathBuf>) -> Result<WorldConfig, String> {
    let Some(path) = path else {
        return Ok(WorldConfig::default());
    };
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {err}", path.display()))?;
    serde_json::from_str(&raw).map_err(|err| format!("invalid config {}: {err}", path.display()))
}

fn load_snapshot(path: &str) -> Result<SnapshotV1, String> {
    let raw = fs::read_to_string(path).map_err(|err| format!("failed to read {path}: {err}"))?;
    serde_json::from_str(&raw).map_err(|err| format!("invalid snapshot {path}: {err}"))
}

/// Request log file: a JSON object mapping tick to the requests run at that tick.
fn load_actions(path: Option<&String>) -> Result<BTreeMap<u64, Vec<ActionRequest>>, String> {
    let Some(path) = path else {
        return Ok(BTreeMap::new());
    };
    let raw = fs::read_to_string(path).map_err(|err| format!("failed to read {path}: {err}"))?;
    serde_json::from_str(&raw).map_err(|err| format!("invalid request log {path}: {err}"))
}

fn run_digest(config: WorldConfig, args: &[String]) -> Result<(), String> {
    let target_tick = parse_optional_ticks(args.get(2), 0)?;
    let mut api = WorldApi::from_config(config).map_err(|err| err.to_string())?;
    api.run_to(target_tick);
    println!("tick={} digest={}", api.tick(), api.digest());
    Ok(())
}

fn run_simulation(mut config: WorldConfig, args: &[String]) -> Result<(), String> {
    let world_id = args
        .get(2)
        .cloned()
        .ok_or_else(|| "missing world_id".to_string())?;
    let seed = parse_seed(args.get(3))?;
    let target_tick = parse_optional_ticks(args.get(4), 3000)?;
    let sqlite_path = parse_sqlite_path(args.get(5));
    let mut actions = load_actions(args.get(6))?;

    config.id = world_id.clone();
    config.seed = seed;

    let mut api = WorldApi::from_config(config).map_err(|err| err.to_string())?;
    api.attach_sqlite_store(PathBuf::from(&sqlite_path))
        .map_err(|err| format!("failed to attach sqlite store: {err}"))?;
    api.initialize_world_storage(true)
        .map_err(|err| format!("failed to initialize world storage: {err}"))?;

    let mut refused = 0_usize;
    while api.tick() < target_tick {
        let batch = actions.remove(&api.tick()).unwrap_or_default();
        let outcome = api.step_with(&batch);
        refused += voxel_api::rejected(&outcome.results).count();
    }

    if let Some(error) = api.last_persistence_error() {
        return Err(format!("persistence error after simulation: {error}"));
    }

    info!(%world_id, seed, target_tick, "simulation finished");
    println!(
        "simulated world_id={} seed={} tick={} actions={} refused={} digest={} sqlite={}",
        world_id,
        seed,
        api.tick(),
        api.action_log().len(),
        refused,
        api.digest(),
        sqlite_path
    );
    Ok(())
}

fn run_export(config: WorldConfig, args: &[String]) -> Result<(), String> {
    let out_path = args
        .get(2)
        .cloned()
        .ok_or_else(|| "missing out_path".to_string())?;
    let target_tick = parse_optional_ticks(args.get(3), 0)?;

    let mut api = WorldApi::from_config(config).map_err(|err| err.to_string())?;
    api.run_to(target_tick);
    let snapshot = api.export_snapshot();
    let text = serde_json::to_string_pretty(&snapshot).map_err(|err| err.to_string())?;
    fs::write(&out_path, text).map_err(|err| format!("failed to write {out_path}: {err}"))?;
    println!("exported tick={} digest={} path={}", snapshot.header.tick, api.digest(), out_path);
    Ok(())
}

fn run_import(config: WorldConfig, args: &[String]) -> Result<(), String> {
    let path = args.get(2).ok_or_else(|| "missing snapshot_path".to_string())?;
    let snapshot = load_snapshot(path)?;
    let mut api = WorldApi::from_snapshot(config, &snapshot).map_err(|err| err.to_string())?;
    let world = api.world();
    println!(
        "imported world_id={} tick={} chunks={} claims={} laws={} orgs={} agents={}",
        world.world_id(),
        world.tick(),
        world.store().len(),
        world.claims().len(),
        world.laws().len(),
        world.orgs().len(),
        world.agents().len(),
    );
    println!("digest={}", api.digest());
    Ok(())
}

fn run_inspect_chunk(config: WorldConfig, args: &[String]) -> Result<(), String> {
    let key = ChunkKey::new(parse_i32(args.get(2), "cx")?, parse_i32(args.get(3), "cz")?);
    let mut api = match args.get(4) {
        Some(path) => WorldApi::from_snapshot(config, &load_snapshot(path)?),
        None => WorldApi::from_config(config),
    }
    .map_err(|err| err.to_string())?;

    let chunk = api.world_mut().store_mut().get_or_gen(key);
    let digest = hex::encode(chunk.digest());
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for block in chunk.blocks() {
        *counts.entry(catalog::block_name(*block)).or_insert(0) += 1;
    }

    println!("chunk cx={} cz={} digest={}", key.cx, key.cz, digest);
    for (name, count) in counts {
        println!("  {name}: {count}");
    }
    Ok(())
}

fn run_replay(args: &[String]) -> Result<(), String> {
    let world_id = args.get(2).ok_or_else(|| "missing world_id".to_string())?;
    let target_tick = parse_u64(args.get(3), "tick")?;
    let sqlite_path = parse_sqlite_path(args.get(4));

    let mut api = WorldApi::replay_from_store(&sqlite_path, world_id, target_tick)
        .map_err(|err| format!("replay failed: {err}"))?;
    println!(
        "replayed world_id={} tick={} digest={}",
        world_id,
        api.tick(),
        api.digest()
    );
    Ok(())
}

fn main() {
    init_logging();

    let (config_path, args) = match split_config_flag(env::args().collect()) {
        Ok(split) => split,
        Err(err) => {
            eprintln!("error: {err}");
            print_usage();
            std::process::exit(2);
        }
    };
    let config = match load_config(config_path.as_ref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };

    let result = match args.get(1).map(String::as_str) {
        Some("digest") => run_digest(config, &args),
        Some("simulate") => run_simulation(config, &args),
        Some("export") => run_export(config, &args),
        Some("import") => run_import(config, &args),
        Some("inspect-chunk") => run_inspect_chunk(config, &args),
        Some("replay") => run_replay(&args),
        _ => {
            print_usage();
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        print_usage();
        std::process::exit(2);
    }
}
