use std::collections::BTreeMap;

use contracts::{ActionKind, ActionRequest, ErrorCode, WorldConfig};
use voxel_api::WorldApi;

fn config() -> WorldConfig {
    WorldConfig {
        id: "REPLAY".to_string(),
        seed: 99,
        ..WorldConfig::default()
    }
}

fn request_log() -> BTreeMap<u64, Vec<ActionRequest>> {
    BTreeMap::from([
        (
            1,
            vec![ActionRequest::new(
                "org-1",
                "A1",
                ActionKind::CreateOrg {
                    org_kind: "CITY".into(),
                    org_name: "Harbor".into(),
                },
            )],
        ),
        (3, vec![ActionRequest::new("leave-1", "A1", ActionKind::LeaveOrg)]),
    ])
}

#[test]
fn replay_reproduces_live_digests_tick_by_tick() {
    let log = request_log();
    let replayed = WorldApi::replay(config(), &log, 6).expect("replay");
    assert_eq!(replayed.len(), 6);

    let mut api = WorldApi::from_config(config()).expect("valid config");
    for (tick, digest) in &replayed {
        let actions = log.get(tick).cloned().unwrap_or_default();
        let outcome = api.step_with(&actions);
        assert_eq!(outcome.tick, *tick);
        assert_eq!(&outcome.digest, digest, "tick {tick}");
    }

    // Unknown actors are refused, never created.
    let refused: Vec<_> = api.action_log().iter().map(|entry| entry.result.code).collect();
    assert_eq!(refused, vec![Some(ErrorCode::InvalidTarget); 2]);
}

#[test]
fn replay_to_tick_zero_runs_nothing() {
    let replayed = WorldApi::replay(config(), &BTreeMap::new(), 0).expect("replay");
    assert!(replayed.is_empty());
}
