//! Completed-structure primitives: blueprint features, stability and ids.

use std::collections::{HashMap, VecDeque};

use crate::model::Vec3i;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlueprintFeatures {
    pub unique_block_types: usize,
    pub has_storage: bool,
    pub has_light: bool,
    pub has_workshop: bool,
    pub has_governance: bool,
}

/// Inspects the block names a blueprint places.
pub fn extract_blueprint_features<'a>(blocks: impl IntoIterator<Item = &'a str>) -> BlueprintFeatures {
    let mut seen = std::collections::BTreeSet::new();
    let mut out = BlueprintFeatures::default();
    for name in blocks {
        if name.is_empty() {
            continue;
        }
        seen.insert(name);
        match name {
            "CHEST" => out.has_storage = true,
            "TORCH" => out.has_light = true,
            "CRAFTING_BENCH" | "FURNACE" => out.has_workshop = true,
            "BULLETIN_BOARD" | "CONTRACT_TERMINAL" | "CLAIM_TOTEM" | "SIGN" => out.has_governance = true,
            _ => {}
        }
    }
    out.unique_block_types = seen.len();
    out
}

const NEIGHBOURS: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// Fraction of blocks that must reach a support for the structure to count as stable.
pub const STABLE_SUPPORTED_RATIO: f64 = 0.95;

/// Blocks resting on the ground (`y <= 1`) or on a solid block outside the
/// structure seed a flood fill over face neighbours. An empty structure is stable.
pub fn is_structure_stable(positions: &[Vec3i], is_support: impl Fn(i32, i32, i32) -> bool) -> bool {
    if positions.is_empty() {
        return true;
    }
    let index: HashMap<Vec3i, usize> = positions.iter().enumerate().map(|(i, p)| (*p, i)).collect();
    let mut visited = vec![false; positions.len()];
    let mut queue = VecDeque::new();

    for (i, p) in positions.iter().enumerate() {
        let grounded = p.y <= 1 || {
            let below = p.offset(0, -1, 0);
            !index.contains_key(&below) && is_support(below.x, below.y, below.z)
        };
        if grounded {
            visited[i] = true;
            queue.push_back(i);
        }
    }

    while let Some(i) = queue.pop_front() {
        let p = positions[i];
        for (dx, dy, dz) in NEIGHBOURS {
            if let Some(&ni) = index.get(&p.offset(dx, dy, dz)) {
                if !visited[ni] {
                    visited[ni] = true;
                    queue.push_back(ni);
                }
            }
        }
    }

    let supported = visited.iter().filter(|v| **v).count();
    supported > 0 && supported as f64 / positions.len() as f64 >= STABLE_SUPPORTED_RATIO
}

pub fn structure_id(world_id: &str, now_tick: u64, blueprint_id: &str, anchor: Vec3i) -> String {
    format!(
        "STRUCT_{world_id}_{now_tick}_{blueprint_id}_{}_{}_{}",
        anchor.x, anchor.y, anchor.z
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn features_follow_block_names() {
        let f = extract_blueprint_features(["PLANK", "PLANK", "CHEST", "TORCH", "FURNACE", "SIGN", ""]);
        assert_eq!(f.unique_block_types, 5);
        assert!(f.has_storage && f.has_light && f.has_workshop && f.has_governance);
        assert_eq!(extract_blueprint_features(["STONE"]).unique_block_types, 1);
        assert!(!extract_blueprint_features(["STONE"]).has_storage);
    }

    #[test]
    fn empty_structure_is_stable() {
        assert!(is_structure_stable(&[], |_, _, _| false));
    }

    #[test]
    fn grounded_column_is_stable() {
        let column: Vec<Vec3i> = (1..=10).map(|y| Vec3i::new(0, y, 0)).collect();
        assert!(is_structure_stable(&column, |_, _, _| false));
    }

    #[test]
    fn floating_block_breaks_stability() {
        let mut blocks: Vec<Vec3i> = (1..=10).map(|x| Vec3i::new(x, 1, 0)).collect();
        blocks.push(Vec3i::new(50, 9, 50));
        // 10 of 11 supported is below 95%.
        assert!(!is_structure_stable(&blocks, |_, _, _| false));
    }

    #[test]
    fn external_support_seeds_the_fill() {
        let blocks = [Vec3i::new(0, 5, 0), Vec3i::new(1, 5, 0)];
        assert!(!is_structure_stable(&blocks, |_, _, _| false));
        assert!(is_structure_stable(&blocks, |x, y, _| x == 0 && y == 4));
    }

    #[test]
    fn ids_are_stable_text() {
        assert_eq!(
            structure_id("OVERWORLD", 120, "HUT", Vec3i::new(-3, 0, 7)),
            "STRUCT_OVERWORLD_120_HUT_-3_0_7"
        );
    }
}
