//! Entity records held by the world. Most of them are opaque to the governance
//! rules and only participate in the state digest and the snapshot document.

use std::collections::{BTreeMap, BTreeSet};

use contracts::Pos3;
use serde::{Deserialize, Serialize};

pub type ItemMap = BTreeMap<String, i64>;

/// Block position. Ordering is lexicographic by `(x, y, z)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Vec3i {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Vec3i {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> Pos3 {
        [self.x, self.y, self.z]
    }

    pub fn from_array(a: Pos3) -> Self {
        Self::new(a[0], a[1], a[2])
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(
            self.x.wrapping_add(dx),
            self.y.wrapping_add(dy),
            self.z.wrapping_add(dz),
        )
    }
}

/// Copies only strictly positive entries.
pub fn positive_items(src: &ItemMap) -> ItemMap {
    src.iter()
        .filter(|(item, n)| !item.is_empty() && **n > 0)
        .map(|(item, n)| (item.clone(), *n))
        .collect()
}

pub fn has_items(inventory: &ItemMap, cost: &ItemMap) -> bool {
    cost.iter()
        .all(|(item, need)| *need <= 0 || inventory.get(item).copied().unwrap_or(0) >= *need)
}

/// Deducts `cost`; entries that fall to zero or below are removed.
pub fn deduct_items(inventory: &mut ItemMap, cost: &ItemMap) {
    for (item, need) in cost {
        if *need <= 0 {
            continue;
        }
        let left = inventory.get(item).copied().unwrap_or(0) - need;
        if left <= 0 {
            inventory.remove(item);
        } else {
            inventory.insert(item.clone(), left);
        }
    }
}

pub fn add_items(inventory: &mut ItemMap, item: &str, count: i64) {
    if item.is_empty() || count <= 0 {
        return;
    }
    *inventory.entry(item.to_string()).or_insert(0) += count;
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunScore {
    pub novelty: i64,
    pub creation: i64,
    pub social: i64,
    pub influence: i64,
    pub narrative: i64,
    pub risk_rescue: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunDecayWindow {
    pub start_tick: u64,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Equipment {
    pub main_hand: String,
    pub armor: [String; 4],
}

impl Equipment {
    pub fn is_empty(&self) -> bool {
        self.main_hand.is_empty() && self.armor.iter().all(String::is_empty)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryEntry {
    pub value: String,
    pub expiry_tick: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateWindow {
    pub start_tick: u64,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovementTask {
    pub task_id: String,
    pub kind: String,
    pub target: Vec3i,
    pub tolerance: f64,
    pub target_id: String,
    pub distance: f64,
    pub start_pos: Vec3i,
    pub started_tick: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkTask {
    pub task_id: String,
    pub kind: String,
    pub block_pos: Vec3i,
    pub recipe_id: String,
    pub item_id: String,
    pub count: i64,
    pub blueprint_id: String,
    pub anchor: Vec3i,
    pub rotation: i64,
    pub build_index: i64,
    pub target_id: String,
    pub src_container: String,
    pub dst_container: String,
    pub started_tick: u64,
    pub work_ticks: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub org_id: String,
    pub current_world_id: String,
    pub world_switch_cooldown_until_tick: u64,
    pub pos: Vec3i,
    pub yaw: i64,
    pub hp: i64,
    pub hunger: i64,
    pub stamina_milli: i64,
    pub rep_trade: i64,
    pub rep_build: i64,
    pub rep_social: i64,
    pub rep_law: i64,
    pub fun: FunScore,
    pub inventory: ItemMap,
    pub memory: BTreeMap<String, MemoryEntry>,
    pub rate_windows: BTreeMap<String, RateWindow>,
    pub seen_biomes: BTreeSet<String>,
    pub seen_recipes: BTreeSet<String>,
    pub seen_events: BTreeSet<String>,
    pub fun_decay: BTreeMap<String, FunDecayWindow>,
    pub equipment: Equipment,
    pub move_task: Option<MovementTask>,
    pub work_task: Option<WorkTask>,
}

impl Agent {
    pub fn new(id: impl Into<String>, name: impl Into<String>, pos: Vec3i) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            pos,
            hp: 20,
            hunger: 20,
            stamina_milli: 1000,
            rep_trade: 500,
            rep_build: 500,
            rep_social: 500,
            rep_law: 500,
            ..Self::default()
        }
    }

    pub fn with_items<'a>(mut self, items: impl IntoIterator<Item = (&'a str, i64)>) -> Self {
        for (item, count) in items {
            add_items(&mut self.inventory, item, count);
        }
        self
    }

    pub fn item_count(&self, item: &str) -> i64 {
        self.inventory.get(item).copied().unwrap_or(0)
    }

    /// Sorted, positive inventory entries.
    pub fn inventory_list(&self) -> Vec<(&str, i64)> {
        self.inventory
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(item, n)| (item.as_str(), *n))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Placed entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    pub kind: String,
    pub pos: Vec3i,
    pub inventory: ItemMap,
    pub reserved: ItemMap,
    pub owed: BTreeMap<String, ItemMap>,
}

impl Container {
    pub fn new(kind: impl Into<String>, pos: Vec3i) -> Self {
        Self {
            kind: kind.into(),
            pos,
            ..Self::default()
        }
    }

    /// Drops non-positive entries and empty owed ledgers.
    pub fn normalized(mut self) -> Self {
        self.inventory = positive_items(&self.inventory);
        self.reserved = positive_items(&self.reserved);
        self.owed = self
            .owed
            .into_iter()
            .filter(|(agent, _)| !agent.is_empty())
            .map(|(agent, items)| (agent, positive_items(&items)))
            .filter(|(_, items)| !items.is_empty())
            .collect();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemEntity {
    pub entity_id: String,
    pub pos: Vec3i,
    pub item: String,
    pub count: i64,
    pub created_tick: u64,
    pub expires_tick: u64,
}

impl ItemEntity {
    pub fn is_valid(&self) -> bool {
        !self.item.is_empty() && self.count > 0
    }

    pub fn is_expired(&self, now_tick: u64) -> bool {
        self.expires_tick != 0 && now_tick >= self.expires_tick
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sign {
    pub text: String,
    pub updated_tick: u64,
    pub updated_by: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConveyorMeta {
    pub dx: i32,
    pub dz: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trade {
    pub trade_id: String,
    pub from: String,
    pub to: String,
    pub offer: ItemMap,
    pub request: ItemMap,
    pub created_tick: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardPost {
    pub post_id: String,
    pub author: String,
    pub title: String,
    pub body: String,
    pub tick: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    pub board_id: String,
    pub posts: Vec<BoardPost>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contract {
    pub contract_id: String,
    pub terminal_pos: Vec3i,
    pub poster: String,
    pub acceptor: String,
    pub kind: String,
    pub state: String,
    pub requirements: ItemMap,
    pub reward: ItemMap,
    pub deposit: ItemMap,
    pub blueprint_id: String,
    pub anchor: Vec3i,
    pub rotation: i64,
    pub created_tick: u64,
    pub deadline_tick: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Structure {
    pub structure_id: String,
    pub blueprint_id: String,
    pub builder_id: String,
    pub anchor: Vec3i,
    pub rotation: i64,
    pub min: Vec3i,
    pub max: Vec3i,
    pub completed_tick: u64,
    pub award_due_tick: u64,
    pub awarded: bool,
    pub used_by: BTreeMap<String, u64>,
    pub last_influence_day: i64,
}

/// Weather and world-event header fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub weather: String,
    pub weather_until_tick: u64,
    pub active_event_id: String,
    pub active_event_start: u64,
    pub active_event_ends: u64,
    pub active_event_center: Vec3i,
    pub active_event_radius: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec3i_orders_by_x_then_y_then_z() {
        let mut positions = vec![
            Vec3i::new(1, 0, 0),
            Vec3i::new(0, 1, -5),
            Vec3i::new(0, 0, 9),
            Vec3i::new(0, 1, -6),
        ];
        positions.sort();
        assert_eq!(
            positions,
            vec![
                Vec3i::new(0, 0, 9),
                Vec3i::new(0, 1, -6),
                Vec3i::new(0, 1, -5),
                Vec3i::new(1, 0, 0),
            ]
        );
    }

    #[test]
    fn deduct_items_removes_exhausted_entries() {
        let mut inventory = ItemMap::from([("BATTERY".to_string(), 1), ("COAL".to_string(), 5)]);
        let cost = ItemMap::from([("BATTERY".to_string(), 1), ("COAL".to_string(), 2)]);
        assert!(has_items(&inventory, &cost));
        deduct_items(&mut inventory, &cost);
        assert_eq!(inventory, ItemMap::from([("COAL".to_string(), 3)]));
        assert!(!has_items(&inventory, &cost));
    }

    #[test]
    fn container_normalization_drops_empty_ledgers() {
        let mut container = Container::new("CHEST", Vec3i::new(1, 0, 1));
        container.inventory.insert("PLANK".to_string(), 0);
        container.owed.insert("A1".to_string(), ItemMap::from([("COAL".to_string(), -1)]));
        container.owed.insert("A2".to_string(), ItemMap::from([("COAL".to_string(), 2)]));
        let container = container.normalized();
        assert!(container.inventory.is_empty());
        assert_eq!(container.owed.len(), 1);
        assert!(container.owed.contains_key("A2"));
    }

    #[test]
    fn item_expiry_ignores_zero_deadline() {
        let mut entity = ItemEntity {
            entity_id: "IT_1".to_string(),
            item: "COAL".to_string(),
            count: 1,
            ..ItemEntity::default()
        };
        assert!(!entity.is_expired(u64::MAX));
        entity.expires_tick = 10;
        assert!(!entity.is_expired(9));
        assert!(entity.is_expired(10));
    }
}
