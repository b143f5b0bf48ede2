//! Fixed block palette and item names.
//!
//! Block ids are stable: chunk digests and snapshots store the raw `u16`, so the
//! order below must never change. New blocks are appended.

pub type BlockId = u16;

pub const AIR: BlockId = 0;
pub const DIRT: BlockId = 1;
pub const GRASS: BlockId = 2;
pub const SAND: BlockId = 3;
pub const STONE: BlockId = 4;
pub const GRAVEL: BlockId = 5;
pub const LOG: BlockId = 6;
pub const COAL_ORE: BlockId = 7;
pub const IRON_ORE: BlockId = 8;
pub const COPPER_ORE: BlockId = 9;
pub const CRYSTAL_ORE: BlockId = 10;
pub const PLANK: BlockId = 11;
pub const CLAIM_TOTEM: BlockId = 12;
pub const CHEST: BlockId = 13;
pub const TORCH: BlockId = 14;
pub const CRAFTING_BENCH: BlockId = 15;
pub const FURNACE: BlockId = 16;
pub const BULLETIN_BOARD: BlockId = 17;
pub const CONTRACT_TERMINAL: BlockId = 18;
pub const SIGN: BlockId = 19;
pub const CONVEYOR: BlockId = 20;
pub const SWITCH: BlockId = 21;

const BLOCK_NAMES: [&str; 22] = [
    "AIR",
    "DIRT",
    "GRASS",
    "SAND",
    "STONE",
    "GRAVEL",
    "LOG",
    "COAL_ORE",
    "IRON_ORE",
    "COPPER_ORE",
    "CRYSTAL_ORE",
    "PLANK",
    "CLAIM_TOTEM",
    "CHEST",
    "TORCH",
    "CRAFTING_BENCH",
    "FURNACE",
    "BULLETIN_BOARD",
    "CONTRACT_TERMINAL",
    "SIGN",
    "CONVEYOR",
    "SWITCH",
];

// Items that are not also block names.
const ITEM_NAMES: [&str; 10] = [
    "BATTERY",
    "BERRIES",
    "COAL",
    "COPPER_INGOT",
    "CRYSTAL_SHARD",
    "IRON_INGOT",
    "STICK",
    "BREAD",
    "WHEAT",
    "WOOL",
];

pub fn block_name(id: BlockId) -> &'static str {
    BLOCK_NAMES.get(usize::from(id)).copied().unwrap_or("UNKNOWN")
}

pub fn block_id(name: &str) -> Option<BlockId> {
    BLOCK_NAMES
        .iter()
        .position(|candidate| *candidate == name)
        .and_then(|idx| BlockId::try_from(idx).ok())
}

/// Everything except AIR occupies its cell.
pub fn is_solid(id: BlockId) -> bool {
    id != AIR && usize::from(id) < BLOCK_NAMES.len()
}

/// Any placeable block or plain item is a valid inventory entry.
pub fn item_exists(name: &str) -> bool {
    if name.is_empty() || name == "AIR" {
        return false;
    }
    ITEM_NAMES.contains(&name) || block_id(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_ids_are_stable() {
        assert_eq!(block_name(AIR), "AIR");
        assert_eq!(block_name(CRYSTAL_ORE), "CRYSTAL_ORE");
        assert_eq!(block_name(SWITCH), "SWITCH");
        assert_eq!(block_id("CLAIM_TOTEM"), Some(CLAIM_TOTEM));
        assert_eq!(block_id("NOPE"), None);
        assert_eq!(block_name(999), "UNKNOWN");
    }

    #[test]
    fn items_include_blocks_and_plain_items() {
        assert!(item_exists("IRON_INGOT"));
        assert!(item_exists("PLANK"));
        assert!(!item_exists("AIR"));
        assert!(!item_exists("GOLD_DUST"));
    }

    #[test]
    fn air_and_unknown_ids_are_not_solid() {
        assert!(!is_solid(AIR));
        assert!(is_solid(STONE));
        assert!(!is_solid(500));
    }
}
