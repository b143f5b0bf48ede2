//! Per-world id minting. Every namespace is `<PREFIX><n>` with a strictly
//! increasing `n`; import raises each counter to the largest suffix seen.

use contracts::snapshot::CountersV1;

pub const AGENT_PREFIX: &str = "A_";
pub const TASK_PREFIX: &str = "T_";
pub const LAND_PREFIX: &str = "LAND_";
pub const TRADE_PREFIX: &str = "TR_";
pub const POST_PREFIX: &str = "P_";
pub const CONTRACT_PREFIX: &str = "C_";
pub const LAW_PREFIX: &str = "LAW_";
pub const ORG_PREFIX: &str = "ORG_";
pub const ITEM_PREFIX: &str = "IT_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdCounters {
    pub agent: u64,
    pub task: u64,
    pub land: u64,
    pub trade: u64,
    pub post: u64,
    pub contract: u64,
    pub law: u64,
    pub org: u64,
    pub item: u64,
}

fn mint(counter: &mut u64, prefix: &str) -> String {
    *counter += 1;
    format!("{prefix}{counter}")
}

impl IdCounters {
    pub fn next_agent(&mut self) -> String {
        mint(&mut self.agent, AGENT_PREFIX)
    }

    pub fn next_task(&mut self) -> String {
        mint(&mut self.task, TASK_PREFIX)
    }

    pub fn next_land(&mut self) -> String {
        mint(&mut self.land, LAND_PREFIX)
    }

    pub fn next_trade(&mut self) -> String {
        mint(&mut self.trade, TRADE_PREFIX)
    }

    pub fn next_post(&mut self) -> String {
        mint(&mut self.post, POST_PREFIX)
    }

    pub fn next_contract(&mut self) -> String {
        mint(&mut self.contract, CONTRACT_PREFIX)
    }

    pub fn next_law(&mut self) -> String {
        mint(&mut self.law, LAW_PREFIX)
    }

    pub fn next_org(&mut self) -> String {
        mint(&mut self.org, ORG_PREFIX)
    }

    pub fn next_item(&mut self) -> String {
        mint(&mut self.item, ITEM_PREFIX)
    }

    pub fn to_v1(self) -> CountersV1 {
        CountersV1 {
            next_agent: self.agent,
            next_task: self.task,
            next_land: self.land,
            next_trade: self.trade,
            next_post: self.post,
            next_contract: self.contract,
            next_law: self.law,
            next_org: self.org,
            next_item: self.item,
        }
    }

    pub fn from_v1(v1: &CountersV1) -> Self {
        Self {
            agent: v1.next_agent,
            task: v1.next_task,
            land: v1.next_land,
            trade: v1.next_trade,
            post: v1.next_post,
            contract: v1.next_contract,
            law: v1.next_law,
            org: v1.next_org,
            item: v1.next_item,
        }
    }
}

/// Numeric suffix of `id` after `prefix`, if it is all digits.
pub fn parse_uint_after_prefix(prefix: &str, id: &str) -> Option<u64> {
    let rest = id.strip_prefix(prefix)?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

/// Land ids may carry an owner segment (`LAND_<owner>_<n>`); the number is the last segment.
pub fn parse_land_num(id: &str) -> Option<u64> {
    let rest = id.strip_prefix(LAND_PREFIX)?;
    let tail = rest.rsplit('_').next()?;
    parse_uint_after_prefix("", tail)
}

/// Raises `counter` to at least the suffix of every id.
pub fn track_max<'a>(counter: &mut u64, prefix: &str, ids: impl IntoIterator<Item = &'a str>) {
    for id in ids {
        if let Some(n) = parse_uint_after_prefix(prefix, id) {
            *counter = (*counter).max(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_ids_are_strictly_increasing() {
        let mut counters = IdCounters::default();
        assert_eq!(counters.next_land(), "LAND_1");
        assert_eq!(counters.next_land(), "LAND_2");
        assert_eq!(counters.next_law(), "LAW_1");
        assert_eq!(counters.next_org(), "ORG_1");
        assert_eq!(counters.next_item(), "IT_1");
    }

    #[test]
    fn suffix_parsing_rejects_non_digits() {
        assert_eq!(parse_uint_after_prefix("LAW_", "LAW_12"), Some(12));
        assert_eq!(parse_uint_after_prefix("LAW_", "LAW_"), None);
        assert_eq!(parse_uint_after_prefix("LAW_", "LAW_1a"), None);
        assert_eq!(parse_uint_after_prefix("LAW_", "ORG_1"), None);
        assert_eq!(parse_uint_after_prefix("A_", "A_-3"), None);
    }

    #[test]
    fn land_numbers_parse_with_or_without_owner_segment() {
        assert_eq!(parse_land_num("LAND_7"), Some(7));
        assert_eq!(parse_land_num("LAND_A1_003"), Some(3));
        assert_eq!(parse_land_num("LAND_HOME"), None);
    }

    #[test]
    fn track_max_keeps_the_largest_suffix() {
        let mut counter = 4;
        track_max(&mut counter, "IT_", ["IT_2", "IT_9", "bogus", "IT_x"]);
        assert_eq!(counter, 9);
    }
}
