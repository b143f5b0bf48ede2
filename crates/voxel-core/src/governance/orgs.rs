//! Organisations: guilds and cities with a leader, members and per-world treasuries.

use std::collections::BTreeMap;

use contracts::{ErrorCode, GLOBAL_WORLD_ID};
use serde::{Deserialize, Serialize};

use crate::governance::{reject, Rejection};
use crate::model::ItemMap;

pub const MAX_ORG_NAME_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrgKind {
    #[default]
    Guild,
    City,
}

impl OrgKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Guild => "GUILD",
            Self::City => "CITY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrgRole {
    Leader,
    Member,
}

impl OrgRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Leader => "LEADER",
            Self::Member => "MEMBER",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LEADER" => Some(Self::Leader),
            "MEMBER" => Some(Self::Member),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Organization {
    pub org_id: String,
    pub kind: OrgKind,
    pub name: String,
    pub created_tick: u64,
    pub meta_version: u64,
    pub members: BTreeMap<String, OrgRole>,
    /// World id to item counts; empty per-world maps are never stored.
    pub treasury_by_world: BTreeMap<String, ItemMap>,
}

/// Treasury key for a world; the empty id shares the global treasury.
pub fn treasury_key(world_id: &str) -> &str {
    if world_id.is_empty() {
        GLOBAL_WORLD_ID
    } else {
        world_id
    }
}

impl Organization {
    pub fn new(org_id: impl Into<String>, kind: OrgKind, name: impl Into<String>, leader: &str, now_tick: u64) -> Self {
        Self {
            org_id: org_id.into(),
            kind,
            name: name.into(),
            created_tick: now_tick,
            meta_version: 1,
            members: BTreeMap::from([(leader.to_string(), OrgRole::Leader)]),
            treasury_by_world: BTreeMap::new(),
        }
    }

    pub fn is_member(&self, agent_id: &str) -> bool {
        self.members.contains_key(agent_id)
    }

    pub fn is_admin(&self, agent_id: &str) -> bool {
        self.members.get(agent_id) == Some(&OrgRole::Leader)
    }

    pub fn treasury(&self, world_id: &str) -> Option<&ItemMap> {
        self.treasury_by_world.get(treasury_key(world_id))
    }

    pub fn treasury_count(&self, world_id: &str, item: &str) -> i64 {
        self.treasury(world_id)
            .and_then(|t| t.get(item))
            .copied()
            .unwrap_or(0)
    }

    pub fn deposit(&mut self, world_id: &str, item: &str, count: i64) {
        if item.is_empty() || count <= 0 {
            return;
        }
        *self
            .treasury_by_world
            .entry(treasury_key(world_id).to_string())
            .or_default()
            .entry(item.to_string())
            .or_insert(0) += count;
    }

    /// Removes `cost` from the world treasury if it is fully covered.
    pub fn try_spend(&mut self, world_id: &str, cost: &ItemMap) -> bool {
        let key = treasury_key(world_id);
        let Some(treasury) = self.treasury_by_world.get_mut(key) else {
            return cost.values().all(|n| *n <= 0);
        };
        if !crate::model::has_items(treasury, cost) {
            return false;
        }
        crate::model::deduct_items(treasury, cost);
        if treasury.is_empty() {
            self.treasury_by_world.remove(key);
        }
        true
    }

    pub fn join(&mut self, agent_id: &str) {
        self.members.insert(agent_id.to_string(), OrgRole::Member);
        self.meta_version += 1;
    }

    /// Removes a member and hands leadership on when needed.
    /// Returns `true` when the org is left empty and should be deleted.
    pub fn leave(&mut self, agent_id: &str) -> bool {
        let role = self.members.remove(agent_id);
        self.meta_version += 1;
        if self.members.is_empty() {
            return true;
        }
        if role == Some(OrgRole::Leader) {
            if let Some(next) = select_next_leader(self.members.keys().map(String::as_str)) {
                let next = next.to_string();
                self.members.insert(next, OrgRole::Leader);
                self.meta_version += 1;
            }
        }
        false
    }
}

pub fn normalize_org_kind(raw: &str) -> Result<OrgKind, Rejection> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "GUILD" => Ok(OrgKind::Guild),
        "CITY" => Ok(OrgKind::City),
        _ => reject(ErrorCode::BadRequest, "bad org_kind"),
    }
}

/// Returns the trimmed name.
pub fn validate_org_name(raw: &str) -> Result<String, Rejection> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_ORG_NAME_CHARS {
        return reject(ErrorCode::BadRequest, "bad org_name");
    }
    Ok(name.to_string())
}

pub fn validate_org_transfer_input(org_id: &str, item: &str, count: i64) -> Result<(), Rejection> {
    if org_id.trim().is_empty() || item.trim().is_empty() || count <= 0 {
        return reject(ErrorCode::BadRequest, "missing org_id/item_id/count");
    }
    Ok(())
}

/// Lexicographically smallest candidate.
pub fn select_next_leader<'a>(candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    candidates.into_iter().filter(|id| !id.is_empty()).min()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org_with(members: &[(&str, OrgRole)]) -> Organization {
        Organization {
            org_id: "ORG_1".to_string(),
            meta_version: 1,
            members: members
                .iter()
                .map(|(id, role)| (id.to_string(), *role))
                .collect(),
            ..Organization::default()
        }
    }

    #[test]
    fn kinds_and_names_normalise() {
        assert_eq!(normalize_org_kind(" guild "), Ok(OrgKind::Guild));
        assert_eq!(normalize_org_kind("City"), Ok(OrgKind::City));
        assert!(normalize_org_kind("CLAN").is_err());
        assert_eq!(validate_org_name("  Miners  "), Ok("Miners".to_string()));
        assert!(validate_org_name("   ").is_err());
        assert!(validate_org_name(&"x".repeat(41)).is_err());
        assert!(validate_org_name(&"x".repeat(40)).is_ok());
    }

    #[test]
    fn next_leader_is_lexicographic() {
        assert_eq!(select_next_leader(["B2", "A9", "A1"]), Some("A1"));
        assert_eq!(select_next_leader(Vec::<&str>::new()), None);
    }

    #[test]
    fn leader_leaving_promotes_smallest_member() {
        let mut org = org_with(&[
            ("A1", OrgRole::Leader),
            ("A3", OrgRole::Member),
            ("A2", OrgRole::Member),
        ]);
        assert!(!org.leave("A1"));
        assert_eq!(org.members.get("A2"), Some(&OrgRole::Leader));
        assert_eq!(org.members.get("A3"), Some(&OrgRole::Member));
        assert_eq!(org.meta_version, 3);
    }

    #[test]
    fn last_member_leaving_empties_org() {
        let mut org = org_with(&[("A1", OrgRole::Leader)]);
        assert!(org.leave("A1"));
    }

    #[test]
    fn treasury_is_per_world_and_prunes_empty_maps() {
        let mut org = org_with(&[("A1", OrgRole::Leader)]);
        org.deposit("", "COAL", 2);
        org.deposit("OVERWORLD", "COAL", 1);
        assert_eq!(org.treasury_count("GLOBAL", "COAL"), 2);
        assert_eq!(org.treasury_count("OVERWORLD", "COAL"), 1);

        let cost = ItemMap::from([("COAL".to_string(), 1)]);
        assert!(org.try_spend("OVERWORLD", &cost));
        assert!(org.treasury("OVERWORLD").is_none());
        assert!(!org.try_spend("OVERWORLD", &cost));
        assert!(org.try_spend("", &cost));
        assert_eq!(org.treasury_count("", "COAL"), 1);
    }

    #[test]
    fn admin_is_leader_only() {
        let org = org_with(&[("A1", OrgRole::Leader), ("A2", OrgRole::Member)]);
        assert!(org.is_admin("A1"));
        assert!(!org.is_admin("A2"));
        assert!(org.is_member("A2"));
        assert!(!org.is_member("A9"));
    }
}
