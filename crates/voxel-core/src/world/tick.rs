use contracts::{ActionRequest, ActionResult};
use serde_json::json;
use tracing::{debug, warn};

use super::World;
use crate::governance::claims::{maintenance_due, settle_maintenance};
use crate::governance::laws::{
    apply_law_template, count_votes, next_transition, vote_passed, LawError, LawStatus,
    LawTransition,
};
use crate::model::{deduct_items, has_items, ItemMap, Vec3i};

/// What one call to [`World::step`] produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Tick the step ran at.
    pub tick: u64,
    pub results: Vec<ActionResult>,
    /// State digest taken after the tick's systems ran.
    pub digest: String,
}

impl World {
    /// Runs one tick: maintenance, the actions in submission order, the law
    /// lifecycle and item expiry, then the digest. The clock advances last.
    pub fn step(&mut self, actions: &[ActionRequest]) -> StepOutcome {
        let now = self.tick;
        self.run_maintenance(now);
        let results = actions.iter().map(|req| self.apply(req)).collect();
        self.tick_laws(now);
        self.expire_items(now);
        self.stats.rotate(now);
        let digest = self.state_digest();
        self.tick = now + 1;
        StepOutcome {
            tick: now,
            results,
            digest,
        }
    }

    /// Steps with no actions until the clock reaches `target`. Returns the
    /// last digest, or `None` when no tick ran.
    pub fn run_to(&mut self, target: u64) -> Option<String> {
        let mut last = None;
        while self.tick < target {
            last = Some(self.step(&[]).digest);
        }
        last
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    pub(crate) fn run_maintenance(&mut self, now: u64) {
        let day = self.config.day_ticks;
        if day <= 0 || self.claims.is_empty() {
            return;
        }
        let day = day as u64;
        let cost: ItemMap = self.config.maintenance_cost.clone();
        let land_ids: Vec<String> = self.claims.keys().cloned().collect();
        for land_id in land_ids {
            let Some(land) = self.claims.get_mut(&land_id) else {
                continue;
            };
            if !maintenance_due(land, now, day) {
                continue;
            }
            let owner = land.owner.clone();
            let paid = self.pay_maintenance(&owner, &cost);
            let Some(land) = self.claims.get_mut(&land_id) else {
                continue;
            };
            let status = settle_maintenance(land, paid, day);
            let (stage, next_due, anchor) =
                (land.maintenance_stage, land.maintenance_due_tick, land.anchor);
            debug!(tick = now, %land_id, %owner, status = status.as_str(), stage, "maintenance settled");
            let fields = json!({
                "land_id": land_id,
                "status": status.as_str(),
                "stage": stage,
                "next_due_tick": next_due,
            });
            self.audit("WORLD", "MAINTENANCE", anchor, status.as_str(), fields.clone());
            if self.agents.contains_key(&owner) {
                self.notify_agent(&owner, "MAINTENANCE", fields);
            }
        }
    }

    // Org-owned land pays from the org's treasury for this world; otherwise
    // the owning agent pays from inventory.
    fn pay_maintenance(&mut self, owner: &str, cost: &ItemMap) -> bool {
        if owner.is_empty() {
            return false;
        }
        let world_id = self.config.treasury_world_id().to_string();
        if let Some(org) = self.orgs.get_mut(owner) {
            return org.try_spend(&world_id, cost);
        }
        match self.agents.get_mut(owner) {
            Some(agent) if has_items(&agent.inventory, cost) => {
                deduct_items(&mut agent.inventory, cost);
                true
            }
            _ => false,
        }
    }

    // -----------------------------------------------------------------------
    // Laws
    // -----------------------------------------------------------------------

    pub(crate) fn tick_laws(&mut self, now: u64) {
        let law_ids: Vec<String> = self.laws.keys().cloned().collect();
        for law_id in law_ids {
            let Some(law) = self.laws.get(&law_id) else {
                continue;
            };
            match next_transition(law.status, now, law.notice_ends_tick, law.vote_ends_tick) {
                Some(LawTransition::EnterVoting) => self.open_voting(&law_id),
                Some(LawTransition::CloseVote) => self.close_vote(&law_id),
                None => {}
            }
        }
    }

    fn open_voting(&mut self, law_id: &str) {
        let Some(law) = self.laws.get_mut(law_id) else {
            return;
        };
        law.status = LawStatus::Voting;
        let fields = json!({
            "kind": "VOTING",
            "law_id": law.law_id,
            "land_id": law.land_id,
            "template_id": law.template_id,
            "title": law.title,
            "status": LawStatus::Voting.as_str(),
        });
        debug!(tick = self.tick, law_id, "law entered voting");
        self.broadcast("LAW", fields);
    }

    fn close_vote(&mut self, law_id: &str) {
        let Some(law) = self.laws.get(law_id).cloned() else {
            return;
        };
        let (yes, no) = count_votes(law.votes.values());
        let anchor = self.claims.get(&law.land_id).map(|land| land.anchor);

        let outcome = if vote_passed(yes, no) {
            let applied = match self.claims.get_mut(&law.land_id) {
                Some(land) => apply_law_template(&law.template_id, &law.params, land),
                None => Err(LawError::LandNotFound),
            };
            applied.map_err(|err| Some(err.to_string()))
        } else {
            Err(None)
        };

        let status = if outcome.is_ok() {
            LawStatus::Active
        } else {
            LawStatus::Rejected
        };
        if let Some(stored) = self.laws.get_mut(law_id) {
            stored.status = status;
        }

        let base = json!({
            "law_id": law.law_id,
            "land_id": law.land_id,
            "template_id": law.template_id,
            "title": law.title,
        });
        let mut audit_fields = base.clone();
        let mut event_fields = base;
        event_fields["status"] = json!(status.as_str());
        audit_fields["yes"] = json!(yes);
        audit_fields["no"] = json!(no);

        let (action, reason) = match &outcome {
            Ok(()) => {
                audit_fields["params"] = json!(law.params);
                event_fields["kind"] = json!("ACTIVE");
                ("LAW_ACTIVE", "VOTE_PASSED")
            }
            Err(Some(message)) => {
                warn!(tick = self.tick, law_id, %message, "law activation failed");
                audit_fields["message"] = json!(message);
                event_fields["kind"] = json!("REJECTED");
                event_fields["message"] = json!(message);
                ("LAW_REJECTED", "ACTIVATE_FAILED")
            }
            Err(None) => {
                event_fields["kind"] = json!("REJECTED");
                event_fields["message"] = json!("vote failed");
                ("LAW_REJECTED", "VOTE_FAILED")
            }
        };
        debug!(tick = self.tick, law_id, yes, no, status = status.as_str(), "law vote closed");
        if let Some(anchor) = anchor {
            self.audit("WORLD", action, anchor, reason, audit_fields);
        }
        self.broadcast("LAW", event_fields);
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    fn expire_items(&mut self, now: u64) {
        self.items.retain(|_, item| item.is_valid() && !item.is_expired(now));
    }

    /// Items whose position lies within `radius` (Chebyshev, xz) of `center`.
    pub fn items_near(&self, center: Vec3i, radius: i32) -> Vec<&crate::model::ItemEntity> {
        let r = i64::from(radius.max(0));
        self.items
            .values()
            .filter(|it| {
                (i64::from(it.pos.x) - i64::from(center.x)).abs() <= r
                    && (i64::from(it.pos.z) - i64::from(center.z)).abs() <= r
            })
            .collect()
    }
}
