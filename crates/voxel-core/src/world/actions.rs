//! Action handlers. Each validates against the current state, mutates on
//! success and records its audit trail; refusals leave the world untouched.

use std::collections::BTreeMap;

use contracts::{ActionKind, ActionRequest, ActionResult, ErrorCode};
use serde_json::{json, Value};
use tracing::debug;

use super::World;
use crate::catalog::{self, CLAIM_TOTEM};
use crate::governance::claims::{
    self, apply_policy_flags, clamp_claim_radius, initial_maintenance_due, overlaps_any, upgrade_cost,
    validate_deed_input, validate_member_mutation_input, validate_set_permissions_input,
    validate_upgrade_input, validate_upgrade_radius, LandClaim, CLAIM_COST,
};
use crate::governance::laws::{
    build_law_timeline, normalize_law_params, normalize_vote_choice, resolve_law_title,
    validate_propose_input, validate_vote_input, Law, LawError, LawStatus, LawTemplate,
};
use crate::governance::orgs::{
    normalize_org_kind, validate_org_name, validate_org_transfer_input, Organization,
};
use crate::governance::{reject, validate_land_admin, Rejection};
use crate::model::{add_items, deduct_items, has_items, ItemMap, Vec3i};
use crate::rules::{default_claim_flags, default_claim_type_for_world, Params};

type Payload = BTreeMap<String, Value>;
type Handled = Result<Payload, Rejection>;

fn payload(value: Value) -> Payload {
    super::details(value)
}

fn claim_cost() -> ItemMap {
    CLAIM_COST
        .iter()
        .map(|(item, n)| (item.to_string(), *n))
        .collect()
}

impl World {
    /// Applies one request at the current tick and reports the outcome.
    pub fn apply(&mut self, request: &ActionRequest) -> ActionResult {
        let tick = self.tick;
        let outcome = if self.agents.contains_key(&request.actor) {
            self.dispatch(&request.actor, &request.kind)
        } else {
            reject(ErrorCode::InvalidTarget, "actor not found")
        };
        match outcome {
            Ok(fields) => {
                let mut result = ActionResult::ok(tick, request.ref_id.clone());
                result.payload = fields;
                result
            }
            Err(rejection) => {
                if rejection.code == ErrorCode::NoPermission {
                    self.stats.record_denied(tick);
                }
                debug!(
                    tick,
                    actor = %request.actor,
                    action = request.kind.name(),
                    code = rejection.code.as_str(),
                    message = %rejection.message,
                    "action rejected"
                );
                ActionResult::fail(tick, request.ref_id.clone(), rejection.code, rejection.message)
            }
        }
    }

    fn dispatch(&mut self, actor: &str, kind: &ActionKind) -> Handled {
        match kind {
            ActionKind::ClaimLand { anchor, radius } => {
                self.claim_land(actor, Vec3i::from_array(*anchor), *radius)
            }
            ActionKind::UpgradeClaim { land_id, radius } => self.upgrade_claim(actor, land_id, *radius),
            ActionKind::SetPermissions { land_id, policy } => {
                self.set_permissions(actor, land_id, policy.as_ref())
            }
            ActionKind::AddMember { land_id, member_id } => self.add_member(actor, land_id, member_id),
            ActionKind::RemoveMember { land_id, member_id } => {
                self.remove_member(actor, land_id, member_id)
            }
            ActionKind::DeedLand { land_id, new_owner } => self.deed_land(actor, land_id, new_owner),
            ActionKind::ProposeLaw {
                land_id,
                template_id,
                title,
                params,
            } => self.propose_law(actor, land_id, template_id, title, params.as_ref()),
            ActionKind::Vote { law_id, choice } => self.vote(actor, law_id, choice),
            ActionKind::CreateOrg { org_kind, org_name } => self.create_org(actor, org_kind, org_name),
            ActionKind::JoinOrg { org_id } => self.join_org(actor, org_id),
            ActionKind::OrgDeposit { org_id, item, count } => self.org_deposit(actor, org_id, item, *count),
            ActionKind::OrgWithdraw { org_id, item, count } => {
                self.org_withdraw(actor, org_id, item, *count)
            }
            ActionKind::LeaveOrg => self.leave_org(actor),
        }
    }

    fn actor_inventory_has(&self, actor: &str, cost: &ItemMap) -> bool {
        self.agents
            .get(actor)
            .is_some_and(|a| has_items(&a.inventory, cost))
    }

    fn admin_land(&self, actor: &str, land_id: &str) -> Result<(), Rejection> {
        let land = self.claims.get(land_id);
        validate_land_admin(
            land.is_some(),
            land.is_some_and(|l| self.is_land_admin(actor, l)),
        )
    }

    // -----------------------------------------------------------------------
    // Claims
    // -----------------------------------------------------------------------

    fn claim_land(&mut self, actor: &str, anchor: Vec3i, radius: i32) -> Handled {
        if !self.config.allow_claims {
            return reject(ErrorCode::NoPermission, "claims disabled in this world");
        }
        let radius = clamp_claim_radius(radius);
        if anchor.y != 0 {
            return reject(ErrorCode::InvalidTarget, "2D world requires y==0");
        }
        if !self.in_bounds(anchor) {
            return reject(ErrorCode::InvalidTarget, "out of bounds");
        }
        if !self.can_build_at(actor, anchor) {
            return reject(ErrorCode::NoPermission, "cannot claim here");
        }
        let cost = claim_cost();
        if !self.actor_inventory_has(actor, &cost) {
            return reject(ErrorCode::NoResource, "need BATTERY + CRYSTAL_SHARD");
        }
        if overlaps_any(anchor, radius, None, self.claims.values()) {
            return reject(ErrorCode::Conflict, "claim overlaps existing land");
        }
        let from = self.block_at(anchor);
        if from != catalog::AIR {
            return reject(ErrorCode::Blocked, "anchor occupied");
        }

        if let Some(agent) = self.agents.get_mut(actor) {
            deduct_items(&mut agent.inventory, &cost);
        }
        self.set_block(anchor, CLAIM_TOTEM);

        let land_id = self.ids.next_land();
        self.audit(
            actor,
            "SET_BLOCK",
            anchor,
            "CLAIM_LAND",
            json!({
                "from": catalog::block_name(from),
                "to": catalog::block_name(CLAIM_TOTEM),
                "land_id": land_id,
            }),
        );
        let claim_type = default_claim_type_for_world(&self.config.world_type);
        self.claims.insert(
            land_id.clone(),
            LandClaim {
                land_id: land_id.clone(),
                owner: actor.to_string(),
                claim_type,
                anchor,
                radius,
                flags: default_claim_flags(claim_type),
                maintenance_due_tick: initial_maintenance_due(self.tick, self.config.day_ticks),
                ..LandClaim::default()
            },
        );
        debug!(tick = self.tick, %land_id, owner = actor, radius, "land claimed");
        Ok(payload(json!({"land_id": land_id})))
    }

    fn upgrade_claim(&mut self, actor: &str, land_id: &str, radius: i32) -> Handled {
        validate_upgrade_input(land_id, radius)?;
        self.admin_land(actor, land_id)?;
        let Some(land) = self.claims.get(land_id) else {
            return reject(ErrorCode::InvalidTarget, "land not found");
        };
        if land.maintenance_stage >= 1 {
            return reject(ErrorCode::NoPermission, "land maintenance stage disallows expansion");
        }
        let (from, anchor) = (land.radius, land.anchor);
        validate_upgrade_radius(from, radius)?;
        if self.store.peek_block(anchor.x, anchor.y, anchor.z) != Some(CLAIM_TOTEM) {
            return reject(ErrorCode::InvalidTarget, "claim totem missing");
        }
        let cost = upgrade_cost(from, radius);
        if cost.is_empty() {
            return reject(ErrorCode::BadRequest, "no upgrade needed");
        }
        if !self.actor_inventory_has(actor, &cost) {
            return reject(ErrorCode::NoResource, "missing upgrade materials");
        }
        if overlaps_any(anchor, radius, Some(land_id), self.claims.values()) {
            return reject(ErrorCode::Conflict, "claim overlaps existing land");
        }
        if let Some(agent) = self.agents.get_mut(actor) {
            deduct_items(&mut agent.inventory, &cost);
        }
        if let Some(land) = self.claims.get_mut(land_id) {
            land.radius = radius;
        }
        self.audit(
            actor,
            "CLAIM_UPGRADE",
            anchor,
            "UPGRADE_CLAIM",
            json!({"land_id": land_id, "from": from, "to": radius, "cost": cost}),
        );
        Ok(payload(json!({"land_id": land_id, "radius": radius})))
    }

    fn set_permissions(
        &mut self,
        actor: &str,
        land_id: &str,
        policy: Option<&BTreeMap<String, bool>>,
    ) -> Handled {
        validate_set_permissions_input(land_id, policy)?;
        self.admin_land(actor, land_id)?;
        if let (Some(land), Some(policy)) = (self.claims.get_mut(land_id), policy) {
            land.flags = apply_policy_flags(land.flags, policy);
        }
        Ok(Payload::new())
    }

    fn add_member(&mut self, actor: &str, land_id: &str, member_id: &str) -> Handled {
        validate_member_mutation_input(land_id, member_id)?;
        self.admin_land(actor, land_id)?;
        if let Some(land) = self.claims.get_mut(land_id) {
            land.members.insert(member_id.trim().to_string());
        }
        Ok(Payload::new())
    }

    fn remove_member(&mut self, actor: &str, land_id: &str, member_id: &str) -> Handled {
        validate_member_mutation_input(land_id, member_id)?;
        self.admin_land(actor, land_id)?;
        if let Some(land) = self.claims.get_mut(land_id) {
            land.members.remove(member_id.trim());
        }
        Ok(Payload::new())
    }

    fn deed_land(&mut self, actor: &str, land_id: &str, new_owner: &str) -> Handled {
        validate_deed_input(land_id, new_owner)?;
        self.admin_land(actor, land_id)?;
        let new_owner = new_owner.trim();
        if !self.agents.contains_key(new_owner) && !self.orgs.contains_key(new_owner) {
            return reject(ErrorCode::InvalidTarget, "new owner not found");
        }
        if let Some(land) = self.claims.get_mut(land_id) {
            land.owner = new_owner.to_string();
        }
        Ok(Payload::new())
    }

    // -----------------------------------------------------------------------
    // Laws
    // -----------------------------------------------------------------------

    fn propose_law(
        &mut self,
        actor: &str,
        land_id: &str,
        template_id: &str,
        title: &str,
        params: Option<&Params>,
    ) -> Handled {
        validate_propose_input(self.config.allow_laws, land_id, template_id, params)?;
        let Some(land) = self.claims.get(land_id) else {
            return reject(ErrorCode::InvalidTarget, "land not found");
        };
        if !self.is_land_member(actor, land) {
            return reject(ErrorCode::NoPermission, "not eligible");
        }
        let anchor = land.anchor;
        let Some(template) = LawTemplate::parse(template_id) else {
            return reject(ErrorCode::InvalidTarget, "unknown law template");
        };
        let raw = params.cloned().unwrap_or_default();
        let canon = match normalize_law_params(template_id, &raw, catalog::item_exists) {
            Ok(canon) => canon,
            Err(LawError::UnsupportedTemplate) => {
                return reject(ErrorCode::InvalidTarget, "unsupported template")
            }
            Err(err) => return reject(ErrorCode::BadRequest, err.to_string()),
        };

        let title = resolve_law_title(title, template.title());
        let law_id = self.ids.next_law();
        let timeline = build_law_timeline(
            self.tick,
            self.config.law_notice_ticks,
            self.config.law_vote_ticks,
        );
        let law = Law {
            law_id: law_id.clone(),
            land_id: land_id.to_string(),
            template_id: template_id.to_string(),
            title: title.clone(),
            params: canon.clone(),
            proposed_by: actor.to_string(),
            proposed_tick: self.tick,
            notice_ends_tick: timeline.notice_ends,
            vote_ends_tick: timeline.vote_ends,
            status: LawStatus::Notice,
            votes: BTreeMap::new(),
        };
        self.laws.insert(law_id.clone(), law);

        self.broadcast(
            "LAW",
            json!({
                "kind": "PROPOSED",
                "law_id": law_id,
                "land_id": land_id,
                "template_id": template_id,
                "title": title,
                "status": LawStatus::Notice.as_str(),
                "notice_ends_tick": timeline.notice_ends,
                "vote_ends_tick": timeline.vote_ends,
            }),
        );
        self.audit(
            actor,
            "LAW_PROPOSE",
            anchor,
            "PROPOSE_LAW",
            json!({
                "law_id": law_id,
                "land_id": land_id,
                "template_id": template_id,
                "title": title,
                "notice_ends": timeline.notice_ends,
                "vote_ends": timeline.vote_ends,
                "params": canon,
                "proposed_by": actor,
                "proposed_tick": self.tick,
            }),
        );
        debug!(tick = self.tick, %law_id, land_id, template_id, "law proposed");
        Ok(payload(json!({"law_id": law_id})))
    }

    fn vote(&mut self, actor: &str, law_id: &str, choice: &str) -> Handled {
        validate_vote_input(self.config.allow_laws, law_id, choice)?;
        let Some(law) = self.laws.get(law_id) else {
            return reject(ErrorCode::InvalidTarget, "law not found");
        };
        if law.status != LawStatus::Voting {
            return reject(ErrorCode::Blocked, "law not in voting");
        }
        let Some(land) = self.claims.get(&law.land_id) else {
            return reject(ErrorCode::InvalidTarget, "land not found");
        };
        if !self.is_land_member(actor, land) {
            return reject(ErrorCode::NoPermission, "not eligible to vote");
        }
        let Some(choice) = normalize_vote_choice(choice) else {
            return reject(ErrorCode::BadRequest, "bad choice");
        };
        let (land_id, anchor) = (land.land_id.clone(), land.anchor);
        if let Some(law) = self.laws.get_mut(law_id) {
            law.votes.insert(actor.to_string(), choice.to_string());
        }
        self.audit(
            actor,
            "LAW_VOTE",
            anchor,
            "VOTE",
            json!({"law_id": law_id, "land_id": land_id, "choice": choice, "voter_id": actor}),
        );
        Ok(Payload::new())
    }

    // -----------------------------------------------------------------------
    // Organisations
    // -----------------------------------------------------------------------

    fn actor_pos(&self, actor: &str) -> Vec3i {
        self.agents.get(actor).map(|a| a.pos).unwrap_or_default()
    }

    fn actor_org(&self, actor: &str) -> &str {
        self.agents.get(actor).map(|a| a.org_id.as_str()).unwrap_or("")
    }

    fn create_org(&mut self, actor: &str, org_kind: &str, org_name: &str) -> Handled {
        let kind = normalize_org_kind(org_kind)?;
        let name = validate_org_name(org_name)?;
        if !self.actor_org(actor).is_empty() {
            return reject(ErrorCode::Conflict, "already in org");
        }
        let org_id = self.ids.next_org();
        self.orgs.insert(
            org_id.clone(),
            Organization::new(org_id.clone(), kind, name.clone(), actor, self.tick),
        );
        if let Some(agent) = self.agents.get_mut(actor) {
            agent.org_id = org_id.clone();
        }
        let pos = self.actor_pos(actor);
        self.audit(
            actor,
            "ORG_CREATE",
            pos,
            "CREATE_ORG",
            json!({"org_id": org_id, "org_kind": kind.as_str(), "org_name": name, "leader": actor}),
        );
        Ok(payload(json!({"org_id": org_id})))
    }

    fn join_org(&mut self, actor: &str, org_id: &str) -> Handled {
        let org_id = org_id.trim();
        if org_id.is_empty() {
            return reject(ErrorCode::BadRequest, "missing org_id");
        }
        let Some(org) = self.orgs.get_mut(org_id) else {
            return reject(ErrorCode::InvalidTarget, "org not found");
        };
        let in_org = self
            .agents
            .get(actor)
            .is_some_and(|a| !a.org_id.is_empty());
        if in_org {
            return reject(ErrorCode::Conflict, "already in org");
        }
        org.join(actor);
        let kind = org.kind;
        if let Some(agent) = self.agents.get_mut(actor) {
            agent.org_id = org_id.to_string();
        }
        let pos = self.actor_pos(actor);
        self.audit(
            actor,
            "ORG_JOIN",
            pos,
            "JOIN_ORG",
            json!({"org_id": org_id, "member": actor, "org_kind": kind.as_str()}),
        );
        Ok(Payload::new())
    }

    fn org_deposit(&mut self, actor: &str, org_id: &str, item: &str, count: i64) -> Handled {
        validate_org_transfer_input(org_id, item, count)?;
        let (org_id, item) = (org_id.trim(), item.trim());
        let Some(org) = self.orgs.get(org_id) else {
            return reject(ErrorCode::InvalidTarget, "org not found");
        };
        if !org.is_member(actor) {
            return reject(ErrorCode::NoPermission, "not org member");
        }
        let cost = ItemMap::from([(item.to_string(), count)]);
        if !self.actor_inventory_has(actor, &cost) {
            return reject(ErrorCode::NoResource, "missing items");
        }
        if let Some(agent) = self.agents.get_mut(actor) {
            deduct_items(&mut agent.inventory, &cost);
        }
        let world_id = self.config.treasury_world_id().to_string();
        if let Some(org) = self.orgs.get_mut(org_id) {
            org.deposit(&world_id, item, count);
        }
        let pos = self.actor_pos(actor);
        self.audit(
            actor,
            "ORG_DEPOSIT",
            pos,
            "ORG_DEPOSIT",
            json!({"org_id": org_id, "item": item, "count": count}),
        );
        Ok(Payload::new())
    }

    fn org_withdraw(&mut self, actor: &str, org_id: &str, item: &str, count: i64) -> Handled {
        validate_org_transfer_input(org_id, item, count)?;
        let (org_id, item) = (org_id.trim(), item.trim());
        let world_id = self.config.treasury_world_id().to_string();
        let Some(org) = self.orgs.get_mut(org_id) else {
            return reject(ErrorCode::InvalidTarget, "org not found");
        };
        if !org.is_admin(actor) {
            return reject(ErrorCode::NoPermission, "not org admin");
        }
        let cost = ItemMap::from([(item.to_string(), count)]);
        if !org.try_spend(&world_id, &cost) {
            return reject(ErrorCode::NoResource, "treasury lacks items");
        }
        if let Some(agent) = self.agents.get_mut(actor) {
            add_items(&mut agent.inventory, item, count);
        }
        let pos = self.actor_pos(actor);
        self.audit(
            actor,
            "ORG_WITHDRAW",
            pos,
            "ORG_WITHDRAW",
            json!({"org_id": org_id, "item": item, "count": count}),
        );
        Ok(Payload::new())
    }

    fn leave_org(&mut self, actor: &str) -> Handled {
        let org_id = self.actor_org(actor).to_string();
        if org_id.is_empty() {
            return reject(ErrorCode::Blocked, "not in org");
        }
        if let Some(agent) = self.agents.get_mut(actor) {
            agent.org_id.clear();
        }
        let emptied = self
            .orgs
            .get_mut(&org_id)
            .is_some_and(|org| org.leave(actor));
        if emptied {
            self.orgs.remove(&org_id);
            debug!(tick = self.tick, %org_id, "org dissolved");
        }
        Ok(Payload::new())
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    /// Operator override: sets a claim's maintenance stage and due tick
    /// without any payment. Returns `false` for unknown land.
    pub fn admin_set_maintenance(&mut self, land_id: &str, stage: u8, due_tick: u64) -> bool {
        match self.claims.get_mut(land_id) {
            Some(land) => {
                land.maintenance_stage = stage.min(claims::MAX_MAINTENANCE_STAGE);
                land.maintenance_due_tick = due_tick;
                true
            }
            None => false,
        }
    }

    /// Operator override: removes a claim and clears its totem if still present.
    pub fn admin_remove_claim(&mut self, land_id: &str) -> bool {
        let Some(land) = self.claims.remove(land_id) else {
            return false;
        };
        if self.store.peek_block(land.anchor.x, land.anchor.y, land.anchor.z) == Some(CLAIM_TOTEM) {
            self.set_block(land.anchor, catalog::AIR);
        }
        self.audit(
            "WORLD",
            "CLAIM_REMOVE",
            land.anchor,
            "ADMIN",
            json!({"land_id": land.land_id}),
        );
        true
    }
}
