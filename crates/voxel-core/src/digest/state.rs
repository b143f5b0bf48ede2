//! Whole-world state digest.

use std::collections::BTreeMap;

use crate::digest::DigestWriter;
use crate::governance::{LandClaim, Law, Organization};
use crate::model::{
    Agent, Board, Container, Contract, ConveyorMeta, Environment, ItemEntity, Sign, Structure,
    Trade, Vec3i,
};
use crate::terrain::ChunkKey;

/// Borrowed view of everything the digest covers. `chunks` must already be
/// sorted by key with fresh per-chunk digests.
#[derive(Debug, Clone, Copy)]
pub struct StateInput<'a> {
    pub now_tick: u64,
    pub seed: i64,
    pub env: &'a Environment,
    pub chunks: &'a [(ChunkKey, [u8; 32])],
    pub claims: &'a BTreeMap<String, LandClaim>,
    pub laws: &'a BTreeMap<String, Law>,
    pub orgs: &'a BTreeMap<String, Organization>,
    pub containers: &'a BTreeMap<Vec3i, Container>,
    pub items: &'a BTreeMap<String, ItemEntity>,
    pub signs: &'a BTreeMap<Vec3i, Sign>,
    pub conveyors: &'a BTreeMap<Vec3i, ConveyorMeta>,
    pub switches: &'a BTreeMap<Vec3i, bool>,
    pub contracts: &'a BTreeMap<String, Contract>,
    pub trades: &'a BTreeMap<String, Trade>,
    pub boards: &'a BTreeMap<String, Board>,
    pub structures: &'a BTreeMap<String, Structure>,
    pub agents: &'a BTreeMap<String, Agent>,
}

/// Lower-case hex SHA-256 over every section in a fixed order.
pub fn state_digest(input: &StateInput<'_>) -> String {
    let mut w = DigestWriter::new();
    write_header(&mut w, input);
    write_chunks(&mut w, input.chunks);
    write_claims(&mut w, input.claims);
    write_laws(&mut w, input.laws);
    write_orgs(&mut w, input.orgs);
    write_containers(&mut w, input.containers);
    write_items(&mut w, input.items);
    write_signs(&mut w, input.signs);
    write_conveyors(&mut w, input.conveyors);
    write_switches(&mut w, input.switches);
    write_contracts(&mut w, input.contracts);
    write_trades(&mut w, input.trades);
    write_boards(&mut w, input.boards);
    write_structures(&mut w, input.structures);
    write_agents(&mut w, input.agents);
    w.finish_hex()
}

fn write_header(w: &mut DigestWriter, input: &StateInput<'_>) {
    let env = input.env;
    w.write_u64(input.now_tick);
    w.write_i64(input.seed);
    w.write_str(&env.weather);
    w.write_u64(env.weather_until_tick);
    w.write_str(&env.active_event_id);
    w.write_u64(env.active_event_start);
    w.write_u64(env.active_event_ends);
    w.write_pos(env.active_event_center);
    w.write_i64(env.active_event_radius);
}

fn write_chunks(w: &mut DigestWriter, chunks: &[(ChunkKey, [u8; 32])]) {
    for (key, digest) in chunks {
        w.write_i64(i64::from(key.cx));
        w.write_i64(i64::from(key.cz));
        w.write_bytes(digest);
    }
}

fn write_claims(w: &mut DigestWriter, claims: &BTreeMap<String, LandClaim>) {
    for (id, c) in claims {
        w.write_str(id);
        w.write_str(&c.owner);
        w.write_pos(c.anchor);
        w.write_i64(i64::from(c.radius));
        w.write_bool(c.flags.allow_build);
        w.write_bool(c.flags.allow_break);
        w.write_bool(c.flags.allow_damage);
        w.write_bool(c.flags.allow_trade);
        w.write_u64(c.members.len() as u64);
        for member in &c.members {
            w.write_str(member);
        }
        w.write_f64(c.market_tax);
        w.write_bool(c.curfew.enabled);
        w.write_f64(c.curfew.start);
        w.write_f64(c.curfew.end);
        w.write_bool(c.fine_break.enabled);
        w.write_str(&c.fine_break.item);
        w.write_i64(c.fine_break.per_block);
        w.write_bool(c.access_pass.enabled);
        w.write_str(&c.access_pass.item);
        w.write_i64(c.access_pass.cost);
        w.write_u64(c.maintenance_due_tick);
        w.write_u64(u64::from(c.maintenance_stage));
    }
}

fn write_laws(w: &mut DigestWriter, laws: &BTreeMap<String, Law>) {
    for (id, law) in laws {
        w.write_str(id);
        w.write_str(&law.land_id);
        w.write_str(&law.template_id);
        w.write_str(&law.title);
        w.write_str(&law.proposed_by);
        w.write_str(law.status.as_str());
        w.write_u64(law.proposed_tick);
        w.write_u64(law.notice_ends_tick);
        w.write_u64(law.vote_ends_tick);
        for (key, value) in &law.params {
            w.write_str(key);
            w.write_str(value);
        }
        for (voter, choice) in &law.votes {
            w.write_str(voter);
            w.write_str(choice);
        }
    }
}

fn write_orgs(w: &mut DigestWriter, orgs: &BTreeMap<String, Organization>) {
    for (id, org) in orgs {
        w.write_str(id);
        w.write_str(org.kind.as_str());
        w.write_str(&org.name);
        w.write_u64(org.created_tick);
        for (world_id, treasury) in &org.treasury_by_world {
            w.write_str(world_id);
            w.write_sorted_non_zero_map(treasury);
        }
        w.write_u64(org.members.len() as u64);
        for (member, role) in &org.members {
            w.write_str(member);
            w.write_str(role.as_str());
        }
        w.write_u64(org.meta_version);
    }
}

fn write_containers(w: &mut DigestWriter, containers: &BTreeMap<Vec3i, Container>) {
    for c in containers.values() {
        w.write_str(&c.kind);
        w.write_pos(c.pos);
        w.write_sorted_non_zero_map(&c.inventory);
        w.write_sorted_non_zero_map(&c.reserved);
        for (agent, owed) in &c.owed {
            w.write_str(agent);
            w.write_sorted_non_zero_map(owed);
        }
    }
}

fn write_items(w: &mut DigestWriter, items: &BTreeMap<String, ItemEntity>) {
    let live: Vec<(&String, &ItemEntity)> = items.iter().filter(|(_, e)| e.is_valid()).collect();
    w.write_u64(live.len() as u64);
    for (id, e) in live {
        w.write_str(id);
        w.write_pos(e.pos);
        w.write_str(&e.item);
        w.write_i64(e.count);
        w.write_u64(e.created_tick);
        w.write_u64(e.expires_tick);
    }
}

fn write_signs(w: &mut DigestWriter, signs: &BTreeMap<Vec3i, Sign>) {
    w.write_u64(signs.len() as u64);
    for (pos, sign) in signs {
        w.write_pos(*pos);
        w.write_str(&sign.text);
        w.write_u64(sign.updated_tick);
        w.write_str(&sign.updated_by);
    }
}

fn write_conveyors(w: &mut DigestWriter, conveyors: &BTreeMap<Vec3i, ConveyorMeta>) {
    w.write_u64(conveyors.len() as u64);
    for (pos, meta) in conveyors {
        w.write_pos(*pos);
        w.write_i64(i64::from(meta.dx));
        w.write_i64(i64::from(meta.dz));
    }
}

fn write_switches(w: &mut DigestWriter, switches: &BTreeMap<Vec3i, bool>) {
    w.write_u64(switches.len() as u64);
    for (pos, on) in switches {
        w.write_pos(*pos);
        w.write_bool(*on);
    }
}

fn write_contracts(w: &mut DigestWriter, contracts: &BTreeMap<String, Contract>) {
    for (id, c) in contracts {
        w.write_str(id);
        w.write_str(&c.kind);
        w.write_str(&c.state);
        w.write_str(&c.poster);
        w.write_str(&c.acceptor);
        w.write_u64(c.created_tick);
        w.write_u64(c.deadline_tick);
        w.write_pos(c.terminal_pos);
        w.write_sorted_non_zero_map(&c.requirements);
        w.write_sorted_non_zero_map(&c.reward);
        w.write_sorted_non_zero_map(&c.deposit);
        w.write_str(&c.blueprint_id);
        w.write_pos(c.anchor);
        w.write_i64(c.rotation);
    }
}

fn write_trades(w: &mut DigestWriter, trades: &BTreeMap<String, Trade>) {
    for (id, t) in trades {
        w.write_str(id);
        w.write_str(&t.from);
        w.write_str(&t.to);
        w.write_sorted_non_zero_map(&t.offer);
        w.write_sorted_non_zero_map(&t.request);
    }
}

fn write_boards(w: &mut DigestWriter, boards: &BTreeMap<String, Board>) {
    for (id, board) in boards {
        w.write_str(id);
        for post in &board.posts {
            w.write_str(&post.post_id);
            w.write_str(&post.author);
            w.write_str(&post.title);
            w.write_str(&post.body);
            w.write_u64(post.tick);
        }
    }
}

fn write_structures(w: &mut DigestWriter, structures: &BTreeMap<String, Structure>) {
    w.write_u64(structures.len() as u64);
    for s in structures.values() {
        w.write_str(&s.structure_id);
        w.write_str(&s.blueprint_id);
        w.write_str(&s.builder_id);
        w.write_pos(s.anchor);
        w.write_i64(s.rotation);
        w.write_pos(s.min);
        w.write_pos(s.max);
        w.write_u64(s.completed_tick);
        w.write_u64(s.award_due_tick);
        w.write_bool(s.awarded);
        w.write_i64(s.last_influence_day);
        w.write_u64(s.used_by.len() as u64);
        for (agent, tick) in &s.used_by {
            w.write_str(agent);
            w.write_u64(*tick);
        }
    }
}

fn write_agents(w: &mut DigestWriter, agents: &BTreeMap<String, Agent>) {
    for a in agents.values() {
        w.write_str(&a.id);
        w.write_str(&a.name);
        w.write_str(&a.org_id);
        w.write_pos(a.pos);
        w.write_i64(a.yaw);
        for stat in [
            a.hp,
            a.hunger,
            a.stamina_milli,
            a.rep_trade,
            a.rep_build,
            a.rep_social,
            a.rep_law,
            a.fun.novelty,
            a.fun.creation,
            a.fun.social,
            a.fun.influence,
            a.fun.narrative,
            a.fun.risk_rescue,
        ] {
            w.write_i64(stat);
        }

        for seen in [&a.seen_biomes, &a.seen_recipes, &a.seen_events] {
            w.write_u64(seen.len() as u64);
            for entry in seen {
                w.write_str(entry);
            }
        }
        w.write_u64(a.fun_decay.len() as u64);
        for (key, window) in &a.fun_decay {
            w.write_str(key);
            w.write_u64(window.start_tick);
            w.write_i64(window.count);
        }
        w.write_str(&a.equipment.main_hand);
        for slot in &a.equipment.armor {
            w.write_str(slot);
        }

        w.write_bool(a.move_task.is_some());
        if let Some(mt) = &a.move_task {
            w.write_str(&mt.task_id);
            w.write_str(&mt.kind);
            w.write_pos(mt.target);
            w.write_f64(mt.tolerance);
            w.write_str(&mt.target_id);
            w.write_f64(mt.distance);
            w.write_pos(mt.start_pos);
            w.write_u64(mt.started_tick);
        }
        w.write_bool(a.work_task.is_some());
        if let Some(wt) = &a.work_task {
            w.write_str(&wt.task_id);
            w.write_str(&wt.kind);
            w.write_pos(wt.block_pos);
            w.write_str(&wt.recipe_id);
            w.write_str(&wt.item_id);
            w.write_i64(wt.count);
            w.write_str(&wt.blueprint_id);
            w.write_pos(wt.anchor);
            w.write_i64(wt.rotation);
            w.write_i64(wt.build_index);
            w.write_str(&wt.target_id);
            w.write_str(&wt.src_container);
            w.write_str(&wt.dst_container);
            w.write_u64(wt.started_tick);
            w.write_i64(wt.work_ticks);
        }

        for (item, count) in a.inventory_list() {
            w.write_str(item);
            w.write_i64(count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemMap, MovementTask};

    #[derive(Default)]
    struct Fixture {
        env: Environment,
        chunks: Vec<(ChunkKey, [u8; 32])>,
        claims: BTreeMap<String, LandClaim>,
        laws: BTreeMap<String, Law>,
        orgs: BTreeMap<String, Organization>,
        containers: BTreeMap<Vec3i, Container>,
        items: BTreeMap<String, ItemEntity>,
        signs: BTreeMap<Vec3i, Sign>,
        conveyors: BTreeMap<Vec3i, ConveyorMeta>,
        switches: BTreeMap<Vec3i, bool>,
        contracts: BTreeMap<String, Contract>,
        trades: BTreeMap<String, Trade>,
        boards: BTreeMap<String, Board>,
        structures: BTreeMap<String, Structure>,
        agents: BTreeMap<String, Agent>,
    }

    impl Fixture {
        fn digest(&self, now_tick: u64) -> String {
            state_digest(&StateInput {
                now_tick,
                seed: 42,
                env: &self.env,
                chunks: &self.chunks,
                claims: &self.claims,
                laws: &self.laws,
                orgs: &self.orgs,
                containers: &self.containers,
                items: &self.items,
                signs: &self.signs,
                conveyors: &self.conveyors,
                switches: &self.switches,
                contracts: &self.contracts,
                trades: &self.trades,
                boards: &self.boards,
                structures: &self.structures,
                agents: &self.agents,
            })
        }
    }

    #[test]
    fn empty_state_digest_is_header_plus_fixed_counts() {
        let f = Fixture::default();
        let mut w = DigestWriter::new();
        w.write_u64(7);
        w.write_i64(42);
        w.write_u64(0);
        w.write_u64(0);
        w.write_u64(0);
        w.write_pos(Vec3i::default());
        w.write_i64(0);
        // items, signs, conveyors, switches, structures
        for _ in 0..5 {
            w.write_u64(0);
        }
        assert_eq!(f.digest(7), w.finish_hex());
    }

    #[test]
    fn digest_is_lower_case_hex() {
        let d = Fixture::default().digest(0);
        assert_eq!(d.len(), 64);
        assert!(d.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
    }

    #[test]
    fn every_section_feeds_the_hash() {
        let base = Fixture::default().digest(1);

        let mut f = Fixture::default();
        f.claims.insert(
            "LAND_1".to_string(),
            LandClaim {
                land_id: "LAND_1".to_string(),
                radius: 32,
                ..LandClaim::default()
            },
        );
        assert_ne!(f.digest(1), base);

        let mut f = Fixture::default();
        f.switches.insert(Vec3i::new(1, 0, 1), false);
        assert_ne!(f.digest(1), base);

        let mut f = Fixture::default();
        let mut agent = Agent::new("A_1", "Ada", Vec3i::default());
        agent.move_task = Some(MovementTask::default());
        f.agents.insert(agent.id.clone(), agent);
        assert_ne!(f.digest(1), base);

        assert_ne!(Fixture::default().digest(2), base);
    }

    #[test]
    fn invalid_items_and_zero_counts_are_ignored() {
        let base = Fixture::default().digest(1);

        let mut f = Fixture::default();
        f.items.insert(
            "IT_1".to_string(),
            ItemEntity {
                entity_id: "IT_1".to_string(),
                item: "COAL".to_string(),
                count: 0,
                ..ItemEntity::default()
            },
        );
        let mut container = Container::new("CHEST", Vec3i::new(2, 0, 2));
        container.inventory = ItemMap::from([("COAL".to_string(), 0)]);
        assert_eq!(f.digest(1), base);

        f.containers.insert(container.pos, container);
        assert_ne!(f.digest(1), base);
    }

    #[test]
    fn chunk_order_is_load_bearing() {
        let mut a = Fixture::default();
        a.chunks = vec![(ChunkKey::new(0, 0), [1; 32]), (ChunkKey::new(0, 1), [2; 32])];
        let mut b = Fixture::default();
        b.chunks = vec![(ChunkKey::new(0, 1), [2; 32]), (ChunkKey::new(0, 0), [1; 32])];
        assert_ne!(a.digest(0), b.digest(0));
    }
}
