//! Parameterised laws and their legislative lifecycle.
//!
//! A law is proposed against a land claim, sits in `NOTICE` for the notice
//! period, opens for `VOTING`, and closes as `ACTIVE` (strict yes majority and a
//! successful template application) or `REJECTED`.

use std::collections::BTreeMap;

use contracts::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::governance::claims::LandClaim;
use crate::governance::{reject, Rejection};
use crate::rules::{float_to_canon_string, param_float, param_int, param_string, ParamError, Params};

pub const MAX_MARKET_TAX: f64 = 0.25;
pub const MAX_FINE_PER_BLOCK: i64 = 100;
pub const MAX_TICKET_COST: i64 = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LawStatus {
    #[default]
    Notice,
    Voting,
    Active,
    Rejected,
}

impl LawStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Notice => "NOTICE",
            Self::Voting => "VOTING",
            Self::Active => "ACTIVE",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "NOTICE" => Some(Self::Notice),
            "VOTING" => Some(Self::Voting),
            "ACTIVE" => Some(Self::Active),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Active | Self::Rejected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LawTemplate {
    MarketTax,
    CurfewNoBuild,
    FineBreakPerBlock,
    AccessPassCore,
}

impl LawTemplate {
    pub const ALL: [Self; 4] = [
        Self::MarketTax,
        Self::CurfewNoBuild,
        Self::FineBreakPerBlock,
        Self::AccessPassCore,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::MarketTax => "MARKET_TAX",
            Self::CurfewNoBuild => "CURFEW_NO_BUILD",
            Self::FineBreakPerBlock => "FINE_BREAK_PER_BLOCK",
            Self::AccessPassCore => "ACCESS_PASS_CORE",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::MarketTax => "Market Tax",
            Self::CurfewNoBuild => "Curfew: No Building",
            Self::FineBreakPerBlock => "Fine Per Broken Block",
            Self::AccessPassCore => "Core Access Pass",
        }
    }

    pub fn parse(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }
}

/// Title of a known template id.
pub fn template_title(template_id: &str) -> Option<&'static str> {
    LawTemplate::parse(template_id).map(LawTemplate::title)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LawError {
    #[error("unsupported template")]
    UnsupportedTemplate,
    #[error(transparent)]
    Param(#[from] ParamError),
    #[error("unknown {0}")]
    UnknownItem(&'static str),
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("bad {0}")]
    Malformed(&'static str),
    #[error("land not found")]
    LandNotFound,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Law {
    pub law_id: String,
    pub land_id: String,
    pub template_id: String,
    pub title: String,
    /// Canonical string form.
    pub params: BTreeMap<String, String>,
    pub proposed_by: String,
    pub proposed_tick: u64,
    pub notice_ends_tick: u64,
    pub vote_ends_tick: u64,
    pub status: LawStatus,
    /// Voter id to normalised choice.
    pub votes: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

pub const VOTE_YES: &str = "YES";
pub const VOTE_NO: &str = "NO";
pub const VOTE_ABSTAIN: &str = "ABSTAIN";

/// Case-insensitive; returns `None` for anything unrecognised.
pub fn normalize_vote_choice(choice: &str) -> Option<&'static str> {
    match choice.trim().to_ascii_uppercase().as_str() {
        "YES" | "Y" | "1" | "TRUE" => Some(VOTE_YES),
        "NO" | "N" | "0" | "FALSE" => Some(VOTE_NO),
        "ABSTAIN" => Some(VOTE_ABSTAIN),
        _ => None,
    }
}

pub fn count_votes<'a>(votes: impl IntoIterator<Item = &'a String>) -> (u64, u64) {
    votes
        .into_iter()
        .fold((0, 0), |(yes, no), v| match normalize_vote_choice(v) {
            Some(VOTE_YES) => (yes + 1, no),
            Some(VOTE_NO) => (yes, no + 1),
            _ => (yes, no),
        })
}

/// Strict majority; ties reject.
pub fn vote_passed(yes: u64, no: u64) -> bool {
    yes > no
}

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

pub fn validate_propose_input(
    allow_laws: bool,
    land_id: &str,
    template_id: &str,
    params: Option<&Params>,
) -> Result<(), Rejection> {
    if !allow_laws {
        return reject(ErrorCode::NoPermission, "laws disabled in this world");
    }
    if land_id.trim().is_empty() || template_id.trim().is_empty() {
        return reject(ErrorCode::BadRequest, "missing land_id/template_id");
    }
    if params.is_none() {
        return reject(ErrorCode::BadRequest, "missing params");
    }
    Ok(())
}

pub fn validate_vote_input(allow_laws: bool, law_id: &str, choice: &str) -> Result<(), Rejection> {
    if !allow_laws {
        return reject(ErrorCode::NoPermission, "laws disabled in this world");
    }
    if law_id.trim().is_empty() || choice.trim().is_empty() {
        return reject(ErrorCode::BadRequest, "missing law_id/choice");
    }
    Ok(())
}

pub fn resolve_law_title(provided: &str, fallback: &str) -> String {
    let title = provided.trim();
    if title.is_empty() {
        fallback.to_string()
    } else {
        title.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeline {
    pub notice_ends: u64,
    pub vote_ends: u64,
}

pub fn build_law_timeline(now_tick: u64, notice_ticks: i64, vote_ticks: i64) -> Timeline {
    let notice_ends = now_tick + notice_ticks.max(0) as u64;
    Timeline {
        notice_ends,
        vote_ends: notice_ends + vote_ticks.max(0) as u64,
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Validates raw request params and renders them in canonical string form.
pub fn normalize_law_params(
    template_id: &str,
    params: &Params,
    item_exists: impl Fn(&str) -> bool,
) -> Result<BTreeMap<String, String>, LawError> {
    let template = LawTemplate::parse(template_id).ok_or(LawError::UnsupportedTemplate)?;
    let canon = match template {
        LawTemplate::MarketTax => {
            let tax = param_float(params, "market_tax")?.clamp(0.0, MAX_MARKET_TAX);
            vec![("market_tax", float_to_canon_string(tax))]
        }
        LawTemplate::CurfewNoBuild => {
            let start = param_float(params, "start_time")?.clamp(0.0, 1.0);
            let end = param_float(params, "end_time")?.clamp(0.0, 1.0);
            vec![
                ("start_time", float_to_canon_string(start)),
                ("end_time", float_to_canon_string(end)),
            ]
        }
        LawTemplate::FineBreakPerBlock => {
            let item = param_string(params, "fine_item")?;
            if !item_exists(&item) {
                return Err(LawError::UnknownItem("fine_item"));
            }
            let n = param_int(params, "fine_per_block")?.clamp(0, MAX_FINE_PER_BLOCK);
            vec![("fine_item", item), ("fine_per_block", n.to_string())]
        }
        LawTemplate::AccessPassCore => {
            let item = param_string(params, "ticket_item")?;
            if !item_exists(&item) {
                return Err(LawError::UnknownItem("ticket_item"));
            }
            let n = param_int(params, "ticket_cost")?.clamp(0, MAX_TICKET_COST);
            vec![("ticket_item", item), ("ticket_cost", n.to_string())]
        }
    };
    Ok(canon
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect())
}

fn canon_float(params: &BTreeMap<String, String>, key: &'static str) -> Result<Option<f64>, LawError> {
    match params.get(key).map(String::as_str) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| LawError::Malformed(key)),
    }
}

fn canon_count<'a>(params: &'a BTreeMap<String, String>, key: &'static str) -> Option<&'a str> {
    params
        .get(key)
        .map(|raw| raw.trim())
        .filter(|raw| !raw.is_empty())
}

/// Applies an activated law's effect to its land. On error the land is left untouched.
pub fn apply_law_template(
    template_id: &str,
    params: &BTreeMap<String, String>,
    land: &mut LandClaim,
) -> Result<(), LawError> {
    let template = LawTemplate::parse(template_id).ok_or(LawError::UnsupportedTemplate)?;
    match template {
        LawTemplate::MarketTax => {
            let tax = canon_float(params, "market_tax")?.ok_or(LawError::Missing("market_tax"))?;
            land.market_tax = tax.clamp(0.0, MAX_MARKET_TAX);
        }
        LawTemplate::CurfewNoBuild => {
            let (Some(_), Some(_)) = (canon_count(params, "start_time"), canon_count(params, "end_time")) else {
                return Err(LawError::Missing("start_time/end_time"));
            };
            let start = canon_float(params, "start_time")?
                .ok_or(LawError::Missing("start_time/end_time"))?
                .clamp(0.0, 1.0);
            let end = canon_float(params, "end_time")?
                .ok_or(LawError::Missing("start_time/end_time"))?
                .clamp(0.0, 1.0);
            land.curfew.enabled = start != end;
            if land.curfew.enabled {
                land.curfew.start = start;
                land.curfew.end = end;
            } else {
                land.curfew.start = 0.0;
                land.curfew.end = 0.0;
            }
        }
        LawTemplate::FineBreakPerBlock => {
            let item = params.get("fine_item").map(|s| s.trim()).unwrap_or("");
            let Some(raw) = canon_count(params, "fine_per_block").filter(|_| !item.is_empty()) else {
                return Err(LawError::Missing("fine_item/fine_per_block"));
            };
            let n = raw
                .parse::<i64>()
                .map_err(|_| LawError::Malformed("fine_per_block"))?
                .clamp(0, MAX_FINE_PER_BLOCK);
            land.fine_break.enabled = n != 0;
            land.fine_break.item = if n == 0 { String::new() } else { item.to_string() };
            land.fine_break.per_block = n;
        }
        LawTemplate::AccessPassCore => {
            let item = params.get("ticket_item").map(|s| s.trim()).unwrap_or("");
            let Some(raw) = canon_count(params, "ticket_cost").filter(|_| !item.is_empty()) else {
                return Err(LawError::Missing("ticket_item/ticket_cost"));
            };
            let n = raw
                .parse::<i64>()
                .map_err(|_| LawError::Malformed("ticket_cost"))?
                .clamp(0, MAX_TICKET_COST);
            land.access_pass.enabled = n != 0;
            land.access_pass.item = if n == 0 { String::new() } else { item.to_string() };
            land.access_pass.cost = n;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LawTransition {
    EnterVoting,
    CloseVote,
}

pub fn next_transition(
    status: LawStatus,
    now_tick: u64,
    notice_ends_tick: u64,
    vote_ends_tick: u64,
) -> Option<LawTransition> {
    match status {
        LawStatus::Notice if now_tick >= notice_ends_tick => Some(LawTransition::EnterVoting),
        LawStatus::Voting if now_tick >= vote_ends_tick => Some(LawTransition::CloseVote),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::item_exists;
    use proptest::prelude::*;
    use serde_json::json;

    fn params(value: serde_json::Value) -> Params {
        serde_json::from_value(value).expect("params object")
    }

    fn canon(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn vote_choices_normalise_case_insensitively() {
        assert_eq!(normalize_vote_choice(" yes "), Some("YES"));
        assert_eq!(normalize_vote_choice("n"), Some("NO"));
        assert_eq!(normalize_vote_choice("True"), Some("YES"));
        assert_eq!(normalize_vote_choice("0"), Some("NO"));
        assert_eq!(normalize_vote_choice("abstain"), Some("ABSTAIN"));
        assert_eq!(normalize_vote_choice("maybe"), None);
    }

    #[test]
    fn counting_ignores_abstentions_and_ties_reject() {
        let votes = canon(&[("A1", "YES"), ("A2", "y"), ("A3", "NO"), ("A4", "ABSTAIN")]);
        assert_eq!(count_votes(votes.values()), (2, 1));
        assert!(vote_passed(2, 1));
        assert!(!vote_passed(1, 1));
    }

    #[test]
    fn propose_validation_order() {
        let p = Params::new();
        assert_eq!(
            validate_propose_input(false, "", "", None).map_err(|r| r.code),
            Err(ErrorCode::NoPermission)
        );
        assert_eq!(
            validate_propose_input(true, "LAND_1", " ", Some(&p)).map_err(|r| r.message),
            Err("missing land_id/template_id".to_string())
        );
        assert_eq!(
            validate_propose_input(true, "LAND_1", "MARKET_TAX", None).map_err(|r| r.message),
            Err("missing params".to_string())
        );
        assert!(validate_propose_input(true, "LAND_1", "MARKET_TAX", Some(&p)).is_ok());
        assert!(validate_vote_input(true, "LAW_1", "").is_err());
    }

    #[test]
    fn timeline_clamps_negative_durations() {
        assert_eq!(
            build_law_timeline(100, 3000, 3000),
            Timeline {
                notice_ends: 3100,
                vote_ends: 6100
            }
        );
        assert_eq!(
            build_law_timeline(100, -5, -5),
            Timeline {
                notice_ends: 100,
                vote_ends: 100
            }
        );
    }

    #[test]
    fn title_falls_back_to_template() {
        assert_eq!(resolve_law_title("  ", "Market Tax"), "Market Tax");
        assert_eq!(resolve_law_title(" Tax 10% ", "Market Tax"), "Tax 10%");
        assert_eq!(template_title("CURFEW_NO_BUILD"), Some("Curfew: No Building"));
        assert_eq!(template_title("TAX_EVERYTHING"), None);
    }

    #[test]
    fn market_tax_is_clamped_and_canonical() {
        let out = normalize_law_params("MARKET_TAX", &params(json!({"market_tax": 0.3})), item_exists)
            .expect("normalised");
        assert_eq!(out, canon(&[("market_tax", "0.25")]));
        let out = normalize_law_params("MARKET_TAX", &params(json!({"market_tax": -1})), item_exists)
            .expect("normalised");
        assert_eq!(out, canon(&[("market_tax", "0")]));
    }

    #[test]
    fn fine_and_access_validate_items_and_clamp_counts() {
        let out = normalize_law_params(
            "FINE_BREAK_PER_BLOCK",
            &params(json!({"fine_item": " IRON_INGOT ", "fine_per_block": 250.7})),
            item_exists,
        )
        .expect("normalised");
        assert_eq!(out, canon(&[("fine_item", "IRON_INGOT"), ("fine_per_block", "100")]));

        let err = normalize_law_params(
            "ACCESS_PASS_CORE",
            &params(json!({"ticket_item": "GOLD", "ticket_cost": 3})),
            item_exists,
        )
        .expect_err("unknown item");
        assert_eq!(err.to_string(), "unknown ticket_item");

        let err = normalize_law_params("CURFEW_NO_BUILD", &params(json!({"start_time": 0.1})), item_exists)
            .expect_err("missing end");
        assert_eq!(err.to_string(), "end_time must be number");
    }

    #[test]
    fn unknown_templates_are_the_sentinel() {
        assert_eq!(
            normalize_law_params("TAX_EVERYTHING", &Params::new(), item_exists),
            Err(LawError::UnsupportedTemplate)
        );
        let mut land = LandClaim::default();
        assert_eq!(
            apply_law_template("TAX_EVERYTHING", &BTreeMap::new(), &mut land),
            Err(LawError::UnsupportedTemplate)
        );
    }

    #[test]
    fn curfew_application_disables_on_equal_bounds() {
        let mut land = LandClaim::default();
        apply_law_template(
            "CURFEW_NO_BUILD",
            &canon(&[("start_time", "0.2"), ("end_time", "0.4")]),
            &mut land,
        )
        .expect("applied");
        assert!(land.curfew.enabled);
        assert_eq!((land.curfew.start, land.curfew.end), (0.2, 0.4));

        apply_law_template(
            "CURFEW_NO_BUILD",
            &canon(&[("start_time", "0.5"), ("end_time", "0.5")]),
            &mut land,
        )
        .expect("applied");
        assert!(!land.curfew.enabled);
        assert_eq!((land.curfew.start, land.curfew.end), (0.0, 0.0));
    }

    #[test]
    fn failed_application_leaves_land_unchanged() {
        let mut land = LandClaim::default();
        land.market_tax = 0.1;
        let err = apply_law_template("MARKET_TAX", &canon(&[("market_tax", "lots")]), &mut land)
            .expect_err("bad tax");
        assert_eq!(err.to_string(), "bad market_tax");
        assert_eq!(land.market_tax, 0.1);

        land.fine_break.enabled = true;
        land.fine_break.item = "COAL".to_string();
        land.fine_break.per_block = 2;
        let before = land.clone();
        let err = apply_law_template("FINE_BREAK_PER_BLOCK", &canon(&[("fine_item", "COAL")]), &mut land)
            .expect_err("missing count");
        assert_eq!(err.to_string(), "missing fine_item/fine_per_block");
        assert_eq!(land, before);
    }

    #[test]
    fn zero_fine_disables_policy() {
        let mut land = LandClaim::default();
        apply_law_template(
            "FINE_BREAK_PER_BLOCK",
            &canon(&[("fine_item", "COAL"), ("fine_per_block", "0")]),
            &mut land,
        )
        .expect("applied");
        assert!(!land.fine_break.enabled);
        assert!(land.fine_break.item.is_empty());

        apply_law_template(
            "ACCESS_PASS_CORE",
            &canon(&[("ticket_item", "BREAD"), ("ticket_cost", "99")]),
            &mut land,
        )
        .expect("applied");
        assert!(land.access_pass.enabled);
        assert_eq!(land.access_pass.cost, 64);
    }

    #[test]
    fn transitions_follow_the_state_machine() {
        assert_eq!(next_transition(LawStatus::Notice, 99, 100, 200), None);
        assert_eq!(
            next_transition(LawStatus::Notice, 100, 100, 200),
            Some(LawTransition::EnterVoting)
        );
        assert_eq!(next_transition(LawStatus::Voting, 199, 100, 200), None);
        assert_eq!(
            next_transition(LawStatus::Voting, 200, 100, 200),
            Some(LawTransition::CloseVote)
        );
        assert_eq!(next_transition(LawStatus::Active, 10_000, 100, 200), None);
        assert_eq!(next_transition(LawStatus::Rejected, 10_000, 100, 200), None);
    }

    proptest! {
        #[test]
        fn vote_normalisation_is_idempotent(raw in "[ a-zA-Z01]{0,8}") {
            if let Some(once) = normalize_vote_choice(&raw) {
                prop_assert_eq!(normalize_vote_choice(once), Some(once));
            }
        }
    }
}
