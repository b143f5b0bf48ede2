//! Rule primitives shared by claims and laws: claim-type defaults, curfew windows,
//! canonical float text, and request-parameter coercion.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub type Params = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Claim types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimType {
    Homestead,
    CityCore,
    #[default]
    Default,
}

impl ClaimType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Homestead => "HOMESTEAD",
            Self::CityCore => "CITY_CORE",
            Self::Default => "DEFAULT",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "HOMESTEAD" => Self::Homestead,
            "CITY_CORE" => Self::CityCore,
            _ => Self::Default,
        }
    }
}

/// Visitor policy of a claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimFlags {
    pub allow_build: bool,
    pub allow_break: bool,
    pub allow_damage: bool,
    pub allow_trade: bool,
}

pub fn default_claim_type_for_world(world_type: &str) -> ClaimType {
    match world_type.trim().to_ascii_uppercase().as_str() {
        "OVERWORLD" => ClaimType::Homestead,
        "CITY_HUB" => ClaimType::CityCore,
        _ => ClaimType::Default,
    }
}

pub fn default_claim_flags(claim_type: ClaimType) -> ClaimFlags {
    match claim_type {
        ClaimType::CityCore => ClaimFlags {
            allow_trade: true,
            ..ClaimFlags::default()
        },
        ClaimType::Homestead | ClaimType::Default => ClaimFlags::default(),
    }
}

// ---------------------------------------------------------------------------
// Curfew
// ---------------------------------------------------------------------------

/// `[start, end]` when `start <= end`, otherwise the window wraps past midnight.
pub fn in_window(t: f64, start: f64, end: f64) -> bool {
    if start <= end {
        t >= start && t <= end
    } else {
        t >= start || t <= end
    }
}

pub fn can_action_with_curfew(base: bool, enabled: bool, now: f64, start: f64, end: f64) -> bool {
    base && (!enabled || !in_window(now, start, end))
}

/// Fraction of the current day in `[0, 1)`.
pub fn time_of_day(now_tick: u64, day_ticks: i64) -> f64 {
    if day_ticks <= 0 {
        return 0.0;
    }
    let day = day_ticks as u64;
    (now_tick % day) as f64 / day as f64
}

// ---------------------------------------------------------------------------
// Canonical float text
// ---------------------------------------------------------------------------

/// Shortest round-trippable decimal in `%g` style: plain notation for decimal
/// exponents in `[-4, 6)`, otherwise `d.ddde±XX`.
pub fn float_to_canon_string(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let sci = format!("{f:e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    if (-4..6).contains(&exp) {
        return format!("{f}");
    }
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exp.unsigned_abs())
}

// ---------------------------------------------------------------------------
// Parameter coercion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("{0} must be number")]
    NotNumber(String),
    #[error("{0} must be string")]
    NotString(String),
    #[error("missing {0}")]
    Empty(String),
}

pub fn param_float(params: &Params, key: &str) -> Result<f64, ParamError> {
    match params.get(key) {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| ParamError::NotNumber(key.to_string())),
        _ => Err(ParamError::NotNumber(key.to_string())),
    }
}

/// Read as a float, then truncated toward zero. Integers beyond 2^53 lose
/// precision the same way a float64 decode does.
pub fn param_int(params: &Params, key: &str) -> Result<i64, ParamError> {
    param_float(params, key).map(|f| f.trunc() as i64)
}

pub fn param_string(params: &Params, key: &str) -> Result<String, ParamError> {
    match params.get(key) {
        Some(Value::String(raw)) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                Err(ParamError::Empty(key.to_string()))
            } else {
                Ok(trimmed.to_string())
            }
        }
        _ => Err(ParamError::NotString(key.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        serde_json::from_value(value).expect("params object")
    }

    #[test]
    fn claim_type_defaults_follow_world_type() {
        assert_eq!(default_claim_type_for_world("OVERWORLD"), ClaimType::Homestead);
        assert_eq!(default_claim_type_for_world("city_hub"), ClaimType::CityCore);
        assert_eq!(default_claim_type_for_world("MINE_LEVEL"), ClaimType::Default);
        assert_eq!(default_claim_flags(ClaimType::Homestead), ClaimFlags::default());
        assert!(default_claim_flags(ClaimType::CityCore).allow_trade);
        assert!(!default_claim_flags(ClaimType::CityCore).allow_build);
    }

    #[test]
    fn curfew_window_wraps_past_midnight() {
        assert!(in_window(0.95, 0.9, 0.1));
        assert!(in_window(0.05, 0.9, 0.1));
        assert!(!in_window(0.5, 0.9, 0.1));
        assert!(in_window(0.3, 0.2, 0.4));
        assert!(!in_window(0.5, 0.2, 0.4));
    }

    #[test]
    fn curfew_only_restricts_when_enabled() {
        assert!(!can_action_with_curfew(true, true, 0.3, 0.2, 0.4));
        assert!(can_action_with_curfew(true, true, 0.5, 0.2, 0.4));
        assert!(can_action_with_curfew(true, false, 0.3, 0.2, 0.4));
        assert!(!can_action_with_curfew(false, false, 0.5, 0.2, 0.4));
    }

    #[test]
    fn time_of_day_handles_zero_day() {
        assert_eq!(time_of_day(1500, 6000), 0.25);
        assert_eq!(time_of_day(6000, 6000), 0.0);
        assert_eq!(time_of_day(1500, 0), 0.0);
    }

    #[test]
    fn canon_float_matches_shortest_g_format() {
        assert_eq!(float_to_canon_string(0.25), "0.25");
        assert_eq!(float_to_canon_string(1.0), "1");
        assert_eq!(float_to_canon_string(0.0), "0");
        assert_eq!(float_to_canon_string(0.1), "0.1");
        assert_eq!(float_to_canon_string(0.0001), "0.0001");
        assert_eq!(float_to_canon_string(0.00001), "1e-05");
        assert_eq!(float_to_canon_string(1e21), "1e+21");
        assert_eq!(float_to_canon_string(123456.0), "123456");
        assert_eq!(float_to_canon_string(1234567.0), "1.234567e+06");
        assert_eq!(float_to_canon_string(-2.5e-7), "-2.5e-07");
    }

    #[test]
    fn param_float_accepts_integers_and_floats() {
        let p = params(json!({"a": 3, "b": 0.5, "c": "0.5"}));
        assert_eq!(param_float(&p, "a"), Ok(3.0));
        assert_eq!(param_float(&p, "b"), Ok(0.5));
        assert_eq!(
            param_float(&p, "c").map_err(|e| e.to_string()),
            Err("c must be number".to_string())
        );
        assert_eq!(
            param_float(&p, "missing"),
            Err(ParamError::NotNumber("missing".to_string()))
        );
    }

    #[test]
    fn param_int_truncates_toward_zero() {
        let p = params(json!({"pos": 7.9, "neg": -7.9, "int": 12}));
        assert_eq!(param_int(&p, "pos"), Ok(7));
        assert_eq!(param_int(&p, "neg"), Ok(-7));
        assert_eq!(param_int(&p, "int"), Ok(12));
    }

    #[test]
    fn param_int_goes_through_float_precision() {
        let p = params(json!({"big": 9_007_199_254_740_993_i64}));
        assert_eq!(param_int(&p, "big"), Ok(9_007_199_254_740_992));
    }

    #[test]
    fn param_string_trims_and_rejects_empty() {
        let p = params(json!({"item": "  IRON_INGOT ", "blank": "   ", "num": 4}));
        assert_eq!(param_string(&p, "item"), Ok("IRON_INGOT".to_string()));
        assert_eq!(param_string(&p, "blank"), Err(ParamError::Empty("blank".to_string())));
        assert_eq!(param_string(&p, "num"), Err(ParamError::NotString("num".to_string())));
    }

    proptest! {
        #[test]
        fn canon_float_is_a_fixed_point(x in proptest::num::f64::NORMAL) {
            let once = float_to_canon_string(x);
            let parsed: f64 = once.parse().expect("canonical text parses");
            prop_assert_eq!(float_to_canon_string(parsed), once);
        }
    }
}
