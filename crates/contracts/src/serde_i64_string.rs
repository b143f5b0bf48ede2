//! Seeds travel as strings so JavaScript clients keep all 64 bits; plain numbers are accepted too.

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &i64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum I64Input {
        String(String),
        Number(i64),
    }

    match I64Input::deserialize(deserializer)? {
        I64Input::String(raw) => raw.trim().parse::<i64>().map_err(D::Error::custom),
        I64Input::Number(value) => Ok(value),
    }
}
