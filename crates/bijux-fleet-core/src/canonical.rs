// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::errors::{Error, Result};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    pub const ZERO: Self = Self([0_u8; 32]);

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(self) -> String {
        let mut out = String::with_capacity(64);
        for b in self.0 {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{b:02x}");
        }
        out
    }

    pub fn from_hex(input: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidIdentifier {
            kind: "sha256",
            value: input.to_string(),
            reason: reason.to_string(),
        };
        if input.len() != 64 {
            return Err(invalid("must be 64 hex characters"));
        }
        let mut out = [0_u8; 32];
        for (i, chunk) in input.as_bytes().chunks(2).enumerate() {
            let text = std::str::from_utf8(chunk).map_err(|_| invalid("must be ascii"))?;
            out[i] = u8::from_str_radix(text, 16).map_err(|_| invalid("must be hex"))?;
        }
        Ok(Self(out))
    }
}

impl core::fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl core::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone)]
pub struct CanonicalJson(Value);

impl CanonicalJson {
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        let raw = serde_json::to_value(value)?;
        Ok(Self(normalize_json_value(raw)))
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.0)?)
    }

    pub fn hash(&self) -> Result<Hash256> {
        let bytes = self.to_bytes()?;
        Ok(stable_hash_bytes(&bytes))
    }
}

#[must_use]
pub fn stable_hash_bytes(bytes: &[u8]) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0_u8; 32];
    out.copy_from_slice(&digest);
    Hash256::from_bytes(out)
}

#[must_use]
pub fn stable_hash_hex(bytes: &[u8]) -> String {
    stable_hash_bytes(bytes).to_hex()
}

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    stable_hash_hex(bytes)
}

#[must_use]
pub fn sha256(bytes: &[u8]) -> Hash256 {
    stable_hash_bytes(bytes)
}

pub fn stable_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    CanonicalJson::from_serialize(value)?.to_bytes()
}

pub fn stable_json_hash<T: Serialize>(value: &T) -> Result<Hash256> {
    CanonicalJson::from_serialize(value)?.hash()
}

pub fn stable_json_hash_hex<T: Serialize>(value: &T) -> Result<String> {
    Ok(stable_json_hash(value)?.to_hex())
}

/// Recursively sorts object keys and folds equivalent number spellings
/// (`-0.0`, `10.0`) onto one representation.
#[must_use]
pub fn normalize_json_value(value: Value) -> Value {
    match value {
        Value::Number(n) => Value::Number(normalize_json_number(n)),
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut entries: Vec<(String, Value)> = map
                .into_iter()
                .map(|(k, v)| (k, normalize_json_value(v)))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (k, v) in entries {
                sorted.insert(k, v);
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_json_value).collect()),
        other => other,
    }
}

#[must_use]
pub fn normalize_json_number(number: serde_json::Number) -> serde_json::Number {
    if number.is_i64() || number.is_u64() {
        return number;
    }
    if let Some(value) = number.as_f64() {
        if value == 0.0 {
            return serde_json::Number::from(0);
        }
        if value.fract() == 0.0 && value.abs() < 9.007_199_254_740_992e15 {
            return serde_json::Number::from(value as i64);
        }
    }
    number
}

#[cfg(test)]
mod tests {
    use super::{normalize_json_value, stable_json_bytes, stable_json_hash_hex, Hash256};
    use serde_json::json;

    #[test]
    fn canonical_json_orders_object_keys() {
        let value = json!({
            "z": 1,
            "a": {"d": 4, "b": 2},
            "arr": [{"k2": 2, "k1": 1}],
        });

        let bytes = stable_json_bytes(&value).expect("stable json bytes");
        let text = String::from_utf8(bytes).expect("utf8 json");
        assert_eq!(text, r#"{"a":{"b":2,"d":4},"arr":[{"k1":1,"k2":2}],"z":1}"#);
    }

    #[test]
    fn canonical_hash_is_deterministic_for_same_value() {
        let value = json!({"b": 2, "a": 1});
        let h1 = stable_json_hash_hex(&value).expect("hash 1");
        let h2 = stable_json_hash_hex(&value).expect("hash 2");
        assert_eq!(h1, h2);
    }

    #[test]
    fn integral_floats_fold_onto_integers() {
        assert_eq!(normalize_json_value(json!(10.0)), json!(10));
        assert_eq!(normalize_json_value(json!(-0.0)), json!(0));
        assert_eq!(normalize_json_value(json!(2.5)), json!(2.5));
    }

    #[test]
    fn hash_hex_round_trips() {
        let hash = super::sha256(b"fleet");
        let parsed = Hash256::from_hex(&hash.to_hex()).expect("parse hex");
        assert_eq!(parsed, hash);
        assert!(Hash256::from_hex("xyz").is_err());
    }
}
