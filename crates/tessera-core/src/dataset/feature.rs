//! Primary keys, feature records and their storage paths.

use crate::errors::{Result, TesseraError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// One feature: column name → value. Geometry columns hold hex-encoded WKB.
pub type Feature = serde_json::Map<String, Value>;

/// Primary key value of a feature
///
/// Integer keys sort before text keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    Int(i64),
    Text(String),
}

impl PrimaryKey {
    /// Interpret a JSON value as a key; only integers and strings qualify
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(PrimaryKey::Int),
            Value::String(s) => Some(PrimaryKey::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            PrimaryKey::Int(i) => Value::from(*i),
            PrimaryKey::Text(s) => Value::String(s.clone()),
        }
    }

    /// Filename-safe encoding: hex of the key's JSON form
    pub fn encode(&self) -> String {
        hex::encode(self.to_value().to_string())
    }

    /// Reverse of [`PrimaryKey::encode`]
    ///
    /// # Errors
    ///
    /// Returns `CorruptObject` if `encoded` is not a key written by `encode`.
    pub fn decode(encoded: &str) -> Result<Self> {
        let corrupt = || TesseraError::CorruptObject {
            id: encoded.to_string(),
            reason: "not an encoded primary key".to_string(),
        };
        let bytes = hex::decode(encoded).map_err(|_| corrupt())?;
        let value: Value = serde_json::from_slice(&bytes).map_err(|_| corrupt())?;
        Self::from_value(&value).ok_or_else(corrupt)
    }

    /// Path of the feature blob relative to the dataset's `feature/` directory
    pub fn feature_path(&self) -> String {
        let encoded = self.encode();
        let mut hasher = Sha256::new();
        hasher.update(encoded.as_bytes());
        let shard = hex::encode(hasher.finalize());
        format!("{}/{}", &shard[..2], encoded)
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryKey::Int(i) => write!(f, "{}", i),
            PrimaryKey::Text(s) => f.write_str(s),
        }
    }
}

/// Canonical bytes of a feature blob
///
/// # Errors
///
/// Returns `Json` if serialization fails.
pub fn encode_feature(feature: &Feature) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(feature)?)
}

/// # Errors
///
/// Returns `Json` if the blob is not a JSON object.
pub fn decode_feature(bytes: &[u8]) -> Result<Feature> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_encoding_round_trip() {
        for pk in [
            PrimaryKey::Int(123456),
            PrimaryKey::Int(-1),
            PrimaryKey::Text("a/b c".to_string()),
        ] {
            assert_eq!(PrimaryKey::decode(&pk.encode()).unwrap(), pk);
        }
    }

    #[test]
    fn test_int_and_text_keys_differ() {
        assert_ne!(
            PrimaryKey::Int(1).encode(),
            PrimaryKey::Text("1".to_string()).encode()
        );
    }

    #[test]
    fn test_feature_path_is_sharded() {
        let path = PrimaryKey::Int(1241).feature_path();
        let (shard, name) = path.split_once('/').unwrap();
        assert_eq!(shard.len(), 2);
        assert_eq!(name, PrimaryKey::Int(1241).encode());
        assert!(!name.contains('/'));
    }

    #[test]
    fn test_from_value() {
        assert_eq!(
            PrimaryKey::from_value(&json!(7)),
            Some(PrimaryKey::Int(7))
        );
        assert_eq!(PrimaryKey::from_value(&json!(1.5)), None);
        assert_eq!(PrimaryKey::from_value(&json!(null)), None);
    }

    #[test]
    fn test_ordering_puts_ints_first() {
        let mut keys = vec![
            PrimaryKey::Text("a".to_string()),
            PrimaryKey::Int(10),
            PrimaryKey::Int(2),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                PrimaryKey::Int(2),
                PrimaryKey::Int(10),
                PrimaryKey::Text("a".to_string())
            ]
        );
    }

    #[test]
    fn test_feature_bytes_are_canonical() {
        let a: Feature = serde_json::from_value(json!({"b": 1, "a": 2})).unwrap();
        let b: Feature = serde_json::from_value(json!({"a": 2, "b": 1})).unwrap();
        assert_eq!(encode_feature(&a).unwrap(), encode_feature(&b).unwrap());
    }
}
