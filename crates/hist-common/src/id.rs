//! Topic identity types.
//!
//! A topic is identified by a hash of its normalized (lower-cased) name, so any
//! process can compute the id of a topic without asking the database.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Width of a topic id in bytes.
pub const TOPIC_ID_LEN: usize = 16;

/// Case-folded topic name used as the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicKey(String);

impl TopicKey {
    /// Normalize a topic name into its identity key.
    pub fn new(name: &str) -> Self {
        TopicKey(name.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable topic identifier: the first 16 bytes of SHA-256 over the topic key.
///
/// Rendered as 32 lowercase hex characters in storage and JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicId([u8; TOPIC_ID_LEN]);

impl TopicId {
    /// Compute the id for an already-normalized key.
    pub fn for_key(key: &TopicKey) -> Self {
        let digest = Sha256::digest(key.as_str().as_bytes());
        let mut bytes = [0u8; TOPIC_ID_LEN];
        bytes.copy_from_slice(&digest[..TOPIC_ID_LEN]);
        TopicId(bytes)
    }

    /// Compute the id for a raw topic name (case-insensitive).
    pub fn for_name(name: &str) -> Self {
        Self::for_key(&TopicKey::new(name))
    }

    pub fn as_bytes(&self) -> &[u8; TOPIC_ID_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Error returned when a stored id is not 32 hex characters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid topic id {0:?}")]
pub struct ParseTopicIdError(pub String);

impl FromStr for TopicId {
    type Err = ParseTopicIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; TOPIC_ID_LEN];
        hex::decode_to_slice(s.trim(), &mut bytes)
            .map_err(|_| ParseTopicIdError(s.to_string()))?;
        Ok(TopicId(bytes))
    }
}

impl Serialize for TopicId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TopicId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_case_insensitive() {
        assert_eq!(
            TopicId::for_name("Building/AHU1/Temp"),
            TopicId::for_name("building/ahu1/temp")
        );
    }

    #[test]
    fn test_distinct_names_distinct_ids() {
        assert_ne!(
            TopicId::for_name("building/ahu1/temp"),
            TopicId::for_name("building/ahu2/temp")
        );
    }

    #[test]
    fn test_hex_round_trip() {
        let id = TopicId::for_name("campus/meter");
        let text = id.to_string();
        assert_eq!(text.len(), 32);
        assert!(text.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(text.parse::<TopicId>().unwrap(), id);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("not-hex".parse::<TopicId>().is_err());
        assert!("abcd".parse::<TopicId>().is_err());
    }

    #[test]
    fn test_id_is_stable_across_runs() {
        // Pinned so a hashing change cannot silently orphan stored rows.
        let id = TopicId::for_key(&TopicKey::new(""));
        assert_eq!(id.to_hex(), "e3b0c44298fc1c149afbf4c8996fb924");
    }

    #[test]
    fn test_serde_as_hex_string() {
        let id = TopicId::for_name("a/b");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
        let back: TopicId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
