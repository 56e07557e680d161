//! Domain entities: link records and their identifiers

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::domain::error::DomainError;

/// Prefix the host framework puts in front of parent references
/// (`menu_link_content:<uuid>`).
pub const PARENT_PLUGIN_PREFIX: &str = "menu_link_content:";

/// Longest group key the host framework accepts for a menu id.
pub const MAX_GROUP_KEY_LEN: usize = 32;

const GROUP_KEY_PATTERN: &str = r"^[a-z0-9_-]+$";

/// Opaque record fields (title, link uri, weight, flags), copied verbatim by a clone.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Store-assigned identifier of a persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-wide unique identifier of a record (UUID).
///
/// Parent references point at this key, never at the store id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GlobalKey(Uuid);

impl GlobalKey {
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for GlobalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for GlobalKey {
    type Err = DomainError;

    /// Parse a hyphenated UUID, accepting the host's `menu_link_content:` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let raw = trimmed
            .strip_prefix(PARENT_PLUGIN_PREFIX)
            .unwrap_or(trimmed);
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| DomainError::InvalidGlobalKey(s.to_string()))
    }
}

impl TryFrom<String> for GlobalKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GlobalKey> for String {
    fn from(key: GlobalKey) -> Self {
        key.to_string()
    }
}

/// Machine name of a group (the host's menu id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupKey(String);

fn group_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(GROUP_KEY_PATTERN).expect("group key pattern compiles"))
}

impl GroupKey {
    /// Validate and wrap a group key.
    ///
    /// Allowed: 1 to 32 characters of lowercase letters, digits, `_` and `-`.
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::InvalidGroupKey {
                value,
                reason: "must not be empty".into(),
            });
        }
        if value.len() > MAX_GROUP_KEY_LEN {
            return Err(DomainError::InvalidGroupKey {
                value,
                reason: format!("longer than {MAX_GROUP_KEY_LEN} characters"),
            });
        }
        if !group_key_regex().is_match(&value) {
            return Err(DomainError::InvalidGroupKey {
                value,
                reason: "only lowercase letters, digits, '_' and '-' are allowed".into(),
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GroupKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for GroupKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GroupKey> for String {
    fn from(key: GroupKey) -> Self {
        key.0
    }
}

/// One node of a group's link tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Store id; `None` until persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub global_key: GlobalKey,
    pub group_key: GroupKey,
    /// Parent's global key within the same group; `None` for roots
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_parent_ref"
    )]
    pub parent_ref: Option<GlobalKey>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl LinkRecord {
    /// Create an unpersisted root record.
    pub fn new(global_key: GlobalKey, group_key: GroupKey) -> Self {
        Self {
            id: None,
            global_key,
            group_key,
            parent_ref: None,
            attributes: Attributes::new(),
        }
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_parent(mut self, parent: GlobalKey) -> Self {
        self.parent_ref = Some(parent);
        self
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_ref.is_none()
    }

    pub fn title(&self) -> Option<&str> {
        self.attributes.get("title").and_then(|v| v.as_str())
    }

    /// Sort weight among siblings; missing or non-integer weights count as 0.
    pub fn weight(&self) -> i64 {
        self.attributes
            .get("weight")
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
    }
}

/// Stored data uses an empty string for "no parent".
fn deserialize_parent_ref<'de, D>(deserializer: D) -> Result<Option<GlobalKey>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("account")]
    #[case("main")]
    #[case("test_menu_cloned")]
    #[case("footer-2")]
    fn given_machine_name_when_creating_group_key_then_accepts(#[case] value: &str) {
        assert_eq!(GroupKey::new(value).unwrap().as_str(), value);
    }

    #[rstest]
    #[case("")]
    #[case("Main")]
    #[case("has space")]
    #[case("a_group_key_that_is_far_too_long_for_a_menu")]
    fn given_bad_name_when_creating_group_key_then_rejects(#[case] value: &str) {
        assert!(matches!(
            GroupKey::new(value),
            Err(DomainError::InvalidGroupKey { .. })
        ));
    }

    #[test]
    fn given_plugin_prefixed_reference_when_parsing_then_strips_prefix() {
        let plain: GlobalKey = "0b6c9c4e-0f0a-4d8e-9d3b-2f6a1c2e7b11".parse().unwrap();
        let prefixed: GlobalKey = "menu_link_content:0b6c9c4e-0f0a-4d8e-9d3b-2f6a1c2e7b11"
            .parse()
            .unwrap();
        assert_eq!(plain, prefixed);
    }

    #[test]
    fn given_empty_parent_in_json_when_deserializing_then_record_is_root() {
        let json = r#"{
            "id": 4,
            "global_key": "0b6c9c4e-0f0a-4d8e-9d3b-2f6a1c2e7b11",
            "group_key": "account",
            "parent_ref": "",
            "attributes": {"title": "Home", "weight": -2}
        }"#;

        let record: LinkRecord = serde_json::from_str(json).unwrap();

        assert!(record.is_root());
        assert_eq!(record.id, Some(RecordId(4)));
        assert_eq!(record.title(), Some("Home"));
        assert_eq!(record.weight(), -2);
    }

    #[test]
    fn given_unpersisted_record_when_serializing_then_omits_id_and_parent() {
        let key: GlobalKey = "0b6c9c4e-0f0a-4d8e-9d3b-2f6a1c2e7b11".parse().unwrap();
        let record = LinkRecord::new(key, GroupKey::new("account").unwrap());

        let json = serde_json::to_value(&record).unwrap();

        assert!(json.get("id").is_none());
        assert!(json.get("parent_ref").is_none());
        assert_eq!(json["group_key"], "account");
    }
}
