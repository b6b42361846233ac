//! Wire-level and parsed data model: the JSON shapes experiment and
//! feature-flag config files use, decoded via `serde`.

use std::collections::{BTreeMap, HashMap, HashSet};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::ParseError;

/// Raw experiment record as it appears under a name key in the
/// top-level experiment config JSON object.
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentRecord {
    pub id: serde_json::Value,
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub expires: i64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Distinguishes "key absent" from "key present with value null"
    /// by wrapping the original optional string in another `Option`
    /// supplied only when the JSON key itself is present.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub global_override: Option<Option<String>>,
    #[serde(default)]
    pub experiment: serde_json::Value,
}

impl ExperimentRecord {
    /// `id` must be an integer; this is the one structural check the
    /// parser performs before everything else.
    pub fn integer_id(&self) -> Result<i64, ParseError> {
        self.id.as_i64().ok_or(ParseError::NonIntegerId)
    }
}

/// A top-level feature-flag record (a sibling namespace to
/// experiments in the original config format).
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlagRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub global_override: Option<String>,
    #[serde(default)]
    pub feature: serde_json::Value,
}

fn default_true() -> bool {
    true
}

/// serde helper: makes `Option<Option<T>>` distinguish "absent" from
/// "present and null" for a field marked `#[serde(default, deserialize_with = "deserialize_some")]`.
fn deserialize_some<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// An allow-listed targeting value. Target lists are rarely
/// homogeneous in the wild (`{"logged_in": [true]}` alongside
/// `{"subreddit": ["pics", "funny"]}`), so this mirrors
/// [`crate::subject::Value`] closely enough to compare directly
/// against subject values without losing boolean/int targets to a
/// blanket stringification.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetValue {
    Str(String),
    Bool(bool),
    Int(i64),
}

impl TargetValue {
    pub fn matches(&self, value: &crate::subject::Value) -> bool {
        match (self, value) {
            (TargetValue::Str(a), crate::subject::Value::Str(b)) => *a == b.to_lowercase(),
            (TargetValue::Bool(a), crate::subject::Value::Bool(b)) => a == b,
            (TargetValue::Int(a), crate::subject::Value::Int(b)) => a == b,
            _ => false,
        }
    }
}

/// Payload shared by R2 experiments and feature-flag experiments
/// (the latter only permit the `active` variant).
#[derive(Debug, Clone, Default)]
pub struct R2Payload {
    pub variants: BTreeMap<String, f64>,
    pub seed: Option<String>,
    pub bucket_val: String,
    pub targeting: HashMap<String, Vec<TargetValue>>,
    /// Order-preserving: `check_overrides` walks this in declaration
    /// order, and the first matching override param wins, mirroring
    /// the original's reliance on dict insertion order.
    pub overrides: IndexMap<String, HashMap<String, String>>,
    pub newer_than: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
struct RawR2Payload {
    #[serde(default)]
    variants: BTreeMap<String, f64>,
    #[serde(default)]
    seed: Option<String>,
    #[serde(default)]
    bucket_val: Option<String>,
    #[serde(default)]
    targeting: HashMap<String, Vec<serde_json::Value>>,
    #[serde(default)]
    overrides: IndexMap<String, HashMap<String, String>>,
    #[serde(default)]
    newer_than: Option<i64>,
}

impl R2Payload {
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ParseError> {
        let raw: RawR2Payload = serde_json::from_value(value.clone())?;

        let targeting = raw
            .targeting
            .into_iter()
            .map(|(k, values)| {
                let lowered = values
                    .into_iter()
                    .map(|v| match v {
                        serde_json::Value::String(s) => TargetValue::Str(s.to_lowercase()),
                        serde_json::Value::Bool(b) => TargetValue::Bool(b),
                        serde_json::Value::Number(n) => {
                            TargetValue::Int(n.as_i64().unwrap_or_default())
                        }
                        other => TargetValue::Str(other.to_string().to_lowercase()),
                    })
                    .collect();
                (k.to_lowercase(), lowered)
            })
            .collect();

        let overrides = raw
            .overrides
            .into_iter()
            .map(|(param, mapping)| {
                let lowered = mapping
                    .into_iter()
                    .map(|(k, v)| (k.to_lowercase(), v))
                    .collect();
                (param.to_lowercase(), lowered)
            })
            .collect();

        Ok(Self {
            variants: raw.variants,
            seed: raw.seed,
            bucket_val: raw.bucket_val.unwrap_or_else(|| "user_id".to_string()),
            targeting,
            overrides,
            newer_than: raw.newer_than,
        })
    }
}

/// `user` (default) vs `page` legacy experiments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyKind {
    User,
    Page,
}

#[derive(Debug, Clone, Default)]
pub struct ContentFlags {
    pub subreddit_only: bool,
    pub link_only: bool,
}

#[derive(Debug, Clone)]
pub struct LegacyPayload {
    pub kind: LegacyKind,
    pub variants: BTreeMap<String, f64>,
    pub url_variants: HashMap<String, String>,
    pub content_flags: ContentFlags,
    pub seed: Option<String>,
    pub feature_flag_gate: Option<FeatureFlagPayload>,
}

#[derive(Debug, Deserialize, Default)]
struct RawLegacyPayload {
    #[serde(default)]
    page: bool,
    #[serde(default)]
    variants: BTreeMap<String, f64>,
    #[serde(default)]
    url: HashMap<String, String>,
    #[serde(default)]
    content_flags: RawContentFlags,
    #[serde(default)]
    seed: Option<String>,
    #[serde(default)]
    feature_flag_gate: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Default)]
struct RawContentFlags {
    #[serde(default)]
    subreddit_only: bool,
    #[serde(default)]
    link_only: bool,
}

impl LegacyPayload {
    pub fn from_json(name: &str, value: &serde_json::Value) -> Result<Self, ParseError> {
        let raw: RawLegacyPayload = serde_json::from_value(value.clone())?;

        let mut url_variants = HashMap::new();
        for (flag, variant) in raw.url {
            if raw.variants.contains_key(&variant) {
                url_variants.insert(flag.to_lowercase(), variant);
            } else {
                tracing::warn!(
                    experiment_name = name,
                    url_flag = %flag,
                    variant = %variant,
                    "undefined url variant in legacy experiment; dropping"
                );
            }
        }

        let feature_flag_gate = raw
            .feature_flag_gate
            .map(|v| FeatureFlagPayload::from_json(&v))
            .transpose()?;

        Ok(Self {
            kind: if raw.page { LegacyKind::Page } else { LegacyKind::User },
            variants: raw.variants,
            url_variants,
            content_flags: ContentFlags {
                subreddit_only: raw.content_flags.subreddit_only,
                link_only: raw.content_flags.link_only,
            },
            seed: raw.seed,
            feature_flag_gate,
        })
    }
}

/// The fixed set of user flags a `BasicFeatureFlag` targeting clause
/// may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserFlag {
    Admin,
    Sponsor,
    Employee,
    Beta,
    Gold,
}

impl UserFlag {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserFlag::Admin),
            "sponsor" => Ok(UserFlag::Sponsor),
            "employee" => Ok(UserFlag::Employee),
            "beta" => Ok(UserFlag::Beta),
            "gold" => Ok(UserFlag::Gold),
            other => Err(ParseError::InvalidUserFlag(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeatureTargeting {
    pub user_flags: HashSet<UserFlag>,
    pub newer_than: Option<i64>,
    pub users: HashSet<String>,
    pub subreddits: HashSet<String>,
    pub subdomains: HashSet<String>,
    pub oauth_clients: HashSet<String>,
    pub url_flag: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawFeatureTargeting {
    #[serde(default)]
    user_flags: Vec<String>,
    #[serde(default)]
    newer_than: Option<i64>,
    #[serde(default)]
    users: Vec<String>,
    #[serde(default)]
    subreddits: Vec<String>,
    #[serde(default)]
    subdomains: Vec<String>,
    #[serde(default)]
    oauth_clients: Vec<String>,
    #[serde(default)]
    url: Option<String>,
}

impl FeatureTargeting {
    fn from_raw(raw: RawFeatureTargeting) -> Result<Self, ParseError> {
        let mut user_flags = HashSet::new();
        for flag in raw.user_flags {
            user_flags.insert(UserFlag::parse(&flag)?);
        }

        Ok(Self {
            user_flags,
            newer_than: raw.newer_than,
            users: raw.users.into_iter().map(|s| s.to_lowercase()).collect(),
            subreddits: raw.subreddits.into_iter().map(|s| s.to_lowercase()).collect(),
            subdomains: raw.subdomains.into_iter().map(|s| s.to_lowercase()).collect(),
            oauth_clients: raw.oauth_clients.into_iter().map(|s| s.to_lowercase()).collect(),
            url_flag: raw.url,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeatureFlagPayload {
    pub seed: Option<String>,
    pub percent_logged_in: i32,
    pub percent_logged_out: i32,
    pub targeting: FeatureTargeting,
}

#[derive(Debug, Deserialize, Default)]
struct RawFeatureFlagPayload {
    #[serde(default)]
    seed: Option<String>,
    #[serde(default)]
    percent_logged_in: i32,
    #[serde(default)]
    percent_logged_out: i32,
    #[serde(default)]
    targeting: RawFeatureTargeting,
}

impl FeatureFlagPayload {
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ParseError> {
        let raw: RawFeatureFlagPayload = serde_json::from_value(value.clone())?;
        Ok(Self {
            seed: raw.seed,
            percent_logged_in: raw.percent_logged_in,
            percent_logged_out: raw.percent_logged_out,
            targeting: FeatureTargeting::from_raw(raw.targeting)?,
        })
    }
}

/// A scalar value carried by a bucketing event field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Null,
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<Option<String>> for FieldValue {
    fn from(v: Option<String>) -> Self {
        match v {
            Some(s) => FieldValue::Str(s),
            None => FieldValue::Null,
        }
    }
}

/// A bucketing event ready to hand to an [`crate::event::EventSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub topic: String,
    pub kind: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Event {
    pub const BUCKETING_TOPIC: &'static str = "bucketing_events";
    pub const BUCKET_EVENT_TYPE: &'static str = "bucket";

    pub fn bucketing() -> Self {
        Self {
            topic: Self::BUCKETING_TOPIC.to_string(),
            kind: Self::BUCKET_EVENT_TYPE.to_string(),
            fields: BTreeMap::new(),
        }
    }

    pub fn set_field(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }
}
