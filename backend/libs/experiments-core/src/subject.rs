//! The request-scoped parameter bag passed into provider evaluation.
//!
//! Providers take a loosely-typed set of named attributes keyed by
//! string; this bag makes lookups typed and handles case-insensitivity
//! in one place instead of re-deriving it at every call site.

use std::collections::HashMap;

/// A single subject attribute value. Scalars are lifted to a
/// one-element list on demand by [`Subject::values`], so callers can
/// insert either a bare scalar or a list under the same key and every
/// targeting clause can iterate it uniformly.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Bool(bool),
    Int(i64),
    List(Vec<Value>),
}

impl Value {
    /// Lower-cased string form, if this value is (or reduces to) a string.
    pub fn as_lower_str(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.to_lowercase()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Case-insensitive bag of request-scoped evaluation parameters.
///
/// Keys are normalized to lower-case on insertion so provider configs
/// (whose keys are lower-cased at parse time) never need to
/// re-normalize at evaluation time.
#[derive(Debug, Clone, Default)]
pub struct Subject(HashMap<String, Value>);

impl Subject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.as_ref().to_lowercase(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(&key.to_lowercase())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(&key.to_lowercase())
    }

    /// Values for `key`, lifting a bare scalar into a one-element list.
    pub fn values(&self, key: &str) -> Vec<&Value> {
        match self.get(key) {
            Some(Value::List(items)) => items.iter().collect(),
            Some(v) => vec![v],
            None => Vec::new(),
        }
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    /// A cache key fragment for `ExperimentsClient`'s per-request
    /// memoization: a stable textual rendering of all entries, sorted
    /// by key.
    pub fn cache_fingerprint(&self) -> String {
        let mut entries: Vec<(&String, &Value)> = self.0.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let mut out = String::new();
        for (k, v) in entries {
            out.push_str(k);
            out.push('=');
            out.push_str(&format!("{:?}", v));
            out.push(';');
        }
        out
    }
}

/// Fluent construction, mirroring the `.with_x(..).build()` builder
/// ergonomics used elsewhere in Nova's `libs/` crates (e.g.
/// `grpc-health::HealthManagerBuilder`).
#[derive(Debug, Clone, Default)]
pub struct SubjectBuilder(Subject);

impl SubjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<Value>) -> Self {
        self.0.insert(key, value);
        self
    }

    pub fn build(self) -> Subject {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_case_insensitive() {
        let mut s = Subject::new();
        s.insert("User_ID", "t2_1");
        assert_eq!(s.get_str("user_id").as_deref(), Some("t2_1"));
        assert_eq!(s.get_str("USER_ID").as_deref(), Some("t2_1"));
    }

    #[test]
    fn scalar_lifts_to_single_element_list() {
        let mut s = Subject::new();
        s.insert("oauth_client", "ios-app");
        assert_eq!(s.values("oauth_client"), vec![&Value::Str("ios-app".into())]);
    }

    #[test]
    fn builder_round_trips() {
        let s = SubjectBuilder::new()
            .with("user_id", "t2_1")
            .with("logged_in", true)
            .build();
        assert_eq!(s.get_bool("logged_in"), Some(true));
    }

    #[test]
    fn fingerprint_is_order_independent() {
        let mut a = Subject::new();
        a.insert("b", "2").insert("a", "1");
        let mut b = Subject::new();
        b.insert("a", "1").insert("b", "2");
        assert_eq!(a.cache_fingerprint(), b.cache_fingerprint());
    }
}
