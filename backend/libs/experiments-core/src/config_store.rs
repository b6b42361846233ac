//! Wraps the external config source (the file watcher is out of
//! scope for this crate) behind an immutable, atomically-swapped
//! snapshot, and classifies lookup failures.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::model::{ExperimentRecord, FeatureFlagRecord};

/// The decoded top-level config object: experiment/feature-flag name
/// to raw JSON record.
pub type Snapshot = Map<String, Value>;

/// Narrow interface onto whatever produces decoded JSON snapshots —
/// a file watcher in production, a static fixture in tests.
pub trait ConfigSource: Send + Sync {
    fn snapshot(&self) -> Result<Arc<Snapshot>, ConfigError>;
}

/// Holds the current parsed snapshot for the process and exposes
/// lookups by experiment name. I/O is isolated to [`ConfigStore::reload`];
/// [`ConfigStore::get`] never blocks.
pub struct ConfigStore {
    current: ArcSwap<Option<Arc<Snapshot>>>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(None),
        }
    }

    /// Re-fetch the snapshot from `source` and atomically swap it in.
    /// The embedding service's file-watch task calls this on change
    /// notification; evaluators never see a half-updated map.
    pub fn reload(&self, source: &dyn ConfigSource) -> Result<(), ConfigError> {
        let snapshot = source.snapshot()?;
        self.current.store(Arc::new(Some(snapshot)));
        Ok(())
    }

    /// Look up a record by name, distinguishing source unavailability,
    /// name absence, and an unusable record shape.
    pub fn get(&self, name: &str) -> Result<ExperimentRecord, ConfigError> {
        let guard = self.current.load();
        let snapshot = guard
            .as_ref()
            .as_ref()
            .ok_or(ConfigError::Unavailable)?;

        let raw = snapshot
            .get(name)
            .ok_or_else(|| ConfigError::NotFound(name.to_string()))?;

        serde_json::from_value(raw.clone())
            .map_err(|_| ConfigError::BadConfigShape(name.to_string()))
    }

    /// Look up a feature-flag record by name. Feature flags live in the
    /// same top-level config namespace as experiments but decode to a
    /// distinct shape (`feature` payload instead of `experiment`, no
    /// `expires`/`enabled`), so this is a separate accessor rather than
    /// a variant of [`Self::get`].
    pub fn get_feature_flag(&self, name: &str) -> Result<FeatureFlagRecord, ConfigError> {
        let guard = self.current.load();
        let snapshot = guard
            .as_ref()
            .as_ref()
            .ok_or(ConfigError::Unavailable)?;

        let raw = snapshot
            .get(name)
            .ok_or_else(|| ConfigError::NotFound(name.to_string()))?;

        serde_json::from_value(raw.clone())
            .map_err(|_| ConfigError::BadConfigShape(name.to_string()))
    }
}
