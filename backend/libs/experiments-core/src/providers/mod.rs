//! The closed set of experiment behaviors. Modeled as a tagged union
//! rather than a class hierarchy: the set of provider kinds is fixed
//! and known at compile time, so dispatch is a single `match`, not an
//! open-ended virtual call.

mod basic_feature_flag;
mod legacy;
mod r2;

use crate::error::Error;
use crate::model::{FeatureFlagPayload, LegacyPayload, R2Payload};
use crate::subject::Subject;

/// One parsed experiment or feature flag, ready to evaluate.
#[derive(Debug, Clone)]
pub enum Provider {
    /// Always returns the fixed variant (possibly absent). Used for
    /// expired experiments, disabled experiments, and global
    /// overrides. Never logs a bucketing event.
    Forced(Option<String>),
    /// Percentage-bucketed experiment with targeting and overrides.
    R2 { name: String, payload: R2Payload },
    /// Same shape as `R2`, restricted to the `active` variant at parse
    /// time, and never logs a bucketing event.
    FeatureFlag { name: String, payload: R2Payload },
    /// User/page experiment with URL-flag short circuit and content
    /// gating.
    Legacy { name: String, payload: LegacyPayload },
    /// Targeting-OR-percentage boolean feature flag.
    BasicFf { name: String, payload: FeatureFlagPayload },
    /// A feature flag forced on via `global_override: "on"`.
    GloballyOn,
    /// A feature flag forced off via `global_override: "off"`.
    GloballyOff,
}

impl Provider {
    /// Determine which variant (if any) of this experiment is active
    /// for `subject`. Feature flags (both `BasicFf` and the globally
    /// forced variants) are boolean and surface as `active` / `None`
    /// so they share the same return type as bucketed experiments.
    pub fn variant(&self, subject: &Subject) -> Result<Option<String>, Error> {
        match self {
            Provider::Forced(v) => Ok(v.clone()),
            Provider::R2 { name, payload } => r2::variant(name, payload, subject),
            Provider::FeatureFlag { name, payload } => r2::variant(name, payload, subject),
            Provider::Legacy { name, payload } => Ok(legacy::variant(name, payload, subject)),
            Provider::BasicFf { name, payload } => {
                Ok(basic_feature_flag::enabled(name, payload, subject).then(|| "active".to_string()))
            }
            Provider::GloballyOn => Ok(Some("active".to_string())),
            Provider::GloballyOff => Ok(None),
        }
    }

    /// Whether an exposure to a non-null variant should be logged to
    /// the bucketing event pipeline.
    pub fn should_log_bucketing(&self) -> bool {
        matches!(self, Provider::R2 { .. } | Provider::Legacy { .. })
    }

    /// The de-duplication key for at-most-once bucketing-event
    /// emission, if this evaluation identifies a bucketing subject.
    pub fn bucketing_event_id(&self, subject: &Subject) -> Option<String> {
        match self {
            Provider::R2 { name, payload } | Provider::FeatureFlag { name, payload } => {
                r2::bucketing_event_id(name, payload, subject)
            }
            _ => None,
        }
    }
}
