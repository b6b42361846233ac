//! Turns a decoded [`ExperimentRecord`] / [`FeatureFlagRecord`] into a
//! [`Provider`], honoring `global_override`, `enabled`, `expires`, and
//! `type` in the precedence order the original config format relies
//! on.

use crate::error::{Error, ParseError};
use crate::model::{ExperimentRecord, FeatureFlagPayload, FeatureFlagRecord, LegacyPayload, R2Payload};
use crate::providers::Provider;

/// Current UTC time in epoch seconds. Exposed as a parameter rather
/// than calling a clock internally so tests can pin "now" exactly,
/// the same reason Nova's `resilience::circuit_breaker` takes
/// `Instant` values instead of reading the clock inline in tests.
pub fn parse_experiment(record: &ExperimentRecord, now_utc_seconds: i64) -> Result<Provider, Error> {
    let id = record.integer_id()?;

    if record.expires <= now_utc_seconds {
        tracing::warn!(
            experiment_id = id,
            experiment_name = %record.name,
            owner = ?record.owner,
            "experiment expired; forcing null variant"
        );
        return Ok(Provider::Forced(None));
    }

    if !record.enabled {
        tracing::warn!(
            experiment_id = id,
            experiment_name = %record.name,
            owner = ?record.owner,
            "experiment disabled; forcing null variant"
        );
        return Ok(Provider::Forced(None));
    }

    if let Some(override_value) = &record.global_override {
        tracing::warn!(
            experiment_id = id,
            experiment_name = %record.name,
            owner = ?record.owner,
            override_value = ?override_value,
            "experiment has a global override configured"
        );
        return Ok(Provider::Forced(override_value.clone()));
    }

    match record.kind.as_str() {
        "r2" => {
            let payload = R2Payload::from_json(&record.experiment)?;
            Ok(Provider::R2 {
                name: record.name.clone(),
                payload,
            })
        }
        "feature_flag" => {
            let payload = R2Payload::from_json(&record.experiment)?;
            let allowed: Vec<&String> = payload
                .variants
                .keys()
                .filter(|k| k.as_str() != "active")
                .collect();
            if !allowed.is_empty() {
                return Err(Error::InvalidConfig(ParseError::InvalidFeatureFlagVariants(
                    payload.variants.keys().cloned().collect(),
                )));
            }
            Ok(Provider::FeatureFlag {
                name: record.name.clone(),
                payload,
            })
        }
        "legacy" => {
            let payload = LegacyPayload::from_json(&record.name, &record.experiment)?;
            Ok(Provider::Legacy {
                name: record.name.clone(),
                payload,
            })
        }
        other => {
            tracing::warn!(
                experiment_id = id,
                experiment_name = %record.name,
                owner = ?record.owner,
                experiment_type = other,
                "unknown experiment type; forcing null variant"
            );
            Ok(Provider::Forced(None))
        }
    }
}

/// Parse a top-level feature-flag record (the sibling config
/// namespace next to experiments).
pub fn parse_feature_flag(record: &FeatureFlagRecord) -> Result<Provider, Error> {
    match record.global_override.as_deref() {
        Some("on") => {
            tracing::warn!(feature_name = %record.name, owner = ?record.owner, "feature flag globally enabled");
            return Ok(Provider::GloballyOn);
        }
        Some("off") => {
            tracing::warn!(feature_name = %record.name, owner = ?record.owner, "feature flag globally disabled");
            return Ok(Provider::GloballyOff);
        }
        _ => {}
    }

    match record.kind.as_str() {
        "basic" => {
            let payload = FeatureFlagPayload::from_json(&record.feature)?;
            Ok(Provider::BasicFf {
                name: record.name.clone(),
                payload,
            })
        }
        other => {
            tracing::warn!(
                feature_name = %record.name,
                owner = ?record.owner,
                feature_type = other,
                "unknown feature flag type; defaulting to globally disabled"
            );
            Ok(Provider::GloballyOff)
        }
    }
}
