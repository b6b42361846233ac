//! Error taxonomy for the experiments core, mirroring the shape of
//! Nova's `error-handling` crate: a small enum per failure domain plus
//! `From` impls at the one real parsing boundary.

use thiserror::Error;

/// Errors that can escape [`crate::client::ExperimentsClient::variant`].
///
/// Every other failure mode (config unavailable, name not found, bad
/// shape, unknown experiment type, stray URL variant, event enqueue
/// failure) is caught internally and logged instead of propagated.
#[derive(Debug, Error)]
pub enum Error {
    #[error("experiment {experiment} requires bucket key {key:?} in request parameters")]
    MissingBucketKey { experiment: String, key: String },

    #[error("invalid experiment config: {0}")]
    InvalidConfig(#[from] ParseError),
}

/// Failures while turning a decoded [`crate::model::ExperimentRecord`]
/// into a [`crate::providers::Provider`].
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("id must be an integer")]
    NonIntegerId,

    #[error("feature flag experiment declares variants other than 'active': {0:?}")]
    InvalidFeatureFlagVariants(Vec<String>),

    #[error("user flag {0:?} is not one of admin/sponsor/employee/beta/gold")]
    InvalidUserFlag(String),

    #[error("legacy experiment has unknown type {0:?}")]
    InvalidLegacyType(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Classification of why [`crate::config_store::ConfigStore::get`]
/// could not produce a usable record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("experiment config source unavailable")]
    Unavailable,

    #[error("experiment {0:?} not found")]
    NotFound(String),

    #[error("experiment config for {0:?} has an invalid shape")]
    BadConfigShape(String),
}

/// The only observable contract of the external event-queue transport.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EventSinkError {
    #[error("event too large for queue")]
    TooLarge,
    #[error("event queue is full")]
    QueueFull,
}
