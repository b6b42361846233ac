//! Experiment and feature-flag evaluation core shared by Nova's
//! application services.
//!
//! Given a named experiment or feature flag and a request-scoped
//! [`Subject`], an [`ExperimentsClient`] decides which variant (if
//! any) is active via [`ExperimentsClient::variant`], or whether a
//! named feature flag is on via [`ExperimentsClient::enabled`], and
//! whether a bucketing event should be emitted. Configuration is
//! supplied by an external [`ConfigSource`] (typically a file watcher,
//! out of scope here) and events are handed to an external
//! [`EventSink`] (typically Kafka).

pub mod client;
pub mod config_store;
pub mod error;
pub mod event;
mod hasher;
pub mod model;
mod parser;
mod providers;
pub mod subject;
mod variant_chooser;

pub use client::ExperimentsClient;
pub use config_store::{ConfigSource, ConfigStore, Snapshot};
pub use error::{ConfigError, Error, EventSinkError, ParseError};
pub use event::EventSink;
pub use hasher::{bucket, NUM_BUCKETS};
pub use model::{Event, ExperimentRecord, FeatureFlagRecord, FieldValue};
pub use parser::{parse_experiment, parse_feature_flag};
pub use providers::Provider;
pub use subject::{Subject, SubjectBuilder, Value};
