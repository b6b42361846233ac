//! Per-request façade: resolves a record from the [`ConfigStore`],
//! builds a provider, memoizes by `(name, subject)`, and enforces
//! at-most-once bucketing-event emission for the lifetime of the
//! client.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::config_store::ConfigStore;
use crate::error::Error;
use crate::event::EventSink;
use crate::model::{Event, FieldValue};
use crate::parser;
use crate::subject::Subject;

struct PendingEvent {
    id: Option<String>,
    event: Event,
}

/// Per-request experiment/feature-flag evaluator. Construct one per
/// request (or per batch of evaluations sharing a de-duplication
/// scope) and drop it at the end; there is no cross-request state.
pub struct ExperimentsClient {
    config: Arc<ConfigStore>,
    sink: Option<Arc<dyn EventSink>>,
    logged: HashSet<String>,
    memo: HashMap<String, Option<String>>,
    pending: Vec<PendingEvent>,
    span: Option<tracing::Span>,
}

impl ExperimentsClient {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self {
            config,
            sink: None,
            logged: HashSet::new(),
            memo: HashMap::new(),
            pending: Vec::new(),
            span: None,
        }
    }

    pub fn with_sink(config: Arc<ConfigStore>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::new(config)
        }
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Evaluate `name` for `subject`. Pure computation, no I/O: a
    /// qualifying bucketing event is queued internally rather than
    /// sent, matching the concurrency model's "no I/O during
    /// evaluation" invariant. Call [`Self::flush`] (or
    /// [`Self::variant_and_log`]) to actually hand queued events to
    /// the sink.
    pub fn variant(
        &mut self,
        name: &str,
        subject: &Subject,
        bucketing_event_override: Option<bool>,
        extra_event_fields: Option<BTreeMap<String, FieldValue>>,
    ) -> Result<Option<String>, Error> {
        let cache_key = format!("{name}\u{0}{}", subject.cache_fingerprint());
        if let Some(cached) = self.memo.get(&cache_key) {
            return Ok(cached.clone());
        }

        let record = match self.config.get(name) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(experiment_name = name, %err, "could not resolve experiment config");
                self.memo.insert(cache_key, None);
                return Ok(None);
            }
        };

        let now = chrono::Utc::now().timestamp();
        let provider = parser::parse_experiment(&record, now)?;
        let value = provider.variant(subject)?;

        let mut do_log = value.is_some() && provider.should_log_bucketing();
        let event_id = provider.bucketing_event_id(subject);
        if let Some(id) = &event_id {
            if self.logged.contains(id) {
                do_log = false;
            }
        }
        // Overrides the decision unconditionally, including forcing a
        // log for a provider that never logs on its own.
        if let Some(forced) = bucketing_event_override {
            do_log = forced;
        }

        if do_log {
            let mut event = Event::bucketing();
            if let Some(extra) = extra_event_fields {
                for (field, field_value) in extra {
                    event.set_field(field, field_value);
                }
            }
            // Inserted last so a caller's extras can never shadow them.
            event.set_field("variant", value.clone());
            event.set_field("experiment_id", record.integer_id().unwrap_or_default());
            event.set_field("experiment_name", record.name.clone());
            event.set_field("owner", record.owner.clone());
            self.pending.push(PendingEvent { id: event_id, event });
        }

        self.memo.insert(cache_key, value.clone());
        Ok(value)
    }

    /// Hand every event queued since the last flush to the configured
    /// sink, recording each dedup id only on a successful enqueue. A
    /// client with no sink just drops the queue.
    pub async fn flush(&mut self) {
        let Some(sink) = self.sink.clone() else {
            self.pending.clear();
            return;
        };

        for pending in self.pending.drain(..) {
            match sink.put(pending.event).await {
                Ok(()) => {
                    if let Some(id) = pending.id {
                        self.logged.insert(id);
                    }
                }
                Err(err) => {
                    if let Some(span) = &self.span {
                        span.record("error.kind", tracing::field::display(&err));
                    }
                    tracing::error!(%err, "failed to enqueue bucketing event");
                }
            }
        }
    }

    /// Whether the named feature flag is enabled for `subject`.
    ///
    /// Feature flags (`BasicFeatureFlag` and the globally-on/off
    /// specializations) never log a bucketing event, so this is a pure
    /// lookup with no `EventSink` interaction — unlike [`Self::variant`]
    /// there is nothing to [`Self::flush`] afterward. Resolved the same
    /// way as `variant`: unavailable/missing/malformed config is
    /// treated as disabled rather than propagated.
    pub fn enabled(&mut self, name: &str, subject: &Subject) -> Result<bool, Error> {
        let cache_key = format!("ff\u{0}{name}\u{0}{}", subject.cache_fingerprint());
        if let Some(cached) = self.memo.get(&cache_key) {
            return Ok(cached.is_some());
        }

        let record = match self.config.get_feature_flag(name) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(feature_name = name, %err, "could not resolve feature flag config");
                self.memo.insert(cache_key, None);
                return Ok(false);
            }
        };

        let provider = parser::parse_feature_flag(&record)?;
        let value = provider.variant(subject)?;
        self.memo.insert(cache_key, value.clone());
        Ok(value.is_some())
    }

    /// Evaluate and immediately flush — the convenience entry point
    /// for callers already inside an async context.
    pub async fn variant_and_log(
        &mut self,
        name: &str,
        subject: &Subject,
        bucketing_event_override: Option<bool>,
        extra_event_fields: Option<BTreeMap<String, FieldValue>>,
    ) -> Result<Option<String>, Error> {
        let value = self.variant(name, subject, bucketing_event_override, extra_event_fields)?;
        self.flush().await;
        Ok(value)
    }
}
