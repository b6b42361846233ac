//! The outbound half of bucketing: the event shape lives in
//! [`crate::model::Event`], this module only defines the narrow
//! transport contract `ExperimentsClient` enqueues onto.

use async_trait::async_trait;

use crate::error::EventSinkError;
use crate::model::Event;

/// Whatever carries bucketing events off this process — Kafka via
/// `rdkafka` in production, a recording fake in tests. Modeled with
/// `async-trait` the same way `grpc-clients` puts async methods on
/// trait objects.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn put(&self, event: Event) -> Result<(), EventSinkError>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use super::*;

    /// Records every event handed to it; used by `client` and
    /// integration tests to assert at-most-once emission.
    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn put(&self, event: Event) -> Result<(), EventSinkError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    /// Always fails, to exercise the "enqueue failure doesn't consume
    /// the at-most-once slot" behavior.
    pub struct FailingSink {
        pub error: EventSinkError,
    }

    #[async_trait]
    impl EventSink for FailingSink {
        async fn put(&self, _event: Event) -> Result<(), EventSinkError> {
            Err(self.error)
        }
    }
}
