//! Optional durable sink for enrolled vectors.
//!
//! Delivery is fire-and-forget: each record is handed to the sink at most
//! once, on a detached task, and the enrolling caller never learns the
//! outcome. Failures end in a `warn` log line; nothing is retried here.

use crate::types::Embedding;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),
    #[error("sink rejected record: {0}")]
    Rejected(String),
}

/// Accepts (identity, vector, display name) triples, e.g. a vector database.
#[async_trait]
pub trait EnrollmentSink: Send + Sync {
    async fn store(
        &self,
        identity: &str,
        embedding: &Embedding,
        name: &str,
    ) -> Result<(), SinkError>;
}

/// Spawns sink deliveries onto a tokio runtime without waiting for them.
#[derive(Clone)]
pub struct SinkDispatcher {
    sink: Arc<dyn EnrollmentSink>,
    runtime: Handle,
}

impl SinkDispatcher {
    pub fn new(sink: Arc<dyn EnrollmentSink>, runtime: Handle) -> Self {
        Self { sink, runtime }
    }

    /// Dispatcher bound to the runtime of the calling context.
    pub fn on_current_runtime(
        sink: Arc<dyn EnrollmentSink>,
    ) -> Result<Self, tokio::runtime::TryCurrentError> {
        Ok(Self::new(sink, Handle::try_current()?))
    }

    /// Hand one record to the sink on a detached task.
    ///
    /// Returns immediately. The handle resolves once the attempt is over and
    /// carries no outcome; dropping it leaves the task running.
    pub fn dispatch(&self, identity: &str, embedding: Embedding, name: &str) -> JoinHandle<()> {
        let sink = Arc::clone(&self.sink);
        let identity = identity.to_string();
        let name = name.to_string();

        self.runtime.spawn(async move {
            match sink.store(&identity, &embedding, &name).await {
                Ok(()) => tracing::debug!(identity = %identity, "enrollment delivered to sink"),
                Err(err) => tracing::warn!(
                    identity = %identity,
                    error = %err,
                    "enrollment sink failed; record kept in memory only"
                ),
            }
        })
    }
}
