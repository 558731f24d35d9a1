//! Enrollment and recognition facade over pipeline, store and sink.

use crate::engine::FaceEngine;
use crate::pipeline::{EmbeddingPipeline, PipelineError};
use crate::sink::SinkDispatcher;
use crate::store::{EmbeddingStore, StoreError};
use crate::types::{Embedding, MatchResult};
use image::RgbImage;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a successful enrollment.
pub struct Enrollment {
    pub embedding: Embedding,
    /// Detached sink delivery, if a sink is configured. Awaiting it only
    /// tells the caller the attempt is over, never whether it succeeded.
    pub delivery: Option<JoinHandle<()>>,
}

/// Ties one pipeline to a shared [`EmbeddingStore`] and an optional sink.
///
/// The store is passed in so several services (or other components) can
/// share one gallery.
pub struct FaceService<E> {
    pipeline: EmbeddingPipeline<E>,
    store: Arc<EmbeddingStore>,
    sink: Option<SinkDispatcher>,
}

impl<E: FaceEngine> FaceService<E> {
    pub fn new(engine: E, store: Arc<EmbeddingStore>) -> Self {
        Self {
            pipeline: EmbeddingPipeline::new(engine),
            store,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: SinkDispatcher) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn pipeline(&self) -> &EmbeddingPipeline<E> {
        &self.pipeline
    }

    /// Zero vector when no face is found. See [`EmbeddingPipeline::generate_embedding`].
    pub fn generate_embedding(&self, image: &RgbImage) -> Result<Embedding, PipelineError> {
        self.pipeline.generate_embedding(image)
    }

    pub fn generate_embedding_from_bytes(&self, bytes: &[u8]) -> Result<Embedding, PipelineError> {
        self.pipeline.generate_embedding_from_bytes(bytes)
    }

    pub fn find_most_similar(&self, embedding: &Embedding) -> Result<MatchResult, StoreError> {
        self.store.find_most_similar(embedding)
    }

    pub fn add_embedding(&self, embedding: &Embedding, label: &str) -> Result<(), StoreError> {
        self.store.add(embedding, label)
    }

    /// Fire-and-forget delivery to the configured sink.
    ///
    /// `None` when no sink is configured. The returned handle never reports
    /// whether delivery succeeded.
    pub fn store_in_sink(
        &self,
        identity: &str,
        embedding: &Embedding,
        name: &str,
    ) -> Option<JoinHandle<()>> {
        self.sink
            .as_ref()
            .map(|sink| sink.dispatch(identity, embedding.clone(), name))
    }

    /// Enroll the face in `image` under `identity`.
    ///
    /// Returns `Ok(None)` without touching the store when no face is found.
    /// The in-memory enrollment completes before the sink is contacted, and
    /// the sink outcome never affects the result.
    pub fn enroll(
        &self,
        identity: &str,
        name: &str,
        image: &RgbImage,
    ) -> Result<Option<Enrollment>, ServiceError> {
        let Some(embedding) = self.pipeline.try_generate_embedding(image)? else {
            tracing::info!(identity, "enroll: no face found");
            return Ok(None);
        };

        self.store.add(&embedding, identity)?;
        tracing::info!(identity, enrolled = self.store.len(), "enroll: face added");

        let delivery = self.store_in_sink(identity, &embedding, name);
        Ok(Some(Enrollment { embedding, delivery }))
    }

    /// Best match for the face in `image`, or `None` when no face is found.
    pub fn identify(&self, image: &RgbImage) -> Result<Option<MatchResult>, ServiceError> {
        let Some(embedding) = self.pipeline.try_generate_embedding(image)? else {
            tracing::debug!("identify: no face found");
            return Ok(None);
        };
        let result = self.store.find_most_similar(&embedding)?;
        tracing::debug!(label = %result.label, score = result.score, "identify: best match");
        Ok(Some(result))
    }
}
