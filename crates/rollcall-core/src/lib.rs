//! rollcall-core — Face embedding pipeline and similarity index.
//!
//! Turns an RGB photograph into a 512-dimensional embedding through an
//! injected [`FaceEngine`] (detect, align, embed), and answers "who is this"
//! against an in-memory gallery with cosine similarity.

pub mod aligner;
pub mod codec;
pub mod engine;
pub mod extractor;
pub mod locator;
pub mod pipeline;
pub mod service;
pub mod sink;
pub mod store;
pub mod tensor;
pub mod types;

pub use engine::{EngineError, FaceEngine};
pub use pipeline::{EmbeddingPipeline, PipelineError};
pub use service::{Enrollment, FaceService, ServiceError};
pub use sink::{EnrollmentSink, SinkDispatcher, SinkError};
pub use store::{EmbeddingStore, SimilarityIndex, StoreError};
pub use tensor::{Tensor, TensorError};
pub use types::{
    BoundingBox, Detection, DimensionMismatch, Embedding, LandmarkSet, MatchResult, EMBEDDING_DIM,
};
