//! In-memory enrollment gallery and nearest-identity search.

use crate::types::{cosine_similarity, DimensionMismatch, MatchResult, EMBEDDING_DIM};
use parking_lot::RwLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error(transparent)]
    Dimension(#[from] DimensionMismatch),
    #[error("enrollment label must not be empty")]
    EmptyLabel,
}

/// One enrolled vector and the identity it belongs to.
struct EnrollmentRecord {
    label: String,
    vector: Vec<f32>,
}

/// Strategy for storing enrolled vectors and answering "most similar" queries.
///
/// [`EmbeddingStore`] is the linear-scan implementation; an approximate index
/// can stand in behind the same two operations.
pub trait SimilarityIndex: Send + Sync {
    /// Append a record. The vector length and a non-empty label are validated.
    fn add(&self, vector: &[f32], label: &str) -> Result<(), StoreError>;

    /// Label and score of the best-scoring record, or [`MatchResult::no_match`]
    /// when nothing is enrolled.
    fn find_most_similar(&self, query: &[f32]) -> Result<MatchResult, StoreError>;
}

/// Gallery of enrollment records behind a single reader/writer lock.
///
/// Several records may share a label. Appends are atomic with respect to
/// queries, and queries run in parallel with each other.
pub struct EmbeddingStore {
    dimension: usize,
    records: RwLock<Vec<EnrollmentRecord>>,
}

impl Default for EmbeddingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingStore {
    /// Empty store for [`EMBEDDING_DIM`]-length vectors.
    pub fn new() -> Self {
        Self::with_dimension(EMBEDDING_DIM)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Append a record. Empty labels are refused so they can never be
    /// mistaken for [`MatchResult::no_match`].
    pub fn add(&self, vector: &[f32], label: &str) -> Result<(), StoreError> {
        DimensionMismatch::check(self.dimension, vector.len())?;
        if label.is_empty() {
            return Err(StoreError::EmptyLabel);
        }
        let record = EnrollmentRecord {
            label: label.to_string(),
            vector: vector.to_vec(),
        };
        self.records.write().push(record);
        Ok(())
    }

    /// Linear scan with cosine similarity.
    ///
    /// Every record is scored. The first record reaching the maximum wins ties.
    pub fn find_most_similar(&self, query: &[f32]) -> Result<MatchResult, StoreError> {
        DimensionMismatch::check(self.dimension, query.len())?;

        let records = self.records.read();
        let mut best_score = f32::NEG_INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, record) in records.iter().enumerate() {
            let score = cosine_similarity(query, &record.vector);
            if score > best_score {
                best_score = score;
                best_idx = Some(i);
            }
        }

        Ok(match best_idx {
            Some(idx) => MatchResult {
                label: records[idx].label.clone(),
                score: best_score,
            },
            None => MatchResult::no_match(),
        })
    }

    /// Remove every record carrying `label`; returns how many were dropped.
    pub fn remove(&self, label: &str) -> usize {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| r.label != label);
        before - records.len()
    }

    /// Distinct labels in first-enrolled order.
    pub fn labels(&self) -> Vec<String> {
        let records = self.records.read();
        let mut labels: Vec<String> = Vec::new();
        for r in records.iter() {
            if !labels.contains(&r.label) {
                labels.push(r.label.clone());
            }
        }
        labels
    }
}

impl SimilarityIndex for EmbeddingStore {
    fn add(&self, vector: &[f32], label: &str) -> Result<(), StoreError> {
        EmbeddingStore::add(self, vector, label)
    }

    fn find_most_similar(&self, query: &[f32]) -> Result<MatchResult, StoreError> {
        EmbeddingStore::find_most_similar(self, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Embedding;
    use rand::{Rng, SeedableRng};

    fn unit(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[i] = 1.0;
        v
    }

    fn random_vec(rng: &mut impl Rng) -> Vec<f32> {
        (0..EMBEDDING_DIM).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    #[test]
    fn test_empty_store_returns_sentinel() {
        let store = EmbeddingStore::new();
        let result = store.find_most_similar(&unit(0)).unwrap();
        assert!(result.is_no_match());
        assert_eq!(result.label, "");
        assert_eq!(result.score, -1.0);
    }

    #[test]
    fn test_exact_vector_scores_one() {
        let store = EmbeddingStore::new();
        let v = unit(5);
        store.add(&v, "alice").unwrap();
        store.add(&v, "alice").unwrap();
        store.add(&unit(6), "bob").unwrap();

        let result = store.find_most_similar(&v).unwrap();
        assert_eq!(result.label, "alice");
        assert!((result.score - 1.0).abs() < 1e-6);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_best_record_across_shared_labels() {
        let store = EmbeddingStore::new();
        let mut near = unit(0);
        near[1] = 0.1;
        store.add(&unit(2), "alice").unwrap();
        store.add(&near, "alice").unwrap();
        store.add(&unit(1), "bob").unwrap();

        let result = store.find_most_similar(&unit(0)).unwrap();
        assert_eq!(result.label, "alice");
        assert!(result.score > 0.99);
    }

    #[test]
    fn test_tie_break_first_wins() {
        let store = EmbeddingStore::new();
        store.add(&unit(0), "first").unwrap();
        store.add(&unit(0), "second").unwrap();
        assert_eq!(store.find_most_similar(&unit(0)).unwrap().label, "first");
    }

    #[test]
    fn test_all_negative_scores_still_match() {
        let store = EmbeddingStore::new();
        let neg: Vec<f32> = unit(0).iter().map(|v| -v).collect();
        store.add(&neg, "opposite").unwrap();
        let result = store.find_most_similar(&unit(0)).unwrap();
        assert_eq!(result.label, "opposite");
        assert!((result.score + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_scale_invariance() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let store = EmbeddingStore::new();
        for i in 0..20 {
            store.add(&random_vec(&mut rng), &format!("p{i}")).unwrap();
        }

        for _ in 0..10 {
            let q = random_vec(&mut rng);
            let k: f32 = rng.gen_range(0.01..100.0);
            let scaled: Vec<f32> = q.iter().map(|v| v * k).collect();

            let a = store.find_most_similar(&q).unwrap();
            let b = store.find_most_similar(&scaled).unwrap();
            assert_eq!(a.label, b.label);
            assert!((a.score - b.score).abs() < 1e-4, "{} vs {}", a.score, b.score);
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let store = EmbeddingStore::new();
        assert_eq!(store.dimension(), EMBEDDING_DIM);
        let err = store.add(&[1.0; 511], "x").unwrap_err();
        assert_eq!(err, StoreError::Dimension(DimensionMismatch { expected: 512, actual: 511 }));
        assert!(store.is_empty());

        store.add(&unit(0), "x").unwrap();
        assert!(store.find_most_similar(&[1.0; 513]).is_err());
        assert!(store.find_most_similar(&[]).is_err());
    }

    #[test]
    fn test_accepts_embedding_via_deref() {
        let store = EmbeddingStore::new();
        let e = Embedding::try_from(unit(9)).unwrap();
        store.add(&e, "carol").unwrap();
        assert_eq!(store.find_most_similar(&e).unwrap().label, "carol");
    }

    #[test]
    fn test_empty_label_rejected() {
        let store = EmbeddingStore::new();
        let opposite: Vec<f32> = unit(0).iter().map(|v| -v).collect();
        assert_eq!(store.add(&opposite, ""), Err(StoreError::EmptyLabel));
        assert!(store.is_empty());

        // A real record scoring -1.0 is still a match, not the sentinel.
        store.add(&opposite, "opposite").unwrap();
        let result = store.find_most_similar(&unit(0)).unwrap();
        assert!(!result.is_no_match());
        assert_eq!(result.label, "opposite");
    }

    #[test]
    fn test_remove_and_labels() {
        let store = EmbeddingStore::new();
        store.add(&unit(0), "alice").unwrap();
        store.add(&unit(1), "bob").unwrap();
        store.add(&unit(2), "alice").unwrap();
        assert_eq!(store.labels(), vec!["alice".to_string(), "bob".to_string()]);

        assert_eq!(store.remove("alice"), 2);
        assert_eq!(store.remove("alice"), 0);
        assert_eq!(store.len(), 1);
        assert_eq!(store.find_most_similar(&unit(0)).unwrap().label, "bob");
    }

    #[test]
    fn test_custom_dimension_via_trait_object() {
        let concrete = EmbeddingStore::with_dimension(3);
        assert_eq!(concrete.dimension(), 3);
        let store: Box<dyn SimilarityIndex> = Box::new(concrete);
        store.add(&[1.0, 0.0, 0.0], "a").unwrap();
        store.add(&[0.0, 1.0, 0.0], "b").unwrap();
        let result = store.find_most_similar(&[0.1, 0.9, 0.0]).unwrap();
        assert_eq!(result.label, "b");
    }
}
