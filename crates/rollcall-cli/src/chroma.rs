//! Chroma vector-database sink.

use async_trait::async_trait;
use rollcall_core::{Embedding, EnrollmentSink, SinkError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::sync::OnceCell;

#[derive(Serialize)]
struct CreateCollection<'a> {
    name: &'a str,
    get_or_create: bool,
}

#[derive(Deserialize)]
struct Collection {
    id: String,
}

/// Pushes enrollments into one Chroma collection over its REST API.
///
/// The collection id is resolved on first use, inside the delivery task, so
/// building the sink never touches the network.
pub struct ChromaSink {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    collection_id: OnceCell<String>,
}

impl ChromaSink {
    /// Every request, including connection setup, is bounded by `timeout`.
    pub fn new(base_url: &str, collection: &str, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            collection_id: OnceCell::new(),
        })
    }

    async fn collection_id(&self) -> Result<&str, SinkError> {
        self.collection_id
            .get_or_try_init(|| self.resolve_collection())
            .await
            .map(String::as_str)
    }

    /// Get-or-create the collection by name.
    async fn resolve_collection(&self) -> Result<String, SinkError> {
        let response = self
            .client
            .post(format!("{}/collections", self.base_url))
            .json(&CreateCollection { name: &self.collection, get_or_create: true })
            .send()
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SinkError::Rejected(format!(
                "get-or-create collection {}: HTTP {}",
                self.collection,
                response.status()
            )));
        }

        let Collection { id } = response
            .json()
            .await
            .map_err(|e| SinkError::Rejected(format!("collection response: {e}")))?;

        tracing::info!(
            url = %self.base_url,
            collection = %self.collection,
            id = %id,
            "chroma collection ready"
        );
        Ok(id)
    }

    async fn post(&self, action: &str, body: &serde_json::Value) -> Result<(), SinkError> {
        let url = format!("{}/collections/{}/{action}", self.base_url, self.collection_id().await?);
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SinkError::Rejected(format!("{action}: HTTP {}", response.status())))
        }
    }

    /// Delete every record stored for `identity`.
    pub async fn remove_identity(&self, identity: &str) -> Result<(), SinkError> {
        self.post("delete", &delete_body(identity)).await
    }
}

/// Request body for a single-record add.
fn add_body(
    record_id: &str,
    identity: &str,
    embedding: &Embedding,
    name: &str,
) -> serde_json::Value {
    json!({
        "ids": [record_id],
        "embeddings": [embedding.as_slice()],
        "metadatas": [{ "person_id": identity, "name": name }],
    })
}

fn delete_body(identity: &str) -> serde_json::Value {
    json!({ "where": { "person_id": identity } })
}

#[async_trait]
impl EnrollmentSink for ChromaSink {
    async fn store(
        &self,
        identity: &str,
        embedding: &Embedding,
        name: &str,
    ) -> Result<(), SinkError> {
        // Chroma ids must be unique; one person may be enrolled from several photos.
        let record_id = format!("{identity}-{}", uuid::Uuid::new_v4());
        self.post("add", &add_body(&record_id, identity, embedding, name)).await
    }
}
