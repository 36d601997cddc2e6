//! Trait seams and error taxonomy for the search pipeline.

use async_trait::async_trait;
use serde_json::Value;

use super::compiler::CompiledSearch;

/// Errors crossing the search seams.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The embedder could not encode the query text.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Connection reset, timeout; the store may recover and clients retry.
    #[error("store unavailable: {0}")]
    StoreTransient(String),

    /// The store answered with something outside its contract
    /// (a hit with no id, a mapping conflict). A programming error.
    #[error("store contract violation: {0}")]
    StoreContract(String),

    /// Index assertion failed with anything other than "already
    /// exists". Fatal during startup.
    #[error("store startup failure: {0}")]
    Startup(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;

/// One page of raw backend hits plus the total match count.
///
/// Each hit is the store's own hit object: `_id`, `_score` and the
/// (possibly projection-filtered) `_source`.
#[derive(Debug, Clone, Default)]
pub struct HitPage {
    pub hits: Vec<Value>,
    pub total: u64,
}

/// Opaque text encoder producing vectors of a fixed dimension.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Encode one text. CPU-bound implementations must offload so the
    /// request task is not stalled.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Vector dimension produced by this encoder.
    fn dimensions(&self) -> usize;
}

/// A single insert-or-replace destined for a bulk write.
#[derive(Debug, Clone)]
pub struct BulkAction {
    pub id: String,
    pub document: Value,
}

/// Outcome of a bulk write. Per-document failures are logged by the
/// store and reported here; the batch as a whole still succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct BulkSummary {
    pub stored: usize,
    pub failed: usize,
}

/// Executes compiled descriptors against the document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run one compiled search against `index`.
    async fn search(&self, index: &str, request: &CompiledSearch) -> Result<HitPage>;

    /// Insert-or-replace a batch of documents keyed by their action id.
    async fn bulk_upsert(&self, index: &str, actions: Vec<BulkAction>) -> Result<BulkSummary>;

    /// Create `index` with `mappings` if it does not exist yet; a
    /// no-op when it already does.
    async fn assert_index(&self, index: &str, mappings: Value) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both seams stay object-safe so binaries can box them.
    fn _assert_embedder_object_safe(_: &dyn Embedder) {}
    fn _assert_store_object_safe(_: &dyn DocumentStore) {}

    #[test]
    fn transient_errors_render_cause() {
        let err = SearchError::StoreTransient("connection reset".to_string());
        assert_eq!(err.to_string(), "store unavailable: connection reset");
    }
}
