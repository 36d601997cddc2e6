//! Mock embedder for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::search::traits::{Embedder, Result};

/// Mock embedder returning configurable vectors and counting calls.
#[derive(Clone)]
pub struct MockEmbedder {
    responses: Arc<Vec<Vec<f32>>>,
    call_count: Arc<AtomicUsize>,
    dimensions: usize,
}

impl MockEmbedder {
    /// Always return the same vector.
    pub fn returning(vector: Vec<f32>) -> Self {
        let dimensions = vector.len();
        Self {
            responses: Arc::new(vec![vector]),
            call_count: Arc::new(AtomicUsize::new(0)),
            dimensions,
        }
    }

    /// Number of times `embed` was called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::returning(vec![0.0; 384])
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        let index = self.call_count.fetch_add(1, Ordering::SeqCst);
        let response_index = index % self.responses.len();
        Ok(self.responses[response_index].clone())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_fixed_vector_and_counts_calls() {
        let embedder = MockEmbedder::returning(vec![1.0, 2.0]);

        assert_eq!(embedder.call_count(), 0);
        assert_eq!(embedder.embed("a").await.unwrap(), vec![1.0, 2.0]);
        assert_eq!(embedder.embed("b").await.unwrap(), vec![1.0, 2.0]);
        assert_eq!(embedder.call_count(), 2);
        assert_eq!(embedder.dimensions(), 2);
    }
}
