//! Local MiniLM embedder backed by the fastembed ONNX runtime.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::search::traits::{Embedder, Result, SearchError};

/// Vector dimension of all-MiniLM-L6-v2.
pub const MINILM_DIMENSIONS: usize = 384;

/// Embedder running a local sentence-transformer model.
///
/// Encoding is CPU-bound, so every call is offloaded to the blocking
/// pool; the ONNX session is shared behind a mutex.
#[derive(Clone)]
pub struct MiniLmEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl MiniLmEmbedder {
    /// Load the model from the configured directory.
    pub fn load(model_path: &Path) -> Result<Self> {
        let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_cache_dir(model_path.to_path_buf())
            .with_show_download_progress(false);

        let model = TextEmbedding::try_new(options)
            .map_err(|e| SearchError::Embedding(format!("failed to load model: {e}")))?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

#[async_trait]
impl Embedder for MiniLmEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Ok(vec![0.0; MINILM_DIMENSIONS]);
        }

        let model = Arc::clone(&self.model);
        let text = text.to_string();

        let mut vectors = tokio::task::spawn_blocking(move || {
            let guard = model
                .lock()
                .map_err(|_| "embedding model mutex poisoned".to_string())?;
            guard
                .embed(vec![text], None)
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| SearchError::Embedding(e.to_string()))?
        .map_err(SearchError::Embedding)?;

        vectors
            .pop()
            .ok_or_else(|| SearchError::Embedding("model returned no vectors".into()))
    }

    fn dimensions(&self) -> usize {
        MINILM_DIMENSIONS
    }
}
