//! Intermediate batch store holding analyzed articles between the
//! upstream analyzer and this service.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::{Client, Collection};
use serde_json::Value;
use tracing::info;

use super::IngestError;
use crate::config::MongoSettings;

/// Read side of the intermediate store: fetch analyzed article
/// documents by id.
#[async_trait]
pub trait AnalyzerRepository: Send + Sync {
    async fn get_batch(&self, ids: &[String]) -> Result<Vec<Value>, IngestError>;
}

/// MongoDB-backed analyzer batch store.
pub struct MongoAnalyzerRepository {
    collection: Collection<Document>,
}

impl MongoAnalyzerRepository {
    pub async fn connect(settings: &MongoSettings) -> Result<Self, IngestError> {
        let uri = format!("mongodb://{}:{}", settings.host, settings.port);
        let client = Client::with_uri_str(&uri)
            .await
            .map_err(|e| IngestError::Analyzer(format!("failed to connect: {e}")))?;
        info!(
            "connected to analyzer store, host {}, port {}",
            settings.host, settings.port
        );

        let collection = client
            .database(&settings.database)
            .collection(&settings.collection);
        Ok(Self { collection })
    }
}

#[async_trait]
impl AnalyzerRepository for MongoAnalyzerRepository {
    async fn get_batch(&self, ids: &[String]) -> Result<Vec<Value>, IngestError> {
        let cursor = self
            .collection
            .find(doc! { "_id": { "$in": ids.to_vec() } })
            .await
            .map_err(|e| IngestError::Analyzer(e.to_string()))?;

        let documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| IngestError::Analyzer(e.to_string()))?;

        documents
            .into_iter()
            .map(|document| {
                serde_json::to_value(&document)
                    .map_err(|e| IngestError::Analyzer(format!("unserializable document: {e}")))
            })
            .collect()
    }
}

/// In-memory analyzer store for tests.
#[derive(Clone, Default)]
pub struct MockAnalyzerRepository {
    documents: Arc<RwLock<HashMap<String, Value>>>,
}

impl MockAnalyzerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(self, documents: Vec<(&str, Value)>) -> Self {
        {
            let mut map = self.documents.write().unwrap();
            for (id, document) in documents {
                map.insert(id.to_string(), document);
            }
        }
        self
    }
}

#[async_trait]
impl AnalyzerRepository for MockAnalyzerRepository {
    async fn get_batch(&self, ids: &[String]) -> Result<Vec<Value>, IngestError> {
        let map = self.documents.read().unwrap();
        Ok(ids.iter().filter_map(|id| map.get(id).cloned()).collect())
    }
}
