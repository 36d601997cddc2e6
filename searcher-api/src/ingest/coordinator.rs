//! Turns one "batch ready" notification into a bulk write.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use super::analyzer::AnalyzerRepository;
use super::IngestError;
use crate::search::{BulkAction, DocumentStore, ARTICLES_INDEX};

/// Callback invoked by the stream consumer for each notification.
///
/// Implementations must be idempotent: delivery is at-least-once.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, article_ids: Vec<String>) -> Result<(), IngestError>;
}

/// Fetches an analyzed batch and upserts it into the articles index.
pub struct IngestCoordinator<A, S>
where
    A: AnalyzerRepository,
    S: DocumentStore,
{
    analyzer: A,
    store: S,
}

impl<A, S> IngestCoordinator<A, S>
where
    A: AnalyzerRepository,
    S: DocumentStore,
{
    pub fn new(analyzer: A, store: S) -> Self {
        Self { analyzer, store }
    }
}

#[async_trait]
impl<A, S> NotificationHandler for IngestCoordinator<A, S>
where
    A: AnalyzerRepository,
    S: DocumentStore,
{
    async fn handle(&self, article_ids: Vec<String>) -> Result<(), IngestError> {
        let documents = self.analyzer.get_batch(&article_ids).await?;
        if documents.is_empty() {
            // nothing to do; the message still gets acknowledged
            warn!("no documents found in analyzer batch");
            return Ok(());
        }

        let actions: Vec<BulkAction> = documents
            .into_iter()
            .filter_map(|document| match article_id(&document) {
                Some(id) => Some(BulkAction { id, document }),
                None => {
                    warn!("analyzer document has no article id, skipping");
                    None
                }
            })
            .collect();

        let summary = self.store.bulk_upsert(ARTICLES_INDEX, actions).await?;
        info!(
            stored = summary.stored,
            failed = summary.failed,
            "stored analyzer batch"
        );
        Ok(())
    }
}

/// Bulk writes key on the upstream article id, making replays converge
/// on the same index state.
fn article_id(document: &Value) -> Option<String> {
    document
        .get("article")
        .and_then(|article| article.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::MockAnalyzerRepository;
    use crate::search::repository::MockDocumentStore;
    use serde_json::json;

    fn analyzed(id: &str, title: &str) -> Value {
        json!({
            "article": {"id": id, "title": [title]},
            "analyzer": {"entities": []},
        })
    }

    #[tokio::test]
    async fn empty_fetch_is_acknowledged_without_writes() {
        let analyzer = MockAnalyzerRepository::new();
        let store = MockDocumentStore::new();
        let coordinator = IngestCoordinator::new(analyzer, store.clone());

        coordinator
            .handle(vec!["missing".to_string()])
            .await
            .unwrap();
        assert_eq!(store.document_count(ARTICLES_INDEX), 0);
    }

    #[tokio::test]
    async fn batch_is_upserted_keyed_by_article_id() {
        let analyzer = MockAnalyzerRepository::new()
            .with_documents(vec![("a1", analyzed("a1", "one")), ("a2", analyzed("a2", "two"))]);
        let store = MockDocumentStore::new();
        let coordinator = IngestCoordinator::new(analyzer, store.clone());

        coordinator
            .handle(vec!["a1".to_string(), "a2".to_string()])
            .await
            .unwrap();

        assert_eq!(store.document_count(ARTICLES_INDEX), 2);
        assert!(store.document(ARTICLES_INDEX, "a1").is_some());
    }

    #[tokio::test]
    async fn replaying_a_notification_is_idempotent() {
        let analyzer = MockAnalyzerRepository::new()
            .with_documents(vec![("a1", analyzed("a1", "one")), ("a2", analyzed("a2", "two"))]);
        let store = MockDocumentStore::new();
        let coordinator = IngestCoordinator::new(analyzer, store.clone());

        let ids = vec!["a1".to_string(), "a2".to_string()];
        coordinator.handle(ids.clone()).await.unwrap();
        coordinator.handle(ids).await.unwrap();

        assert_eq!(store.document_count(ARTICLES_INDEX), 2);
    }

    #[tokio::test]
    async fn documents_without_article_id_are_skipped() {
        let analyzer = MockAnalyzerRepository::new().with_documents(vec![
            ("a1", analyzed("a1", "one")),
            ("broken", json!({"analyzer": {}})),
        ]);
        let store = MockDocumentStore::new();
        let coordinator = IngestCoordinator::new(analyzer, store.clone());

        coordinator
            .handle(vec!["a1".to_string(), "broken".to_string()])
            .await
            .unwrap();
        assert_eq!(store.document_count(ARTICLES_INDEX), 1);
    }

    #[tokio::test]
    async fn per_document_bulk_failures_do_not_fail_the_batch() {
        let analyzer = MockAnalyzerRepository::new()
            .with_documents(vec![("a1", analyzed("a1", "one")), ("a2", analyzed("a2", "two"))]);
        let store = MockDocumentStore::new().failing_bulk_ids(&["a2"]);
        let coordinator = IngestCoordinator::new(analyzer, store.clone());

        coordinator
            .handle(vec!["a1".to_string(), "a2".to_string()])
            .await
            .unwrap();
        assert_eq!(store.document_count(ARTICLES_INDEX), 1);
    }
}
