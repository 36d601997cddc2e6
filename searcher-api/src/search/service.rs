//! Per-request orchestration: compile, fan out, fuse, map.

use tracing::info;

use super::traits::{DocumentStore, Embedder, HitPage, Result};
use super::{compiler, fusion, mapper};
use super::{ARTICLES_INDEX, CATEGORIES_INDEX, TOPICS_INDEX, TOPIC_BATCHES_INDEX};
use crate::domain::ArticleList;
use crate::dto::{
    ArticleQuery, ArticleResults, CategoryQuery, CategoryResults, SearchType, TopicBatchQuery,
    TopicBatchResults, TopicQuery, TopicResults,
};

/// Search orchestrator over an embedder and a document store.
///
/// # Type Parameters
///
/// * `E` - Embedder used to encode semantic queries
/// * `S` - Document store executing compiled descriptors
pub struct SearchService<E, S>
where
    E: Embedder,
    S: DocumentStore,
{
    embedder: E,
    store: S,
}

impl<E, S> SearchService<E, S>
where
    E: Embedder,
    S: DocumentStore,
{
    pub fn new(embedder: E, store: S) -> Self {
        Self { embedder, store }
    }

    /// Dispatch an article search by its search type.
    pub async fn search_articles(&self, query: &ArticleQuery) -> Result<ArticleResults> {
        info!(search_type = ?query.search_type, "searching for articles");

        let list = match query.search_type {
            SearchType::Text => self.search_articles_text(query).await?,
            SearchType::Semantic => self.search_articles_semantic(query).await?,
            SearchType::Combined => self.search_articles_combined(query).await?,
        };

        Ok(ArticleResults::from(list))
    }

    async fn search_articles_text(&self, query: &ArticleQuery) -> Result<ArticleList> {
        let request = compiler::compile_article_text(query);
        let page = self.store.search(ARTICLES_INDEX, &request).await?;
        mapper::map_articles(&page)
    }

    async fn search_articles_semantic(&self, query: &ArticleQuery) -> Result<ArticleList> {
        let vector = self.encode_query(query).await?;
        let request = compiler::compile_article_knn(query, &vector);
        let page = self.store.search(ARTICLES_INDEX, &request).await?;
        mapper::map_articles(&page)
    }

    /// Lexical and kNN searches run concurrently; a failure on either
    /// side cancels the other. Pagination of the fused list is not
    /// possible (the kNN slice is stable across pages), which is why
    /// the boundary pins `page` to 0 for this mode.
    async fn search_articles_combined(&self, query: &ArticleQuery) -> Result<ArticleList> {
        let vector = self.encode_query(query).await?;
        let text_request = compiler::compile_article_text(query);
        let knn_request = compiler::compile_article_knn(query, &vector);

        let (text_page, knn_page) = tokio::try_join!(
            self.store.search(ARTICLES_INDEX, &text_request),
            self.store.search(ARTICLES_INDEX, &knn_request),
        )?;

        if text_page.total == 0 {
            return mapper::map_articles(&knn_page);
        }
        if knn_page.total == 0 {
            return mapper::map_articles(&text_page);
        }

        // the overlap between the two lists makes a precise total
        // unknowable from one request; report the larger side
        let total = text_page.total.max(knn_page.total);
        let mut fused = fusion::reciprocal_rank_fusion(text_page.hits, knn_page.hits);
        fused.truncate(query.page_size as usize);

        mapper::map_articles(&HitPage { hits: fused, total })
    }

    async fn encode_query(&self, query: &ArticleQuery) -> Result<Vec<f32>> {
        // validation guarantees a non-blank query for semantic modes
        let text = query.query.as_deref().unwrap_or_default();
        self.embedder.embed(text).await
    }

    pub async fn search_topics(&self, query: &TopicQuery) -> Result<TopicResults> {
        info!("searching for topics");
        let request = compiler::compile_topics(query);
        let page = self.store.search(TOPICS_INDEX, &request).await?;
        Ok(TopicResults::from(mapper::map_topics(&page)?))
    }

    pub async fn search_topic_batches(
        &self,
        query: &TopicBatchQuery,
    ) -> Result<TopicBatchResults> {
        info!("searching for topic batches");
        let request = compiler::compile_topic_batches(query);
        let page = self.store.search(TOPIC_BATCHES_INDEX, &request).await?;
        Ok(TopicBatchResults::from(mapper::map_topic_batches(&page)?))
    }

    pub async fn search_categories(&self, query: &CategoryQuery) -> Result<CategoryResults> {
        info!("searching for categories");
        let request = compiler::compile_categories(query);
        let page = self.store.search(CATEGORIES_INDEX, &request).await?;
        Ok(CategoryResults::from(mapper::map_categories(&page)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::embedder::MockEmbedder;
    use crate::search::repository::MockDocumentStore;
    use crate::search::SearchError;
    use serde_json::json;

    fn article_hit(id: &str) -> serde_json::Value {
        json!({"_id": id, "_score": 1.0, "_source": {"article": {"title": [id]}}})
    }

    fn page(ids: &[&str], total: u64) -> HitPage {
        HitPage {
            hits: ids.iter().map(|id| article_hit(id)).collect(),
            total,
        }
    }

    fn service(store: MockDocumentStore) -> SearchService<MockEmbedder, MockDocumentStore> {
        SearchService::new(MockEmbedder::default(), store)
    }

    #[tokio::test]
    async fn text_search_issues_one_lexical_call() {
        let store = MockDocumentStore::new().with_page(ARTICLES_INDEX, page(&["A", "B"], 2));
        let embedder = MockEmbedder::default();
        let service = SearchService::new(embedder.clone(), store.clone());

        let results = service
            .search_articles(&ArticleQuery::default())
            .await
            .unwrap();

        assert_eq!(results.total, 2);
        assert_eq!(results.results.len(), 2);
        assert_eq!(embedder.call_count(), 0);

        let requests = store.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].1.query.is_some());
        assert!(requests[0].1.knn.is_none());
    }

    #[tokio::test]
    async fn semantic_search_encodes_once_and_issues_knn() {
        let store = MockDocumentStore::new().with_page(ARTICLES_INDEX, page(&["A"], 1));
        let embedder = MockEmbedder::default();
        let service = SearchService::new(embedder.clone(), store.clone());

        let query = ArticleQuery {
            search_type: SearchType::Semantic,
            query: Some("climate".to_string()),
            ..Default::default()
        };
        service.search_articles(&query).await.unwrap();

        assert_eq!(embedder.call_count(), 1);
        let requests = store.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].1.knn.is_some());
        assert!(requests[0].1.query.is_none());
    }

    #[tokio::test]
    async fn combined_search_fuses_and_reports_max_total() {
        let store = MockDocumentStore::new()
            .with_page(ARTICLES_INDEX, page(&["X", "Y"], 2))
            .with_page(ARTICLES_INDEX, page(&["Y", "Z"], 3));
        let embedder = MockEmbedder::default();
        let service = SearchService::new(embedder.clone(), store.clone());

        let query = ArticleQuery {
            search_type: SearchType::Combined,
            query: Some("climate".to_string()),
            ..Default::default()
        };
        let results = service.search_articles(&query).await.unwrap();

        assert_eq!(embedder.call_count(), 1);
        assert_eq!(results.total, 3);
        let ids: Vec<_> = results
            .results
            .iter()
            .map(|r| r.id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["Y", "X", "Z"]);
    }

    #[tokio::test]
    async fn combined_search_truncates_to_page_size() {
        let store = MockDocumentStore::new()
            .with_page(ARTICLES_INDEX, page(&["A", "B", "C"], 3))
            .with_page(ARTICLES_INDEX, page(&["D", "E"], 2));
        let service = service(store);

        let query = ArticleQuery {
            search_type: SearchType::Combined,
            query: Some("climate".to_string()),
            page_size: 2,
            ..Default::default()
        };
        let results = service.search_articles(&query).await.unwrap();
        assert_eq!(results.results.len(), 2);
    }

    #[tokio::test]
    async fn combined_search_falls_back_when_one_side_is_empty() {
        // lexical empty: return the kNN page as-is
        let store = MockDocumentStore::new()
            .with_page(ARTICLES_INDEX, page(&[], 0))
            .with_page(ARTICLES_INDEX, page(&["K1", "K2"], 2));
        let service = service(store);

        let query = ArticleQuery {
            search_type: SearchType::Combined,
            query: Some("climate".to_string()),
            ..Default::default()
        };
        let results = service.search_articles(&query).await.unwrap();
        assert_eq!(results.total, 2);
        assert_eq!(results.results[0].id.as_deref(), Some("K1"));

        // kNN empty: return the lexical page as-is
        let store = MockDocumentStore::new()
            .with_page(ARTICLES_INDEX, page(&["T1"], 1))
            .with_page(ARTICLES_INDEX, page(&[], 0));
        let service = service(store);
        let results = service.search_articles(&query).await.unwrap();
        assert_eq!(results.total, 1);
        assert_eq!(results.results[0].id.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn store_errors_propagate() {
        let store =
            MockDocumentStore::new().failing_with(|| SearchError::StoreTransient("reset".into()));
        let service = service(store);

        let err = service
            .search_articles(&ArticleQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::StoreTransient(_)));
    }

    #[tokio::test]
    async fn projection_mask_limits_result_fields() {
        let full_hit = json!({
            "_id": "A",
            "_score": 1.0,
            "_source": {
                "article": {
                    "url": "https://example.com/a",
                    "title": ["Headline"],
                    "paragraphs": ["p1", "p2"],
                }
            }
        });
        let store = MockDocumentStore::new().with_page(
            ARTICLES_INDEX,
            HitPage {
                hits: vec![full_hit],
                total: 1,
            },
        );
        let service = service(store);

        let query = ArticleQuery {
            return_attributes: vec!["id".to_string(), "title".to_string()],
            ..Default::default()
        };
        let results = service.search_articles(&query).await.unwrap();

        let value = serde_json::to_value(&results.results[0]).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["id", "title"]);
    }

    #[tokio::test]
    async fn topics_dispatch_a_single_call() {
        let hit = json!({"_id": "t1", "_source": {"topic": "Elections", "count": 3}});
        let store = MockDocumentStore::new().with_page(
            TOPICS_INDEX,
            HitPage {
                hits: vec![hit],
                total: 1,
            },
        );
        let service = service(store.clone());

        let results = service.search_topics(&TopicQuery::default()).await.unwrap();
        assert_eq!(results.total, 1);
        assert_eq!(results.results[0].topic.as_deref(), Some("Elections"));
        assert_eq!(store.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn categories_dispatch_a_single_call() {
        let hit = json!({"_id": "c1", "_source": {"name": "World"}});
        let store = MockDocumentStore::new().with_page(
            CATEGORIES_INDEX,
            HitPage {
                hits: vec![hit],
                total: 1,
            },
        );
        let service = service(store.clone());

        let results = service
            .search_categories(&CategoryQuery::default())
            .await
            .unwrap();
        assert_eq!(results.results[0].name, "World");
        assert_eq!(store.recorded_requests().len(), 1);
    }
}
