//! Elasticsearch-backed document store.
//!
//! Owns the long-lived, connection-pooled client and the index
//! mappings. Descriptor execution is thin: the compiled search is
//! assembled into a request body verbatim.

use async_trait::async_trait;
use elasticsearch::auth::Credentials;
use elasticsearch::cert::{Certificate, CertificateValidation};
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::http::StatusCode;
use elasticsearch::indices::IndicesCreateParts;
use elasticsearch::{BulkOperation, BulkParts, Elasticsearch, SearchParts};
use serde_json::{json, Value};
use tracing::{info, warn};
use url::Url;

use crate::config::ElasticSettings;
use crate::search::compiler::CompiledSearch;
use crate::search::traits::{
    BulkAction, BulkSummary, DocumentStore, HitPage, Result, SearchError,
};
use crate::search::{ARTICLES_INDEX, CATEGORIES_INDEX, TOPICS_INDEX, TOPIC_BATCHES_INDEX};

#[derive(Clone)]
pub struct ElasticDocumentStore {
    client: Elasticsearch,
    /// Dimension of the dense-vector field, fixed at configuration time.
    dims: usize,
}

impl ElasticDocumentStore {
    /// Build the pooled client from connection settings.
    pub fn connect(settings: &ElasticSettings, dims: usize) -> Result<Self> {
        info!("connecting to Elasticsearch at {}", settings.host);

        let url = Url::parse(&settings.host)
            .map_err(|e| SearchError::Startup(format!("invalid store endpoint: {e}")))?;
        let pool = SingleNodeConnectionPool::new(url);
        let mut builder = TransportBuilder::new(pool).auth(Credentials::Basic(
            settings.user.clone(),
            settings.password.clone(),
        ));

        if settings.tls_insecure {
            warn!("store certificate validation is disabled");
            builder = builder.cert_validation(CertificateValidation::None);
        } else if let Ok(pem) = std::fs::read(&settings.ca_path) {
            let certificate = Certificate::from_pem(&pem)
                .map_err(|e| SearchError::Startup(format!("invalid CA bundle: {e}")))?;
            builder = builder.cert_validation(CertificateValidation::Full(certificate));
        }

        let transport = builder
            .build()
            .map_err(|e| SearchError::Startup(format!("failed to build transport: {e}")))?;

        Ok(Self {
            client: Elasticsearch::new(transport),
            dims,
        })
    }

    /// Create every index this service reads or writes. Idempotent.
    pub async fn assert_indices(&self) -> Result<()> {
        self.assert_index(ARTICLES_INDEX, articles_mappings(self.dims))
            .await?;
        self.assert_index(TOPICS_INDEX, topics_mappings()).await?;
        self.assert_index(TOPIC_BATCHES_INDEX, topic_batches_mappings())
            .await?;
        self.assert_index(CATEGORIES_INDEX, categories_mappings())
            .await?;
        Ok(())
    }

    pub fn dims(&self) -> usize {
        self.dims
    }
}

#[async_trait]
impl DocumentStore for ElasticDocumentStore {
    async fn search(&self, index: &str, request: &CompiledSearch) -> Result<HitPage> {
        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .body(search_body(request))
            .send()
            .await
            .map_err(transient)?;

        let status = response.status_code();
        let value: Value = response.json().await.map_err(transient)?;
        if !status.is_success() {
            return Err(response_error(status, &value));
        }

        let hits = value
            .get("hits")
            .ok_or_else(|| SearchError::StoreContract("no 'hits' in search response".into()))?;
        Ok(HitPage {
            total: hits["total"]["value"].as_u64().unwrap_or(0),
            hits: hits
                .get("hits")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        })
    }

    async fn bulk_upsert(&self, index: &str, actions: Vec<BulkAction>) -> Result<BulkSummary> {
        if actions.is_empty() {
            return Ok(BulkSummary::default());
        }

        let operations: Vec<BulkOperation<Value>> = actions
            .into_iter()
            .map(|action| BulkOperation::index(action.document).id(action.id).into())
            .collect();

        let response = self
            .client
            .bulk(BulkParts::Index(index))
            .body(operations)
            .send()
            .await
            .map_err(transient)?;

        let status = response.status_code();
        let value: Value = response.json().await.map_err(transient)?;
        if !status.is_success() {
            return Err(response_error(status, &value));
        }

        let mut summary = BulkSummary::default();
        for item in value["items"].as_array().into_iter().flatten() {
            let outcome = item.get("index").or_else(|| item.get("create"));
            match outcome.and_then(|o| o.get("error")) {
                Some(error) => {
                    warn!(%error, "failed to bulk store document");
                    summary.failed += 1;
                }
                None => summary.stored += 1,
            }
        }
        Ok(summary)
    }

    async fn assert_index(&self, index: &str, mappings: Value) -> Result<()> {
        info!("creating/asserting index '{index}'");

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(json!({ "mappings": mappings }))
            .send()
            .await
            .map_err(|e| SearchError::Startup(e.to_string()))?;

        if response.status_code().is_success() {
            return Ok(());
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| SearchError::Startup(e.to_string()))?;
        if value["error"]["type"] == "resource_already_exists_exception" {
            info!("index '{index}' already exists");
            return Ok(());
        }
        Err(SearchError::Startup(format!(
            "failed to create index '{index}': {}",
            value["error"]
        )))
    }
}

/// Assemble the request body for a compiled search.
fn search_body(request: &CompiledSearch) -> Value {
    let mut body = serde_json::Map::new();

    if let Some(query) = &request.query {
        body.insert("query".to_string(), query.clone());
    }
    if let Some(knn) = &request.knn {
        body.insert("knn".to_string(), knn.clone());
    }
    if !request.sort.is_empty() {
        body.insert("sort".to_string(), json!(request.sort));
        body.insert("track_scores".to_string(), json!(request.track_scores));
    }
    if let Some(from) = request.from {
        body.insert("from".to_string(), json!(from));
    }
    if let Some(size) = request.size {
        body.insert("size".to_string(), json!(size));
    }

    let mut source = serde_json::Map::new();
    if let Some(includes) = &request.source_includes {
        source.insert("includes".to_string(), json!(includes));
    }
    if !request.source_excludes.is_empty() {
        source.insert("excludes".to_string(), json!(request.source_excludes));
    }
    if !source.is_empty() {
        body.insert("_source".to_string(), Value::Object(source));
    }

    Value::Object(body)
}

fn transient(error: elasticsearch::Error) -> SearchError {
    SearchError::StoreTransient(error.to_string())
}

fn response_error(status: StatusCode, body: &Value) -> SearchError {
    let reason = body["error"]["reason"]
        .as_str()
        .unwrap_or("unknown store error");
    if status.is_server_error() {
        SearchError::StoreTransient(format!("{status}: {reason}"))
    } else {
        SearchError::StoreContract(format!("{status}: {reason}"))
    }
}

pub fn articles_mappings(dims: usize) -> Value {
    json!({
        "properties": {
            "topics": {
                "properties": {
                    "topic_ids": { "type": "keyword" },
                    "topic_names": { "type": "text" },
                }
            },
            "analyzer": {
                "properties": {
                    // not indexed: the merged categories are; this only
                    // marks which of them the analyzer predicted
                    "category_ids": { "type": "keyword", "index": false },
                    "embeddings": {
                        "type": "dense_vector",
                        "dims": dims,
                    },
                    "entities": { "type": "text" },
                }
            },
            "article": {
                "properties": {
                    "id": { "type": "keyword" },
                    "url": { "type": "keyword" },
                    "source": {
                        "type": "text",
                        // keyword sub-field enables exact-term aggregations
                        "fields": {
                            "keyword": { "type": "keyword", "ignore_above": 256 }
                        }
                    },
                    "publish_date": { "type": "date" },
                    "image": { "type": "keyword", "index": false },
                    "author": { "type": "text" },
                    "title": { "type": "text" },
                    "paragraphs": { "type": "text" },
                    "categories": {
                        "properties": {
                            "ids": { "type": "keyword" },
                            "names": {
                                "type": "text",
                                "fields": {
                                    "keyword": { "type": "keyword", "ignore_above": 256 }
                                }
                            }
                        }
                    },
                }
            }
        }
    })
}

pub fn topics_mappings() -> Value {
    json!({
        "properties": {
            "batch_id": { "type": "keyword" },
            "batch_query": {
                "properties": {
                    "publish_date": {
                        "properties": {
                            "start": { "type": "date" },
                            "end": { "type": "date" },
                        }
                    }
                }
            },
            "create_time": { "type": "date" },
            "topic": { "type": "text" },
            "count": { "type": "integer" },
            "representative_articles": {
                "properties": {
                    "_id": { "type": "keyword" },
                    "url": { "type": "keyword" },
                    "image": { "type": "keyword", "index": false },
                    "publish_date": { "type": "date" },
                    "author": { "type": "text" },
                    "title": { "type": "text" },
                }
            }
        }
    })
}

pub fn topic_batches_mappings() -> Value {
    json!({
        "properties": {
            "query": {
                "properties": {
                    "publish_date": {
                        "properties": {
                            "start": { "type": "date" },
                            "end": { "type": "date" },
                        }
                    }
                }
            },
            "article_count": { "type": "integer" },
            "topic_count": { "type": "integer" },
            "create_time": { "type": "date" },
        }
    })
}

pub fn categories_mappings() -> Value {
    json!({
        "properties": {
            "name": { "type": "text" },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_query_sort_and_pagination() {
        let request = CompiledSearch {
            query: Some(json!({"bool": {}})),
            sort: vec![json!({"_score": {"order": "desc"}})],
            track_scores: true,
            from: Some(20),
            size: Some(10),
            source_excludes: vec!["analyzer.embeddings".to_string()],
            ..Default::default()
        };

        let body = search_body(&request);
        assert_eq!(body["query"], json!({"bool": {}}));
        assert_eq!(body["track_scores"], json!(true));
        assert_eq!(body["from"], json!(20));
        assert_eq!(body["size"], json!(10));
        assert_eq!(body["_source"]["excludes"], json!(["analyzer.embeddings"]));
        assert!(body.get("knn").is_none());
    }

    #[test]
    fn knn_body_omits_pagination() {
        let request = CompiledSearch {
            knn: Some(json!({"field": "analyzer.embeddings", "k": 10})),
            sort: vec![json!({"_score": {"order": "desc"}})],
            track_scores: true,
            source_includes: Some(vec!["article.title".to_string()]),
            source_excludes: vec!["analyzer.embeddings".to_string()],
            ..Default::default()
        };

        let body = search_body(&request);
        assert!(body.get("from").is_none());
        assert!(body.get("size").is_none());
        assert_eq!(body["_source"]["includes"], json!(["article.title"]));
    }

    #[test]
    fn empty_sort_leaves_score_order() {
        let request = CompiledSearch::default();
        let body = search_body(&request);
        assert!(body.get("sort").is_none());
        assert!(body.get("track_scores").is_none());
        assert!(body.get("_source").is_none());
    }

    #[test]
    fn articles_mappings_use_configured_dims() {
        let mappings = articles_mappings(512);
        assert_eq!(
            mappings["properties"]["analyzer"]["properties"]["embeddings"]["dims"],
            json!(512)
        );
        assert_eq!(
            mappings["properties"]["article"]["properties"]["image"]["index"],
            json!(false)
        );
    }

    #[test]
    fn server_errors_are_transient_client_errors_are_contract() {
        let body = json!({"error": {"reason": "boom"}});
        assert!(matches!(
            response_error(StatusCode::BAD_GATEWAY, &body),
            SearchError::StoreTransient(_)
        ));
        assert!(matches!(
            response_error(StatusCode::BAD_REQUEST, &body),
            SearchError::StoreContract(_)
        ));
    }
}
