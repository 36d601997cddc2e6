use serde::Serialize;
use time::OffsetDateTime;

use super::TopicArticleQueryResult;
use crate::domain::{TopicBatch, TopicBatchList};

/// Outbound topic batch with null suppression.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TopicBatchResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Query the batch was generated from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<TopicArticleQueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_count: Option<u64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub create_time: Option<OffsetDateTime>,
}

impl TopicBatchResult {
    pub const FIELDS: &'static [&'static str] =
        &["id", "query", "article_count", "topic_count", "create_time"];
}

impl From<TopicBatch> for TopicBatchResult {
    fn from(batch: TopicBatch) -> Self {
        Self {
            id: Some(batch.id),
            query: batch.query.map(TopicArticleQueryResult::from),
            article_count: batch.article_count,
            topic_count: batch.topic_count,
            create_time: batch.create_time,
        }
    }
}

/// Response envelope for topic-batch searches.
#[derive(Debug, Clone, Serialize)]
pub struct TopicBatchResults {
    pub total: u64,
    pub results: Vec<TopicBatchResult>,
}

impl From<TopicBatchList> for TopicBatchResults {
    fn from(list: TopicBatchList) -> Self {
        Self {
            total: list.total,
            results: list.batches.into_iter().map(TopicBatchResult::from).collect(),
        }
    }
}
