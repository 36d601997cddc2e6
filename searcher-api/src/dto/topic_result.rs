use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::{
    PublishDateWindow, Topic, TopicArticle, TopicArticleQuery, TopicList,
};

/// Serialized publish-date window of a batch query.
#[derive(Debug, Clone, Serialize)]
pub struct PublishDateWindowResult {
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
}

/// Serialized batch query.
#[derive(Debug, Clone, Serialize)]
pub struct TopicArticleQueryResult {
    pub publish_date: PublishDateWindowResult,
}

impl From<TopicArticleQuery> for TopicArticleQueryResult {
    fn from(query: TopicArticleQuery) -> Self {
        let PublishDateWindow { start, end } = query.publish_date;
        Self {
            publish_date: PublishDateWindowResult { start, end },
        }
    }
}

/// Article projection carried inside a topic result.
#[derive(Debug, Clone, Serialize)]
pub struct TopicArticleResult {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub publish_date: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Vec<String>>,
}

impl From<TopicArticle> for TopicArticleResult {
    fn from(article: TopicArticle) -> Self {
        Self {
            id: article.id,
            url: article.url,
            image: article.image,
            publish_date: article.publish_date,
            author: article.author,
            title: article.title,
        }
    }
}

/// Outbound topic with null suppression.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TopicResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_query: Option<TopicArticleQueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub representative_articles: Option<Vec<TopicArticleResult>>,
}

impl TopicResult {
    pub const FIELDS: &'static [&'static str] = &[
        "id",
        "batch_id",
        "batch_query",
        "topic",
        "count",
        "representative_articles",
    ];
}

impl From<Topic> for TopicResult {
    fn from(topic: Topic) -> Self {
        Self {
            id: Some(topic.id),
            batch_id: topic.batch_id,
            batch_query: topic.batch_query.map(TopicArticleQueryResult::from),
            topic: topic.topic,
            count: topic.count,
            representative_articles: topic
                .representative_articles
                .map(|articles| articles.into_iter().map(TopicArticleResult::from).collect()),
        }
    }
}

/// Response envelope for topic searches.
#[derive(Debug, Clone, Serialize)]
pub struct TopicResults {
    pub total: u64,
    pub results: Vec<TopicResult>,
}

impl From<TopicList> for TopicResults {
    fn from(list: TopicList) -> Self {
        Self {
            total: list.total,
            results: list.topics.into_iter().map(TopicResult::from).collect(),
        }
    }
}
