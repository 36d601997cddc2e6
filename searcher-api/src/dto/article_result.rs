use serde::Serialize;
use time::OffsetDateTime;

use super::CategoryResult;
use crate::domain::{Article, ArticleList, ArticleTopic};

/// Topic reference attached to an article result.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleTopicResult {
    pub id: String,
    pub topic_name: String,
}

impl From<ArticleTopic> for ArticleTopicResult {
    fn from(topic: ArticleTopic) -> Self {
        Self {
            id: topic.id,
            topic_name: topic.topic_name,
        }
    }
}

/// Outbound article. Which fields are populated depends on the
/// `return_attributes` mask of the query; absent fields are omitted
/// from the serialized body.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArticleResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<CategoryResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<ArticleTopicResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub publish_date: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraphs: Option<Vec<String>>,
}

impl ArticleResult {
    /// Serialized field names, in declaration order. Checked against
    /// the projection tables at startup.
    pub const FIELDS: &'static [&'static str] = &[
        "id",
        "categories",
        "entities",
        "topics",
        "url",
        "publish_date",
        "source",
        "image",
        "author",
        "title",
        "paragraphs",
    ];
}

impl From<Article> for ArticleResult {
    fn from(article: Article) -> Self {
        Self {
            id: Some(article.id),
            categories: article
                .categories
                .map(|cats| cats.into_iter().map(CategoryResult::from).collect()),
            entities: article.entities,
            topics: article
                .topics
                .map(|topics| topics.into_iter().map(ArticleTopicResult::from).collect()),
            url: article.url,
            publish_date: article.publish_date,
            source: article.source,
            image: article.image,
            author: article.author,
            title: article.title,
            paragraphs: article.paragraphs,
        }
    }
}

/// Response envelope for article searches.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleResults {
    pub total: u64,
    pub results: Vec<ArticleResult>,
}

impl From<ArticleList> for ArticleResults {
    fn from(list: ArticleList) -> Self {
        Self {
            total: list.total,
            results: list.articles.into_iter().map(ArticleResult::from).collect(),
        }
    }
}
