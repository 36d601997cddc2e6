use time::OffsetDateTime;

use super::Category;

/// Subset of a topic attached to an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleTopic {
    pub id: String,
    pub topic_name: String,
}

/// A news article as reconstructed from a backend hit.
///
/// Every field other than the id can be absent: projection masks can
/// exclude any of them, and older documents miss some groups entirely.
/// `author` and `title` are stored as multi-value literals and exposed
/// as a single newline-joined string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Article {
    pub id: String,
    pub url: Option<String>,
    pub source: Option<String>,
    pub publish_date: Option<OffsetDateTime>,
    pub image: Option<String>,
    pub author: Option<String>,
    pub title: Option<String>,
    pub paragraphs: Option<Vec<String>>,
    /// Merged categories: predefined plus analyzer-assigned.
    pub categories: Option<Vec<Category>>,
    /// Subset of `categories` assigned by the analyzer. Absent unless
    /// both the merged categories and the analyzer ids were returned.
    pub analyzed_categories: Option<Vec<Category>>,
    pub entities: Option<Vec<String>>,
    /// Never surfaced to clients; excluded from every search.
    pub embeddings: Option<Vec<f32>>,
    pub topics: Option<Vec<ArticleTopic>>,
}

impl Article {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// One page of articles plus the total match count.
#[derive(Debug, Clone)]
pub struct ArticleList {
    pub articles: Vec<Article>,
    pub total: u64,
}
