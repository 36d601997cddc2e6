use time::OffsetDateTime;

/// Closed publish-date window of a topic-modelling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishDateWindow {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

/// The article query a topic batch was generated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicArticleQuery {
    pub publish_date: PublishDateWindow,
}

/// Projection of an article carried inside a topic document.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicArticle {
    pub id: String,
    pub url: Option<String>,
    pub image: Option<String>,
    pub publish_date: Option<OffsetDateTime>,
    pub author: Option<Vec<String>>,
    pub title: Option<Vec<String>>,
}

/// A cluster of articles produced by one topic-modelling run.
///
/// Every field other than the id can be absent: they can be excluded
/// from the search and are not always returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topic {
    pub id: String,
    pub batch_id: Option<String>,
    pub batch_query: Option<TopicArticleQuery>,
    pub create_time: Option<OffsetDateTime>,
    pub topic: Option<String>,
    pub count: Option<u64>,
    pub representative_articles: Option<Vec<TopicArticle>>,
}

impl Topic {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// One page of topics plus the total match count.
#[derive(Debug, Clone)]
pub struct TopicList {
    pub topics: Vec<Topic>,
    pub total: u64,
}

/// Snapshot of a single topic-discovery run over a time window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicBatch {
    pub id: String,
    pub query: Option<TopicArticleQuery>,
    pub article_count: Option<u64>,
    pub topic_count: Option<u64>,
    pub create_time: Option<OffsetDateTime>,
}

impl TopicBatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// One page of topic batches plus the total match count.
#[derive(Debug, Clone)]
pub struct TopicBatchList {
    pub batches: Vec<TopicBatch>,
    pub total: u64,
}
