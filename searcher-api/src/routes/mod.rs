pub(crate) mod articles;
pub(crate) mod categories;
pub(crate) mod error;
pub(crate) mod topic_batches;
pub(crate) mod topics;

pub(crate) use articles::search_articles;
pub(crate) use categories::search_categories;
pub(crate) use error::ApiError;
pub(crate) use topic_batches::search_topic_batches;
pub(crate) use topics::search_topics;
