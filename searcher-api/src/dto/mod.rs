mod article_query;
mod article_result;
mod category_query;
mod category_result;
mod sort_direction;
mod topic_batch_query;
mod topic_batch_result;
mod topic_query;
mod topic_result;

pub use article_query::*;
pub use article_result::*;
pub use category_query::*;
pub use category_result::*;
pub use sort_direction::*;
pub use topic_batch_query::*;
pub use topic_batch_result::*;
pub use topic_query::*;
pub use topic_result::*;

/// A query object failed a boundary invariant. Rendered as HTTP 422.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct QueryValidationError {
    pub message: String,
}

impl QueryValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
