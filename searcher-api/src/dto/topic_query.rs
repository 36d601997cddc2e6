use serde::Deserialize;
use time::OffsetDateTime;

use super::article_query::{
    validate_date_range, validate_page_size, validate_return_attributes, validate_sort_field,
};
use super::{QueryValidationError, SortDirection};
use crate::search::schema;

pub const TOPIC_PAGE_SIZE_MAX: u32 = 30;

/// Validated topic search request.
///
/// The date range selects topics whose whole batch window lies inside
/// `[date_min, date_max]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopicQuery {
    pub ids: Vec<String>,
    pub batch_ids: Vec<String>,

    /// Free text matched against the topic name.
    pub topic: Option<String>,

    pub count_min: Option<u64>,
    pub count_max: Option<u64>,

    #[serde(with = "time::serde::rfc3339::option")]
    pub date_min: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date_max: Option<OffsetDateTime>,

    pub page: u32,
    pub page_size: u32,

    pub sort_field: Option<String>,
    pub sort_dir: Option<SortDirection>,

    /// Mask of `TopicResult` attributes to return; empty means all.
    pub return_attributes: Vec<String>,
}

impl Default for TopicQuery {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            batch_ids: Vec::new(),
            topic: None,
            count_min: None,
            count_max: None,
            date_min: None,
            date_max: None,
            page: 0,
            page_size: 10,
            sort_field: None,
            sort_dir: None,
            return_attributes: Vec::new(),
        }
    }
}

impl TopicQuery {
    pub fn validate(&self) -> Result<(), QueryValidationError> {
        validate_page_size(self.page_size, TOPIC_PAGE_SIZE_MAX)?;
        validate_date_range(self.date_min, self.date_max)?;
        validate_return_attributes(&self.return_attributes, &schema::TOPICS)?;
        validate_sort_field(self.sort_field.as_deref(), &schema::TOPICS)
    }
}
