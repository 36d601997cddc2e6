use serde::Deserialize;
use time::OffsetDateTime;

use super::{QueryValidationError, SortDirection};
use crate::search::schema;

pub const ARTICLE_PAGE_SIZE_MAX: u32 = 30;

/// How article hits are retrieved and scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Text,
    Semantic,
    Combined,
}

/// Validated article search request.
///
/// Empty id/filter lists mean "unfiltered". `date_min`/`date_max`
/// default to the beginning of the corpus and the request time
/// respectively; resolution happens at compile time so `date_max`
/// tracks "now" per request.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArticleQuery {
    pub ids: Vec<String>,

    /// Free text matched against title and paragraphs.
    pub query: Option<String>,

    pub category_ids: Vec<String>,
    /// Free text matched against category names.
    pub categories: Option<String>,

    pub source: Option<String>,
    pub author: Option<String>,

    #[serde(with = "time::serde::rfc3339::option")]
    pub date_min: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date_max: Option<OffsetDateTime>,

    pub topic_ids: Vec<String>,
    /// Free text matched against topic names.
    pub topic: Option<String>,

    pub page: u32,
    pub page_size: u32,

    pub sort_field: Option<String>,
    pub sort_dir: Option<SortDirection>,

    pub search_type: SearchType,

    /// Mask of `ArticleResult` attributes to return; empty means all.
    pub return_attributes: Vec<String>,
}

impl Default for ArticleQuery {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            query: None,
            category_ids: Vec::new(),
            categories: None,
            source: None,
            author: None,
            date_min: None,
            date_max: None,
            topic_ids: Vec::new(),
            topic: None,
            page: 0,
            page_size: 10,
            sort_field: None,
            sort_dir: None,
            search_type: SearchType::Text,
            return_attributes: Vec::new(),
        }
    }
}

impl ArticleQuery {
    /// Enforce the boundary invariants before the query reaches the
    /// compiler.
    pub fn validate(&self) -> Result<(), QueryValidationError> {
        validate_page_size(self.page_size, ARTICLE_PAGE_SIZE_MAX)?;
        validate_date_range(self.date_min, self.date_max)?;
        validate_return_attributes(&self.return_attributes, &schema::ARTICLES)?;
        validate_sort_field(self.sort_field.as_deref(), &schema::ARTICLES)?;

        if matches!(self.search_type, SearchType::Semantic | SearchType::Combined) {
            let blank = self
                .query
                .as_deref()
                .map(|q| q.trim().is_empty())
                .unwrap_or(true);
            if blank {
                return Err(QueryValidationError::new(
                    "'query' must not be empty for 'semantic' or 'combined' search.",
                ));
            }
            if self.page != 0 {
                return Err(QueryValidationError::new(
                    "'page' must be 0 for 'semantic' or 'combined' search.",
                ));
            }
        }

        Ok(())
    }
}

pub(crate) fn validate_page_size(page_size: u32, max: u32) -> Result<(), QueryValidationError> {
    if page_size < 1 || page_size > max {
        return Err(QueryValidationError::new(format!(
            "'page_size' must be between 1 and {max}."
        )));
    }
    Ok(())
}

pub(crate) fn validate_date_range(
    date_min: Option<OffsetDateTime>,
    date_max: Option<OffsetDateTime>,
) -> Result<(), QueryValidationError> {
    if let (Some(min), Some(max)) = (date_min, date_max) {
        if min > max {
            return Err(QueryValidationError::new(
                "'date_min' must not be after 'date_max'.",
            ));
        }
    }
    Ok(())
}

pub(crate) fn validate_return_attributes(
    keys: &[String],
    entity: &schema::EntitySchema,
) -> Result<(), QueryValidationError> {
    for key in keys {
        if !entity.is_attribute(key) {
            return Err(QueryValidationError::new(format!(
                "Invalid return attribute '{key}'."
            )));
        }
    }
    Ok(())
}

pub(crate) fn validate_sort_field(
    sort_field: Option<&str>,
    entity: &schema::EntitySchema,
) -> Result<(), QueryValidationError> {
    if let Some(field) = sort_field {
        if !entity.is_sortable(field) {
            return Err(QueryValidationError::new(format!(
                "Invalid sort field '{field}'."
            )));
        }
    }
    Ok(())
}
