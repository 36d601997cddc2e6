use serde::Deserialize;

use super::{article_query::validate_page_size, QueryValidationError};

pub const CATEGORY_PAGE_SIZE_MAX: u32 = 50;
const CATEGORY_IDS_MAX: usize = 100;

/// Validated category search request.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CategoryQuery {
    pub ids: Vec<String>,
    /// Free text matched against the category name.
    pub query: Option<String>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for CategoryQuery {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            query: None,
            page: 0,
            page_size: 10,
        }
    }
}

impl CategoryQuery {
    /// Drop blank id entries and enforce the boundary invariants.
    pub fn validate(&mut self) -> Result<(), QueryValidationError> {
        validate_page_size(self.page_size, CATEGORY_PAGE_SIZE_MAX)?;

        self.ids.retain(|id| !id.trim().is_empty());
        if self.ids.len() > CATEGORY_IDS_MAX {
            return Err(QueryValidationError::new("'ids' contains too many items."));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_ids_are_dropped() {
        let mut q = CategoryQuery {
            ids: vec!["c1".to_string(), " ".to_string(), String::new()],
            ..Default::default()
        };
        q.validate().unwrap();
        assert_eq!(q.ids, vec!["c1"]);
    }

    #[test]
    fn too_many_ids_rejected() {
        let mut q = CategoryQuery {
            ids: (0..101).map(|i| format!("c{i}")).collect(),
            ..Default::default()
        };
        assert!(q.validate().is_err());
    }

    #[test]
    fn page_size_up_to_fifty() {
        let mut q = CategoryQuery {
            page_size: 50,
            ..Default::default()
        };
        q.validate().unwrap();

        let mut q = CategoryQuery {
            page_size: 51,
            ..Default::default()
        };
        assert!(q.validate().is_err());
    }
}
