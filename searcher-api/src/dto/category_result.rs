use serde::Serialize;

use crate::domain::{Category, CategoryList};

/// Outbound category; both fields are always present on hits.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryResult {
    pub id: String,
    pub name: String,
}

impl CategoryResult {
    pub const FIELDS: &'static [&'static str] = &["id", "name"];
}

impl From<Category> for CategoryResult {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
        }
    }
}

/// Response envelope for category searches.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryResults {
    pub total: u64,
    pub results: Vec<CategoryResult>,
}

impl From<CategoryList> for CategoryResults {
    fn from(list: CategoryList) -> Self {
        Self {
            total: list.total,
            results: list
                .categories
                .into_iter()
                .map(CategoryResult::from)
                .collect(),
        }
    }
}
