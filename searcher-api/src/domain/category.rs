/// A predefined or analyzer-assigned article category.
///
/// Identity is the backend document id; the name is what readers see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// One page of categories plus the total match count.
#[derive(Debug, Clone)]
pub struct CategoryList {
    pub categories: Vec<Category>,
    pub total: u64,
}
