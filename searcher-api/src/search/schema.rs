//! Per-entity projection and sort descriptor tables.
//!
//! Each searchable entity owns two closed tables: requested attribute
//! key to backend source path(s), and requested sort key to backend
//! sort path. The attribute table's domain is exactly the flattened
//! field set of the entity's outbound DTO, and the sort table's domain
//! is exactly the entity's sortable allow-list. [`verify_tables`] is
//! run at process start; a mismatch is a programming error.

/// Backend path(s) a requested attribute expands to in the `_source`
/// projection. A single request key can pull several source subtrees,
/// e.g. merged categories plus the analyzer's category ids.
#[derive(Debug, Clone, Copy)]
pub enum BackendPath {
    Single(&'static str),
    Multi(&'static [&'static str]),
}

/// Placeholder backend path for the `id` attribute. The backend
/// document id rides on every hit regardless of `_source` filtering,
/// so this path matches nothing and projecting it is a no-op.
pub const ID_SENTINEL: &str = "id_is_always_returned";

/// Descriptor tables for one searchable entity.
pub struct EntitySchema {
    attributes: &'static [(&'static str, BackendPath)],
    sort_keys: &'static [(&'static str, &'static str)],
}

impl EntitySchema {
    /// Whether `key` is a requestable attribute of this entity.
    pub fn is_attribute(&self, key: &str) -> bool {
        self.attributes.iter().any(|(k, _)| *k == key)
    }

    /// Whether `key` may be sorted on for this entity.
    pub fn is_sortable(&self, key: &str) -> bool {
        self.sort_keys.iter().any(|(k, _)| *k == key)
    }

    /// All requestable attribute keys.
    pub fn attribute_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.attributes.iter().map(|(k, _)| *k)
    }

    /// All sortable keys.
    pub fn sort_key_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sort_keys.iter().map(|(k, _)| *k)
    }

    /// Expand a requested attribute mask into backend source paths,
    /// flattening multi-path entries. `None` (meaning: return the full
    /// document) when the mask is empty. Unknown keys are skipped; the
    /// boundary has already rejected them.
    pub fn expand_projection(&self, keys: &[String]) -> Option<Vec<String>> {
        if keys.is_empty() {
            return None;
        }

        let mut paths = Vec::with_capacity(keys.len());
        for key in keys {
            match self.attributes.iter().find(|(k, _)| k == key) {
                Some((_, BackendPath::Single(path))) => paths.push((*path).to_string()),
                Some((_, BackendPath::Multi(multi))) => {
                    paths.extend(multi.iter().map(|p| (*p).to_string()))
                }
                None => {}
            }
        }
        Some(paths)
    }

    /// Backend sort path for a requested sort key.
    pub fn backend_sort_key(&self, key: &str) -> Option<&'static str> {
        self.sort_keys
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, path)| *path)
    }

    /// Assert the attribute table's domain is exactly `dto_fields`.
    fn check_closed(&self, entity: &str, dto_fields: &[&str]) -> Result<(), String> {
        for field in dto_fields {
            if !self.is_attribute(field) {
                return Err(format!(
                    "{entity}: DTO field '{field}' has no projection mapping"
                ));
            }
        }
        for key in self.attribute_keys() {
            if !dto_fields.contains(&key) {
                return Err(format!(
                    "{entity}: projection key '{key}' is not a DTO field"
                ));
            }
        }
        Ok(())
    }
}

pub const ARTICLES: EntitySchema = EntitySchema {
    attributes: &[
        ("id", BackendPath::Single(ID_SENTINEL)),
        (
            "categories",
            BackendPath::Multi(&["article.categories", "analyzer.category_ids"]),
        ),
        ("entities", BackendPath::Single("analyzer.entities")),
        ("topics", BackendPath::Single("topics")),
        ("url", BackendPath::Single("article.url")),
        ("publish_date", BackendPath::Single("article.publish_date")),
        ("source", BackendPath::Single("article.source")),
        ("image", BackendPath::Single("article.image")),
        ("author", BackendPath::Single("article.author")),
        ("title", BackendPath::Single("article.title")),
        ("paragraphs", BackendPath::Single("article.paragraphs")),
    ],
    sort_keys: &[("publish_date", "article.publish_date")],
};

pub const TOPICS: EntitySchema = EntitySchema {
    attributes: &[
        ("id", BackendPath::Single(ID_SENTINEL)),
        ("batch_id", BackendPath::Single("batch_id")),
        ("batch_query", BackendPath::Single("batch_query")),
        ("topic", BackendPath::Single("topic")),
        ("count", BackendPath::Single("count")),
        (
            "representative_articles",
            BackendPath::Single("representative_articles"),
        ),
    ],
    sort_keys: &[
        ("date_min", "batch_query.publish_date.start"),
        ("date_max", "batch_query.publish_date.end"),
        ("count", "count"),
    ],
};

pub const TOPIC_BATCHES: EntitySchema = EntitySchema {
    attributes: &[
        ("id", BackendPath::Single(ID_SENTINEL)),
        ("query", BackendPath::Single("query")),
        ("article_count", BackendPath::Single("article_count")),
        ("topic_count", BackendPath::Single("topic_count")),
        ("create_time", BackendPath::Single("create_time")),
    ],
    sort_keys: &[
        ("date_min", "query.publish_date.start"),
        ("date_max", "query.publish_date.end"),
        ("article_count", "article_count"),
        ("topic_count", "topic_count"),
    ],
};

/// Categories have no projection mask on their query surface; the
/// table exists so the closed-table invariant covers every entity.
pub const CATEGORIES: EntitySchema = EntitySchema {
    attributes: &[
        ("id", BackendPath::Single(ID_SENTINEL)),
        ("name", BackendPath::Single("name")),
    ],
    sort_keys: &[],
};

/// Check every entity's tables against its DTO field list. Called once
/// at process start; failure means the tables and DTOs drifted apart.
pub fn verify_tables() -> Result<(), String> {
    ARTICLES.check_closed("articles", crate::dto::ArticleResult::FIELDS)?;
    TOPICS.check_closed("topics", crate::dto::TopicResult::FIELDS)?;
    TOPIC_BATCHES.check_closed("topic_batches", crate::dto::TopicBatchResult::FIELDS)?;
    CATEGORIES.check_closed("categories", crate::dto::CategoryResult::FIELDS)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_round_trip_with_dtos() {
        verify_tables().unwrap();
    }

    #[test]
    fn empty_mask_projects_everything() {
        assert!(ARTICLES.expand_projection(&[]).is_none());
    }

    #[test]
    fn multi_path_attribute_flattens() {
        let paths = ARTICLES
            .expand_projection(&["categories".to_string()])
            .unwrap();
        assert_eq!(paths, vec!["article.categories", "analyzer.category_ids"]);
    }

    #[test]
    fn id_maps_to_sentinel() {
        let paths = ARTICLES.expand_projection(&["id".to_string()]).unwrap();
        assert_eq!(paths, vec![ID_SENTINEL]);
    }

    #[test]
    fn article_sort_allow_list_is_publish_date_only() {
        let keys: Vec<_> = ARTICLES.sort_key_names().collect();
        assert_eq!(keys, vec!["publish_date"]);
        assert_eq!(
            ARTICLES.backend_sort_key("publish_date"),
            Some("article.publish_date")
        );
        assert_eq!(ARTICLES.backend_sort_key("title"), None);
    }

    #[test]
    fn topic_sort_keys_map_to_batch_window() {
        assert_eq!(
            TOPICS.backend_sort_key("date_min"),
            Some("batch_query.publish_date.start")
        );
        assert_eq!(
            TOPICS.backend_sort_key("date_max"),
            Some("batch_query.publish_date.end")
        );
        assert_eq!(TOPICS.backend_sort_key("count"), Some("count"));
    }

    #[test]
    fn categories_are_unsortable() {
        assert!(!CATEGORIES.is_sortable("name"));
    }
}
