//! Compilation of validated query objects into backend descriptors.
//!
//! Every function here is pure: a query object in, an immutable
//! [`CompiledSearch`] out. The descriptors carry the store's query DSL
//! as raw JSON values; the adapter only assembles them into a request
//! body.

use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::schema;
use crate::dto::{
    ArticleQuery, CategoryQuery, SortDirection, TopicBatchQuery, TopicQuery,
};

/// Candidate pool evaluated by the ANN search.
pub const KNN_NUM_CANDIDATES: u32 = 50;
/// Hits returned by the ANN search; kNN is not paginable.
pub const KNN_K: u32 = 10;

/// Lower bound applied when a query carries no `date_min`.
const EARLIEST_PUBLISH_DATE: OffsetDateTime = time::macros::datetime!(1000-01-01 0:00 UTC);

/// One backend search request, ready for execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledSearch {
    /// Lexical bool query, absent on pure kNN searches.
    pub query: Option<Value>,
    /// kNN descriptor with pre-filters, absent on lexical searches.
    pub knn: Option<Value>,
    /// Sort block; empty means score order only.
    pub sort: Vec<Value>,
    /// Keep `_score` populated under explicit sort so the trailing
    /// tiebreaker is meaningful.
    pub track_scores: bool,
    pub from: Option<u64>,
    pub size: Option<u64>,
    /// Projection mask expanded to backend paths; `None` returns all.
    pub source_includes: Option<Vec<String>>,
    pub source_excludes: Vec<String>,
}

/// Immutable bool-query value: scoring clauses in `must`, optional
/// free-text alternatives in `should`, score-free predicates in
/// `filter`.
#[derive(Debug, Default)]
struct BoolQuery {
    must: Vec<Value>,
    should: Vec<Value>,
    filter: Vec<Value>,
}

impl BoolQuery {
    /// At least one `should` alternative has to match whenever any
    /// were emitted; otherwise the query degenerates into filters.
    fn into_value(self) -> Value {
        let minimum_should_match = u32::from(!self.should.is_empty());
        json!({
            "bool": {
                "must": self.must,
                "should": self.should,
                "minimum_should_match": minimum_should_match,
                "filter": self.filter,
            }
        })
    }
}

/// Compile the lexical half of an article search.
pub fn compile_article_text(query: &ArticleQuery) -> CompiledSearch {
    let mut bool_query = BoolQuery::default();

    // the query has to match either the paragraphs or the title
    if let Some(text) = non_blank(query.query.as_deref()) {
        bool_query.should.push(match_clause("article.paragraphs", text));
        bool_query.should.push(json!({
            "match": {
                "article.title": {
                    "query": text,
                    "boost": 2,
                }
            }
        }));
    }

    bool_query.must = article_must_clauses(query);
    bool_query.filter = article_filter_clauses(query);

    CompiledSearch {
        query: Some(bool_query.into_value()),
        knn: None,
        sort: article_sort(query),
        track_scores: true,
        from: Some(u64::from(query.page) * u64::from(query.page_size)),
        size: Some(u64::from(query.page_size)),
        source_includes: schema::ARTICLES.expand_projection(&query.return_attributes),
        source_excludes: embeddings_exclusion(),
    }
}

/// Compile the kNN half of an article search. Every predicate is a
/// pre-filter; the score is cosine similarity alone.
pub fn compile_article_knn(query: &ArticleQuery, query_vector: &[f32]) -> CompiledSearch {
    let mut filters = vec![publish_date_filter(query)];
    if !query.ids.is_empty() {
        filters.push(ids_filter(&query.ids));
    }
    if let Some(source) = non_blank(query.source.as_deref()) {
        filters.push(match_clause("article.source", source));
    }
    if let Some(author) = non_blank(query.author.as_deref()) {
        filters.push(match_clause("article.author", author));
    }
    if let Some(categories) = non_blank(query.categories.as_deref()) {
        filters.push(match_clause("article.categories.names", categories));
    }
    if !query.category_ids.is_empty() {
        filters.push(json!({"match": {"article.categories.ids": query.category_ids}}));
    }
    if let Some(topic) = non_blank(query.topic.as_deref()) {
        filters.push(match_clause("topics.topic_names", topic));
    }
    if !query.topic_ids.is_empty() {
        filters.push(json!({"terms": {"topics.topic_ids": query.topic_ids}}));
    }

    CompiledSearch {
        query: None,
        knn: Some(json!({
            "field": "analyzer.embeddings",
            "query_vector": query_vector,
            "num_candidates": KNN_NUM_CANDIDATES,
            "k": KNN_K,
            "filter": filters,
        })),
        sort: article_sort(query),
        track_scores: true,
        // the store returns at most k hits; from/size do not apply
        from: None,
        size: None,
        source_includes: schema::ARTICLES.expand_projection(&query.return_attributes),
        source_excludes: embeddings_exclusion(),
    }
}

fn article_must_clauses(query: &ArticleQuery) -> Vec<Value> {
    let mut must = Vec::new();
    if let Some(source) = non_blank(query.source.as_deref()) {
        must.push(match_clause("article.source", source));
    }
    if let Some(author) = non_blank(query.author.as_deref()) {
        must.push(match_clause("article.author", author));
    }
    if let Some(categories) = non_blank(query.categories.as_deref()) {
        must.push(match_clause("article.categories.names", categories));
    }
    if let Some(topic) = non_blank(query.topic.as_deref()) {
        must.push(match_clause("topics.topic_names", topic));
    }
    must
}

fn article_filter_clauses(query: &ArticleQuery) -> Vec<Value> {
    let mut filters = vec![publish_date_filter(query)];
    if !query.ids.is_empty() {
        filters.push(ids_filter(&query.ids));
    }
    if !query.category_ids.is_empty() {
        filters.push(json!({"match": {"article.categories.ids": query.category_ids}}));
    }
    if !query.topic_ids.is_empty() {
        filters.push(json!({"terms": {"topics.topic_ids": query.topic_ids}}));
    }
    filters
}

fn publish_date_filter(query: &ArticleQuery) -> Value {
    date_range_filter("article.publish_date", query.date_min, query.date_max)
}

fn article_sort(query: &ArticleQuery) -> Vec<Value> {
    let default = json!({"article.publish_date": {"order": "desc"}});
    sort_block(
        query.sort_field.as_deref(),
        query.sort_dir,
        &schema::ARTICLES,
        vec![default],
    )
}

/// Compile a topic search. Lexical only: an optional name match plus
/// filters requiring the whole batch window inside the queried range.
pub fn compile_topics(query: &TopicQuery) -> CompiledSearch {
    let mut bool_query = BoolQuery::default();

    if let Some(topic) = non_blank(query.topic.as_deref()) {
        bool_query.must.push(match_clause("topic", topic));
    }

    if !query.ids.is_empty() {
        bool_query.filter.push(ids_filter(&query.ids));
    }
    if !query.batch_ids.is_empty() {
        bool_query
            .filter
            .push(json!({"terms": {"batch_id": query.batch_ids}}));
    }
    if let Some(count) = count_range_filter("count", query.count_min, query.count_max) {
        bool_query.filter.push(count);
    }
    bool_query.filter.push(date_range_filter(
        "batch_query.publish_date.start",
        query.date_min,
        query.date_max,
    ));
    bool_query.filter.push(date_range_filter(
        "batch_query.publish_date.end",
        query.date_min,
        query.date_max,
    ));

    let default_sort = vec![
        json!({"batch_query.publish_date.end": {"order": "desc"}}),
        json!({"count": {"order": "desc"}}),
    ];

    CompiledSearch {
        query: Some(bool_query.into_value()),
        knn: None,
        sort: sort_block(
            query.sort_field.as_deref(),
            query.sort_dir,
            &schema::TOPICS,
            default_sort,
        ),
        track_scores: true,
        from: Some(u64::from(query.page) * u64::from(query.page_size)),
        size: Some(u64::from(query.page_size)),
        source_includes: schema::TOPICS.expand_projection(&query.return_attributes),
        source_excludes: Vec::new(),
    }
}

/// Compile a topic-batch search. Pure filters, no scoring clauses.
pub fn compile_topic_batches(query: &TopicBatchQuery) -> CompiledSearch {
    let mut bool_query = BoolQuery::default();

    if !query.ids.is_empty() {
        bool_query.filter.push(ids_filter(&query.ids));
    }
    if let Some(count) = count_range_filter("article_count", query.count_min, query.count_max) {
        bool_query.filter.push(count);
    }
    if let Some(count) =
        count_range_filter("topic_count", query.topic_count_min, query.topic_count_max)
    {
        bool_query.filter.push(count);
    }
    bool_query.filter.push(date_range_filter(
        "query.publish_date.start",
        query.date_min,
        query.date_max,
    ));
    bool_query.filter.push(date_range_filter(
        "query.publish_date.end",
        query.date_min,
        query.date_max,
    ));

    // most recent window first, larger batch on equal end dates
    let default_sort = vec![
        json!({"query.publish_date.end": {"order": "desc"}}),
        json!({"article_count": {"order": "desc"}}),
    ];

    CompiledSearch {
        query: Some(bool_query.into_value()),
        knn: None,
        sort: sort_block(
            query.sort_field.as_deref(),
            query.sort_dir,
            &schema::TOPIC_BATCHES,
            default_sort,
        ),
        track_scores: true,
        from: Some(u64::from(query.page) * u64::from(query.page_size)),
        size: Some(u64::from(query.page_size)),
        source_includes: schema::TOPIC_BATCHES.expand_projection(&query.return_attributes),
        source_excludes: Vec::new(),
    }
}

/// Compile a category search.
pub fn compile_categories(query: &CategoryQuery) -> CompiledSearch {
    let mut bool_query = BoolQuery::default();

    if let Some(name) = non_blank(query.query.as_deref()) {
        bool_query.should.push(match_clause("name", name));
    }
    if !query.ids.is_empty() {
        bool_query.filter.push(ids_filter(&query.ids));
    }

    CompiledSearch {
        query: Some(bool_query.into_value()),
        knn: None,
        sort: Vec::new(),
        track_scores: false,
        from: Some(u64::from(query.page) * u64::from(query.page_size)),
        size: Some(u64::from(query.page_size)),
        source_includes: None,
        source_excludes: Vec::new(),
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

fn match_clause(field: &str, text: &str) -> Value {
    json!({"match": {field: text}})
}

fn ids_filter(ids: &[String]) -> Value {
    json!({"terms": {"_id": ids}})
}

fn date_range_filter(
    field: &str,
    start: Option<OffsetDateTime>,
    end: Option<OffsetDateTime>,
) -> Value {
    let start = start.unwrap_or(EARLIEST_PUBLISH_DATE);
    let end = end.unwrap_or_else(OffsetDateTime::now_utc);
    json!({
        "range": {
            field: {
                "gte": rfc3339(start),
                "lte": rfc3339(end),
            }
        }
    })
}

fn count_range_filter(field: &str, min: Option<u64>, max: Option<u64>) -> Option<Value> {
    if min.is_none() && max.is_none() {
        return None;
    }
    let mut bounds = serde_json::Map::new();
    if let Some(min) = min {
        bounds.insert("gte".to_string(), json!(min));
    }
    if let Some(max) = max {
        bounds.insert("lte".to_string(), json!(max));
    }
    Some(json!({"range": {field: bounds}}))
}

/// `[user_sort | default_sort, _score desc]`; the trailing score sort
/// breaks ties under any explicit order.
fn sort_block(
    sort_field: Option<&str>,
    sort_dir: Option<SortDirection>,
    entity: &schema::EntitySchema,
    default_sort: Vec<Value>,
) -> Vec<Value> {
    let mut sort = match (sort_field, sort_dir) {
        (Some(field), Some(dir)) => match entity.backend_sort_key(field) {
            Some(backend_key) => vec![json!({backend_key: {"order": dir.to_string()}})],
            None => default_sort,
        },
        _ => default_sort,
    };
    sort.push(json!({"_score": {"order": "desc"}}));
    sort
}

fn rfc3339(date: OffsetDateTime) -> String {
    date.format(&Rfc3339).unwrap_or_else(|_| date.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn dated_query() -> ArticleQuery {
        ArticleQuery {
            date_min: Some(datetime!(2024-01-01 0:00 UTC)),
            date_max: Some(datetime!(2024-02-01 0:00 UTC)),
            ..Default::default()
        }
    }

    fn bool_part<'a>(compiled: &'a CompiledSearch, part: &str) -> &'a Vec<Value> {
        compiled.query.as_ref().unwrap()["bool"][part]
            .as_array()
            .unwrap()
    }

    #[test]
    fn empty_query_compiles_to_pure_filter() {
        let compiled = compile_article_text(&dated_query());
        assert!(bool_part(&compiled, "should").is_empty());
        assert_eq!(
            compiled.query.as_ref().unwrap()["bool"]["minimum_should_match"],
            0
        );
    }

    #[test]
    fn free_text_emits_title_and_paragraph_alternatives() {
        let query = ArticleQuery {
            query: Some("climate".to_string()),
            ..dated_query()
        };
        let compiled = compile_article_text(&query);

        let should = bool_part(&compiled, "should");
        assert_eq!(should.len(), 2);
        assert_eq!(should[0], json!({"match": {"article.paragraphs": "climate"}}));
        assert_eq!(
            should[1],
            json!({"match": {"article.title": {"query": "climate", "boost": 2}}})
        );
        assert_eq!(
            compiled.query.as_ref().unwrap()["bool"]["minimum_should_match"],
            1
        );
    }

    #[test]
    fn publish_date_filter_always_present_and_spans_range() {
        let compiled = compile_article_text(&dated_query());
        let filters = bool_part(&compiled, "filter");
        assert_eq!(
            filters[0],
            json!({
                "range": {
                    "article.publish_date": {
                        "gte": "2024-01-01T00:00:00Z",
                        "lte": "2024-02-01T00:00:00Z",
                    }
                }
            })
        );
    }

    #[test]
    fn date_defaults_resolve_to_corpus_epoch_and_now() {
        let before = OffsetDateTime::now_utc();
        let compiled = compile_article_text(&ArticleQuery::default());
        let filters = bool_part(&compiled, "filter");
        let range = &filters[0]["range"]["article.publish_date"];

        assert_eq!(range["gte"], "1000-01-01T00:00:00Z");
        let lte = OffsetDateTime::parse(
            range["lte"].as_str().unwrap(),
            &time::format_description::well_known::Rfc3339,
        )
        .unwrap();
        assert!(lte >= before);
    }

    #[test]
    fn structural_predicates_land_in_must_and_filter() {
        let query = ArticleQuery {
            source: Some("bbc".to_string()),
            author: Some("doe".to_string()),
            categories: Some("politics".to_string()),
            topic: Some("elections".to_string()),
            ids: vec!["a1".to_string()],
            category_ids: vec!["c1".to_string()],
            topic_ids: vec!["t1".to_string()],
            ..dated_query()
        };
        let compiled = compile_article_text(&query);

        let must = bool_part(&compiled, "must");
        assert_eq!(must.len(), 4);
        assert_eq!(must[0], json!({"match": {"article.source": "bbc"}}));
        assert_eq!(must[3], json!({"match": {"topics.topic_names": "elections"}}));

        let filters = bool_part(&compiled, "filter");
        assert_eq!(filters.len(), 4);
        assert_eq!(filters[1], json!({"terms": {"_id": ["a1"]}}));
        assert_eq!(filters[2], json!({"match": {"article.categories.ids": ["c1"]}}));
        assert_eq!(filters[3], json!({"terms": {"topics.topic_ids": ["t1"]}}));
    }

    #[test]
    fn pagination_is_offset_times_size() {
        let query = ArticleQuery {
            page: 3,
            page_size: 20,
            ..dated_query()
        };
        let compiled = compile_article_text(&query);
        assert_eq!(compiled.from, Some(60));
        assert_eq!(compiled.size, Some(20));
    }

    #[test]
    fn embeddings_always_excluded() {
        let compiled = compile_article_text(&dated_query());
        assert_eq!(compiled.source_excludes, vec!["analyzer.embeddings"]);

        let knn = compile_article_knn(&dated_query(), &[0.0; 4]);
        assert_eq!(knn.source_excludes, vec!["analyzer.embeddings"]);
    }

    #[test]
    fn projection_mask_expands_through_schema() {
        let query = ArticleQuery {
            return_attributes: vec!["id".to_string(), "categories".to_string()],
            ..dated_query()
        };
        let compiled = compile_article_text(&query);
        assert_eq!(
            compiled.source_includes.as_deref().unwrap(),
            [
                schema::ID_SENTINEL.to_string(),
                "article.categories".to_string(),
                "analyzer.category_ids".to_string(),
            ]
        );
    }

    #[test]
    fn no_mask_means_full_source() {
        let compiled = compile_article_text(&dated_query());
        assert!(compiled.source_includes.is_none());
    }

    #[test]
    fn default_sort_is_publish_date_with_score_tiebreak() {
        let compiled = compile_article_text(&dated_query());
        assert_eq!(
            compiled.sort,
            vec![
                json!({"article.publish_date": {"order": "desc"}}),
                json!({"_score": {"order": "desc"}}),
            ]
        );
        assert!(compiled.track_scores);
    }

    #[test]
    fn explicit_sort_replaces_default_but_keeps_tiebreak() {
        let query = ArticleQuery {
            sort_field: Some("publish_date".to_string()),
            sort_dir: Some(SortDirection::Asc),
            ..dated_query()
        };
        let compiled = compile_article_text(&query);
        assert_eq!(
            compiled.sort,
            vec![
                json!({"article.publish_date": {"order": "asc"}}),
                json!({"_score": {"order": "desc"}}),
            ]
        );
    }

    #[test]
    fn knn_descriptor_carries_pre_filters_and_constants() {
        let query = ArticleQuery {
            source: Some("bbc".to_string()),
            topic_ids: vec!["t1".to_string()],
            ..dated_query()
        };
        let compiled = compile_article_knn(&query, &[0.25, 0.5]);

        assert!(compiled.query.is_none());
        let knn = compiled.knn.as_ref().unwrap();
        assert_eq!(knn["field"], "analyzer.embeddings");
        assert_eq!(knn["num_candidates"], 50);
        assert_eq!(knn["k"], 10);
        assert_eq!(knn["query_vector"], json!([0.25, 0.5]));

        let filters = knn["filter"].as_array().unwrap();
        assert_eq!(filters.len(), 3);
        assert!(filters[0]["range"]["article.publish_date"].is_object());
        assert_eq!(filters[1], json!({"match": {"article.source": "bbc"}}));
        assert_eq!(filters[2], json!({"terms": {"topics.topic_ids": ["t1"]}}));

        // kNN is not paginable
        assert_eq!(compiled.from, None);
        assert_eq!(compiled.size, None);
    }

    #[test]
    fn topics_require_whole_window_inside_range() {
        let query = TopicQuery {
            date_min: Some(datetime!(2024-01-01 0:00 UTC)),
            date_max: Some(datetime!(2024-02-01 0:00 UTC)),
            ..Default::default()
        };
        let compiled = compile_topics(&query);
        let filters = bool_part(&compiled, "filter");
        assert_eq!(filters.len(), 2);
        assert!(filters[0]["range"]["batch_query.publish_date.start"].is_object());
        assert!(filters[1]["range"]["batch_query.publish_date.end"].is_object());
    }

    #[test]
    fn topic_count_bounds_become_a_range_filter() {
        let query = TopicQuery {
            count_min: Some(5),
            count_max: Some(50),
            ..Default::default()
        };
        let compiled = compile_topics(&query);
        let filters = bool_part(&compiled, "filter");
        assert_eq!(filters[0], json!({"range": {"count": {"gte": 5, "lte": 50}}}));
    }

    #[test]
    fn topic_default_sort_is_window_end_then_count() {
        let compiled = compile_topics(&TopicQuery::default());
        assert_eq!(
            compiled.sort,
            vec![
                json!({"batch_query.publish_date.end": {"order": "desc"}}),
                json!({"count": {"order": "desc"}}),
                json!({"_score": {"order": "desc"}}),
            ]
        );
    }

    #[test]
    fn topic_batches_filter_both_window_bounds_and_counts() {
        let query = TopicBatchQuery {
            ids: vec!["b1".to_string()],
            count_min: Some(100),
            topic_count_max: Some(10),
            ..Default::default()
        };
        let compiled = compile_topic_batches(&query);
        let filters = bool_part(&compiled, "filter");
        assert_eq!(filters.len(), 5);
        assert_eq!(filters[0], json!({"terms": {"_id": ["b1"]}}));
        assert_eq!(filters[1], json!({"range": {"article_count": {"gte": 100}}}));
        assert_eq!(filters[2], json!({"range": {"topic_count": {"lte": 10}}}));
        assert!(filters[3]["range"]["query.publish_date.start"].is_object());
        assert!(filters[4]["range"]["query.publish_date.end"].is_object());
    }

    #[test]
    fn categories_match_name_when_query_present() {
        let query = CategoryQuery {
            query: Some("sports".to_string()),
            ids: vec!["c1".to_string()],
            ..Default::default()
        };
        let compiled = compile_categories(&query);
        let should = bool_part(&compiled, "should");
        assert_eq!(should[0], json!({"match": {"name": "sports"}}));
        assert_eq!(
            compiled.query.as_ref().unwrap()["bool"]["minimum_should_match"],
            1
        );
        let filters = bool_part(&compiled, "filter");
        assert_eq!(filters[0], json!({"terms": {"_id": ["c1"]}}));
    }

    #[test]
    fn categories_without_query_have_no_should_requirement() {
        let compiled = compile_categories(&CategoryQuery::default());
        assert!(bool_part(&compiled, "should").is_empty());
        assert_eq!(
            compiled.query.as_ref().unwrap()["bool"]["minimum_should_match"],
            0
        );
        assert!(compiled.sort.is_empty());
    }
}
