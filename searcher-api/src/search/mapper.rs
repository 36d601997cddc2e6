//! Mapping of raw backend hits onto domain entities.
//!
//! A missing group or leaf yields an absent field, never an error.
//! The single hard contract is the backend document id, which must
//! ride on every hit.

use serde_json::Value;
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, PrimitiveDateTime};

use super::traits::{HitPage, Result, SearchError};
use crate::domain::{
    Article, ArticleList, ArticleTopic, Category, CategoryList, PublishDateWindow, Topic,
    TopicArticle, TopicArticleQuery, TopicBatch, TopicBatchList, TopicList,
};

/// Paragraphs surfaced on the reader-facing article preview.
const PARAGRAPH_PREVIEW_LEN: usize = 3;

pub fn map_articles(page: &HitPage) -> Result<ArticleList> {
    let articles = page
        .hits
        .iter()
        .map(map_article)
        .collect::<Result<Vec<_>>>()?;
    Ok(ArticleList {
        articles,
        total: page.total,
    })
}

fn map_article(hit: &Value) -> Result<Article> {
    let mut article = Article::new(hit_id(hit)?);
    let source = hit.get("_source").unwrap_or(&Value::Null);

    if let Some(doc) = source.get("article") {
        article.url = string_field(doc, "url");
        article.source = string_field(doc, "source");
        article.publish_date = date_field(doc, "publish_date");
        article.image = string_field(doc, "image");
        article.author = string_list(doc, "author").map(|lines| lines.join("\n"));
        article.title = string_list(doc, "title").map(|lines| lines.join("\n"));
        article.paragraphs = string_list(doc, "paragraphs")
            .map(|paragraphs| paragraphs.into_iter().take(PARAGRAPH_PREVIEW_LEN).collect());
        article.categories = doc.get("categories").and_then(map_categories_group);
    }

    if let Some(analyzer) = source.get("analyzer") {
        article.entities = string_list(analyzer, "entities");
        article.embeddings = analyzer.get("embeddings").and_then(float_list);

        // the analyzed subset only exists relative to the merged categories
        if let (Some(categories), Some(analyzed_ids)) =
            (&article.categories, string_list(analyzer, "category_ids"))
        {
            article.analyzed_categories = Some(
                categories
                    .iter()
                    .filter(|category| analyzed_ids.contains(&category.id))
                    .cloned()
                    .collect(),
            );
        }
    }

    if let Some(topics) = source.get("topics") {
        if let (Some(ids), Some(names)) = (
            string_list(topics, "topic_ids"),
            string_list(topics, "topic_names"),
        ) {
            let topics: Vec<ArticleTopic> = ids
                .into_iter()
                .zip(names)
                .map(|(id, topic_name)| ArticleTopic { id, topic_name })
                .collect();
            if !topics.is_empty() {
                article.topics = Some(topics);
            }
        }
    }

    Ok(article)
}

fn map_categories_group(group: &Value) -> Option<Vec<Category>> {
    let ids = string_list(group, "ids")?;
    let names = string_list(group, "names")?;
    Some(
        ids.into_iter()
            .zip(names)
            .map(|(id, name)| Category { id, name })
            .collect(),
    )
}

pub fn map_topics(page: &HitPage) -> Result<TopicList> {
    let topics = page.hits.iter().map(map_topic).collect::<Result<Vec<_>>>()?;
    Ok(TopicList {
        topics,
        total: page.total,
    })
}

fn map_topic(hit: &Value) -> Result<Topic> {
    let mut topic = Topic::new(hit_id(hit)?);
    let source = hit.get("_source").unwrap_or(&Value::Null);

    topic.batch_id = string_field(source, "batch_id");
    topic.create_time = date_field(source, "create_time");
    topic.topic = string_field(source, "topic");
    topic.count = source.get("count").and_then(Value::as_u64);
    topic.batch_query = source.get("batch_query").and_then(map_publish_window);
    topic.representative_articles = source
        .get("representative_articles")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(map_topic_article).collect());

    Ok(topic)
}

fn map_topic_article(entry: &Value) -> Option<TopicArticle> {
    let id = entry.get("_id").and_then(Value::as_str)?.to_string();
    Some(TopicArticle {
        id,
        url: string_field(entry, "url"),
        image: string_field(entry, "image"),
        publish_date: date_field(entry, "publish_date"),
        author: string_list(entry, "author"),
        title: string_list(entry, "title"),
    })
}

fn map_publish_window(query: &Value) -> Option<TopicArticleQuery> {
    let window = query.get("publish_date")?;
    Some(TopicArticleQuery {
        publish_date: PublishDateWindow {
            start: date_field(window, "start")?,
            end: date_field(window, "end")?,
        },
    })
}

pub fn map_topic_batches(page: &HitPage) -> Result<TopicBatchList> {
    let batches = page
        .hits
        .iter()
        .map(map_topic_batch)
        .collect::<Result<Vec<_>>>()?;
    Ok(TopicBatchList {
        batches,
        total: page.total,
    })
}

fn map_topic_batch(hit: &Value) -> Result<TopicBatch> {
    let mut batch = TopicBatch::new(hit_id(hit)?);
    let source = hit.get("_source").unwrap_or(&Value::Null);

    batch.query = source.get("query").and_then(map_publish_window);
    batch.article_count = source.get("article_count").and_then(Value::as_u64);
    batch.topic_count = source.get("topic_count").and_then(Value::as_u64);
    batch.create_time = date_field(source, "create_time");

    Ok(batch)
}

pub fn map_categories(page: &HitPage) -> Result<CategoryList> {
    let categories = page
        .hits
        .iter()
        .map(map_category)
        .collect::<Result<Vec<_>>>()?;
    Ok(CategoryList {
        categories,
        total: page.total,
    })
}

fn map_category(hit: &Value) -> Result<Category> {
    let id = hit_id(hit)?;
    let source = hit.get("_source").unwrap_or(&Value::Null);
    let name = string_field(source, "name").ok_or_else(|| {
        SearchError::StoreContract(format!("no 'name' field in source of hit: {hit}"))
    })?;
    Ok(Category { id, name })
}

fn hit_id(hit: &Value) -> Result<String> {
    hit.get("_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SearchError::StoreContract(format!("no '_id' field in hit: {hit}")))
}

fn string_field(object: &Value, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

fn string_list(object: &Value, key: &str) -> Option<Vec<String>> {
    object.get(key).and_then(Value::as_array).map(|values| {
        values
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

fn float_list(value: &Value) -> Option<Vec<f32>> {
    value.as_array().map(|values| {
        values
            .iter()
            .filter_map(Value::as_f64)
            .map(|f| f as f32)
            .collect()
    })
}

/// Dates arrive as RFC-3339 or as zone-less ISO-8601; the latter are
/// taken as UTC. Anything else reads as absent.
fn date_field(object: &Value, key: &str) -> Option<OffsetDateTime> {
    let text = object.get(key).and_then(Value::as_str)?;
    OffsetDateTime::parse(text, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(text, &Iso8601::DEFAULT))
        .ok()
        .or_else(|| {
            PrimitiveDateTime::parse(text, &Iso8601::DEFAULT)
                .ok()
                .map(PrimitiveDateTime::assume_utc)
        })
}
