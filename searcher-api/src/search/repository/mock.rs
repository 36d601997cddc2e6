//! In-memory document store for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::search::compiler::CompiledSearch;
use crate::search::traits::{
    BulkAction, BulkSummary, DocumentStore, HitPage, Result, SearchError,
};

type ErrorFactory = dyn Fn() -> SearchError + Send + Sync;

/// Mock store that replays queued hit pages and records every request.
///
/// Queued pages go through the store's `_source` filtering: includes
/// and excludes from the compiled descriptor are honoured, so tests
/// observe the same projection behaviour as against the real cluster.
#[derive(Clone, Default)]
pub struct MockDocumentStore {
    pages: Arc<RwLock<HashMap<String, VecDeque<HitPage>>>>,
    requests: Arc<RwLock<Vec<(String, CompiledSearch)>>>,
    documents: Arc<RwLock<HashMap<(String, String), Value>>>,
    asserted: Arc<RwLock<Vec<String>>>,
    failing: Arc<RwLock<Option<Arc<ErrorFactory>>>>,
    failing_bulk_ids: Arc<RwLock<Vec<String>>>,
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a page to be returned by the next search on `index`.
    pub fn with_page(self, index: &str, page: HitPage) -> Self {
        self.pages
            .write()
            .unwrap()
            .entry(index.to_string())
            .or_default()
            .push_back(page);
        self
    }

    /// Make every search fail with the produced error.
    pub fn failing_with(
        self,
        factory: impl Fn() -> SearchError + Send + Sync + 'static,
    ) -> Self {
        *self.failing.write().unwrap() = Some(Arc::new(factory));
        self
    }

    /// Make bulk writes report these action ids as failed.
    pub fn failing_bulk_ids(self, ids: &[&str]) -> Self {
        *self.failing_bulk_ids.write().unwrap() =
            ids.iter().map(|id| id.to_string()).collect();
        self
    }

    /// Every `(index, request)` pair seen so far.
    pub fn recorded_requests(&self) -> Vec<(String, CompiledSearch)> {
        self.requests.read().unwrap().clone()
    }

    /// Indices asserted so far.
    pub fn asserted_indices(&self) -> Vec<String> {
        self.asserted.read().unwrap().clone()
    }

    /// Current document under `(index, id)`.
    pub fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.documents
            .read()
            .unwrap()
            .get(&(index.to_string(), id.to_string()))
            .cloned()
    }

    /// Number of documents held for `index`.
    pub fn document_count(&self, index: &str) -> usize {
        self.documents
            .read()
            .unwrap()
            .keys()
            .filter(|(idx, _)| idx == index)
            .count()
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn search(&self, index: &str, request: &CompiledSearch) -> Result<HitPage> {
        self.requests
            .write()
            .unwrap()
            .push((index.to_string(), request.clone()));

        if let Some(factory) = self.failing.read().unwrap().as_ref() {
            return Err(factory());
        }

        let page = self
            .pages
            .write()
            .unwrap()
            .get_mut(index)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default();

        let hits = page
            .hits
            .into_iter()
            .map(|hit| apply_source_filter(hit, request))
            .collect();
        Ok(HitPage {
            hits,
            total: page.total,
        })
    }

    async fn bulk_upsert(&self, index: &str, actions: Vec<BulkAction>) -> Result<BulkSummary> {
        let failing = self.failing_bulk_ids.read().unwrap().clone();
        let mut documents = self.documents.write().unwrap();
        let mut summary = BulkSummary::default();
        for action in actions {
            if failing.contains(&action.id) {
                summary.failed += 1;
                continue;
            }
            documents.insert((index.to_string(), action.id), action.document);
            summary.stored += 1;
        }
        Ok(summary)
    }

    async fn assert_index(&self, index: &str, _mappings: Value) -> Result<()> {
        self.asserted.write().unwrap().push(index.to_string());
        Ok(())
    }
}

/// Mirror the store's `_source` filtering on a queued hit.
fn apply_source_filter(mut hit: Value, request: &CompiledSearch) -> Value {
    let Some(source) = hit.get("_source").cloned() else {
        return hit;
    };

    let mut filtered = match &request.source_includes {
        Some(includes) => {
            let mut kept = json!({});
            for path in includes {
                copy_path(&source, &mut kept, path);
            }
            kept
        }
        None => source,
    };

    for path in &request.source_excludes {
        remove_path(&mut filtered, path);
    }

    hit["_source"] = filtered;
    hit
}

fn copy_path(source: &Value, target: &mut Value, path: &str) {
    let segments: Vec<&str> = path.split('.').collect();
    let Some(value) = segments
        .iter()
        .try_fold(source, |node, segment| node.get(segment))
    else {
        return;
    };
    insert_at(target, &segments, value.clone());
}

fn insert_at(target: &mut Value, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [leaf] => target[*leaf] = value,
        [head, rest @ ..] => {
            if !target.get(*head).is_some_and(Value::is_object) {
                target[*head] = json!({});
            }
            insert_at(&mut target[*head], rest, value);
        }
    }
}

fn remove_path(target: &mut Value, path: &str) {
    let segments: Vec<&str> = path.split('.').collect();
    remove_at(target, &segments);
}

fn remove_at(target: &mut Value, segments: &[&str]) {
    match segments {
        [] => {}
        [leaf] => {
            if let Some(object) = target.as_object_mut() {
                object.remove(*leaf);
            }
        }
        [head, rest @ ..] => {
            if let Some(next) = target.get_mut(*head) {
                remove_at(next, rest);
            }
        }
    }
}
