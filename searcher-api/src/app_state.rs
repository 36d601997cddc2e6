use std::sync::Arc;

use crate::search::embedder::MiniLmEmbedder;
use crate::search::repository::ElasticDocumentStore;
use crate::search::SearchService;

/// The service wired with its production collaborators.
pub type AppSearchService = SearchService<MiniLmEmbedder, ElasticDocumentStore>;

#[derive(Clone)]
pub struct AppState {
    search: Arc<AppSearchService>,
}

impl AppState {
    pub fn new(search: AppSearchService) -> Self {
        Self {
            search: Arc::new(search),
        }
    }

    pub fn search(&self) -> &AppSearchService {
        &self.search
    }
}
