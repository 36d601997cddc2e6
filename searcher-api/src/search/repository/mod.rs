mod elastic;
mod mock;

pub use elastic::{
    articles_mappings, categories_mappings, topic_batches_mappings, topics_mappings,
    ElasticDocumentStore,
};
pub use mock::MockDocumentStore;
