//! Ingest path: at-least-once consumption of "analyzed batch"
//! notifications and bulk writes into the articles index.
//!
//! [`StreamConsumer`] owns the consumer-group mechanics (pending
//! recovery, idle reclaim, acknowledgements); [`IngestCoordinator`]
//! turns one notification into a batch fetch plus a bulk upsert.
//! Redelivery is harmless because upserts key on the article id.

mod analyzer;
mod consumer;
mod coordinator;

pub use analyzer::{AnalyzerRepository, MockAnalyzerRepository, MongoAnalyzerRepository};
pub use consumer::StreamConsumer;
pub use coordinator::{IngestCoordinator, NotificationHandler};

use crate::search::SearchError;

/// Errors on the ingest path. The consumer logs them and leaves the
/// message unacknowledged so it is redelivered.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("malformed notification: {0}")]
    Notification(String),

    #[error("analyzer store error: {0}")]
    Analyzer(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error(transparent)]
    Store(#[from] SearchError),
}
