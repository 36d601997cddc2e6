use axum::{extract::State, Json};
use axum_extra::extract::{Query, WithRejection};
use tracing::instrument;

use super::ApiError;
use crate::dto::{TopicBatchQuery, TopicBatchResults};
use crate::AppState;

#[instrument(name = "GET /api/v1/search/topic-batches", skip(state))]
pub(crate) async fn search_topic_batches(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<TopicBatchQuery>, ApiError>,
) -> Result<Json<TopicBatchResults>, ApiError> {
    query.validate()?;
    let results = state.search().search_topic_batches(&query).await?;
    Ok(Json(results))
}
