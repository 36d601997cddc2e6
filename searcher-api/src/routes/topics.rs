use axum::{extract::State, Json};
use axum_extra::extract::{Query, WithRejection};
use tracing::instrument;

use super::ApiError;
use crate::dto::{TopicQuery, TopicResults};
use crate::AppState;

#[instrument(name = "GET /api/v1/search/topics", skip(state))]
pub(crate) async fn search_topics(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<TopicQuery>, ApiError>,
) -> Result<Json<TopicResults>, ApiError> {
    query.validate()?;
    let results = state.search().search_topics(&query).await?;
    Ok(Json(results))
}
