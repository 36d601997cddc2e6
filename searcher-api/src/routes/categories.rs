use axum::{extract::State, Json};
use axum_extra::extract::{Query, WithRejection};
use tracing::instrument;

use super::ApiError;
use crate::dto::{CategoryQuery, CategoryResults};
use crate::AppState;

#[instrument(name = "GET /api/v1/search/categories", skip(state))]
pub(crate) async fn search_categories(
    State(state): State<AppState>,
    WithRejection(Query(mut query), _): WithRejection<Query<CategoryQuery>, ApiError>,
) -> Result<Json<CategoryResults>, ApiError> {
    query.validate()?;
    let results = state.search().search_categories(&query).await?;
    Ok(Json(results))
}
