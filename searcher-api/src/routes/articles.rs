use axum::{extract::State, Json};
use axum_extra::extract::{Query, WithRejection};
use tracing::instrument;

use super::ApiError;
use crate::dto::{ArticleQuery, ArticleResults};
use crate::AppState;

#[instrument(name = "GET /api/v1/search/articles", skip(state))]
pub(crate) async fn search_articles(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ArticleQuery>, ApiError>,
) -> Result<Json<ArticleResults>, ApiError> {
    query.validate()?;
    let results = state.search().search_articles(&query).await?;
    Ok(Json(results))
}
