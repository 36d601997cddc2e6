use anyhow::Context;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::{routing::get, Router};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::config::CorsSettings;
use crate::{routes, AppState};

pub fn create(state: AppState, cors: &CorsSettings) -> anyhow::Result<Router> {
    let router = Router::new()
        .route("/api/v1/search/articles", get(routes::search_articles))
        .route("/api/v1/search/topics", get(routes::search_topics))
        .route(
            "/api/v1/search/topic-batches",
            get(routes::search_topic_batches),
        )
        .route("/api/v1/search/categories", get(routes::search_categories))
        .with_state(state)
        .layer(cors_layer(cors)?)
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()));

    Ok(router)
}

/// Wildcard entries mirror the request when credentials are allowed;
/// a literal `*` together with credentials is rejected by the CORS
/// middleware.
fn cors_layer(settings: &CorsSettings) -> anyhow::Result<CorsLayer> {
    let credentials = settings.allow_credentials;
    let mut layer = CorsLayer::new().allow_credentials(credentials);

    let origins = settings.origins();
    layer = if origins.contains(&"*") {
        if credentials {
            layer.allow_origin(AllowOrigin::mirror_request())
        } else {
            layer.allow_origin(Any)
        }
    } else {
        let origins = origins
            .iter()
            .map(|origin| origin.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .context("invalid CORS_ALLOWED_ORIGINS entry")?;
        layer.allow_origin(origins)
    };

    let methods = settings.methods();
    layer = if methods.contains(&"*") {
        if credentials {
            layer.allow_methods(AllowMethods::mirror_request())
        } else {
            layer.allow_methods(Any)
        }
    } else {
        let methods = methods
            .iter()
            .map(|method| method.parse::<Method>())
            .collect::<Result<Vec<_>, _>>()
            .context("invalid CORS_ALLOWED_METHODS entry")?;
        layer.allow_methods(methods)
    };

    let headers = settings.headers();
    layer = if headers.contains(&"*") {
        if credentials {
            layer.allow_headers(AllowHeaders::mirror_request())
        } else {
            layer.allow_headers(Any)
        }
    } else {
        let headers = headers
            .iter()
            .map(|header| header.parse::<HeaderName>())
            .collect::<Result<Vec<_>, _>>()
            .context("invalid CORS_ALLOWED_HEADERS entry")?;
        layer.allow_headers(headers)
    };

    Ok(layer)
}
