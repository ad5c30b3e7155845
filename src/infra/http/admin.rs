//! Operator routes, served on the admin listener only.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::application::{error::HttpError, sitemap::SitemapService};

use super::{
    catalog_health_response,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct AdminState {
    pub sitemap: Arc<SitemapService>,
}

#[derive(Debug, Serialize)]
struct SitemapStatusView {
    cached: bool,
    epoch: u64,
    bytes: usize,
    base_url: String,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/sitemap/invalidate", post(invalidate_sitemap))
        .route("/sitemap/refresh", post(refresh_sitemap))
        .route("/sitemap/status", get(sitemap_status))
        .route("/_health/catalog", get(admin_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn invalidate_sitemap(State(state): State<AdminState>) -> Response {
    state.sitemap.invalidate();
    StatusCode::NO_CONTENT.into_response()
}

async fn refresh_sitemap(State(state): State<AdminState>) -> Response {
    match state.sitemap.refresh().await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn sitemap_status(State(state): State<AdminState>) -> Json<SitemapStatusView> {
    let status = state.sitemap.status();
    Json(SitemapStatusView {
        cached: status.cached,
        epoch: status.epoch,
        bytes: status.bytes,
        base_url: state.sitemap.base().as_str().to_string(),
    })
}

async fn admin_health(State(state): State<AdminState>) -> Response {
    catalog_health_response(
        "infra::http::admin::health",
        state.sitemap.catalog_health().await,
    )
}
