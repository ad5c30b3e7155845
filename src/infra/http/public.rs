use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;

use crate::application::{error::HttpError, sitemap::SitemapService};

use super::{
    catalog_health_response,
    middleware::{log_responses, set_request_context},
};

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

#[derive(Clone)]
pub struct HttpState {
    pub sitemap: Arc<SitemapService>,
    sitemap_cache_control: HeaderValue,
}

impl HttpState {
    /// `max_age` bounds how long downstream caches may keep a sitemap; pass
    /// the refresh interval so no copy outlives the periodic rebuild.
    pub fn new(sitemap: Arc<SitemapService>, max_age: Duration) -> Self {
        let sitemap_cache_control =
            HeaderValue::from_str(&format!("public, max-age={}", max_age.as_secs()))
                .unwrap_or_else(|_| HeaderValue::from_static("no-cache"));
        Self {
            sitemap,
            sitemap_cache_control,
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/sitemap.xml", get(sitemap))
        .route("/robots.txt", get(robots_txt))
        .route("/_health/catalog", get(public_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn sitemap(State(state): State<HttpState>) -> Response {
    match state.sitemap.sitemap_xml().await {
        Ok(document) => xml_response(document, state.sitemap_cache_control.clone()),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn robots_txt(State(state): State<HttpState>) -> Response {
    match state.sitemap.robots_txt() {
        Ok(body) => plain_response(body),
        Err(err) => HttpError::new(
            "infra::http::public::robots",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to generate robots.txt",
            err.to_string(),
        )
        .into_response(),
    }
}

async fn public_health(State(state): State<HttpState>) -> Response {
    catalog_health_response(
        "infra::http::public::health",
        state.sitemap.catalog_health().await,
    )
}

/// Lets a cached `Arc<str>` back a response body without copying it.
struct SharedText(Arc<str>);

impl AsRef<[u8]> for SharedText {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

fn xml_response(document: Arc<str>, cache_control: HeaderValue) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, XML_CONTENT_TYPE)
        .header(CACHE_CONTROL, cache_control)
        .body(Body::from(Bytes::from_owner(SharedText(document))))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn plain_response(body: String) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
