//! Catalog store contract consumed by the sitemap service.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::catalog::{CatalogEntry, CategoryEntry};

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("catalog transport error: {0}")]
    Transport(String),
    #[error("catalog query failed: {0}")]
    Query(String),
    #[error("catalog returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("catalog response could not be decoded: {0}")]
    Decode(String),
    #[error("catalog request timed out")]
    Timeout,
}

impl CatalogError {
    pub fn query(err: impl std::fmt::Display) -> Self {
        Self::Query(err.to_string())
    }

    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}

/// External provider of game and category identities.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_catalog_slugs(&self) -> Result<Vec<CatalogEntry>, CatalogError>;

    async fn list_category_slugs(&self) -> Result<Vec<CategoryEntry>, CatalogError>;

    async fn health_check(&self) -> Result<(), CatalogError>;
}
