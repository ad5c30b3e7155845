//! Postgres-backed catalog store.

mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    query, query_as,
};

use crate::application::repos::{CatalogError, CatalogStore};
use crate::domain::catalog::{CatalogEntry, CategoryEntry};

const LIST_GAME_SLUGS: &str = "SELECT slug FROM games ORDER BY created_at DESC, slug";
const LIST_CATEGORY_SLUGS: &str = "SELECT slug FROM categories ORDER BY name, slug";

#[derive(Clone)]
pub struct PostgresCatalog {
    pool: Arc<PgPool>,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Build a pool without opening a connection, so the service can start
    /// while the database is still unreachable.
    pub fn connect_lazy(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(url)
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalog {
    async fn list_catalog_slugs(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        query_as::<_, CatalogEntry>(LIST_GAME_SLUGS)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn list_category_slugs(&self) -> Result<Vec<CategoryEntry>, CatalogError> {
        query_as::<_, CategoryEntry>(LIST_CATEGORY_SLUGS)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn health_check(&self) -> Result<(), CatalogError> {
        query("SELECT 1")
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}
