//! Read-only identities supplied by the catalog store.

use serde::{Deserialize, Serialize};

/// A game listed in the catalog, reduced to the slug used for its URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CatalogEntry {
    pub slug: String,
}

impl CatalogEntry {
    pub fn new(slug: impl Into<String>) -> Self {
        Self { slug: slug.into() }
    }
}

/// A category listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategoryEntry {
    pub slug: String,
}

impl CategoryEntry {
    pub fn new(slug: impl Into<String>) -> Self {
        Self { slug: slug.into() }
    }
}
