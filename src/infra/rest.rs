//! Catalog store backed by a hosted data API speaking the PostgREST dialect
//! (`/rest/v1/{table}?select=...&order=...`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use crate::application::repos::{CatalogError, CatalogStore};
use crate::domain::catalog::{CatalogEntry, CategoryEntry};

const GAMES_TABLE: &str = "games";
const GAMES_ORDER: &str = "created_at.desc,slug.asc";
const CATEGORIES_TABLE: &str = "categories";
const CATEGORIES_ORDER: &str = "name.asc,slug.asc";
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Clone, Debug)]
pub struct RestCatalog {
    client: Client,
    base: Url,
    api_key: String,
}

impl RestCatalog {
    pub fn new(endpoint: &str, api_key: String, timeout: Duration) -> Result<Self, CatalogError> {
        let mut base = Url::parse(endpoint.trim()).map_err(CatalogError::transport)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .map_err(CatalogError::transport)?;

        Ok(Self {
            client,
            base,
            api_key,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("playshelf/", env!("CARGO_PKG_VERSION"))
    }

    fn table_url(&self, table: &str, query: &[(&str, &str)]) -> Result<Url, CatalogError> {
        let mut url = self
            .base
            .join(&format!("rest/v1/{table}"))
            .map_err(CatalogError::transport)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", "slug");
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<T, CatalogError> {
        let response = self
            .client
            .get(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body: error_body(&bytes),
            });
        }

        serde_json::from_slice(&bytes).map_err(|err| CatalogError::Decode(err.to_string()))
    }
}

#[async_trait]
impl CatalogStore for RestCatalog {
    async fn list_catalog_slugs(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        let url = self.table_url(GAMES_TABLE, &[("order", GAMES_ORDER)])?;
        self.fetch(url).await
    }

    async fn list_category_slugs(&self) -> Result<Vec<CategoryEntry>, CatalogError> {
        let url = self.table_url(CATEGORIES_TABLE, &[("order", CATEGORIES_ORDER)])?;
        self.fetch(url).await
    }

    async fn health_check(&self) -> Result<(), CatalogError> {
        let url = self.table_url(GAMES_TABLE, &[("limit", "1")])?;
        self.fetch::<Vec<CatalogEntry>>(url).await.map(|_| ())
    }
}

/// Lossy UTF-8 of an error response, capped at `MAX_ERROR_BODY_CHARS`.
fn error_body(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    match text.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}... ({} bytes total)", &text[..cut], bytes.len()),
        None => text.into_owned(),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> CatalogError {
    if err.is_timeout() {
        CatalogError::Timeout
    } else if err.is_decode() {
        CatalogError::Decode(err.to_string())
    } else {
        CatalogError::transport(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(endpoint: &str) -> RestCatalog {
        RestCatalog::new(endpoint, "anon-key".to_string(), Duration::from_secs(5))
            .expect("valid endpoint")
    }

    #[test]
    fn table_url_selects_slugs_in_order() {
        let url = catalog("https://project.example.co")
            .table_url(GAMES_TABLE, &[("order", GAMES_ORDER)])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://project.example.co/rest/v1/games?select=slug&order=created_at.desc%2Cslug.asc"
        );
    }

    #[test]
    fn endpoint_path_is_kept_as_prefix() {
        let url = catalog("https://gateway.example.com/catalog")
            .table_url(CATEGORIES_TABLE, &[])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://gateway.example.com/catalog/rest/v1/categories?select=slug"
        );
    }

    #[test]
    fn error_body_is_capped() {
        let page = "<html>".repeat(200);
        let body = error_body(page.as_bytes());
        assert!(body.starts_with("<html><html>"));
        assert!(body.ends_with("... (1200 bytes total)"));
        assert_eq!(
            body.chars().count(),
            MAX_ERROR_BODY_CHARS + "... (1200 bytes total)".len()
        );

        assert_eq!(
            error_body(b"relation does not exist"),
            "relation does not exist"
        );
    }

    #[test]
    fn rejects_unparseable_endpoint() {
        assert!(matches!(
            RestCatalog::new("::", String::new(), Duration::from_secs(1)),
            Err(CatalogError::Transport(_))
        ));
    }
}
