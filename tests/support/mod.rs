#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use playshelf::application::repos::{CatalogError, CatalogStore};
use playshelf::application::sitemap::SitemapService;
use playshelf::domain::catalog::{CatalogEntry, CategoryEntry};
use playshelf::domain::sitemap::SiteBase;

pub const BASE_URL: &str = "https://example.com";

/// In-memory catalog that counts fetches and can be told to fail or stall.
#[derive(Default)]
pub struct FakeCatalog {
    games: Mutex<Vec<CatalogEntry>>,
    categories: Mutex<Vec<CategoryEntry>>,
    game_fetches: AtomicUsize,
    category_fetches: AtomicUsize,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl FakeCatalog {
    pub fn new(games: &[&str], categories: &[&str]) -> Arc<Self> {
        let catalog = Self::default();
        catalog.set_games(games);
        catalog.set_categories(categories);
        Arc::new(catalog)
    }

    pub fn set_games(&self, slugs: &[&str]) {
        *self.games.lock().unwrap() = slugs.iter().map(|s| CatalogEntry::new(*s)).collect();
    }

    pub fn set_categories(&self, slugs: &[&str]) {
        *self.categories.lock().unwrap() = slugs.iter().map(|s| CategoryEntry::new(*s)).collect();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn game_fetches(&self) -> usize {
        self.game_fetches.load(Ordering::SeqCst)
    }

    pub fn category_fetches(&self) -> usize {
        self.category_fetches.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check(&self) -> Result<(), CatalogError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CatalogError::transport("connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CatalogStore for FakeCatalog {
    async fn list_catalog_slugs(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.game_fetches.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check()?;
        Ok(self.games.lock().unwrap().clone())
    }

    async fn list_category_slugs(&self) -> Result<Vec<CategoryEntry>, CatalogError> {
        self.category_fetches.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check()?;
        Ok(self.categories.lock().unwrap().clone())
    }

    async fn health_check(&self) -> Result<(), CatalogError> {
        self.check()
    }
}

pub fn service(catalog: Arc<FakeCatalog>) -> Arc<SitemapService> {
    let base = SiteBase::parse(BASE_URL).expect("valid base url");
    Arc::new(SitemapService::new(catalog, base))
}

/// `<loc>` values of a rendered sitemap, in document order.
pub fn locations(xml: &str) -> Vec<String> {
    xml.split("<loc>")
        .skip(1)
        .filter_map(|chunk| chunk.split("</loc>").next())
        .map(str::to_string)
        .collect()
}
