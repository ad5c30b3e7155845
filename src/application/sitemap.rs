//! Sitemap service for sitemap.xml and robots.txt generation.
//!
//! The service owns the cache slot for the generated document. Readers hit the
//! slot first; on a miss, one regeneration runs at a time and callers queued
//! behind it pick up its result instead of querying the catalog again.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use futures::future::try_join;
use metrics::{counter, histogram};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::repos::{CatalogError, CatalogStore};
use crate::cache::{CacheSlot, SlotStatus};
use crate::domain::error::DomainError;
use crate::domain::sitemap::{SiteBase, SitemapDocument};

pub const METRIC_SITEMAP_CACHE_HIT: &str = "playshelf_sitemap_cache_hit_total";
pub const METRIC_SITEMAP_CACHE_MISS: &str = "playshelf_sitemap_cache_miss_total";
pub const METRIC_SITEMAP_REGENERATE: &str = "playshelf_sitemap_regenerate_total";
pub const METRIC_SITEMAP_GENERATE_MS: &str = "playshelf_sitemap_generate_ms";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogCollection {
    Games,
    Categories,
}

impl CatalogCollection {
    pub fn as_str(self) -> &'static str {
        match self {
            CatalogCollection::Games => "games",
            CatalogCollection::Categories => "categories",
        }
    }
}

impl fmt::Display for CatalogCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
pub enum SitemapError {
    #[error("failed to fetch {collection} for sitemap: {source}")]
    DataFetch {
        collection: CatalogCollection,
        #[source]
        source: CatalogError,
    },
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl SitemapError {
    fn fetch(collection: CatalogCollection) -> impl FnOnce(CatalogError) -> Self {
        move |source| SitemapError::DataFetch { collection, source }
    }
}

pub struct SitemapService {
    catalog: Arc<dyn CatalogStore>,
    base: SiteBase,
    slot: CacheSlot,
    regenerate: Mutex<Flight>,
    // Mirrors `Flight::completed`, readable before queueing on `regenerate`.
    completed_flights: AtomicU64,
}

/// Outcome of the last regeneration, kept for callers that queued behind it.
#[derive(Default)]
struct Flight {
    completed: u64,
    failure: Option<SitemapError>,
}

impl SitemapService {
    pub fn new(catalog: Arc<dyn CatalogStore>, base: SiteBase) -> Self {
        Self {
            catalog,
            base,
            slot: CacheSlot::new(),
            regenerate: Mutex::new(Flight::default()),
            completed_flights: AtomicU64::new(0),
        }
    }

    pub fn base(&self) -> &SiteBase {
        &self.base
    }

    /// Current sitemap.xml text, regenerating it if the slot is empty.
    ///
    /// Callers that queue behind a regeneration share its outcome, failure
    /// included. A call arriving after that regeneration finished starts a
    /// new one.
    pub async fn sitemap_xml(&self) -> Result<Arc<str>, SitemapError> {
        let seen = self.completed_flights.load(Ordering::Acquire);
        if let Some(document) = self.slot.get() {
            counter!(METRIC_SITEMAP_CACHE_HIT).increment(1);
            return Ok(document);
        }
        counter!(METRIC_SITEMAP_CACHE_MISS).increment(1);

        let mut flight = self.regenerate.lock().await;
        if let Some(document) = self.slot.get() {
            debug!(
                target = "playshelf::sitemap",
                "sitemap filled by a concurrent regeneration"
            );
            return Ok(document);
        }
        if flight.completed != seen {
            if let Some(err) = flight.failure.as_ref() {
                debug!(
                    target = "playshelf::sitemap",
                    error = %err,
                    "sharing failure of a concurrent regeneration"
                );
                return Err(err.clone());
            }
        }

        self.regenerate_locked(&mut flight).await
    }

    /// Drop the cached document. Returns the epoch that starts now.
    pub fn invalidate(&self) -> u64 {
        let epoch = self.slot.invalidate();
        info!(target = "playshelf::sitemap", epoch, "sitemap cache invalidated");
        epoch
    }

    /// Invalidate and regenerate eagerly.
    pub async fn refresh(&self) -> Result<Arc<str>, SitemapError> {
        self.invalidate();

        let mut flight = self.regenerate.lock().await;
        // Anything present now was filled under the epoch started above.
        if let Some(document) = self.slot.get() {
            return Ok(document);
        }

        self.regenerate_locked(&mut flight).await
    }

    /// Fetch both collections and build the document without touching the cache.
    pub async fn build_document(&self) -> Result<SitemapDocument, SitemapError> {
        let (games, categories) = try_join(
            async {
                self.catalog
                    .list_catalog_slugs()
                    .await
                    .map_err(SitemapError::fetch(CatalogCollection::Games))
            },
            async {
                self.catalog
                    .list_category_slugs()
                    .await
                    .map_err(SitemapError::fetch(CatalogCollection::Categories))
            },
        )
        .await?;

        Ok(SitemapDocument::build(&self.base, &games, &categories)?)
    }

    /// Generate robots.txt content pointing crawlers at the sitemap.
    pub fn robots_txt(&self) -> Result<String, SitemapError> {
        let sitemap_url = self.base.location(&["sitemap.xml"])?;
        Ok(format!("User-agent: *\nAllow: /\nSitemap: {sitemap_url}\n"))
    }

    pub fn status(&self) -> SlotStatus {
        self.slot.status()
    }

    pub fn cached(&self) -> Option<Arc<str>> {
        self.slot.get()
    }

    pub async fn catalog_health(&self) -> Result<(), CatalogError> {
        self.catalog.health_check().await
    }

    async fn regenerate_locked(&self, flight: &mut Flight) -> Result<Arc<str>, SitemapError> {
        let outcome = self.regenerate_document().await;

        flight.completed = flight.completed.wrapping_add(1);
        flight.failure = outcome.as_ref().err().cloned();
        self.completed_flights.store(flight.completed, Ordering::Release);

        outcome
    }

    // Only called through `regenerate_locked`, with `self.regenerate` held.
    async fn regenerate_document(&self) -> Result<Arc<str>, SitemapError> {
        let epoch = self.slot.epoch();
        let started_at = Instant::now();

        let document = match self.build_document().await {
            Ok(document) => document,
            Err(err) => {
                counter!(METRIC_SITEMAP_REGENERATE, "outcome" => "error").increment(1);
                warn!(
                    target = "playshelf::sitemap",
                    error = %err,
                    epoch,
                    "sitemap regeneration failed"
                );
                return Err(err);
            }
        };

        let xml: Arc<str> = Arc::from(document.to_xml());
        let stored = self.slot.fill(epoch, Arc::clone(&xml));

        counter!(METRIC_SITEMAP_REGENERATE, "outcome" => "ok").increment(1);
        histogram!(METRIC_SITEMAP_GENERATE_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        info!(
            target = "playshelf::sitemap",
            urls = document.len(),
            bytes = xml.len(),
            epoch,
            stored,
            "sitemap regenerated"
        );

        Ok(xml)
    }
}
