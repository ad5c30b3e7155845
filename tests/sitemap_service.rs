mod support;

use std::sync::Arc;
use std::time::Duration;

use playshelf::application::sitemap::{CatalogCollection, SitemapError};
use support::{FakeCatalog, locations, service};

#[tokio::test]
async fn renders_static_pages_then_games_then_categories() {
    let catalog = FakeCatalog::new(&["space-race"], &["arcade"]);
    let sitemap = service(catalog.clone());

    let xml = sitemap.sitemap_xml().await.expect("sitemap");

    assert_eq!(
        locations(&xml),
        vec![
            "https://example.com/",
            "https://example.com/top-games",
            "https://example.com/new-releases",
            "https://example.com/contact-us",
            "https://example.com/privacy-policy",
            "https://example.com/about-us",
            "https://example.com/g/space-race",
            "https://example.com/category/arcade",
        ]
    );
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
    assert!(xml.ends_with("</urlset>\n"));
}

#[tokio::test]
async fn empty_catalog_yields_static_pages_only() {
    let sitemap = service(FakeCatalog::new(&[], &[]));

    let xml = sitemap.sitemap_xml().await.expect("sitemap");
    assert_eq!(locations(&xml).len(), 6);
}

#[tokio::test]
async fn catalog_order_is_preserved() {
    let catalog = FakeCatalog::new(&["zeta", "alpha", "mid"], &["b", "a"]);
    let sitemap = service(catalog);

    let xml = sitemap.sitemap_xml().await.expect("sitemap");
    let locs = locations(&xml);
    assert_eq!(
        &locs[6..],
        &[
            "https://example.com/g/zeta",
            "https://example.com/g/alpha",
            "https://example.com/g/mid",
            "https://example.com/category/b",
            "https://example.com/category/a",
        ]
    );
}

#[tokio::test]
async fn repeated_reads_hit_the_cache() {
    let catalog = FakeCatalog::new(&["space-race"], &["arcade"]);
    let sitemap = service(catalog.clone());

    let first = sitemap.sitemap_xml().await.expect("first read");
    catalog.set_games(&["changed"]);
    let second = sitemap.sitemap_xml().await.expect("second read");

    assert_eq!(first, second);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(catalog.game_fetches(), 1);
    assert_eq!(catalog.category_fetches(), 1);
}

#[tokio::test]
async fn invalidate_forces_refetch_on_next_read() {
    let catalog = FakeCatalog::new(&["space-race"], &[]);
    let sitemap = service(catalog.clone());

    sitemap.sitemap_xml().await.expect("first read");
    catalog.set_games(&["moon-lander"]);

    let epoch = sitemap.invalidate();
    assert_eq!(epoch, 1);
    assert!(sitemap.cached().is_none());

    let xml = sitemap.sitemap_xml().await.expect("second read");
    assert!(xml.contains("https://example.com/g/moon-lander"));
    assert!(!xml.contains("space-race"));
    assert_eq!(catalog.game_fetches(), 2);
}

#[tokio::test]
async fn invalidating_an_empty_cache_is_harmless() {
    let sitemap = service(FakeCatalog::new(&[], &[]));

    sitemap.invalidate();
    sitemap.invalidate();

    let status = sitemap.status();
    assert!(!status.cached);
    assert_eq!(status.epoch, 2);
    assert!(sitemap.sitemap_xml().await.is_ok());
}

#[tokio::test]
async fn failure_is_not_cached() {
    let catalog = FakeCatalog::new(&["space-race"], &[]);
    catalog.set_failing(true);
    let sitemap = service(catalog.clone());

    let err = sitemap.sitemap_xml().await.expect_err("catalog down");
    assert!(matches!(
        err,
        SitemapError::DataFetch {
            collection: CatalogCollection::Games,
            ..
        } | SitemapError::DataFetch {
            collection: CatalogCollection::Categories,
            ..
        }
    ));
    assert!(sitemap.cached().is_none());

    catalog.set_failing(false);
    let xml = sitemap.sitemap_xml().await.expect("recovered");
    assert!(xml.contains("https://example.com/g/space-race"));
    assert!(sitemap.status().cached);
}

#[tokio::test]
async fn refresh_rebuilds_eagerly() {
    let catalog = FakeCatalog::new(&["space-race"], &[]);
    let sitemap = service(catalog.clone());

    sitemap.sitemap_xml().await.expect("first read");
    catalog.set_games(&["moon-lander"]);

    let refreshed = sitemap.refresh().await.expect("refresh");
    assert!(refreshed.contains("moon-lander"));

    let status = sitemap.status();
    assert!(status.cached);
    assert_eq!(status.epoch, 1);
    assert_eq!(status.bytes, refreshed.len());

    let cached = sitemap.sitemap_xml().await.expect("cached read");
    assert!(Arc::ptr_eq(&cached, &refreshed));
    assert_eq!(catalog.game_fetches(), 2);
}

#[tokio::test]
async fn failed_refresh_leaves_cache_empty() {
    let catalog = FakeCatalog::new(&["space-race"], &[]);
    let sitemap = service(catalog.clone());

    sitemap.sitemap_xml().await.expect("first read");
    catalog.set_failing(true);

    assert!(sitemap.refresh().await.is_err());
    assert!(sitemap.cached().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cold_reads_share_one_regeneration() {
    let catalog = FakeCatalog::new(&["space-race"], &["arcade"]);
    catalog.set_delay(Duration::from_millis(50));
    let sitemap = service(catalog.clone());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let sitemap = sitemap.clone();
        handles.push(tokio::spawn(async move { sitemap.sitemap_xml().await }));
    }

    let mut documents = Vec::new();
    for handle in handles {
        documents.push(handle.await.expect("task").expect("sitemap"));
    }

    assert_eq!(catalog.game_fetches(), 1);
    assert_eq!(catalog.category_fetches(), 1);
    assert!(documents.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn build_document_bypasses_the_cache() {
    let catalog = FakeCatalog::new(&["space-race"], &[]);
    let sitemap = service(catalog.clone());

    let document = sitemap.build_document().await.expect("document");
    assert_eq!(document.len(), 7);
    assert!(sitemap.cached().is_none());
}

#[tokio::test]
async fn robots_points_at_sitemap() {
    let sitemap = service(FakeCatalog::new(&[], &[]));

    assert_eq!(
        sitemap.robots_txt().expect("robots"),
        "User-agent: *\nAllow: /\nSitemap: https://example.com/sitemap.xml\n"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cold_reads_share_one_failed_regeneration() {
    let catalog = FakeCatalog::new(&["space-race"], &[]);
    catalog.set_failing(true);
    catalog.set_delay(Duration::from_millis(200));
    let sitemap = service(catalog.clone());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let sitemap = sitemap.clone();
        handles.push(tokio::spawn(async move { sitemap.sitemap_xml().await }));
    }

    for handle in handles {
        let result = handle.await.expect("task");
        assert!(matches!(result, Err(SitemapError::DataFetch { .. })));
    }
    assert_eq!(catalog.game_fetches(), 1);
    assert!(sitemap.cached().is_none());

    // A later caller did not queue behind the failed run and retries.
    catalog.set_failing(false);
    catalog.set_delay(Duration::ZERO);
    sitemap.sitemap_xml().await.expect("recovered");
    assert_eq!(catalog.game_fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn invalidation_during_regeneration_is_not_overwritten() {
    let catalog = FakeCatalog::new(&["space-race"], &[]);
    catalog.set_delay(Duration::from_millis(50));
    let sitemap = service(catalog.clone());

    let reader = {
        let sitemap = sitemap.clone();
        tokio::spawn(async move { sitemap.sitemap_xml().await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(catalog.game_fetches(), 1);
    sitemap.invalidate();

    let xml = reader.await.expect("task").expect("in-flight read succeeds");
    assert!(xml.contains("https://example.com/g/space-race"));
    assert!(sitemap.cached().is_none());

    catalog.set_games(&["moon-lander"]);

    let fresh = sitemap.sitemap_xml().await.expect("rebuilt");
    assert!(fresh.contains("https://example.com/g/moon-lander"));
    assert_eq!(catalog.game_fetches(), 2);
}
