mod support;

use std::collections::HashSet;

use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use playshelf::application::sitemap::{
    METRIC_SITEMAP_CACHE_HIT, METRIC_SITEMAP_CACHE_MISS, METRIC_SITEMAP_GENERATE_MS,
    METRIC_SITEMAP_REGENERATE,
};
use support::{FakeCatalog, service};

#[tokio::test]
async fn sitemap_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let catalog = FakeCatalog::new(&["space-race"], &[]);
    let sitemap = service(catalog.clone());

    sitemap.sitemap_xml().await.expect("miss then regenerate");
    sitemap.sitemap_xml().await.expect("hit");
    catalog.set_failing(true);
    sitemap.invalidate();
    assert!(sitemap.sitemap_xml().await.is_err());

    let snapshot = snapshotter.snapshot().into_vec();

    let names: HashSet<String> = snapshot
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();
    for expected in [
        METRIC_SITEMAP_CACHE_HIT,
        METRIC_SITEMAP_CACHE_MISS,
        METRIC_SITEMAP_REGENERATE,
        METRIC_SITEMAP_GENERATE_MS,
    ] {
        assert!(names.contains(expected), "missing metric {expected}");
    }

    let counter = |name: &str| -> u64 {
        snapshot
            .iter()
            .filter(|(key, _, _, _)| key.key().name() == name)
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(count) => *count,
                _ => 0,
            })
            .sum()
    };
    assert_eq!(counter(METRIC_SITEMAP_CACHE_HIT), 1);
    assert_eq!(counter(METRIC_SITEMAP_CACHE_MISS), 2);

    let outcomes: HashSet<String> = snapshot
        .iter()
        .filter(|(key, _, _, _)| key.key().name() == METRIC_SITEMAP_REGENERATE)
        .flat_map(|(key, _, _, _)| {
            key.key()
                .labels()
                .filter(|label| label.key() == "outcome")
                .map(|label| label.value().to_string())
                .collect::<Vec<_>>()
        })
        .collect();
    assert_eq!(
        outcomes,
        HashSet::from(["ok".to_string(), "error".to_string()])
    );
}
