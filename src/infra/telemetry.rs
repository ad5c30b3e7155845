use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing::{Subscriber, level_filters::LevelFilter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::application::sitemap::{
    METRIC_SITEMAP_CACHE_HIT, METRIC_SITEMAP_CACHE_MISS, METRIC_SITEMAP_GENERATE_MS,
    METRIC_SITEMAP_REGENERATE,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global subscriber: `RUST_LOG` directives win over the configured
/// level, and spans carry `SpanTrace`s for error reports.
///
/// Logs go to stderr; stdout is reserved for `render` output.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    tracing_subscriber::registry()
        .with(env_filter(logging.level))
        .with(ErrorLayer::default())
        .with(fmt_layer(logging.format))
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

fn fmt_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .with_target(true)
            .with_thread_ids(false)
            .boxed(),
    }
}

/// Register units and help text for the sitemap metrics. Idempotent.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_SITEMAP_CACHE_HIT,
            Unit::Count,
            "Sitemap requests served from the cache slot."
        );
        describe_counter!(
            METRIC_SITEMAP_CACHE_MISS,
            Unit::Count,
            "Sitemap requests that found the cache slot empty."
        );
        describe_counter!(
            METRIC_SITEMAP_REGENERATE,
            Unit::Count,
            "Sitemap regenerations, labelled by outcome."
        );
        describe_histogram!(
            METRIC_SITEMAP_GENERATE_MS,
            Unit::Milliseconds,
            "Sitemap regeneration latency in milliseconds."
        );
    });
}
