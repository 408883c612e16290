use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::images::{
    METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_CACHE_REPAIR, METRIC_CACHE_WRITE_FAILED,
    METRIC_NOT_FOUND, METRIC_TRANSCODE_MS,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT,
            Unit::Count,
            "Image requests served from the disk cache."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Image requests that missed the disk cache."
        );
        describe_counter!(
            METRIC_CACHE_REPAIR,
            Unit::Count,
            "Disk cache entries rewritten from the durable store."
        );
        describe_counter!(
            METRIC_CACHE_WRITE_FAILED,
            Unit::Count,
            "Disk cache writes that failed and were skipped."
        );
        describe_counter!(
            METRIC_NOT_FOUND,
            Unit::Count,
            "Image requests unknown to both the cache and the durable store."
        );
        describe_histogram!(
            METRIC_TRANSCODE_MS,
            Unit::Milliseconds,
            "Upload transcoding latency in milliseconds."
        );
    });
}
