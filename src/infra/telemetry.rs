use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
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

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "socio_cache_hit_total",
            Unit::Count,
            "Reads served from a well-formed cache entry."
        );
        describe_counter!(
            "socio_cache_miss_total",
            Unit::Count,
            "Reads that fell through to the primary store."
        );
        describe_counter!(
            "socio_cache_corrupt_total",
            Unit::Count,
            "Cache entries that failed to deserialize and were overwritten."
        );
        describe_counter!(
            "socio_cache_store_error_total",
            Unit::Count,
            "Cache store calls that failed and were swallowed."
        );
        describe_counter!(
            "socio_cache_evict_total",
            Unit::Count,
            "In-process cache evictions due to capacity."
        );
        describe_counter!(
            "socio_cache_invalidated_keys_total",
            Unit::Count,
            "Cache keys deleted by invalidation."
        );
        describe_histogram!(
            "socio_cache_invalidate_ms",
            Unit::Milliseconds,
            "Invalidation plan execution latency in milliseconds."
        );
        describe_histogram!(
            "socio_counter_resync_ms",
            Unit::Milliseconds,
            "Counter resync run latency in milliseconds."
        );
    });
}
