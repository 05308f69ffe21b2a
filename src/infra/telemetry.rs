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

pub const MEMORY_HIT_TOTAL: &str = "toggleboard_cache_memory_hit_total";
pub const MEMORY_MISS_TOTAL: &str = "toggleboard_cache_memory_miss_total";
pub const EDGE_HIT_TOTAL: &str = "toggleboard_cache_edge_hit_total";
pub const EDGE_MISS_TOTAL: &str = "toggleboard_cache_edge_miss_total";
pub const EDGE_ERROR_TOTAL: &str = "toggleboard_cache_edge_error_total";
pub const SOURCE_READ_TOTAL: &str = "toggleboard_source_read_total";
pub const CDN_INVALIDATION_FAILED_TOTAL: &str = "toggleboard_cdn_invalidation_failed_total";
pub const TASK_DROPPED_TOTAL: &str = "toggleboard_task_dropped_total";
pub const RESOLVE_MS: &str = "toggleboard_resolve_ms";

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
            MEMORY_HIT_TOTAL,
            Unit::Count,
            "Toggle reads answered by the in-process cache."
        );
        describe_counter!(
            MEMORY_MISS_TOTAL,
            Unit::Count,
            "Toggle reads that missed the in-process cache."
        );
        describe_counter!(
            EDGE_HIT_TOTAL,
            Unit::Count,
            "Toggle reads answered by the edge object store."
        );
        describe_counter!(
            EDGE_MISS_TOTAL,
            Unit::Count,
            "Toggle reads that missed the edge object store."
        );
        describe_counter!(
            EDGE_ERROR_TOTAL,
            Unit::Count,
            "Edge tier reads or writes that failed and were skipped."
        );
        describe_counter!(
            SOURCE_READ_TOTAL,
            Unit::Count,
            "Toggle lookups served from the database."
        );
        describe_counter!(
            CDN_INVALIDATION_FAILED_TOTAL,
            Unit::Count,
            "CDN purge requests that failed."
        );
        describe_counter!(
            TASK_DROPPED_TOTAL,
            Unit::Count,
            "Background tasks dropped because the queue was full or closed."
        );
        describe_histogram!(
            RESOLVE_MS,
            Unit::Milliseconds,
            "Toggle resolution latency in milliseconds."
        );
    });
}
