use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "trove_cache_hit_total",
            Unit::Count,
            "Reads served from the read-through cache."
        );
        describe_counter!(
            "trove_cache_miss_total",
            Unit::Count,
            "Reads that fell through to the upstream views, labelled by reason."
        );
        describe_counter!(
            "trove_cache_store_total",
            Unit::Count,
            "Entries written to the read-through cache."
        );
        describe_counter!(
            "trove_cache_store_skipped_total",
            Unit::Count,
            "Cache writes that were skipped, labelled by reason."
        );
        describe_counter!(
            "trove_cache_purge_total",
            Unit::Count,
            "Full cache purges (admin clear or data version change)."
        );
        describe_gauge!(
            "trove_cache_entries",
            Unit::Count,
            "Current number of entries held by the cache."
        );
        describe_counter!(
            "trove_version_read_total",
            Unit::Count,
            "Reads of the upstream data version row."
        );
        describe_counter!(
            "trove_version_read_error_total",
            Unit::Count,
            "Failed reads of the upstream data version row."
        );
        describe_histogram!(
            "trove_upstream_request_ms",
            Unit::Milliseconds,
            "Latency of row store queries in milliseconds, labelled by backend."
        );
        describe_counter!(
            "trove_upstream_error_total",
            Unit::Count,
            "Failed row store queries, labelled by backend."
        );
    });
}
