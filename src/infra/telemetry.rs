use std::sync::Once;

use metrics::{Unit, describe_counter};
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
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
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
            "agencia_query_cache_hit_total",
            Unit::Count,
            "Reads answered from a fresh cache entry."
        );
        describe_counter!(
            "agencia_query_cache_miss_total",
            Unit::Count,
            "Reads that started a backend fetch."
        );
        describe_counter!(
            "agencia_query_cache_coalesced_total",
            Unit::Count,
            "Reads that joined a fetch already in flight."
        );
        describe_counter!(
            "agencia_query_cache_invalidated_total",
            Unit::Count,
            "Cache entries dropped by mutation invalidation."
        );
        describe_counter!(
            "agencia_mutation_total",
            Unit::Count,
            "Completed mutations, labelled by mutation and outcome."
        );
    });
}
