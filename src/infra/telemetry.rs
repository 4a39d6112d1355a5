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
///
/// Logs go to stderr so rendered output on stdout stays clean.
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "weft_cache_hit_total",
            Unit::Count,
            "Total number of cache hits, by group."
        );
        describe_counter!(
            "weft_cache_miss_total",
            Unit::Count,
            "Total number of cache misses, by group."
        );
        describe_counter!(
            "weft_cache_write_total",
            Unit::Count,
            "Total number of successful cache writes, by group."
        );
        describe_counter!(
            "weft_cache_error_total",
            Unit::Count,
            "Total number of cache backend failures, by group and operation."
        );
        describe_counter!(
            "weft_render_total",
            Unit::Count,
            "Total number of dispatched renders, by type."
        );
        describe_counter!(
            "weft_render_unknown_type_total",
            Unit::Count,
            "Total number of dispatches naming an unregistered type."
        );
        describe_counter!(
            "weft_resolver_pass_limit_total",
            Unit::Count,
            "Resolutions stopped at the pass limit with directives left."
        );
        describe_counter!(
            "weft_resolver_depth_limit_total",
            Unit::Count,
            "Directives dropped because the nesting limit was reached."
        );
    });
}
