use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging.
///
/// - `tracing-subscriber::fmt` layer, compact for terminals or JSON lines
///   when `json` is set.
/// - `EnvFilter` for dynamic log levels (`RUST_LOG`), defaulting to
///   `info` with debug output for this crate.
pub fn init(json: bool) {
    let compact_layer = (!json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .compact()
    });
    let json_layer = json.then(|| fmt::layer().json().with_current_span(false));

    let filter_layer = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,assistant_chat=debug"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(compact_layer)
        .with(json_layer)
        .init();
}
