use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Directive string used when `RUST_LOG` is unset: the service itself logs
/// at `info`, dependencies only surface warnings.
fn default_directives(service: &str) -> String {
    format!("warn,{service}=info")
}

/// Initialize structured stdout logging for a service. Emits JSON lines,
/// filtered by `RUST_LOG` when set and by [`default_directives`] otherwise.
/// Call once at startup with the crate name (underscored, as it appears in
/// log targets).
///
/// Later calls are silently ignored, so tests may call this freely.
pub fn init_tracing(service: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(service)));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json())
        .try_init();
}
