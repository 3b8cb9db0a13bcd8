use lazy_static::lazy_static;
use prometheus::{opts, Histogram, HistogramOpts, IntCounter, Registry};

lazy_static! {
    // Collectors are created here and registered manually into the registry
    // owned by the service, not the prometheus default registry.

    /// Duration of every synthetic request (seconds).
    ///
    /// Default buckets top out at 10s, which matches the default max duration.
    pub static ref APP_REQUEST_DURATION_SECONDS: Histogram =
        Histogram::with_opts(HistogramOpts::new(
            "app_request_duration_seconds",
            "Request duration in seconds"
        )).unwrap();

    /// Synthetic requests marked as failed.
    pub static ref APP_REQUEST_ERRORS_COUNT: IntCounter =
        IntCounter::with_opts(opts!(
            "app_request_errors_count",
            "Number of errors observed in requests"
        )).unwrap();
}

/// Registers all custom metrics defined in this crate to the given registry.
///
/// Call once per registry during service startup so the collectors show up
/// on the `/metrics` scrape.
pub fn register_custom_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(APP_REQUEST_DURATION_SECONDS.clone()))?;
    registry.register(Box::new(APP_REQUEST_ERRORS_COUNT.clone()))?;

    Ok(())
}
