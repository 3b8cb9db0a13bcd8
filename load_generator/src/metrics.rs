use metrics::{APP_REQUEST_DURATION_SECONDS, APP_REQUEST_ERRORS_COUNT};
use prometheus::{Histogram, IntCounter};

use crate::simulation::ObservationSink;

/// Prometheus-backed sink for the simulation driver.
pub struct MetricsCtx {
    pub request_duration_seconds: Histogram,
    pub request_errors_count: IntCounter,
}

impl MetricsCtx {
    pub fn new() -> Self {
        Self {
            request_duration_seconds: APP_REQUEST_DURATION_SECONDS.clone(),
            request_errors_count: APP_REQUEST_ERRORS_COUNT.clone(),
        }
    }
}

impl Default for MetricsCtx {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservationSink for MetricsCtx {
    fn observe_duration(&self, seconds: f64) {
        self.request_duration_seconds.observe(seconds);
    }

    fn observe_error(&self) {
        self.request_errors_count.inc();
    }
}
