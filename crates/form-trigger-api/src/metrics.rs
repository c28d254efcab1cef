//! Prometheus metrics for form traffic.
//!
//! Metrics live in a registry owned by the service instance rather than the
//! process-wide default, so several routers can coexist in one process.

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Form service metrics
pub struct FormMetrics {
    registry: Registry,

    /// Form pages rendered, by form
    pub pages_served: IntCounterVec,

    /// Accepted submissions, by form and form mode
    pub submissions_accepted: IntCounterVec,

    /// Rejected requests, by form and rejection reason
    pub submissions_rejected: IntCounterVec,

    /// Authentication failures, by form and status code
    pub auth_failures: IntCounterVec,

    /// Time spent handling form requests, by form and method
    pub request_duration: HistogramVec,
}

impl FormMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new_custom(Some("form_trigger".to_string()), None)?;

        let pages_served = IntCounterVec::new(
            Opts::new("pages_served_total", "Form pages rendered"),
            &["form"],
        )?;
        let submissions_accepted = IntCounterVec::new(
            Opts::new("submissions_accepted_total", "Submissions accepted"),
            &["form", "mode"],
        )?;
        let submissions_rejected = IntCounterVec::new(
            Opts::new("submissions_rejected_total", "Requests rejected"),
            &["form", "reason"],
        )?;
        let auth_failures = IntCounterVec::new(
            Opts::new("auth_failures_total", "Authentication failures"),
            &["form", "status"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "request_duration_seconds",
                "Form request processing time",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 30.0]),
            &["form", "method"],
        )?;

        registry.register(Box::new(pages_served.clone()))?;
        registry.register(Box::new(submissions_accepted.clone()))?;
        registry.register(Box::new(submissions_rejected.clone()))?;
        registry.register(Box::new(auth_failures.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Arc::new(Self {
            registry,
            pages_served,
            submissions_accepted,
            submissions_rejected,
            auth_failures,
            request_duration,
        }))
    }

    /// Render every metric in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

impl std::fmt::Debug for FormMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormMetrics").finish_non_exhaustive()
    }
}
