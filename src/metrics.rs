//! Prometheus metrics for the revision middleware

use prometheus::{CounterVec, Encoder, HistogramVec, Opts, Registry, TextEncoder};

/// Request outcome label: path was not revision-pinned
pub const OUTCOME_PASSTHROUGH: &str = "passthrough";
/// Request outcome label: pinned revision matched
pub const OUTCOME_MATCHED: &str = "matched";
/// Request outcome label: mismatch answered with 409
pub const OUTCOME_MISMATCH_CONFLICT: &str = "mismatch_conflict";
/// Request outcome label: mismatch answered with 302
pub const OUTCOME_MISMATCH_REDIRECT: &str = "mismatch_redirect";

/// Metrics for revision-pinned request handling
///
/// Owns its registry so independent server instances (and tests) never
/// collide on metric registration.
#[derive(Clone)]
pub struct RevMetrics {
    registry: Registry,

    /// Requests by proxy outcome
    pub requests_total: CounterVec,

    /// Serve-time rewrites by content kind
    pub rewrites_total: CounterVec,

    /// Served assets by family
    pub assets_total: CounterVec,

    /// Request handling duration by outcome
    pub request_duration_seconds: HistogramVec,
}

impl RevMetrics {
    /// Create metrics backed by a fresh registry
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Create metrics registered into the given registry
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let requests_total = CounterVec::new(
            Opts::new(
                "outerfaces_rev_requests_total",
                "Total requests by revision-proxy outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let rewrites_total = CounterVec::new(
            Opts::new(
                "outerfaces_rev_rewrites_total",
                "Total serve-time token rewrites by content kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(rewrites_total.clone()))?;

        let assets_total = CounterVec::new(
            Opts::new(
                "outerfaces_rev_assets_total",
                "Total served assets by family",
            ),
            &["family"],
        )?;
        registry.register(Box::new(assets_total.clone()))?;

        let request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "outerfaces_rev_request_duration_seconds",
                "Request handling duration in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
            &["outcome"],
        )?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            rewrites_total,
            assets_total,
            request_duration_seconds,
        })
    }

    /// Record a request outcome
    pub fn record_request(&self, outcome: &str) {
        self.requests_total.with_label_values(&[outcome]).inc();
    }

    /// Record a serve-time rewrite
    pub fn record_rewrite(&self, kind: &str) {
        self.rewrites_total.with_label_values(&[kind]).inc();
    }

    /// Record a served asset
    pub fn record_asset(&self, family: &str) {
        self.assets_total.with_label_values(&[family]).inc();
    }

    /// Record request handling duration
    pub fn observe_duration(&self, outcome: &str, duration_secs: f64) {
        self.request_duration_seconds
            .with_label_values(&[outcome])
            .observe(duration_secs);
    }

    /// Render all metrics in Prometheus text exposition format
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
