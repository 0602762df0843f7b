//! Revision proxy plug and per-request context
//!
//! This is the first plug in the pipeline. It recognizes revision-pinned
//! paths, strips the pin when the revision matches the current one, and
//! short-circuits mismatches according to the configured policy. Later
//! plugs read its annotations out of the request context instead of
//! re-parsing the path.

use crate::cache_policy::CACHE_NO_CACHE;
use crate::config::ServeConfig;
use crate::error::{Result, RevError};
use crate::metrics::{
    RevMetrics, OUTCOME_MATCHED, OUTCOME_MISMATCH_CONFLICT, OUTCOME_MISMATCH_REDIRECT,
    OUTCOME_PASSTHROUGH,
};
use crate::request_analyzer::classify;
use crate::rev_path::{is_known_namespace, RevPinnedPath};
use crate::revision::RevisionProvider;
use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::Full;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Response header flagging a revision mismatch
pub const MISMATCH_HEADER: &str = "x-outerfaces-rev-mismatch";

/// How mismatched pinned revisions are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// 302 to `/` for navigations, 409 for asset fetches
    Redirect,
    /// 409 for everything
    Conflict,
}

/// Per-request annotations written by the proxy plug
///
/// Created fresh for each request; later plugs read it to decide where
/// to serve from and how to cache.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Revision the request pinned itself to, if the path parsed
    pub revision: Option<String>,

    /// Namespace from the pinned path, if the path parsed
    pub namespace: Option<String>,

    /// Whether the pinned revision matched the current one
    pub matched: bool,

    /// Unpinned path downstream plugs should serve, set on match
    pub effective_path: Option<String>,
}

/// Outcome of the proxy plug for one request
#[derive(Debug)]
pub enum ProxyAction {
    /// Fall through to downstream plugs
    Continue,
    /// Short-circuit with this response
    Respond(Response<Full<Bytes>>),
}

impl ProxyAction {
    /// Whether the request falls through to downstream plugs
    pub fn is_continue(&self) -> bool {
        matches!(self, ProxyAction::Continue)
    }
}

/// JSON body of a 409 mismatch response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MismatchBody {
    pub error: String,
    pub requested_revision: String,
    pub current_revision: String,
    pub message: String,
}

/// The revision proxy plug
///
/// # Fields
/// * `config` - Shared server configuration (mismatch policy)
/// * `provider` - Shared revision provider
/// * `metrics` - Optional Prometheus metrics
#[derive(Clone)]
pub struct RevProxy {
    config: Arc<ServeConfig>,
    provider: Arc<RevisionProvider>,
    metrics: Option<Arc<RevMetrics>>,
}

impl RevProxy {
    /// Create a new proxy plug
    ///
    /// # Arguments
    /// * `config` - Server configuration
    /// * `provider` - Revision provider shared with the other plugs
    ///
    /// # Example
    /// ```
    /// use outerfaces_rev::{RevProxy, RevisionProvider, ServeConfig};
    /// use std::sync::Arc;
    ///
    /// let config = Arc::new(ServeConfig::default());
    /// let provider = Arc::new(RevisionProvider::from_config(&config));
    /// let proxy = RevProxy::new(config, provider);
    /// let ctx = proxy.new_ctx();
    /// assert!(!ctx.matched);
    /// ```
    pub fn new(config: Arc<ServeConfig>, provider: Arc<RevisionProvider>) -> Self {
        RevProxy {
            config,
            provider,
            metrics: None,
        }
    }

    /// Attach Prometheus metrics
    pub fn with_metrics(mut self, metrics: Arc<RevMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Create a fresh per-request context
    pub fn new_ctx(&self) -> RequestContext {
        RequestContext::default()
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &ServeConfig {
        &self.config
    }

    /// Run the proxy decision for one request
    ///
    /// # Arguments
    /// * `path` - Request path, without query string
    /// * `headers` - Request headers, used to classify mismatched requests
    /// * `ctx` - Per-request context; annotated with revision, namespace,
    ///   match state and the effective path
    ///
    /// # Returns
    /// * `Ok(ProxyAction::Continue)` - not pinned, or pinned and matched;
    ///   downstream plugs serve the request
    /// * `Ok(ProxyAction::Respond(..))` - mismatch; the response carries
    ///   the policy's answer and the mismatch header
    pub fn request_filter(
        &self,
        path: &str,
        headers: &HeaderMap,
        ctx: &mut RequestContext,
    ) -> Result<ProxyAction> {
        let Some(pinned) = RevPinnedPath::parse(path) else {
            self.record(OUTCOME_PASSTHROUGH);
            return Ok(ProxyAction::Continue);
        };

        if !is_known_namespace(&pinned.namespace) {
            warn!(
                "Unknown namespace '{}' in pinned path {}",
                pinned.namespace, path
            );
        }

        // Annotations are recorded for mismatches too, so logs and
        // metrics can name the stale revision.
        ctx.revision = Some(pinned.revision.clone());
        ctx.namespace = Some(pinned.namespace.clone());

        let current = self.provider.current();
        if pinned.revision == current {
            let effective = pinned.effective_path();
            debug!("Revision match: {} -> {}", path, effective);
            ctx.matched = true;
            ctx.effective_path = Some(effective);
            self.record(OUTCOME_MATCHED);
            return Ok(ProxyAction::Continue);
        }

        debug!(
            "Revision mismatch: requested {} but current is {}",
            pinned.revision, current
        );
        match self.config.mismatch_policy {
            MismatchPolicy::Conflict => {
                self.record(OUTCOME_MISMATCH_CONFLICT);
                Ok(ProxyAction::Respond(
                    self.conflict_response(&pinned.revision, &current)?,
                ))
            }
            MismatchPolicy::Redirect => {
                if classify(headers).is_navigation() {
                    self.record(OUTCOME_MISMATCH_REDIRECT);
                    Ok(ProxyAction::Respond(self.redirect_response()?))
                } else {
                    self.record(OUTCOME_MISMATCH_CONFLICT);
                    Ok(ProxyAction::Respond(
                        self.conflict_response(&pinned.revision, &current)?,
                    ))
                }
            }
        }
    }

    fn record(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_request(outcome);
        }
    }

    fn conflict_response(&self, requested: &str, current: &str) -> Result<Response<Full<Bytes>>> {
        let body = MismatchBody {
            error: "revision_mismatch".to_string(),
            requested_revision: requested.to_string(),
            current_revision: current.to_string(),
            message: format!(
                "Requested revision {} does not match current revision {}. Reload the application.",
                requested, current
            ),
        };
        let json = serde_json::to_string(&body)
            .map_err(|e| RevError::HttpError(format!("Failed to serialize mismatch body: {}", e)))?;

        Response::builder()
            .status(StatusCode::CONFLICT)
            .header("content-type", "application/json; charset=utf-8")
            .header("cache-control", CACHE_NO_CACHE)
            .header(MISMATCH_HEADER, "true")
            .body(Full::new(Bytes::from(json)))
            .map_err(|e| RevError::HttpError(format!("Failed to build response: {}", e)))
    }

    fn redirect_response(&self) -> Result<Response<Full<Bytes>>> {
        Response::builder()
            .status(StatusCode::FOUND)
            .header("location", "/")
            .header("cache-control", CACHE_NO_CACHE)
            .header(MISMATCH_HEADER, "true")
            .body(Full::new(Bytes::new()))
            .map_err(|e| RevError::HttpError(format!("Failed to build response: {}", e)))
    }
}
