//! HTTP server wiring
//!
//! Binds the configured address and runs the plug pipeline for each
//! request: revision info endpoint, metrics exposition, method gate,
//! revision pinning, asset serving, SPA fallback. The cache header
//! policy is applied last, after the asset layer has produced its
//! response.

use crate::assets::{AssetService, ServedAsset};
use crate::cache_policy;
use crate::config::ServeConfig;
use crate::error::{Result, RevError};
use crate::metrics::{
    RevMetrics, OUTCOME_MATCHED, OUTCOME_MISMATCH_CONFLICT, OUTCOME_MISMATCH_REDIRECT,
    OUTCOME_PASSTHROUGH,
};
use crate::proxy::{ProxyAction, RequestContext, RevProxy};
use crate::request_analyzer::classify;
use crate::rev_endpoint::RevEndpoint;
use crate::revision::RevisionProvider;
use bytes::Bytes;
use http::{HeaderMap, Method, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, TextEncoder};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// The assembled server: one instance owns every plug
///
/// # Fields
/// * `config` - Shared server configuration
/// * `proxy` - Revision pinning plug
/// * `assets` - Static asset plug
/// * `endpoint` - Revision info endpoint
/// * `metrics` - Optional Prometheus metrics, shared with the plugs
pub struct RevServer {
    config: Arc<ServeConfig>,
    proxy: RevProxy,
    assets: AssetService,
    endpoint: RevEndpoint,
    metrics: Option<Arc<RevMetrics>>,
}

impl RevServer {
    /// Assemble the plug pipeline from configuration
    pub fn new(config: Arc<ServeConfig>, provider: Arc<RevisionProvider>) -> Self {
        let metrics = if config.enable_metrics {
            match RevMetrics::new() {
                Ok(metrics) => Some(Arc::new(metrics)),
                Err(err) => {
                    warn!("Metrics registration failed, continuing without: {}", err);
                    None
                }
            }
        } else {
            None
        };

        let mut proxy = RevProxy::new(config.clone(), provider.clone());
        let mut assets = AssetService::new(config.clone(), provider.clone());
        if let Some(metrics) = &metrics {
            proxy = proxy.with_metrics(metrics.clone());
            assets = assets.with_metrics(metrics.clone());
        }

        RevServer {
            config,
            proxy,
            assets,
            endpoint: RevEndpoint::new(provider),
            metrics,
        }
    }

    /// Bind the configured listen address
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr: SocketAddr = self.config.listen_address.parse().map_err(|e| {
            RevError::config(format!(
                "invalid listen address {}: {}",
                self.config.listen_address, e
            ))
        })?;
        TcpListener::bind(addr)
            .await
            .map_err(|e| RevError::config(format!("failed to bind {}: {}", addr, e)))
    }

    /// Accept connections until the listener fails
    pub async fn run(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!("Serving on http://{}", addr);
        }

        loop {
            let (stream, peer_addr) = listener
                .accept()
                .await
                .map_err(|e| RevError::InternalError(format!("Accept failed: {}", e)))?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    // Clients dropping keep-alive connections land here
                    debug!("Connection error from {}: {}", peer_addr, err);
                }
            });
        }
    }

    /// Handle one request and emit the access log line
    async fn handle(
        &self,
        req: Request<hyper::body::Incoming>,
    ) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
        let started = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let headers = req.headers().clone();

        let mut ctx = self.proxy.new_ctx();
        let response = match self.route(&method, &path, &headers, &mut ctx).await {
            Ok(response) => response,
            Err(err) => {
                error!("{} {} failed: {}", method, path, err);
                error_response(&err)
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.observe_duration(
                outcome_of(&ctx, response.status()),
                started.elapsed().as_secs_f64(),
            );
        }
        info!("{} {} -> {}", method, path, response.status());
        Ok(response)
    }

    /// Run the plug pipeline for one request
    ///
    /// # Arguments
    /// * `method` - Request method
    /// * `path` - Request path, query string already excluded
    /// * `headers` - Request headers
    /// * `ctx` - Per-request context, annotated by the proxy plug
    async fn route(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        ctx: &mut RequestContext,
    ) -> Result<Response<Full<Bytes>>> {
        if let Some(response) = self.endpoint.handle(method, path)? {
            return Ok(response);
        }

        if method == Method::GET && path == "/metrics" {
            if let Some(metrics) = &self.metrics {
                return metrics_response(metrics);
            }
        }

        if method != Method::GET && method != Method::HEAD {
            return method_not_allowed();
        }

        if let ProxyAction::Respond(response) = self.proxy.request_filter(path, headers, ctx)? {
            return Ok(response);
        }

        let serve_path = match &ctx.effective_path {
            Some(effective) => effective.clone(),
            None => path.to_string(),
        };
        if let Some(asset) = self.assets.serve(ctx, &serve_path).await? {
            return Ok(finish(asset, ctx.matched));
        }

        if classify(headers).is_navigation() {
            debug!("SPA fallback for {}", path);
            let asset = self.assets.bootstrap_index().await?;
            return Ok(finish(asset, ctx.matched));
        }

        not_found(path)
    }
}

/// Apply the cache header policy to a served asset
fn finish(asset: ServedAsset, matched: bool) -> Response<Full<Bytes>> {
    let ServedAsset {
        mut response,
        is_bootstrap,
        served_path,
    } = asset;

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let existing = response
        .headers()
        .get("cache-control")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    if let Some(directive) = cache_policy::directive_for(
        &served_path,
        matched,
        is_bootstrap,
        &content_type,
        existing.as_deref(),
    ) {
        if let Ok(value) = http::HeaderValue::from_str(directive) {
            response.headers_mut().insert("cache-control", value);
        }
    }
    response
}

/// Duration label for a finished request
fn outcome_of(ctx: &RequestContext, status: StatusCode) -> &'static str {
    if ctx.revision.is_none() {
        OUTCOME_PASSTHROUGH
    } else if ctx.matched {
        OUTCOME_MATCHED
    } else if status == StatusCode::FOUND {
        OUTCOME_MISMATCH_REDIRECT
    } else {
        OUTCOME_MISMATCH_CONFLICT
    }
}

fn metrics_response(metrics: &RevMetrics) -> Result<Response<Full<Bytes>>> {
    let encoder = TextEncoder::new();
    let text = metrics
        .encode_text()
        .map_err(|e| RevError::InternalError(format!("Failed to encode metrics: {}", e)))?;

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", encoder.format_type())
        .body(Full::new(Bytes::from(text)))
        .map_err(|e| RevError::HttpError(format!("Failed to build response: {}", e)))
}

fn method_not_allowed() -> Result<Response<Full<Bytes>>> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header("allow", "GET, HEAD")
        .header("content-type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from("405 Method Not Allowed")))
        .map_err(|e| RevError::HttpError(format!("Failed to build response: {}", e)))
}

fn not_found(path: &str) -> Result<Response<Full<Bytes>>> {
    let body = serde_json::json!({
        "error": "not_found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("content-type", "application/json; charset=utf-8")
        .header("cache-control", cache_policy::CACHE_NO_CACHE)
        .body(Full::new(Bytes::from(body.to_string())))
        .map_err(|e| RevError::HttpError(format!("Failed to build response: {}", e)))
}

/// Turn a pipeline error into a response, never failing
fn error_response(err: &RevError) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(err.to_http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = serde_json::json!({
        "error": "request_failed",
        "message": err.to_string(),
    });

    match Response::builder()
        .status(status)
        .header("content-type", "application/json; charset=utf-8")
        .header("cache-control", cache_policy::CACHE_NO_CACHE)
        .body(Full::new(Bytes::from(body.to_string())))
    {
        Ok(response) => response,
        Err(_) => {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}
