//! Static asset serving under namespace roots
//!
//! Resolves a request path against the configured namespace root, reads
//! the file, and applies serve-time rewriting to `.of.`-marked files.
//! The bootstrap index document is special: it is always rewritten and
//! its transform failures are the only request-fatal errors.

use crate::cache_policy::AssetFamily;
use crate::config::ServeConfig;
use crate::error::{Result, RevError};
use crate::metrics::RevMetrics;
use crate::proxy::RequestContext;
use crate::rev_path::NS_SPA;
use crate::revision::RevisionProvider;
use crate::rewrite::{self, RewriteKind};
use bytes::Bytes;
use http::{Response, StatusCode};
use http_body_util::Full;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// A successfully served asset, plus what the cache policy needs
#[derive(Debug)]
pub struct ServedAsset {
    /// The response, without a Cache-Control header
    pub response: Response<Full<Bytes>>,
    /// Whether this response is the bootstrap index document
    pub is_bootstrap: bool,
    /// Path used for asset-family classification
    pub served_path: String,
}

/// Serves files from the configured namespace roots
///
/// # Fields
/// * `config` - Shared server configuration (roots, index document, origin)
/// * `provider` - Shared revision provider for rewriting
/// * `metrics` - Optional Prometheus metrics
#[derive(Clone)]
pub struct AssetService {
    config: Arc<ServeConfig>,
    provider: Arc<RevisionProvider>,
    metrics: Option<Arc<RevMetrics>>,
}

impl AssetService {
    /// Create a new asset service
    pub fn new(config: Arc<ServeConfig>, provider: Arc<RevisionProvider>) -> Self {
        AssetService {
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

    /// Serve a file for the given request
    ///
    /// # Arguments
    /// * `ctx` - Proxy annotations; a matched context selects the pinned
    ///   namespace's root, everything else serves from the spa root
    /// * `path` - Path to resolve under the root (the effective path for
    ///   matched requests)
    ///
    /// # Returns
    /// * `Ok(Some(asset))` - file found and served
    /// * `Ok(None)` - no such file, unknown namespace, or unservable
    ///   path; the caller decides between 404 and the SPA fallback
    /// * `Err(..)` - read or transform failure that must surface as 500
    pub async fn serve(&self, ctx: &RequestContext, path: &str) -> Result<Option<ServedAsset>> {
        let namespace = if ctx.matched {
            ctx.namespace.as_deref().unwrap_or(NS_SPA)
        } else {
            NS_SPA
        };

        let Some(root) = self.config.root_for(namespace) else {
            warn!("No asset root configured for namespace '{}'", namespace);
            return Ok(None);
        };

        let Some(relative) = sanitize(path) else {
            debug!("Unservable path: {}", path);
            return Ok(None);
        };

        let is_bootstrap = namespace == NS_SPA && relative == self.config.index_document;
        let full_path = Path::new(root).join(relative);

        let bytes = match tokio::fs::read(&full_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("Asset not found: {}", full_path.display());
                return Ok(None);
            }
            Err(err) => {
                return Err(RevError::AssetIo(format!(
                    "Failed to read {}: {}",
                    full_path.display(),
                    err
                )));
            }
        };

        // The bootstrap document is rewritten even without the marker;
        // serving it with raw tokens would break the client.
        let kind = rewrite::kind_for_path(relative)
            .or(if is_bootstrap { Some(RewriteKind::Html) } else { None });

        let body = match kind {
            Some(kind) => match String::from_utf8(bytes) {
                Ok(text) => {
                    let revision = self.provider.current();
                    let rewritten = rewrite::rewrite(kind, &text, &revision, &self.config.cdn_origin)
                        .into_owned();
                    if let Some(metrics) = &self.metrics {
                        metrics.record_rewrite(kind.label());
                    }
                    Bytes::from(rewritten)
                }
                Err(_) if is_bootstrap => {
                    return Err(RevError::transform_failed(
                        relative,
                        "content is not valid UTF-8",
                    ));
                }
                Err(err) => {
                    warn!("Serving {} raw: content is not valid UTF-8", relative);
                    Bytes::from(err.into_bytes())
                }
            },
            None => Bytes::from(bytes),
        };

        let content_type = mime_guess::from_path(relative)
            .first_or_octet_stream()
            .to_string();
        if let Some(metrics) = &self.metrics {
            metrics.record_asset(AssetFamily::from_path(relative).label());
        }

        let response = Response::builder()
            .status(StatusCode::OK)
            .header("content-type", &content_type)
            .body(Full::new(body))
            .map_err(|e| RevError::HttpError(format!("Failed to build response: {}", e)))?;

        Ok(Some(ServedAsset {
            response,
            is_bootstrap,
            served_path: format!("/{}", relative),
        }))
    }

    /// Serve the bootstrap index document from the spa root
    ///
    /// The document is always rewritten (tokens plus the revision meta
    /// tag); any failure here is request-fatal.
    pub async fn bootstrap_index(&self) -> Result<ServedAsset> {
        let root = self
            .config
            .root_for(NS_SPA)
            .ok_or_else(|| RevError::config("no asset root configured for the spa namespace"))?;
        let full_path = Path::new(root).join(&self.config.index_document);

        let bytes = tokio::fs::read(&full_path).await.map_err(|e| {
            RevError::AssetIo(format!(
                "Failed to read bootstrap document {}: {}",
                full_path.display(),
                e
            ))
        })?;
        let text = String::from_utf8(bytes).map_err(|_| {
            RevError::transform_failed(
                self.config.index_document.as_str(),
                "content is not valid UTF-8",
            )
        })?;

        let revision = self.provider.current();
        let html = rewrite::rewrite_html(&text, &revision, &self.config.cdn_origin);
        if let Some(metrics) = &self.metrics {
            metrics.record_rewrite(RewriteKind::Html.label());
            metrics.record_asset(AssetFamily::Html.label());
        }

        let response = Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "text/html; charset=utf-8")
            .body(Full::new(Bytes::from(html)))
            .map_err(|e| RevError::HttpError(format!("Failed to build response: {}", e)))?;

        Ok(ServedAsset {
            response,
            is_bootstrap: true,
            served_path: format!("/{}", self.config.index_document),
        })
    }
}

/// Strip the leading slash and reject paths that could escape the root
///
/// Rejects `..` segments, empty segments (directory requests, `//`),
/// and embedded NUL bytes.
fn sanitize(path: &str) -> Option<&str> {
    if path.contains('\0') {
        return None;
    }
    let relative = path.trim_start_matches('/');
    if relative.is_empty() {
        return None;
    }
    for segment in relative.split('/') {
        if segment.is_empty() || segment == ".." {
            return None;
        }
    }
    Some(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_tree(root: &Path) {
        fs::create_dir_all(root.join("js")).unwrap();
        fs::create_dir_all(root.join("cdn/lib")).unwrap();
        fs::write(
            root.join("js/main.of.js"),
            "import { x } from '[OUTERFACES_CDN]/lib/a.js';\n",
        )
        .unwrap();
        fs::write(
            root.join("js/plain.js"),
            "// mentions [OUTERFACES_CDN] in text\nlet a = 1;\n",
        )
        .unwrap();
        fs::write(
            root.join("index.of.html"),
            "<html><head></head><body></body></html>",
        )
        .unwrap();
        fs::write(root.join("styles.of.css"), "@import url('[OUTERFACES_CDN]/t.css');").unwrap();
        fs::write(root.join("logo.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();
        fs::write(root.join("cdn/lib/a.js"), "export const x = 1;\n").unwrap();
    }

    fn service(root: &Path, revision: &str) -> AssetService {
        let mut config = ServeConfig::default();
        config
            .asset_roots
            .insert("spa".to_string(), root.to_string_lossy().into_owned());
        config.asset_roots.insert(
            "cdn".to_string(),
            root.join("cdn").to_string_lossy().into_owned(),
        );
        config.app_revision = Some(revision.to_string());
        config.enable_vcs_revision = false;
        let config = Arc::new(config);
        let provider = Arc::new(
            RevisionProvider::from_config(&config).with_env_var("OUTERFACES_REV_ASSET_TESTS"),
        );
        AssetService::new(config, provider)
    }

    fn matched_ctx(revision: &str, namespace: &str) -> RequestContext {
        RequestContext {
            revision: Some(revision.to_string()),
            namespace: Some(namespace.to_string()),
            matched: true,
            effective_path: None,
        }
    }

    async fn body_bytes(response: Response<Full<Bytes>>) -> Bytes {
        use http_body_util::BodyExt;
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_serve_plain_file_raw() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path());
        let service = service(dir.path(), "deadbeef");

        let asset = service
            .serve(&RequestContext::default(), "/js/plain.js")
            .await
            .unwrap()
            .expect("file should be served");

        assert_eq!(asset.response.status(), StatusCode::OK);
        assert!(!asset.is_bootstrap);
        assert_eq!(asset.served_path, "/js/plain.js");
        let body = body_bytes(asset.response).await;
        // Unmarked files keep token text verbatim
        assert_eq!(&body[..], fs::read(dir.path().join("js/plain.js")).unwrap());
    }

    #[tokio::test]
    async fn test_serve_rewrites_marked_file() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path());
        let service = service(dir.path(), "deadbeef");

        let asset = service
            .serve(&matched_ctx("deadbeef", "spa"), "/js/main.of.js")
            .await
            .unwrap()
            .expect("file should be served");

        let body = body_bytes(asset.response).await;
        let text = std::str::from_utf8(&body).unwrap();
        assert_eq!(text, "import { x } from '/__rev/deadbeef/cdn/lib/a.js';\n");
    }

    #[tokio::test]
    async fn test_matched_namespace_selects_root() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path());
        let service = service(dir.path(), "deadbeef");

        let asset = service
            .serve(&matched_ctx("deadbeef", "cdn"), "/lib/a.js")
            .await
            .unwrap()
            .expect("cdn file should be served");

        let body = body_bytes(asset.response).await;
        assert_eq!(&body[..], b"export const x = 1;\n");
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path());
        let service = service(dir.path(), "deadbeef");

        let result = service
            .serve(&RequestContext::default(), "/js/nope.js")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path());
        let service = service(dir.path(), "deadbeef");

        for path in ["/../etc/passwd", "/js/../../etc/passwd", "/js//main.of.js", "/"] {
            let result = service
                .serve(&RequestContext::default(), path)
                .await
                .unwrap();
            assert!(result.is_none(), "path {} should be rejected", path);
        }
    }

    #[tokio::test]
    async fn test_unknown_namespace_is_none() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path());
        let service = service(dir.path(), "deadbeef");

        let result = service
            .serve(&matched_ctx("deadbeef", "vendor"), "/lib/a.js")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_content_types() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path());
        let service = service(dir.path(), "deadbeef");

        let asset = service
            .serve(&RequestContext::default(), "/logo.png")
            .await
            .unwrap()
            .expect("png should be served");
        assert_eq!(
            asset.response.headers().get("content-type").unwrap(),
            "image/png"
        );

        let asset = service
            .serve(&RequestContext::default(), "/styles.of.css")
            .await
            .unwrap()
            .expect("css should be served");
        assert_eq!(
            asset.response.headers().get("content-type").unwrap(),
            "text/css"
        );
    }

    #[tokio::test]
    async fn test_direct_index_hit_is_bootstrap() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path());
        let service = service(dir.path(), "deadbeef");

        let asset = service
            .serve(&RequestContext::default(), "/index.of.html")
            .await
            .unwrap()
            .expect("index should be served");
        assert!(asset.is_bootstrap);

        let body = body_bytes(asset.response).await;
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.contains("<meta name=\"outerfaces-rev\" content=\"deadbeef\">"));
    }

    #[tokio::test]
    async fn test_bootstrap_index_rewritten() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path());
        let service = service(dir.path(), "deadbeef");

        let asset = service.bootstrap_index().await.unwrap();
        assert!(asset.is_bootstrap);
        assert_eq!(asset.served_path, "/index.of.html");
        assert_eq!(
            asset.response.headers().get("content-type").unwrap(),
            "text/html; charset=utf-8"
        );

        let body = body_bytes(asset.response).await;
        let text = std::str::from_utf8(&body).unwrap();
        assert_eq!(text.matches("<meta name=\"outerfaces-rev\"").count(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_invalid_utf8_is_error() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path());
        fs::write(dir.path().join("index.of.html"), [0xff, 0xfe, 0x00, 0x01]).unwrap();
        let service = service(dir.path(), "deadbeef");

        let err = service.bootstrap_index().await.unwrap_err();
        assert!(matches!(err, RevError::TransformFailed { .. }));
        assert_eq!(err.to_http_status(), 500);
    }

    #[tokio::test]
    async fn test_bootstrap_missing_is_error() {
        let dir = TempDir::new().unwrap();
        let service = service(dir.path(), "deadbeef");

        let err = service.bootstrap_index().await.unwrap_err();
        assert!(matches!(err, RevError::AssetIo(_)));
    }

    #[tokio::test]
    async fn test_non_bootstrap_invalid_utf8_served_raw() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path());
        fs::write(dir.path().join("js/bad.of.js"), [0xff, 0xfe, 0x61]).unwrap();
        let service = service(dir.path(), "deadbeef");

        let asset = service
            .serve(&RequestContext::default(), "/js/bad.of.js")
            .await
            .unwrap()
            .expect("file should be served raw");
        let body = body_bytes(asset.response).await;
        assert_eq!(&body[..], &[0xff, 0xfe, 0x61]);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("/js/main.js"), Some("js/main.js"));
        assert_eq!(sanitize("/a/b/c.css"), Some("a/b/c.css"));
        assert_eq!(sanitize("/"), None);
        assert_eq!(sanitize(""), None);
        assert_eq!(sanitize("/../x"), None);
        assert_eq!(sanitize("/a/../x"), None);
        assert_eq!(sanitize("/a//b"), None);
        assert_eq!(sanitize("/a/b/"), None);
        assert_eq!(sanitize("/a\0b"), None);
    }
}
