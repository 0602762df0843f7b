//! Outerfaces Revision Server
//!
//! HTTP middleware and server for serving single-page application assets
//! under revision-pinned URLs, with serve-time token rewriting and
//! deterministic cache headers.
//!
//! # Overview
//!
//! Build outputs reference each other through placeholder tokens instead
//! of hard-coded URLs. At serve time every `.of.`-marked file is rewritten
//! so its references point at `/__rev/<revision>/<namespace>/...` paths
//! for the revision currently running. A pinned request either matches the
//! current revision and is served with an immutable cache lifetime, or it
//! is refused, so a deployed revision change invalidates every asset URL
//! at once without touching file names.
//!
//! # Features
//!
//! - **Revision-Pinned URLs**: Assets live under `/__rev/<rev>/<ns>/` paths that either match the running revision or are refused
//! - **Serve-Time Rewriting**: Placeholder tokens in JS, CSS and HTML are resolved against the current revision on every response
//! - **Deterministic Caching**: Immutable for matched fingerprinted assets, revalidation for everything else
//! - **SPA Fallback**: Navigations to unknown paths boot the index document
//! - **Revision Discovery**: Environment override, git hash, configured value, or timestamp fallback
//! - **Metrics Collection**: Prometheus counters and latency histograms per request outcome
//! - **Property-Based Testing**: Grammar and rewriter guarantees under proptest
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use outerfaces_rev::{RevProxy, RevisionProvider, ServeConfig};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration from file
//! let config = Arc::new(ServeConfig::from_file("outerfaces_rev.yaml")?);
//!
//! // Resolve the application revision once
//! let provider = Arc::new(RevisionProvider::from_config(&config));
//! println!("Current revision: {}", provider.current());
//!
//! // Create the pinning plug
//! let proxy = RevProxy::new(config, provider);
//! let ctx = proxy.new_ctx();
//! println!("Matched: {}", ctx.matched);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! The server is a pipeline of small plugs:
//!
//! - [`RevServer`]: Assembles the plugs and runs the HTTP service
//! - [`RevProxy`]: Parses pinned URLs and enforces the revision match
//! - [`RevisionProvider`]: Resolves and caches the application revision
//! - [`AssetService`]: Serves files and applies serve-time rewriting
//! - [`RevEndpoint`]: JSON revision info endpoint at `/__rev`
//! - [`RevPinnedPath`]: The pinned URL grammar
//! - [`cache_policy`]: Cache-Control decisions, applied last
//! - [`RevMetrics`]: Prometheus counters and histograms
//!
//! # Configuration
//!
//! Configuration is loaded from a YAML file:
//!
//! ```yaml
//! listen_address: "127.0.0.1:8080"
//! mismatch_policy: redirect        # or: conflict
//! asset_roots:
//!   spa: "./public"
//!   cdn: "./public/cdn"
//! index_document: "index.of.html"
//! cdn_origin: ""                   # same-origin URLs
//! enable_metrics: true
//! ```
//!
//! See [`ServeConfig`] for detailed configuration options.
//!
//! # Examples
//!
//! ## Custom Configuration
//!
//! ```rust,no_run
//! use outerfaces_rev::{MismatchPolicy, ServeConfig};
//! use std::collections::HashMap;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut asset_roots = HashMap::new();
//! asset_roots.insert("spa".to_string(), "./dist".to_string());
//! asset_roots.insert("cdn".to_string(), "./dist/cdn".to_string());
//!
//! let config = ServeConfig {
//!     listen_address: "0.0.0.0:8080".to_string(),
//!     mismatch_policy: MismatchPolicy::Conflict,
//!     asset_roots,
//!     ..ServeConfig::default()
//! };
//!
//! config.validate()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! The crate uses a custom error type [`RevError`] for all error
//! conditions:
//!
//! ```rust,no_run
//! use outerfaces_rev::{RevError, ServeConfig};
//!
//! # fn main() {
//! match ServeConfig::from_file("config.yaml") {
//!     Ok(_config) => println!("Config loaded successfully"),
//!     Err(RevError::ConfigError(msg)) => eprintln!("Config error: {}", msg),
//!     Err(RevError::AssetIo(msg)) => eprintln!("IO error: {}", msg),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # }
//! ```
//!
//! # Testing
//!
//! The crate includes comprehensive tests:
//!
//! - Unit tests for individual plugs
//! - Property-based tests for the URL grammar, cache policy and rewriter
//! - Integration tests against a running server
//!
//! Run tests with:
//!
//! ```bash
//! cargo test
//! ```
//!
//! # See Also
//!
//! - [README.md](../README.md) - Main documentation

pub mod config;
pub mod error;
pub mod revision;
pub mod rev_path;
pub mod request_analyzer;
pub mod cache_policy;
pub mod rewrite;  // Serve-time token rewriting
pub mod metrics;
pub mod proxy;
pub mod assets;
pub mod rev_endpoint;  // JSON revision info endpoint
pub mod server;

// Re-export commonly used types
pub use config::ServeConfig;
pub use error::{Result, RevError};
pub use revision::RevisionProvider;
pub use rev_path::RevPinnedPath;
pub use request_analyzer::RequestClass;
pub use cache_policy::{AssetFamily, CACHE_IMMUTABLE, CACHE_NO_CACHE};
pub use metrics::RevMetrics;
pub use proxy::{MismatchPolicy, ProxyAction, RequestContext, RevProxy};
pub use assets::{AssetService, ServedAsset};
pub use rev_endpoint::{RevEndpoint, RevInfo};
pub use server::RevServer;
