//! Configuration management for the revision-pinned asset middleware

use crate::error::{Result, RevError};
use crate::proxy::MismatchPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

/// Configuration for the asset server and its plugs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    /// Address the HTTP server binds to (default: "127.0.0.1:8080")
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// How mismatched pinned revisions are answered (default: "redirect")
    /// Options: "redirect" (302 for navigations, 409 for asset fetches)
    /// or "conflict" (always 409)
    #[serde(default = "default_mismatch_policy")]
    pub mismatch_policy: MismatchPolicy,

    /// Namespace to filesystem root mapping
    /// (default: spa -> "./public", cdn -> "./public/cdn")
    #[serde(default = "default_asset_roots")]
    pub asset_roots: HashMap<String, String>,

    /// Bootstrap index document, relative to the spa root
    /// (default: "index.of.html")
    #[serde(default = "default_index_document")]
    pub index_document: String,

    /// Application-provided revision, used when the environment override
    /// is absent and git lookup yields nothing (default: none)
    #[serde(default)]
    pub app_revision: Option<String>,

    /// Origin prefix for rewritten CDN/SPA URLs. Empty means same-origin.
    /// Deprecated: revision pinning makes split-origin cache busting
    /// unnecessary. (default: "")
    #[serde(default)]
    pub cdn_origin: String,

    /// Whether to expose Prometheus metrics at /metrics (default: true)
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Directory to run `git rev-parse` in (default: current directory)
    #[serde(default)]
    pub git_dir: Option<String>,

    /// Whether to consult git when resolving the revision (default: true)
    #[serde(default = "default_true")]
    pub enable_vcs_revision: bool,
}

// Default value functions for serde
fn default_listen_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_mismatch_policy() -> MismatchPolicy {
    MismatchPolicy::Redirect
}

fn default_asset_roots() -> HashMap<String, String> {
    let mut roots = HashMap::new();
    roots.insert("spa".to_string(), "./public".to_string());
    roots.insert("cdn".to_string(), "./public/cdn".to_string());
    roots
}

fn default_index_document() -> String {
    "index.of.html".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ServeConfig {
    fn default() -> Self {
        ServeConfig {
            listen_address: default_listen_address(),
            mismatch_policy: default_mismatch_policy(),
            asset_roots: default_asset_roots(),
            index_document: default_index_document(),
            app_revision: None,
            cdn_origin: String::new(),
            enable_metrics: default_true(),
            git_dir: None,
            enable_vcs_revision: default_true(),
        }
    }
}

impl ServeConfig {
    /// Load configuration from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Returns
    /// * `Ok(ServeConfig)` if loading and validation succeed
    /// * `Err(RevError)` if the file cannot be read or the config is invalid
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| RevError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: ServeConfig = serde_yaml::from_str(&content)
            .map_err(|e| RevError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Ok(())` if configuration is valid
    /// * `Err(RevError)` if any validation fails
    ///
    /// # Validation Rules
    /// - listen_address must parse as a socket address
    /// - asset_roots must map "spa" (the bootstrap index lives there)
    ///   and must not contain empty names or paths
    /// - index_document must not be empty
    /// - cdn_origin, when set, must not carry a trailing slash
    pub fn validate(&self) -> Result<()> {
        if self.listen_address.parse::<SocketAddr>().is_err() {
            return Err(RevError::ConfigError(format!(
                "listen_address '{}' is not a valid socket address",
                self.listen_address
            )));
        }

        if !self.asset_roots.contains_key("spa") {
            return Err(RevError::ConfigError(
                "asset_roots must map the 'spa' namespace".to_string(),
            ));
        }

        for (namespace, root) in &self.asset_roots {
            if namespace.is_empty() {
                return Err(RevError::ConfigError(
                    "asset_roots contains an empty namespace name".to_string(),
                ));
            }
            if root.is_empty() {
                return Err(RevError::ConfigError(format!(
                    "asset root for namespace '{}' must not be empty",
                    namespace
                )));
            }
        }

        if self.index_document.is_empty() {
            return Err(RevError::ConfigError(
                "index_document must not be empty".to_string(),
            ));
        }

        if self.cdn_origin.ends_with('/') {
            return Err(RevError::ConfigError(format!(
                "cdn_origin '{}' must not end with a slash",
                self.cdn_origin
            )));
        }

        Ok(())
    }

    /// Resolve the filesystem root for a namespace, if configured
    pub fn root_for(&self, namespace: &str) -> Option<&str> {
        self.asset_roots.get(namespace).map(String::as_str)
    }
}
