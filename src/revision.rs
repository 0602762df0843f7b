//! Current-revision resolution and caching
//!
//! The revision is the one string the whole middleware pivots on: it is
//! embedded into the bootstrap document, compared against pinned request
//! paths, and reported by the `/__rev` endpoint. Resolution order:
//!
//! 1. `OUTERFACES_REV` environment override (blank counts as absent)
//! 2. `git rev-parse HEAD`, truncated to 12 characters
//! 3. The configured `app_revision`
//! 4. `ts-<epoch-seconds>` fallback
//!
//! The resolved value is cached inside the provider. Handlers share one
//! provider via `Arc`; tests construct their own isolated instances.

use crate::config::ServeConfig;
use std::process::Command;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Environment variable consulted first when resolving the revision
pub const REVISION_ENV_VAR: &str = "OUTERFACES_REV";

/// Length a git hash is truncated to
const GIT_HASH_LEN: usize = 12;

/// Resolves and caches the current revision
pub struct RevisionProvider {
    env_var: String,
    app_revision: Option<String>,
    git_dir: Option<String>,
    enable_vcs: bool,
    cached: RwLock<Option<String>>,
}

impl RevisionProvider {
    /// Create a provider from the server configuration
    pub fn from_config(config: &ServeConfig) -> Self {
        Self::new(
            config.app_revision.clone(),
            config.git_dir.clone(),
            config.enable_vcs_revision,
        )
    }

    /// Create a provider with explicit sources
    ///
    /// # Arguments
    /// * `app_revision` - configured revision, consulted after git
    /// * `git_dir` - directory to run git in (None = current directory)
    /// * `enable_vcs` - whether to consult git at all
    pub fn new(app_revision: Option<String>, git_dir: Option<String>, enable_vcs: bool) -> Self {
        RevisionProvider {
            env_var: REVISION_ENV_VAR.to_string(),
            app_revision,
            git_dir,
            enable_vcs,
            cached: RwLock::new(None),
        }
    }

    /// Override the environment variable consulted first
    ///
    /// Tests use this to read an isolated variable instead of the
    /// process-wide default.
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = name.into();
        self
    }

    /// Return the current revision, resolving and caching it on first use
    ///
    /// Concurrent callers observe one consistent value; resolution runs
    /// at most once per cache fill.
    pub fn current(&self) -> String {
        if let Ok(cached) = self.cached.read() {
            if let Some(revision) = cached.as_ref() {
                return revision.clone();
            }
        }

        let resolved = self.resolve();
        if let Ok(mut cached) = self.cached.write() {
            // Another caller may have filled the cache while we resolved
            if let Some(revision) = cached.as_ref() {
                return revision.clone();
            }
            *cached = Some(resolved.clone());
        }
        resolved
    }

    /// Clear the cached revision so the next `current()` re-resolves
    ///
    /// Exists for tests and deploy hooks.
    pub fn invalidate(&self) {
        if let Ok(mut cached) = self.cached.write() {
            *cached = None;
        }
    }

    fn resolve(&self) -> String {
        if let Ok(value) = std::env::var(&self.env_var) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                debug!("Revision from environment override: {}", trimmed);
                return trimmed.to_string();
            }
        }

        if self.enable_vcs {
            if let Some(hash) = self.git_revision() {
                debug!("Revision from git HEAD: {}", hash);
                return hash;
            }
        }

        if let Some(configured) = &self.app_revision {
            let trimmed = configured.trim();
            if !trimmed.is_empty() {
                debug!("Revision from configuration: {}", trimmed);
                return trimmed.to_string();
            }
        }

        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let fallback = format!("ts-{}", epoch);
        warn!(
            "No revision source available, falling back to {}",
            fallback
        );
        fallback
    }

    fn git_revision(&self) -> Option<String> {
        let mut command = Command::new("git");
        command.args(["rev-parse", "HEAD"]);
        if let Some(dir) = &self.git_dir {
            command.current_dir(dir);
        }

        let output = command.output().ok()?;
        if !output.status.success() {
            debug!("git rev-parse exited with {}", output.status);
            return None;
        }

        short_hash(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Trim and truncate raw `git rev-parse` output to the short form
fn short_hash(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(GIT_HASH_LEN).collect())
}
