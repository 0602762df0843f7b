//! Parsing of revision-pinned request paths
//!
//! Pinned URLs have the shape `/__rev/<rev>/<namespace>/<rest>`. The
//! bare `/__rev` path (no trailing segments) is the info endpoint and
//! deliberately does not parse here.

/// Prefix every pinned path starts with
pub const REV_PREFIX: &str = "/__rev/";

/// Namespace of the application bundle
pub const NS_SPA: &str = "spa";
/// Namespace of shared libraries
pub const NS_CDN: &str = "cdn";
/// Namespace of federated sub-apps
pub const NS_APPS: &str = "apps";

/// Check whether a namespace is one of the well-known ones
///
/// The namespace set is open: unknown names still parse and are
/// resolved against configuration, this only drives logging.
pub fn is_known_namespace(namespace: &str) -> bool {
    matches!(namespace, NS_SPA | NS_CDN | NS_APPS)
}

/// The parsed form of a revision-pinned URL path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RevPinnedPath {
    /// Revision the client pinned itself to
    pub revision: String,
    /// Asset namespace ("spa", "cdn", "apps", or anything configured)
    pub namespace: String,
    /// Remainder of the path below the namespace, without leading slash
    pub rest: String,
}

impl RevPinnedPath {
    /// Parse a request path as a pinned URL
    ///
    /// # Arguments
    /// * `path` - The request path, without query string
    ///
    /// # Returns
    /// * `Some(RevPinnedPath)` for `/__rev/<rev>/<namespace>/<rest>`
    ///   where revision and namespace are non-empty single segments
    /// * `None` for everything else, including `/__rev`, `/__rev/`
    ///   and paths missing the slash after the namespace
    pub fn parse(path: &str) -> Option<Self> {
        let after_prefix = path.strip_prefix(REV_PREFIX)?;

        let (revision, after_revision) = after_prefix.split_once('/')?;
        if revision.is_empty() {
            return None;
        }

        let (namespace, rest) = after_revision.split_once('/')?;
        if namespace.is_empty() {
            return None;
        }

        Some(RevPinnedPath {
            revision: revision.to_string(),
            namespace: namespace.to_string(),
            rest: rest.to_string(),
        })
    }

    /// The unpinned path the asset layer serves (`/<rest>`)
    pub fn effective_path(&self) -> String {
        format!("/{}", self.rest)
    }
}
