//! Cache-Control policy for served responses
//!
//! Revision-pinned asset URLs change on every deploy, so a matched
//! asset can be cached forever; everything that boots or names the
//! revision must never be cached. The policy is decided last, after
//! the response is otherwise formed, and only ever writes one of two
//! directive literals.

/// Directive for immutable, revision-pinned assets
pub const CACHE_IMMUTABLE: &str = "public, max-age=31536000, immutable";

/// Directive for everything that must be revalidated on each load
pub const CACHE_NO_CACHE: &str = "no-store, no-cache, must-revalidate";

/// Coarse classification of a served file by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFamily {
    Script,
    Stylesheet,
    Wasm,
    Image,
    Font,
    Audio,
    Video,
    Html,
    Other,
}

impl AssetFamily {
    /// Classify a path by its file extension (case-insensitive)
    pub fn from_path(path: &str) -> Self {
        match extension(path).map(|e| e.to_ascii_lowercase()).as_deref() {
            Some("js") | Some("mjs") => AssetFamily::Script,
            Some("css") => AssetFamily::Stylesheet,
            Some("wasm") => AssetFamily::Wasm,
            Some("png") | Some("jpg") | Some("jpeg") | Some("gif") | Some("webp")
            | Some("svg") | Some("ico") | Some("avif") => AssetFamily::Image,
            Some("woff") | Some("woff2") | Some("ttf") | Some("otf") | Some("eot") => {
                AssetFamily::Font
            }
            Some("mp3") | Some("ogg") | Some("wav") | Some("flac") | Some("m4a") => {
                AssetFamily::Audio
            }
            Some("mp4") | Some("webm") | Some("mov") => AssetFamily::Video,
            Some("html") | Some("htm") => AssetFamily::Html,
            _ => AssetFamily::Other,
        }
    }

    /// Whether a matched asset of this family may be cached immutably
    ///
    /// HTML and unknown files never are: the bootstrap document and
    /// anything unclassified stay revalidated.
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, AssetFamily::Html | AssetFamily::Other)
    }

    /// Stable lowercase name, used as a metrics label
    pub fn label(&self) -> &'static str {
        match self {
            AssetFamily::Script => "script",
            AssetFamily::Stylesheet => "stylesheet",
            AssetFamily::Wasm => "wasm",
            AssetFamily::Image => "image",
            AssetFamily::Font => "font",
            AssetFamily::Audio => "audio",
            AssetFamily::Video => "video",
            AssetFamily::Html => "html",
            AssetFamily::Other => "other",
        }
    }
}

/// File extension of the last path segment, if any
fn extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext)
}

/// Decide the Cache-Control directive for a response
///
/// # Arguments
/// * `path` - served path, used for asset-family classification
/// * `matched` - whether the request came in revision-pinned and matched
/// * `is_bootstrap_index` - whether this response is the bootstrap document
/// * `content_type` - content type of the outgoing response
/// * `existing` - Cache-Control value already on the response, if any
///
/// # Returns
/// * `Some(directive)` - write this directive onto the response
/// * `None` - leave the response's existing header untouched
///
/// # Decision order (first rule wins)
/// 1. Bootstrap document: never cached.
/// 2. HTML responses: never cached.
/// 3. Matched and the family is cacheable: immutable.
/// 4. Matched but unclassified: revalidate.
/// 5. Unmatched with an upstream directive already present: keep it.
/// 6. Otherwise: revalidate.
pub fn directive_for(
    path: &str,
    matched: bool,
    is_bootstrap_index: bool,
    content_type: &str,
    existing: Option<&str>,
) -> Option<&'static str> {
    if is_bootstrap_index {
        return Some(CACHE_NO_CACHE);
    }

    if content_type.starts_with("text/html") {
        return Some(CACHE_NO_CACHE);
    }

    if matched {
        if AssetFamily::from_path(path).is_cacheable() {
            return Some(CACHE_IMMUTABLE);
        }
        return Some(CACHE_NO_CACHE);
    }

    if existing.is_some() {
        return None;
    }

    Some(CACHE_NO_CACHE)
}
