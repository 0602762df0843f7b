//! Serve-time token rewriting
//!
//! Source files ship with placeholder tokens instead of hardcoded asset
//! URLs; at serve time each token becomes a revision-pinned URL, so the
//! same build artifact works under every deploy. Rewriting is textual:
//! the language is not parsed, and a token inside a comment is rewritten
//! like any other occurrence. Only files carrying the `.of.` double
//! extension (e.g. `main.of.js`) opt into rewriting.
//!
//! All functions are pure: content + revision + origin in, content out.

use crate::rev_path::{NS_CDN, NS_SPA, REV_PREFIX};
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Token for vendored CDN library assets
pub const TOKEN_CDN: &str = "[OUTERFACES_CDN]";
/// Deprecated alias for [`TOKEN_CDN`]
pub const TOKEN_LIB: &str = "[OUTERFACES_LIB]";
/// Token for the application's own module tree
pub const TOKEN_SPA: &str = "[OUTERFACES_SPA]";
/// Bare literal marker replaced with the raw revision string
pub const TOKEN_REV: &str = "__OUTERFACES_REV__";

/// Name of the meta tag injected into rewritten HTML
pub const META_NAME: &str = "outerfaces-rev";

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[OUTERFACES_(CDN|LIB|SPA)\]|__OUTERFACES_REV__").unwrap());

static HEAD_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</head\s*>").unwrap());

static BODY_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<body(\s[^>]*)?>").unwrap());

/// Which rewriter applies to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteKind {
    Js,
    Css,
    Html,
}

impl RewriteKind {
    /// Stable lowercase name, used as a metrics label
    pub fn label(&self) -> &'static str {
        match self {
            RewriteKind::Js => "js",
            RewriteKind::Css => "css",
            RewriteKind::Html => "html",
        }
    }
}

/// Determine the rewriter for a path, if its name opts into rewriting
///
/// Only names carrying the `.of.` double-extension marker qualify:
/// `main.of.js`, `styles.of.css`, `index.of.html` and so on. Everything
/// else is served byte-for-byte even if it contains token text.
pub fn kind_for_path(path: &str) -> Option<RewriteKind> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let lower = name.to_ascii_lowercase();

    if lower.ends_with(".of.js") || lower.ends_with(".of.mjs") {
        Some(RewriteKind::Js)
    } else if lower.ends_with(".of.css") {
        Some(RewriteKind::Css)
    } else if lower.ends_with(".of.html") || lower.ends_with(".of.htm") {
        Some(RewriteKind::Html)
    } else {
        None
    }
}

/// Whether a path opts into serve-time rewriting
pub fn is_rewritable(path: &str) -> bool {
    kind_for_path(path).is_some()
}

/// Quick scan for any recognized marker substring
///
/// When this is false the rewriters skip all regex work and hand the
/// content back unchanged.
pub fn has_tokens(content: &str) -> bool {
    content.contains(TOKEN_CDN)
        || content.contains(TOKEN_LIB)
        || content.contains(TOKEN_SPA)
        || content.contains(TOKEN_REV)
}

/// Rewrite placeholder tokens in JavaScript content
///
/// Tokens typically appear inside import/export and dynamic-import
/// specifiers. Token-free content is returned as `Cow::Borrowed`,
/// byte-identical to the input.
///
/// # Example
/// ```
/// use outerfaces_rev::rewrite::rewrite_js;
///
/// let out = rewrite_js("import { x } from '[OUTERFACES_CDN]/lib/a.js'", "abc123", "");
/// assert_eq!(out, "import { x } from '/__rev/abc123/cdn/lib/a.js'");
/// ```
pub fn rewrite_js<'a>(content: &'a str, revision: &str, origin: &str) -> Cow<'a, str> {
    replace_tokens(content, revision, origin)
}

/// Rewrite placeholder tokens in CSS content
///
/// Tokens typically appear inside `@import` and `url()` values.
/// Token-free content is returned as `Cow::Borrowed`.
pub fn rewrite_css<'a>(content: &'a str, revision: &str, origin: &str) -> Cow<'a, str> {
    replace_tokens(content, revision, origin)
}

/// Rewrite placeholder tokens in HTML content and inject the revision
/// meta tag
///
/// The `<meta name="outerfaces-rev" content="...">` tag is injected
/// exactly once: before `</head>` when the document has one, otherwise
/// immediately after the opening `<body ...>` tag, otherwise prepended.
/// Injection happens even for token-free documents; clients read their
/// own revision out of this tag.
pub fn rewrite_html(content: &str, revision: &str, origin: &str) -> String {
    let replaced = replace_tokens(content, revision, origin);
    inject_meta(&replaced, revision)
}

/// Run the rewriter matching `kind` over `content`
pub fn rewrite<'a>(
    kind: RewriteKind,
    content: &'a str,
    revision: &str,
    origin: &str,
) -> Cow<'a, str> {
    match kind {
        RewriteKind::Js => rewrite_js(content, revision, origin),
        RewriteKind::Css => rewrite_css(content, revision, origin),
        RewriteKind::Html => Cow::Owned(rewrite_html(content, revision, origin)),
    }
}

fn replace_tokens<'a>(content: &'a str, revision: &str, origin: &str) -> Cow<'a, str> {
    if !has_tokens(content) {
        return Cow::Borrowed(content);
    }

    let cdn_url = format!("{}{}{}/{}", origin, REV_PREFIX, revision, NS_CDN);
    let spa_url = format!("{}{}{}/{}", origin, REV_PREFIX, revision, NS_SPA);

    TOKEN_RE.replace_all(content, |caps: &regex::Captures<'_>| {
        match caps.get(1).map(|m| m.as_str()) {
            Some("CDN") | Some("LIB") => cdn_url.clone(),
            Some("SPA") => spa_url.clone(),
            _ => revision.to_string(),
        }
    })
}

fn inject_meta(html: &str, revision: &str) -> String {
    let tag = format!("<meta name=\"{}\" content=\"{}\">", META_NAME, revision);

    if let Some(found) = HEAD_CLOSE_RE.find(html) {
        let mut out = String::with_capacity(html.len() + tag.len());
        out.push_str(&html[..found.start()]);
        out.push_str(&tag);
        out.push_str(&html[found.start()..]);
        return out;
    }

    if let Some(found) = BODY_OPEN_RE.find(html) {
        let mut out = String::with_capacity(html.len() + tag.len());
        out.push_str(&html[..found.end()]);
        out.push_str(&tag);
        out.push_str(&html[found.end()..]);
        return out;
    }

    format!("{}{}", tag, html)
}
