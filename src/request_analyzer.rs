//! Request analysis for distinguishing navigations from asset fetches
//!
//! The mismatch policy answers a stale navigation differently from a
//! stale `<script src>` fetch, so the proxy needs to know which one it
//! is looking at. `Sec-Fetch-Mode` is authoritative when a browser
//! sends it; the `Accept` header is the fallback signal.

use http::header::ACCEPT;
use http::HeaderMap;
use tracing::debug;

/// Classification of an incoming request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// A top-level document load (address bar, link click, reload)
    Navigation,
    /// A subresource fetch (script, stylesheet, image, XHR, ...)
    AssetFetch,
}

impl RequestClass {
    /// Whether this request is a navigation
    pub fn is_navigation(&self) -> bool {
        matches!(self, RequestClass::Navigation)
    }
}

/// Classify a request from its headers
///
/// # Logic
/// 1. `Sec-Fetch-Mode` present: `navigate` means navigation, any other
///    value means asset fetch.
/// 2. Otherwise, an `Accept` header containing `text/html` means
///    navigation.
/// 3. Everything else is an asset fetch.
///
/// Header values that are not valid visible ASCII fall through as
/// non-matching.
pub fn classify(headers: &HeaderMap) -> RequestClass {
    if let Some(mode) = headers.get("sec-fetch-mode") {
        let class = match mode.to_str() {
            Ok("navigate") => RequestClass::Navigation,
            _ => RequestClass::AssetFetch,
        };
        debug!("Classified by Sec-Fetch-Mode: {:?}", class);
        return class;
    }

    if let Some(accept) = headers.get(ACCEPT) {
        if let Ok(value) = accept.to_str() {
            if value.contains("text/html") {
                debug!("Classified as navigation by Accept: {}", value);
                return RequestClass::Navigation;
            }
        }
    }

    RequestClass::AssetFetch
}
