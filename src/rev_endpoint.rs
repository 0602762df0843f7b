//! Revision info endpoint
//!
//! A fixed read-only endpoint at `/__rev` reporting the current
//! revision as JSON. Deploy tooling and client-side service workers
//! poll it to detect new deploys; it never caches and allows
//! cross-origin reads.

use crate::cache_policy::CACHE_NO_CACHE;
use crate::error::{Result, RevError};
use crate::revision::RevisionProvider;
use bytes::Bytes;
use http::{Method, Response, StatusCode};
use http_body_util::Full;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Fixed path the endpoint answers on
pub const REV_ENDPOINT_PATH: &str = "/__rev";

/// Version of the info payload schema
pub const SCHEMA_VERSION: &str = "1.0";

/// JSON payload of the revision info endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevInfo {
    pub revision: String,
    pub schema_version: String,
    pub timestamp: u64,
}

/// Handler for the `/__rev` info endpoint
pub struct RevEndpoint {
    provider: Arc<RevisionProvider>,
}

impl RevEndpoint {
    /// Create a new endpoint handler
    pub fn new(provider: Arc<RevisionProvider>) -> Self {
        RevEndpoint { provider }
    }

    /// Answer the request if it targets the endpoint path
    ///
    /// # Arguments
    /// * `method` - HTTP method of the request
    /// * `path` - Request path, without query string
    ///
    /// # Returns
    /// * `Ok(Some(response))` - request was `/__rev`; 200 with the info
    ///   payload for GET, 405 for any other method
    /// * `Ok(None)` - any other path, pass through
    pub fn handle(&self, method: &Method, path: &str) -> Result<Option<Response<Full<Bytes>>>> {
        if path != REV_ENDPOINT_PATH {
            return Ok(None);
        }

        if method != Method::GET {
            let response = Response::builder()
                .status(StatusCode::METHOD_NOT_ALLOWED)
                .header("allow", "GET")
                .header("content-type", "text/plain")
                .body(Full::new(Bytes::from("405 Method Not Allowed")))
                .map_err(|e| RevError::HttpError(format!("Failed to build response: {}", e)))?;
            return Ok(Some(response));
        }

        Ok(Some(self.info_response()?))
    }

    fn info_response(&self) -> Result<Response<Full<Bytes>>> {
        let info = RevInfo {
            revision: self.provider.current(),
            schema_version: SCHEMA_VERSION.to_string(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };
        let json = serde_json::to_string(&info)
            .map_err(|e| RevError::HttpError(format!("Failed to serialize rev info: {}", e)))?;

        Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/json; charset=utf-8")
            .header("cache-control", CACHE_NO_CACHE)
            .header("access-control-allow-origin", "*")
            .body(Full::new(Bytes::from(json)))
            .map_err(|e| RevError::HttpError(format!("Failed to build response: {}", e)))
    }
}
