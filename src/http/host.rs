//! Host-facing request/response abstraction.
//!
//! # Responsibilities
//! - Minimal read-only request view handed to the router
//! - `Response` trait the router and handlers write through
//! - Cache policy recipes used by static and redirect rules
//! - `BufferedResponse`, the in-memory response rendered by the axum host
//!
//! # Design Decisions
//! - The router never touches raw HTTP; everything goes through `Response`
//! - Cache headers are computed when applied (Expires is relative to now)

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response as AxumResponse};
use chrono::{DateTime, Utc};

/// Lifetime of `CachePolicy::LongLived` in seconds (14 days).
pub const LONG_LIVED_MAX_AGE_SECS: i64 = 14 * 24 * 60 * 60;

/// The request as seen by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRequest {
    pub method: String,
    pub path: String,
    pub application_base_path: String,
}

impl HostRequest {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        application_base_path: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            application_base_path: application_base_path.into(),
        }
    }

    /// A GET request at the application root.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path, "/")
    }
}

/// Cache header recipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// `no-cache`, expires now, max-age 0.
    NoCache,
    /// `public`, expires in 14 days, max-age 14 days.
    LongLived,
}

impl CachePolicy {
    /// Header values for this policy, relative to `now`.
    pub fn headers_at(&self, now: DateTime<Utc>) -> [(HeaderName, String); 2] {
        match self {
            CachePolicy::NoCache => [
                (header::CACHE_CONTROL, "no-cache, max-age=0".to_string()),
                (header::EXPIRES, http_date(now)),
            ],
            CachePolicy::LongLived => [
                (
                    header::CACHE_CONTROL,
                    format!("public, max-age={}", LONG_LIVED_MAX_AGE_SECS),
                ),
                (
                    header::EXPIRES,
                    http_date(now + chrono::Duration::seconds(LONG_LIVED_MAX_AGE_SECS)),
                ),
            ],
        }
    }
}

fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Response surface offered by the host.
pub trait Response {
    /// Issue a redirect to `url`.
    fn redirect(&mut self, url: &str, permanent: bool);

    fn set_status(&mut self, status: StatusCode);

    /// Append bytes to the body.
    fn write(&mut self, bytes: &[u8]);

    fn set_cache_headers(&mut self, policy: CachePolicy);

    /// Discard anything written so far (status, headers, body).
    fn clear(&mut self);
}

/// An in-memory response.
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Default for BufferedResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as UTF-8 (lossy).
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Value of the `Location` header, if a redirect was issued.
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    fn set_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => {
                tracing::warn!(header = %name, value = %value, "Dropping invalid header value");
            }
        }
    }
}

impl Response for BufferedResponse {
    fn redirect(&mut self, url: &str, permanent: bool) {
        self.status = if permanent {
            StatusCode::MOVED_PERMANENTLY
        } else {
            StatusCode::FOUND
        };
        self.set_header(header::LOCATION, url);
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn write(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    fn set_cache_headers(&mut self, policy: CachePolicy) {
        for (name, value) in policy.headers_at(Utc::now()) {
            self.set_header(name, &value);
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

impl IntoResponse for BufferedResponse {
    fn into_response(self) -> AxumResponse {
        let mut response = AxumResponse::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
