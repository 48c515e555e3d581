//! One API call: the route, the shaped request, and its execution.
//!
//! # Design
//! A `RequestHandle` is built fresh by the client for every endpoint call.
//! It can be inspected without any I/O (`describe`), resolved from a
//! response the caller fetched itself (`parse_response`), or executed
//! through the client's session (`execute`). Executing twice sends two
//! requests; nothing is memoized, and concurrent `execute` calls on the
//! same handle are not coalesced.
//!
//! When file payloads are attached the route switches to the upload variant
//! of the endpoint and any JSON fields travel as a `data` multipart part.
//! That choice is made once, in `RequestHandle::new`.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{response_message, Error, HttpError, RatelimitError, Result};
use crate::http_client::{HttpRequest, HttpResponse, HttpSession, RequestBody};
use crate::image::Image;
use crate::multipart::Form;
use crate::ratelimit::RatelimitTracker;

/// Appended to an endpoint path when the request uploads files.
pub const FILE_SUFFIX: &str = "_file";

/// Multipart field holding the JSON-encoded remainder of an upload request.
pub const DATA_FIELD: &str = "data";

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// The fixed set of server-side image operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Particles,
    Explode,
    Dust,
    Sand,
    Runescape,
    ReplaceColors,
    MergeColors,
}

impl Endpoint {
    pub const ALL: [Endpoint; 7] = [
        Endpoint::Particles,
        Endpoint::Explode,
        Endpoint::Dust,
        Endpoint::Sand,
        Endpoint::Runescape,
        Endpoint::ReplaceColors,
        Endpoint::MergeColors,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Particles => "particles",
            Endpoint::Explode => "explode",
            Endpoint::Dust => "dust",
            Endpoint::Sand => "sand",
            Endpoint::Runescape => "runescape",
            Endpoint::ReplaceColors => "replace_colors",
            Endpoint::MergeColors => "merge_colors",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An endpoint plus whether its upload variant is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Route {
    endpoint: Endpoint,
    upload: bool,
}

impl Route {
    pub fn new(endpoint: Endpoint, upload: bool) -> Self {
        Self { endpoint, upload }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn is_upload(&self) -> bool {
        self.upload
    }

    /// Path relative to the API base URL.
    pub fn path(&self) -> String {
        if self.upload {
            format!("{}{FILE_SUFFIX}", self.endpoint.as_str())
        } else {
            self.endpoint.as_str().to_string()
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Inputs to a `RequestHandle`, as shaped by the client.
#[derive(Debug, Default)]
pub struct RequestParts {
    pub json: Option<Map<String, Value>>,
    /// Field name → file contents. Empty for URL-only calls.
    pub files: Vec<(&'static str, Bytes)>,
}

/// A single pending API call.
///
/// Borrows the session and ratelimit state from the client that built it;
/// it never owns or closes the session.
pub struct RequestHandle<'c, S> {
    route: Route,
    request: Arc<HttpRequest>,
    session: Option<&'c S>,
    ratelimit: Option<&'c RatelimitTracker>,
}

impl<'c, S: HttpSession> RequestHandle<'c, S> {
    pub fn new(
        endpoint: Endpoint,
        base_url: &str,
        headers: HeaderMap,
        parts: RequestParts,
        session: Option<&'c S>,
        ratelimit: Option<&'c RatelimitTracker>,
    ) -> Result<Self> {
        let RequestParts { json, files } = parts;
        let route = Route::new(endpoint, !files.is_empty());

        let body = if files.is_empty() {
            json.map_or(RequestBody::Empty, |map| RequestBody::Json(Value::Object(map)))
        } else {
            let mut form = files
                .into_iter()
                .fold(Form::new(), |form, (name, bytes)| form.file(name, bytes));
            if let Some(map) = json.filter(|m| !m.is_empty()) {
                let data = serde_json::to_string(&Value::Object(map))?;
                form = form.text(DATA_FIELD, "application/json", data);
            }
            RequestBody::Multipart(form)
        };

        let method = match body {
            RequestBody::Empty => Method::GET,
            _ => Method::POST,
        };

        let request = HttpRequest {
            method,
            url: format!("{base_url}{}", route.path()),
            headers,
            body,
        };

        Ok(Self {
            route,
            request: Arc::new(request),
            session,
            ratelimit,
        })
    }

    pub fn route(&self) -> Route {
        self.route
    }

    /// The request this handle would send. Performs no I/O.
    pub fn describe(&self) -> &HttpRequest {
        &self.request
    }

    pub fn url(&self) -> &str {
        &self.request.url
    }

    /// Send the request once and resolve the response.
    pub async fn execute(&self) -> Result<Image> {
        if let Some(tracker) = self.ratelimit {
            let left = tracker.remaining();
            if !left.is_zero() {
                return Err(Error::client(format!(
                    "ratelimited, retry in {:.3} seconds",
                    left.as_secs_f64()
                )));
            }
        }

        let session = match self.session {
            Some(session) if session.is_open() => session,
            _ => return Err(Error::client("session is not valid")),
        };

        debug!(
            endpoint = %self.route,
            method = %self.request.method,
            url = %self.request.url,
            "sending request"
        );
        let response = session.send(HttpRequest::clone(&self.request)).await?;
        debug!(endpoint = %self.route, status = response.status.as_u16(), "received response");

        let result = self.parse_response(response);
        if let (Err(Error::Ratelimited(err)), Some(tracker)) = (&result, self.ratelimit) {
            warn!(endpoint = %self.route, reset = err.reset, "ratelimited by server");
            tracker.record(err.reset);
        }
        result
    }

    /// Map a response to an `Image` or a typed error.
    ///
    /// Usable with responses fetched outside the client, e.g. after sending
    /// `describe()` through another transport.
    pub fn parse_response(&self, response: HttpResponse) -> Result<Image> {
        let status = response.status;
        if status.is_success() {
            let content_type = response
                .content_type()
                .filter(|ct| !ct.is_empty())
                .unwrap_or(FALLBACK_CONTENT_TYPE)
                .to_string();
            return Ok(Image::new(
                response.body,
                content_type,
                self.route,
                Arc::clone(&self.request),
            ));
        }

        let message = response_message(status, &response.body);
        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => Error::Ratelimited(RatelimitError::from_headers(
                status.as_u16(),
                message,
                &response.headers,
            )),
            s if s.is_server_error() => Error::Server(HttpError {
                status: s.as_u16(),
                message,
            }),
            s => Error::Http(HttpError {
                status: s.as_u16(),
                message,
            }),
        })
    }
}

impl<S> fmt::Debug for RequestHandle<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("route", &self.route)
            .field("request", &self.request)
            .field("has_session", &self.session.is_some())
            .finish()
    }
}

impl<S> fmt::Display for RequestHandle<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.request.url)
    }
}
