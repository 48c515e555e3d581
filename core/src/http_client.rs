//! HTTP wire types and the session abstraction.
//!
//! # Design
//! The client never talks to a socket directly. It builds `HttpRequest`
//! values and hands them to an `HttpSession`, which returns an `HttpResponse`
//! with the full body already read into memory. Request bodies stay
//! structured (`RequestBody`) until the transport encodes them, so
//! descriptors and test sessions can inspect JSON fields and multipart
//! parts directly.

use std::future::Future;

use bytes::Bytes;
use http::{header, HeaderMap, Method, StatusCode};

use crate::error::TransportError;
use crate::multipart::Form;

/// A request body as the client shaped it.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(Form),
}

impl RequestBody {
    pub fn is_multipart(&self) -> bool {
        matches!(self, RequestBody::Multipart(_))
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            RequestBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_multipart(&self) -> Option<&Form> {
        match self {
            RequestBody::Multipart(form) => Some(form),
            _ => None,
        }
    }
}

/// An HTTP request to be sent by an [`HttpSession`].
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// The fully-qualified URL.
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

/// An HTTP response with the body fully read.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    /// The declared `Content-Type`, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE)?.to_str().ok()
    }
}

/// A shared connection pool the client sends requests through.
///
/// Implementations must be usable from many tasks at once. The client never
/// assumes exclusive access and only closes sessions it created itself.
pub trait HttpSession: Send + Sync {
    /// Send one request and return the full response.
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;

    fn is_open(&self) -> bool {
        true
    }

    /// Release pooled connections. Further sends may fail.
    fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn accessors_match_the_body_kind() {
        let json = RequestBody::Json(serde_json::json!({"text": "hi"}));
        assert_eq!(json.as_json().unwrap()["text"], "hi");
        assert!(json.as_multipart().is_none());
        assert!(!json.is_multipart());

        let form = RequestBody::Multipart(Form::new().file("image", Bytes::from_static(b"x")));
        assert!(form.is_multipart());
        assert!(form.as_json().is_none());
        assert_eq!(form.as_multipart().unwrap().file_fields(), vec!["image"]);

        assert!(RequestBody::Empty.as_json().is_none());
    }

    #[test]
    fn content_type_is_read_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("image/gif"));
        let response = HttpResponse {
            status: StatusCode::OK,
            headers,
            body: Bytes::new(),
        };
        assert_eq!(response.content_type(), Some("image/gif"));
    }
}
