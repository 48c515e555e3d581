//! The decoded result of a successful call.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;

use crate::http_client::HttpRequest;
use crate::request::Route;

/// Image bytes returned by the API, with the request that produced them.
///
/// Read-only. The back-reference is kept for diagnostics and can never be
/// used to issue another call.
#[derive(Debug, Clone)]
pub struct Image {
    data: Bytes,
    content_type: String,
    route: Route,
    request: Arc<HttpRequest>,
}

impl Image {
    pub(crate) fn new(
        data: Bytes,
        content_type: String,
        route: Route,
        request: Arc<HttpRequest>,
    ) -> Self {
        Self {
            data,
            content_type,
            route,
            request,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(self.data.as_ref())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Subtype of the media type, without parameters: `image/png; q=1` → `png`.
    pub fn extension(&self) -> &str {
        let essence = self.content_type.split(';').next().unwrap_or_default();
        essence
            .split_once('/')
            .map_or(essence, |(_, subtype)| subtype)
            .trim()
    }

    /// Endpoint path that produced this image, including any upload suffix.
    pub fn endpoint(&self) -> String {
        self.route.path()
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.route.path(), self.extension())
    }
}
