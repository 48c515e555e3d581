//! In-process stand-in for the image API.
//!
//! Serves `POST /image/{endpoint}` (JSON body) and
//! `POST /image/{endpoint}_file` (multipart body). Every successful call
//! returns the same 1x1 PNG and echoes the received field names in
//! `x-received-fields`. Image URLs containing `ratelimit` or `server-error`
//! trigger a 429 or a 500.

use axum::{
    extract::{FromRequest, Multipart, Path, Request},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tracing::debug;

pub const ENDPOINTS: [&str; 7] = [
    "particles",
    "explode",
    "dust",
    "sand",
    "runescape",
    "replace_colors",
    "merge_colors",
];

pub const UPLOAD_SUFFIX: &str = "_file";

pub const PNG_1X1: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

pub const RATELIMIT_LIMIT: &str = "5";
pub const RATELIMIT_RESET: &str = "2.5";

pub fn app() -> Router {
    Router::new().route("/image/{endpoint}", post(render))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// What the handler pulled out of a request body.
#[derive(Debug, Default)]
struct Received {
    /// JSON keys, or multipart part names.
    fields: Vec<String>,
    /// Values of every `*_url` JSON field, including inside a `data` part.
    urls: Vec<String>,
    files: usize,
    json: Map<String, Value>,
}

async fn render(Path(endpoint): Path<String>, headers: HeaderMap, request: Request) -> Response {
    if !authorized(&headers) {
        return message(StatusCode::UNAUTHORIZED, "missing or invalid bearer token");
    }

    let (name, upload) = match endpoint.strip_suffix(UPLOAD_SUFFIX) {
        Some(name) => (name, true),
        None => (endpoint.as_str(), false),
    };
    if !ENDPOINTS.contains(&name) {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not Found"}))).into_response();
    }

    let received = if upload {
        read_multipart(request).await
    } else {
        read_json(request).await
    };
    let received = match received {
        Ok(received) => received,
        Err(response) => return response,
    };
    debug!(endpoint = %endpoint, fields = ?received.fields, "render request");

    if upload && received.files == 0 {
        return message(StatusCode::BAD_REQUEST, "no image uploaded");
    }
    if name == "runescape" {
        if !received.json.contains_key("text") {
            return message(StatusCode::BAD_REQUEST, "missing text");
        }
    } else if !upload && received.urls.is_empty() {
        return message(StatusCode::BAD_REQUEST, "missing image url");
    }

    if received.urls.iter().any(|u| u.contains("ratelimit")) {
        return ratelimited();
    }
    if received.urls.iter().any(|u| u.contains("server-error")) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
    }

    let fields = received.fields.join(",");
    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/png")],
        PNG_1X1,
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&fields) {
        response.headers_mut().insert("x-received-fields", value);
    }
    response
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| !token.trim().is_empty())
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({"message": text}))).into_response()
}

fn ratelimited() -> Response {
    let mut response = message(StatusCode::TOO_MANY_REQUESTS, "You are being ratelimited");
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from_static(RATELIMIT_LIMIT));
    headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
    headers.insert("x-ratelimit-reset", HeaderValue::from_static(RATELIMIT_RESET));
    response
}

async fn read_json(request: Request) -> Result<Received, Response> {
    let Json(value) = Json::<Value>::from_request(request, &())
        .await
        .map_err(IntoResponse::into_response)?;
    let Value::Object(json) = value else {
        return Err(message(StatusCode::UNPROCESSABLE_ENTITY, "body must be an object"));
    };
    Ok(Received {
        fields: json.keys().cloned().collect(),
        urls: url_fields(&json),
        files: 0,
        json,
    })
}

async fn read_multipart(request: Request) -> Result<Received, Response> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(IntoResponse::into_response)?;

    let mut received = Received::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(message(StatusCode::BAD_REQUEST, &e.body_text())),
        };
        let name = field.name().unwrap_or_default().to_string();
        let is_file = field.file_name().is_some();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| message(StatusCode::BAD_REQUEST, &e.body_text()))?;

        if is_file {
            received.files += 1;
        } else if name == "data" {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(json)) => {
                    received.urls.extend(url_fields(&json));
                    received.json = json;
                }
                _ => return Err(message(StatusCode::BAD_REQUEST, "data is not a JSON object")),
            }
        }
        received.fields.push(name);
    }
    Ok(received)
}

fn url_fields(json: &Map<String, Value>) -> Vec<String> {
    json.iter()
        .filter(|(key, _)| key.ends_with("_url"))
        .filter_map(|(_, value)| value.as_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_fields_picks_only_url_keys() {
        let json = json!({"image_url": "a", "source_url": "b", "text": "c", "speed": 2});
        let mut urls = url_fields(json.as_object().unwrap());
        urls.sort();
        assert_eq!(urls, vec!["a", "b"]);
    }

    #[test]
    fn bearer_token_is_required() {
        let mut headers = HeaderMap::new();
        assert!(!authorized(&headers));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(!authorized(&headers));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert!(authorized(&headers));
    }

    #[test]
    fn png_fixture_has_signature() {
        assert_eq!(&PNG_1X1[..8], b"\x89PNG\r\n\x1a\n");
    }
}
