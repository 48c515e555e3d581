//! Ureq-based session (blocking I/O on tokio's blocking pool).

use std::io::Read as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use ureq::unversioned::multipart;

use crate::error::TransportError;
use crate::http_client::{HttpRequest, HttpResponse, HttpSession, RequestBody};
use crate::multipart::{Form, PartData};

/// An [`HttpSession`] backed by a [`ureq::Agent`] connection pool.
///
/// Requests run on Tokio's blocking pool, so `send` must be awaited inside a
/// Tokio runtime. Outside one it fails with [`TransportError::NoRuntime`].
#[derive(Debug)]
pub struct UreqSession {
    agent: ureq::Agent,
    closed: AtomicBool,
}

impl UreqSession {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            // Status interpretation belongs to the request handle.
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self::from_agent(agent)
    }

    pub fn from_agent(agent: ureq::Agent) -> Self {
        Self {
            agent,
            closed: AtomicBool::new(false),
        }
    }
}

impl HttpSession for UreqSession {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let agent = self.agent.clone();
        runtime
            .spawn_blocking(move || run(&agent, request))
            .await
            .map_err(|e| TransportError::Other(Box::new(e)))?
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

fn run(agent: &ureq::Agent, request: HttpRequest) -> Result<HttpResponse, TransportError> {
    let mut builder = http::Request::builder()
        .method(request.method)
        .uri(&request.url);
    for (name, value) in &request.headers {
        builder = builder.header(name, value);
    }

    let result = match &request.body {
        RequestBody::Empty => agent.run(builder.body(()).map_err(other)?),
        RequestBody::Json(value) => {
            let bytes = serde_json::to_vec(value).map_err(other)?;
            let req = builder
                .header(CONTENT_TYPE, "application/json")
                .body(bytes)
                .map_err(other)?;
            agent.run(req)
        }
        RequestBody::Multipart(form) => {
            let form = multipart_form(form).map_err(other)?;
            // `Agent::run` leaves the content type to the caller.
            let content_type = format!("multipart/form-data; boundary={}", form.boundary());
            let req = builder
                .header(CONTENT_TYPE, content_type)
                .body(form)
                .map_err(other)?;
            agent.run(req)
        }
    };

    match result {
        Ok(resp) => convert_response(resp),
        Err(ureq::Error::Timeout(_)) => Err(TransportError::Timeout),
        Err(ureq::Error::HostNotFound) => {
            Err(TransportError::Connection("host not found".to_owned()))
        }
        Err(ureq::Error::Io(e)) => Err(TransportError::Connection(e.to_string())),
        Err(e) => Err(other(e)),
    }
}

/// Borrow the structured parts into ureq's streaming encoder.
fn multipart_form(form: &Form) -> Result<multipart::Form<'_>, ureq::Error> {
    let mut encoded = multipart::Form::new();
    for part in form.parts() {
        let body = match &part.data {
            PartData::File { filename, bytes } => multipart::Part::bytes(&bytes[..])
                .file_name(filename)
                .mime_str("application/octet-stream")?,
            PartData::Text {
                content_type,
                value,
            } => multipart::Part::text(value).mime_str(content_type)?,
        };
        encoded = encoded.part(&part.name, body);
    }
    Ok(encoded)
}

fn other(e: impl std::error::Error + Send + Sync + 'static) -> TransportError {
    TransportError::Other(Box::new(e))
}

fn convert_response(response: http::Response<ureq::Body>) -> Result<HttpResponse, TransportError> {
    let (parts, body) = response.into_parts();

    let mut body_bytes = Vec::new();
    body.into_reader()
        .read_to_end(&mut body_bytes)
        .map_err(|e| TransportError::Connection(e.to_string()))?;

    Ok(HttpResponse {
        status: parts.status,
        headers: parts.headers,
        body: Bytes::from(body_bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::io::Read;
    use std::pin::pin;
    use std::sync::Arc;
    use std::task::{Context, Poll, Wake, Waker};

    use http::{HeaderMap, Method};

    fn request() -> HttpRequest {
        HttpRequest {
            method: Method::GET,
            url: "http://127.0.0.1:9/".to_string(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    struct NoopWake;

    impl Wake for NoopWake {
        fn wake(self: Arc<Self>) {}
    }

    #[tokio::test]
    async fn closed_session_refuses_to_send() {
        let session = UreqSession::new(Duration::from_secs(1));
        assert!(session.is_open());
        session.close();
        assert!(!session.is_open());

        let err = session.send(request()).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn send_outside_a_runtime_is_an_error() {
        let session = UreqSession::new(Duration::from_secs(1));
        let waker = Waker::from(Arc::new(NoopWake));
        let mut cx = Context::from_waker(&waker);

        let mut send = pin!(session.send(request()));
        match send.as_mut().poll(&mut cx) {
            Poll::Ready(Err(TransportError::NoRuntime)) => {}
            Poll::Ready(result) => panic!("expected NoRuntime, got {result:?}"),
            Poll::Pending => panic!("send should fail before awaiting anything"),
        }
    }

    #[test]
    fn multipart_parts_keep_names_files_and_types() {
        let form = Form::new()
            .file("image", Bytes::from_static(b"\x89PNG"))
            .text("data", "application/json", r#"{"percent":80}"#.to_string());
        let mut encoded = multipart_form(&form).unwrap();
        let boundary = encoded.boundary().to_string();

        let mut body = Vec::new();
        encoded.read_to_end(&mut body).unwrap();
        let text = String::from_utf8_lossy(&body);

        assert!(text.starts_with(&format!("--{boundary}\r\n")));
        assert!(text.contains("name=\"image\"; filename=\"image\""));
        assert!(text.contains("Content-Type: application/octet-stream"));
        assert!(text.contains("Content-Type: application/json"));
        assert!(text.contains(r#"{"percent":80}"#));
        assert!(text.trim_end().ends_with(&format!("--{boundary}--")));
    }
}
