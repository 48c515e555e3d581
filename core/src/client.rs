//! The API client: credentials, session ownership, and one method per
//! endpoint.
//!
//! # Design
//! Endpoint methods validate their arguments, shape the body, and return a
//! `RequestHandle` borrowing the client. They never do I/O themselves, so
//! validation errors surface identically for attached and detached clients.
//! The caller then either inspects the handle (`describe`) or runs it
//! (`execute`).
//!
//! A client closes its session only when it created it. Sessions passed to
//! `ClientBuilder::build_with_session` belong to the caller.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http::header::{AUTHORIZATION, USER_AGENT};
use http::{HeaderMap, HeaderValue};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::{normalize_base_url, ClientConfig};
use crate::error::{Error, Result, TransportError};
use crate::http_client::{HttpRequest, HttpResponse, HttpSession};
use crate::ratelimit::RatelimitTracker;
use crate::request::{Endpoint, RequestHandle, RequestParts};
use crate::types::{ExplodeOptions, ImageSource, MergeOptions, PaletteOptions, ParticleOptions, Rgb};

#[cfg(feature = "ureq-session")]
use crate::session::UreqSession;

/// Session stand-in for clients built with [`ClientBuilder::detached`].
///
/// Never open; handles from a detached client can be described but not
/// executed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl HttpSession for Detached {
    async fn send(&self, _request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        Err(TransportError::Closed)
    }

    fn is_open(&self) -> bool {
        false
    }
}

pub struct ClientBuilder {
    token: String,
    config: ClientConfig,
}

impl ClientBuilder {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            config: ClientConfig::default(),
        }
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn base_url(mut self, url: &str) -> Self {
        self.config.base_url = url.to_string();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn track_ratelimits(mut self, enabled: bool) -> Self {
        self.config.track_ratelimits = enabled;
        self
    }

    /// Build a client that creates, owns, and eventually closes its session.
    ///
    /// The session is a [`UreqSession`], so its handles must be executed
    /// inside a Tokio runtime.
    #[cfg(feature = "ureq-session")]
    pub fn build(self) -> Result<Client<UreqSession>> {
        let session = Arc::new(UreqSession::new(self.config.timeout));
        Client::from_parts(self.token, self.config, Some(session), true)
    }

    /// Build a client over a caller-owned session. The client never closes it.
    pub fn build_with_session<S: HttpSession>(self, session: Arc<S>) -> Result<Client<S>> {
        Client::from_parts(self.token, self.config, Some(session), false)
    }

    /// Build a client with no session: handles can only be described.
    pub fn detached(self) -> Result<Client<Detached>> {
        Client::from_parts(self.token, self.config, None, false)
    }
}

/// Client for the image API.
pub struct Client<S: HttpSession> {
    token: String,
    headers: HeaderMap,
    config: ClientConfig,
    session: Option<Arc<S>>,
    owns_session: bool,
    closed: AtomicBool,
    ratelimit: RatelimitTracker,
}

#[cfg(feature = "ureq-session")]
impl Client<UreqSession> {
    /// Client with default configuration and its own session.
    ///
    /// Like [`ClientBuilder::build`], requires a Tokio runtime to execute.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        ClientBuilder::new(token).build()
    }
}

impl<S: HttpSession> Client<S> {
    fn from_parts(
        token: String,
        mut config: ClientConfig,
        session: Option<Arc<S>>,
        owns_session: bool,
    ) -> Result<Self> {
        config.base_url = normalize_base_url(&config.base_url);
        let headers = default_headers(&token, &config.user_agent)?;
        Ok(Self {
            token,
            headers,
            config,
            session,
            owns_session,
            closed: AtomicBool::new(false),
            ratelimit: RatelimitTracker::new(),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Headers sent with every request.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Arc<S>> {
        self.session.as_ref()
    }

    pub fn owns_session(&self) -> bool {
        self.owns_session
    }

    pub fn is_ratelimited(&self) -> bool {
        self.ratelimit.is_ratelimited()
    }

    /// Time left in the last recorded ratelimit window.
    pub fn ratelimit_remaining(&self) -> Duration {
        self.ratelimit.remaining()
    }

    /// Forget the recorded ratelimit window, e.g. after the caller waited it
    /// out on its own clock.
    pub fn clear_ratelimit(&self) {
        self.ratelimit.clear();
    }

    /// Close the session if this client created it. Idempotent.
    pub fn close(&self) {
        if !self.owns_session || self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(session) = &self.session {
            debug!("closing owned session");
            session.close();
        }
    }

    /// Scatter particles off an image.
    pub fn particles(
        &self,
        image: impl Into<ImageSource>,
        options: ParticleOptions,
    ) -> Result<RequestHandle<'_, S>> {
        options.validate()?;
        let mut parts = RequestParts::default();
        let mut json = Map::new();
        attach_image(&mut json, &mut parts, "image_url", "image", image.into());
        json.insert("particle_type".into(), json!(options.particle_type));
        json.insert("speed".into(), json!(options.speed));
        json.insert("amount".into(), json!(options.amount));
        self.handle(Endpoint::Particles, json, parts)
    }

    /// Blow an image apart pixel by pixel.
    pub fn explode(
        &self,
        image: impl Into<ImageSource>,
        options: ExplodeOptions,
    ) -> Result<RequestHandle<'_, S>> {
        options.validate()?;
        let mut parts = RequestParts::default();
        let mut json = Map::new();
        attach_image(&mut json, &mut parts, "image_url", "image", image.into());
        json.insert("percent".into(), json!(options.percent));
        self.handle(Endpoint::Explode, json, parts)
    }

    pub fn dust(&self, image: impl Into<ImageSource>) -> Result<RequestHandle<'_, S>> {
        self.image_only(Endpoint::Dust, image.into())
    }

    pub fn sand(&self, image: impl Into<ImageSource>) -> Result<RequestHandle<'_, S>> {
        self.image_only(Endpoint::Sand, image.into())
    }

    /// Render text in the RuneScape chat style.
    pub fn runescape(&self, text: &str) -> Result<RequestHandle<'_, S>> {
        if text.is_empty() {
            return Err(Error::invalid("text cannot be empty"));
        }
        let mut json = Map::new();
        json.insert("text".into(), json!(text));
        self.handle(Endpoint::Runescape, json, RequestParts::default())
    }

    /// Replace an image's palette with `colors`.
    pub fn replace_colors(
        &self,
        image: impl Into<ImageSource>,
        colors: &[Rgb],
        options: PaletteOptions,
    ) -> Result<RequestHandle<'_, S>> {
        options.validate()?;
        if colors.is_empty() {
            return Err(Error::invalid("colors cannot be empty"));
        }
        let mut parts = RequestParts::default();
        let mut json = Map::new();
        attach_image(&mut json, &mut parts, "image_url", "image", image.into());
        json.insert("colors".into(), json!(colors));
        json.insert("animated".into(), json!(options.animated));
        json.insert("max_dist".into(), json!(options.max_dist));
        self.handle(Endpoint::ReplaceColors, json, parts)
    }

    /// Recolor `destination` with the dominant colors of `source`.
    pub fn merge_colors(
        &self,
        destination: impl Into<ImageSource>,
        source: impl Into<ImageSource>,
        options: MergeOptions,
    ) -> Result<RequestHandle<'_, S>> {
        options.validate()?;
        let mut parts = RequestParts::default();
        let mut json = Map::new();
        attach_image(&mut json, &mut parts, "source_url", "source_image", source.into());
        attach_image(
            &mut json,
            &mut parts,
            "destination_url",
            "destination_image",
            destination.into(),
        );
        json.insert("num_colors".into(), json!(options.num_colors));
        json.insert("animated".into(), json!(options.animated));
        json.insert("max_distance".into(), json!(options.max_dist));
        self.handle(Endpoint::MergeColors, json, parts)
    }

    fn image_only(&self, endpoint: Endpoint, image: ImageSource) -> Result<RequestHandle<'_, S>> {
        let mut parts = RequestParts::default();
        let mut json = Map::new();
        attach_image(&mut json, &mut parts, "image_url", "image", image);
        self.handle(endpoint, json, parts)
    }

    fn handle(
        &self,
        endpoint: Endpoint,
        json: Map<String, Value>,
        mut parts: RequestParts,
    ) -> Result<RequestHandle<'_, S>> {
        parts.json = Some(json);
        let ratelimit = self.config.track_ratelimits.then_some(&self.ratelimit);
        RequestHandle::new(
            endpoint,
            &self.config.base_url,
            self.headers.clone(),
            parts,
            self.session.as_deref(),
            ratelimit,
        )
    }
}

impl<S: HttpSession> Drop for Client<S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: HttpSession> fmt::Debug for Client<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.config.base_url)
            .field("has_session", &self.session.is_some())
            .field("owns_session", &self.owns_session)
            .field("ratelimited", &self.is_ratelimited())
            .finish_non_exhaustive()
    }
}

/// Route an image argument to a JSON URL field or a file part.
fn attach_image(
    json: &mut Map<String, Value>,
    parts: &mut RequestParts,
    url_field: &str,
    file_field: &'static str,
    image: ImageSource,
) {
    match image {
        ImageSource::Url(url) => {
            json.insert(url_field.to_string(), Value::String(url));
        }
        ImageSource::File(bytes) => parts.files.push((file_field, bytes)),
    }
}

fn default_headers(token: &str, user_agent: &str) -> Result<HeaderMap> {
    let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| Error::invalid("token contains characters not allowed in a header"))?;
    auth.set_sensitive(true);
    let agent = HeaderValue::from_str(user_agent)
        .map_err(|_| Error::invalid("user agent contains characters not allowed in a header"))?;

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);
    headers.insert(USER_AGENT, agent);
    Ok(headers)
}
