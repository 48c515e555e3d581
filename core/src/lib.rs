//! Async client for the zNeitiz image-effects API.
//!
//! # Overview
//! One method per endpoint (`particles`, `explode`, `dust`, `sand`,
//! `runescape`, `replace_colors`, `merge_colors`). Each validates its
//! arguments and returns a `RequestHandle`, which can be described without
//! I/O or executed once per call to produce an `Image`.
//!
//! # Design
//! - Transport is abstracted behind `HttpSession`; `UreqSession` is the
//!   default implementation (`ureq-session` feature).
//! - Image arguments are either URLs (sent as JSON fields) or file bytes
//!   (sent as multipart parts on the `_file` route variant).
//! - Non-2xx responses map to typed errors; 429 windows are recorded and
//!   later calls are rejected locally until they elapse.
//! - Nothing is retried automatically.

pub mod client;
pub mod config;
pub mod error;
pub mod http_client;
pub mod image;
pub mod multipart;
pub mod ratelimit;
pub mod request;
#[cfg(feature = "ureq-session")]
pub mod session;
pub mod types;

pub use client::{Client, ClientBuilder, Detached};
pub use config::ClientConfig;
pub use error::{Error, HttpError, RatelimitError, Result, TransportError};
pub use http_client::{HttpRequest, HttpResponse, HttpSession, RequestBody};
pub use image::Image;
pub use multipart::Form;
pub use request::{Endpoint, RequestHandle, RequestParts, Route};
#[cfg(feature = "ureq-session")]
pub use session::UreqSession;
pub use types::{
    ExplodeOptions, ImageSource, MergeOptions, PaletteOptions, ParticleOptions, ParticleType, Rgb,
};
