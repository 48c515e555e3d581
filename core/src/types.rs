//! Endpoint parameters and their local validation.
//!
//! # Design
//! Each option struct has the server's defaults and a `validate` method the
//! client calls before building a request, so bad arguments fail the same
//! way whether or not a session is attached.

use std::io::Read;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An image argument: a remote URL the server fetches, or raw file bytes
/// uploaded with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    File(Bytes),
}

impl ImageSource {
    /// Read a whole stream into an upload.
    pub fn from_reader(mut reader: impl Read) -> std::io::Result<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(ImageSource::File(Bytes::from(buf)))
    }

    pub fn is_file(&self) -> bool {
        matches!(self, ImageSource::File(_))
    }
}

impl From<&str> for ImageSource {
    fn from(url: &str) -> Self {
        ImageSource::Url(url.to_string())
    }
}

impl From<String> for ImageSource {
    fn from(url: String) -> Self {
        ImageSource::Url(url)
    }
}

impl From<Bytes> for ImageSource {
    fn from(bytes: Bytes) -> Self {
        ImageSource::File(bytes)
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::File(Bytes::from(bytes))
    }
}

impl From<&[u8]> for ImageSource {
    fn from(bytes: &[u8]) -> Self {
        ImageSource::File(Bytes::copy_from_slice(bytes))
    }
}

/// Server-side particle style, sent as its integer id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticleType(pub u32);

impl From<u32> for ParticleType {
    fn from(id: u32) -> Self {
        ParticleType(id)
    }
}

/// An RGB color, serialized as `[r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(c: Rgb) -> Self {
        [c.r, c.g, c.b]
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self { r, g, b }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleOptions {
    pub particle_type: ParticleType,
    pub speed: i64,
    pub amount: i64,
}

impl Default for ParticleOptions {
    fn default() -> Self {
        Self {
            particle_type: ParticleType::default(),
            speed: 2,
            amount: 8,
        }
    }
}

impl ParticleOptions {
    pub fn validate(&self) -> Result<()> {
        if self.speed <= 0 {
            return Err(Error::invalid("speed cannot be <= 0"));
        }
        if self.amount <= 0 {
            return Err(Error::invalid("amount cannot be <= 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExplodeOptions {
    /// Share of pixels blown away, 1..=100.
    pub percent: i64,
}

impl Default for ExplodeOptions {
    fn default() -> Self {
        Self { percent: 80 }
    }
}

impl ExplodeOptions {
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.percent) {
            return Err(Error::invalid("percent cannot be <= 0 or > 100"));
        }
        Ok(())
    }
}

/// Options for `replace_colors`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaletteOptions {
    /// `None` lets the server decide from the input.
    pub animated: Option<bool>,
    pub max_dist: f64,
}

impl Default for PaletteOptions {
    fn default() -> Self {
        Self {
            animated: None,
            max_dist: 16.0,
        }
    }
}

impl PaletteOptions {
    pub fn validate(&self) -> Result<()> {
        check_max_dist(self.max_dist)
    }
}

/// Options for `merge_colors`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeOptions {
    pub num_colors: u32,
    pub animated: Option<bool>,
    pub max_dist: f64,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            num_colors: 16,
            animated: None,
            max_dist: 16.0,
        }
    }
}

impl MergeOptions {
    pub fn validate(&self) -> Result<()> {
        if self.num_colors == 0 {
            return Err(Error::invalid("num_colors cannot be 0"));
        }
        check_max_dist(self.max_dist)
    }
}

fn check_max_dist(max_dist: f64) -> Result<()> {
    if !max_dist.is_finite() {
        return Err(Error::invalid("max_dist cannot be nan or inf"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_urls_and_bytes_are_files() {
        assert_eq!(ImageSource::from("https://a/b.png"), ImageSource::Url("https://a/b.png".into()));
        assert!(ImageSource::from(vec![1u8, 2, 3]).is_file());
        assert!(ImageSource::from(&b"abc"[..]).is_file());
    }

    #[test]
    fn from_reader_buffers_the_stream() {
        let source = ImageSource::from_reader(std::io::Cursor::new(b"GIF89a".to_vec())).unwrap();
        assert_eq!(source, ImageSource::File(Bytes::from_static(b"GIF89a")));
    }

    #[test]
    fn rgb_serializes_as_triplet() {
        let colors = vec![Rgb::new(255, 0, 0), Rgb::from((0, 128, 255))];
        let json = serde_json::to_value(&colors).unwrap();
        assert_eq!(json, serde_json::json!([[255, 0, 0], [0, 128, 255]]));
    }

    #[test]
    fn particle_type_serializes_as_integer() {
        assert_eq!(serde_json::to_value(ParticleType(3)).unwrap(), serde_json::json!(3));
    }

    #[test]
    fn particle_options_reject_non_positive_values() {
        assert!(ParticleOptions::default().validate().is_ok());
        for (speed, amount) in [(0, 8), (-1, 8), (2, 0), (2, -5)] {
            let opts = ParticleOptions {
                speed,
                amount,
                ..Default::default()
            };
            assert!(matches!(opts.validate(), Err(Error::InvalidArgument(_))));
        }
    }

    #[test]
    fn explode_percent_must_be_in_range() {
        for percent in [1, 80, 100] {
            assert!(ExplodeOptions { percent }.validate().is_ok());
        }
        for percent in [0, -3, 101] {
            assert!(ExplodeOptions { percent }.validate().is_err());
        }
    }

    #[test]
    fn max_dist_must_be_finite() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let palette = PaletteOptions {
                max_dist: bad,
                ..Default::default()
            };
            assert!(palette.validate().is_err());
            let merge = MergeOptions {
                max_dist: bad,
                ..Default::default()
            };
            assert!(merge.validate().is_err());
        }
    }

    #[test]
    fn merge_needs_at_least_one_color() {
        let opts = MergeOptions {
            num_colors: 0,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }
}
