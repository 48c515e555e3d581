//! `multipart/form-data` bodies for the file-upload routes.
//!
//! A [`Form`] only records which parts a request carries. Framing happens in
//! the transport (`UreqSession` hands the parts to ureq's multipart encoder),
//! so descriptors and test sessions can inspect files and the `data` part
//! without decoding anything.

use bytes::Bytes;

#[derive(Debug, Clone, PartialEq)]
pub enum PartData {
    File { filename: String, bytes: Bytes },
    Text { content_type: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub name: String,
    pub data: PartData,
}

/// An ordered set of form parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Form {
    parts: Vec<Part>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binary part. The filename mirrors the field name.
    pub fn file(mut self, name: &str, bytes: Bytes) -> Self {
        self.parts.push(Part {
            name: name.to_string(),
            data: PartData::File {
                filename: name.to_string(),
                bytes,
            },
        });
        self
    }

    pub fn text(mut self, name: &str, content_type: &str, value: String) -> Self {
        self.parts.push(Part {
            name: name.to_string(),
            data: PartData::Text {
                content_type: content_type.to_string(),
                value,
            },
        });
        self
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Names of the binary parts, in insertion order.
    pub fn file_fields(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter(|p| matches!(p.data, PartData::File { .. }))
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn file_bytes(&self, name: &str) -> Option<&Bytes> {
        self.parts.iter().find_map(|p| match &p.data {
            PartData::File { bytes, .. } if p.name == name => Some(bytes),
            _ => None,
        })
    }

    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|p| match &p.data {
            PartData::Text { value, .. } if p.name == name => Some(value.as_str()),
            _ => None,
        })
    }
}
