//! HTTP response head serialization.

use crate::exchange::HeaderField;
use crate::status::HttpStatus;

/// Serializes a response status line and header block.
///
/// The body is not this type's concern; callers append it to the emitted
/// head (or stream it) themselves.
#[derive(Debug)]
pub struct ResponseHead {
    status: HttpStatus,
    headers: Vec<HeaderField>,
}

impl ResponseHead {
    /// Creates a head with the given status and no headers.
    #[must_use]
    pub fn new(status: HttpStatus) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    /// Returns the status.
    #[must_use]
    pub fn status(&self) -> HttpStatus {
        self.status
    }

    /// Replaces the status.
    pub fn set_status(&mut self, status: HttpStatus) {
        self.status = status;
    }

    /// Appends a header field.
    pub fn push_header(&mut self, name: &[u8], value: &[u8]) {
        self.headers.push(HeaderField::new(name, value));
    }

    /// Returns the header fields in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[HeaderField] {
        &self.headers
    }

    /// Serializes `HTTP/1.1 <code> <reason>` plus headers and the blank
    /// line into `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(b"HTTP/1.1 ");
        out.extend_from_slice(self.status.as_u16().to_string().as_bytes());
        let reason = self.status.canonical_reason();
        if !reason.is_empty() {
            out.push(b' ');
            out.extend_from_slice(reason.as_bytes());
        }
        out.extend_from_slice(b"\r\n");

        for field in &self.headers {
            out.extend_from_slice(&field.name);
            out.extend_from_slice(b": ");
            out.extend_from_slice(&field.value);
            out.extend_from_slice(b"\r\n");
        }

        out.extend_from_slice(b"\r\n");
    }

    /// Serializes into a fresh buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        self.write_to(&mut out);
        out
    }
}
