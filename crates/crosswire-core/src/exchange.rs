//! The client exchange surface.
//!
//! A connection object that accepted a request exposes it to fulfilling
//! code (a file handler, a proxy connection, ...) through
//! [`ClientExchange`]: the request line and headers as byte slices, the
//! request body as an async pull stream, and the response as a status,
//! header list and async body sink.
//!
//! The contract that matters for backpressure: [`write_body`] resolves
//! only once the written slice has been handed off downstream, so a
//! caller that awaits it before reading more upstream data is paced by
//! the client.
//!
//! [`write_body`]: ClientExchange::write_body

use crate::status::HttpStatus;
use std::collections::VecDeque;
use std::io;

/// A single request or response header field, as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    /// Field name, case preserved.
    pub name: Vec<u8>,
    /// Field value.
    pub value: Vec<u8>,
}

impl HeaderField {
    /// Creates a header field from name and value bytes.
    #[must_use]
    pub fn new(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Case-insensitive name comparison.
    #[must_use]
    pub fn name_eq_ignore_case(&self, other: &[u8]) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }
}

/// The surface a request handler consumes to fulfill a client request.
///
/// Implemented by the server's connection layer; [`TestExchange`] is an
/// in-memory implementation for tests.
///
/// Client aborts are not a callback on this trait: the connection layer
/// cancels the `Cx` the consumer is running under, and the consumer
/// observes that at its next suspension point.
pub trait ClientExchange {
    /// The request method, e.g. `b"GET"`.
    fn method(&self) -> &[u8];

    /// The request URI exactly as received.
    fn uri(&self) -> &[u8];

    /// The request headers in wire order.
    fn request_headers(&self) -> &[HeaderField];

    /// Whether request-body bytes remain to be pulled.
    fn body_available(&self) -> bool;

    /// Pulls the next request-body chunk.
    ///
    /// Resolves to `Ok(None)` once the body is exhausted.
    fn read_body_chunk(&mut self) -> impl std::future::Future<Output = io::Result<Option<Vec<u8>>>>;

    /// Sets the response status.
    fn set_status(&mut self, status: HttpStatus);

    /// Appends a response header.
    fn append_header(&mut self, name: &[u8], value: &[u8]);

    /// Writes a response-body slice to the client.
    ///
    /// Resolution of the returned future is the write-completion signal:
    /// the slice has drained far enough that the caller may produce more.
    fn write_body(&mut self, chunk: &[u8]) -> impl std::future::Future<Output = io::Result<()>>;

    /// Completes the response. Idempotent.
    fn finish(&mut self);
}

/// In-memory [`ClientExchange`] for driving handlers in tests.
///
/// Records the response side verbatim so assertions can inspect exactly
/// what a handler produced.
#[derive(Debug, Default)]
pub struct TestExchange {
    method: Vec<u8>,
    uri: Vec<u8>,
    request_headers: Vec<HeaderField>,
    body_chunks: VecDeque<Vec<u8>>,

    /// Status set by the handler, if any.
    pub status: Option<HttpStatus>,
    /// Response headers in the order they were appended.
    pub response_headers: Vec<HeaderField>,
    /// Response body bytes, concatenated across writes.
    pub response_body: Vec<u8>,
    /// Number of individual body writes observed.
    pub body_writes: usize,
    /// Whether `finish` has been called.
    pub finished: bool,
}

impl TestExchange {
    /// Creates an exchange for the given request line.
    #[must_use]
    pub fn new(method: &str, uri: &str) -> Self {
        Self {
            method: method.as_bytes().to_vec(),
            uri: uri.as_bytes().to_vec(),
            ..Self::default()
        }
    }

    /// Adds a request header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.request_headers.push(HeaderField::new(name, value));
        self
    }

    /// Queues a request-body chunk for `read_body_chunk` to return.
    #[must_use]
    pub fn with_body_chunk(mut self, chunk: &[u8]) -> Self {
        self.body_chunks.push_back(chunk.to_vec());
        self
    }

    /// Looks up a response header by name, case-insensitively.
    #[must_use]
    pub fn response_header(&self, name: &str) -> Option<&[u8]> {
        self.response_headers
            .iter()
            .find(|h| h.name_eq_ignore_case(name.as_bytes()))
            .map(|h| h.value.as_slice())
    }
}

impl ClientExchange for TestExchange {
    fn method(&self) -> &[u8] {
        &self.method
    }

    fn uri(&self) -> &[u8] {
        &self.uri
    }

    fn request_headers(&self) -> &[HeaderField] {
        &self.request_headers
    }

    fn body_available(&self) -> bool {
        !self.body_chunks.is_empty()
    }

    async fn read_body_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.body_chunks.pop_front())
    }

    fn set_status(&mut self, status: HttpStatus) {
        self.status = Some(status);
    }

    fn append_header(&mut self, name: &[u8], value: &[u8]) {
        self.response_headers.push(HeaderField::new(name, value));
    }

    async fn write_body(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.response_body.extend_from_slice(chunk);
        self.body_writes += 1;
        Ok(())
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}
