//! Hop-level header filtering.
//!
//! Both directions of the proxy rewrite only by omission: the request
//! head forwarded to the origin and the response head forwarded to the
//! client are exactly the originals minus the fields that describe the
//! connection they arrived on.

/// Request headers never forwarded to the origin.
pub const DROPPED_REQUEST_HEADERS: &[&str] = &["Content-Transfer", "Expect", "Connection"];

/// Response headers never forwarded to the client.
///
/// `Transfer-Encoding` is dropped because the body is re-framed: the
/// parser hands it over already de-chunked.
pub const DROPPED_RESPONSE_HEADERS: &[&str] = &["Connection", "Transfer-Encoding"];

/// Returns true if a client request header may be passed to the origin.
#[must_use]
pub fn forward_request_header(name: &[u8]) -> bool {
    !DROPPED_REQUEST_HEADERS
        .iter()
        .any(|dropped| name.eq_ignore_ascii_case(dropped.as_bytes()))
}

/// Returns true if an origin response header may be passed to the
/// client. With `cloak` set, the origin's `Server` header is suppressed
/// as well.
#[must_use]
pub fn forward_response_header(name: &[u8], cloak: bool) -> bool {
    if DROPPED_RESPONSE_HEADERS
        .iter()
        .any(|dropped| name.eq_ignore_ascii_case(dropped.as_bytes()))
    {
        return false;
    }
    if cloak && name.eq_ignore_ascii_case(b"Server") {
        return false;
    }
    true
}
