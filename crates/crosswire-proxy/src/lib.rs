//! Reverse-proxy connection core.
//!
//! A [`ProxyConnection`] fulfills one client request against an origin
//! server: it opens a TCP or Unix-domain connection, forwards a filtered
//! form of the client's request head, streams the request body, parses
//! the origin's response with a Response-mode
//! [`MessageParser`](crosswire_http::MessageParser), and hands the
//! filtered response back to the client exchange: status first, then
//! headers, then de-chunked body slices paced by the client's
//! write-completion.
//!
//! # Example
//!
//! ```ignore
//! use crosswire_core::TestExchange;
//! use crosswire_proxy::{ProxyConfig, ProxyConnection};
//!
//! let config = ProxyConfig::reverse("127.0.0.1:3000");
//! let mut exchange = TestExchange::new("GET", "/");
//! let cx = asupersync::Cx::for_testing();
//!
//! asupersync::block_on(async {
//!     ProxyConnection::new(config).run(&cx, &mut exchange).await
//! })?;
//! ```

#![deny(unsafe_code)]
// Pedantic clippy lints allowed (style suggestions, not correctness issues)
#![allow(clippy::must_use_candidate)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::single_match_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::struct_field_names)]

mod config;
mod connect;
mod filter;
mod origin;
mod proxy;
mod timer;

pub use config::{DEFAULT_CLOAK_SERVER_HEADER, ProxyConfig};
pub use connect::{OriginStream, connect_origin};
pub use filter::{
    DROPPED_REQUEST_HEADERS, DROPPED_RESPONSE_HEADERS, forward_request_header,
    forward_response_header,
};
pub use origin::{DEFAULT_ORIGIN_PORT, Origin};
pub use proxy::{ProxyConnection, ProxyError, ProxyState};
