//! crosswire: HTTP/1.1 message engine and reverse-proxy core.
//!
//! This umbrella crate re-exports the public surface of the workspace:
//!
//! - [`http`] - the incremental, zero-copy HTTP/1.1 message parser
//! - [`proxy`] - the reverse-proxy connection core
//! - [`core`] - shared types: status codes, the client exchange surface,
//!   response heads, structured logging
//!
//! The commonly used types are also re-exported at the top level.

#![forbid(unsafe_code)]

pub use crosswire_core as core;
pub use crosswire_http as http;
pub use crosswire_proxy as proxy;

pub use crosswire_core::{ClientExchange, HeaderField, HttpStatus, ResponseHead};
pub use crosswire_http::{Chunk, MessageHandler, MessageParser, ParseMode, ParseStatus};
pub use crosswire_proxy::{Origin, ProxyConfig, ProxyConnection, ProxyError};
