//! Core types and traits for crosswire.
//!
//! This crate provides the fundamental building blocks shared by the
//! message engine and the proxy core:
//!
//! - [`HttpStatus`] - response status codes with canonical reasons
//! - [`ClientExchange`] - the surface a request handler exposes to code
//!   that fulfills the request (the proxy consumes this)
//! - [`ResponseHead`] - status-line and header serialization
//! - [`logging`] - structured log records with level filtering
//!
//! # Design Principles
//!
//! - Zero-copy where possible: the exchange hands out byte slices, not
//!   owned strings
//! - Cancel-correct: long-running consumers observe cancellation through
//!   the asupersync `Cx` they were given, not through callbacks

#![forbid(unsafe_code)]
// Pedantic clippy lints allowed (style suggestions, not correctness issues)
#![allow(clippy::must_use_candidate)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::format_push_string)]
#![allow(clippy::single_match_else)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::unused_async)]

mod exchange;
pub mod logging;
mod response;
mod status;

pub use exchange::{ClientExchange, HeaderField, TestExchange};
pub use logging::{LogConfig, LogLevel, Logger};
pub use response::ResponseHead;
pub use status::HttpStatus;
