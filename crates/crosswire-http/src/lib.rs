//! Incremental, zero-copy HTTP/1.1 message parser.
//!
//! The centerpiece is [`MessageParser`], a byte-at-a-time state machine
//! that tolerates arbitrary fragmentation of its input: feed it the
//! stream in whatever pieces the transport produced and it emits the same
//! callback sequence as if it had seen the stream whole.
//!
//! # Input model
//!
//! Input arrives as [`Chunk`]s: byte slices tagged with their logical
//! position in the stream. The parser consumes from the chunk, advances a
//! caller-owned cursor, and surfaces completed syntactic elements through
//! the [`MessageHandler`] trait as slices borrowing the chunk. Slices are
//! valid only for the duration of the emitting `process` call; a handler
//! that keeps one must copy it.
//!
//! # Example
//!
//! ```
//! use crosswire_http::{Chunk, MessageHandler, MessageParser, ParseMode, ParseStatus};
//!
//! struct Collect(Vec<String>);
//!
//! impl MessageHandler for Collect {
//!     fn on_message_header(&mut self, name: &[u8], value: &[u8]) -> bool {
//!         self.0.push(format!(
//!             "{}: {}",
//!             String::from_utf8_lossy(name),
//!             String::from_utf8_lossy(value)
//!         ));
//!         true
//!     }
//! }
//!
//! let mut parser = MessageParser::new(ParseMode::Request);
//! let mut handler = Collect(Vec::new());
//! let mut cursor = 0;
//!
//! let input: &[u8] = b"GET /x HTTP/1.1\r\nHost: a\r\n\r\n";
//! let status = parser.process(Chunk::new(input, 0), &mut cursor, &mut handler);
//! assert_eq!(status, ParseStatus::Success);
//! assert_eq!(cursor, input.len());
//! assert_eq!(handler.0, vec!["Host: a".to_string()]);
//! ```

#![deny(unsafe_code)]
// Pedantic clippy lints allowed (style suggestions, not correctness issues)
#![allow(clippy::must_use_candidate)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::single_match_else)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]

mod chunk;
mod parser;

pub use chunk::Chunk;
pub use parser::{MessageHandler, MessageParser, ParseMode, ParseStatus, ParserState};
