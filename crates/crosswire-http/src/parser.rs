//! The HTTP/1.1 message state machine.
//!
//! [`MessageParser`] consumes the stream one byte at a time and is
//! restartable at any byte boundary: `process` returns when the chunk is
//! exhausted, a handler callback asked it to stop, or the input turned
//! out to be malformed, and the next call picks up exactly where the
//! cursor says.
//!
//! The grammar implemented is the HTTP/1.1 message grammar:
//!
//! ```text
//! generic-message = start-line *(message-header CRLF) CRLF [ message-body ]
//! start-line      = Request-Line | Status-Line
//! Request-Line    = Method SP Request-URI SP HTTP-Version CRLF
//! Status-Line     = HTTP-Version SP Status-Code SP Reason-Phrase CRLF
//! HTTP-Version    = "HTTP" "/" 1*DIGIT "." 1*DIGIT
//! message-header  = field-name ":" [ field-value ]
//! field-name      = token
//! field-value     = *( field-content | LWS )
//! LWS             = [CRLF] 1*( SP | HT )
//! token           = 1*<any CHAR except CTLs or separators>
//! ```
//!
//! With the `lenient-lf` feature (default) a bare LF is accepted wherever
//! a CRLF line terminator is expected, except inside chunked-body
//! framing.

use crate::chunk::{Chunk, Span};

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const SP: u8 = b' ';
const HT: u8 = b'\t';

/// What kind of message the parser expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseMode {
    /// An HTTP/1.1 request: request-line, headers, optional body.
    Request,
    /// An HTTP/1.1 response: status-line, headers, optional body.
    Response,
    /// A bare message: no start line, just headers and content. The body
    /// runs until the transport ends unless framing headers say
    /// otherwise.
    Message,
}

/// Parser position within the message grammar.
///
/// Exposed so callers can distinguish "mid-message" from "between
/// messages" and observe the terminal error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserState {
    /// Between messages; the next byte starts a new one.
    MessageBegin,

    // Request-line
    RequestLineBegin,
    RequestMethod,
    RequestEntityBegin,
    RequestEntity,
    RequestProtocolBegin,
    RequestProtocolT1,
    RequestProtocolT2,
    RequestProtocolP,
    RequestProtocolSlash,
    RequestVersionMajor,
    RequestVersionMinor,
    RequestLineLf,

    // Status-line
    StatusLineBegin,
    StatusProtocolBegin,
    StatusProtocolT1,
    StatusProtocolT2,
    StatusProtocolP,
    StatusProtocolSlash,
    StatusVersionMajor,
    StatusVersionMinor,
    StatusCodeBegin,
    StatusCode,
    StatusMessageBegin,
    StatusMessage,
    StatusMessageLf,

    // Headers
    HeaderNameBegin,
    HeaderName,
    HeaderColon,
    HeaderValueBegin,
    HeaderValue,
    HeaderValueLf,
    HeaderValueEnd,
    HeaderEndLf,

    // Linear-whitespace sub-machine (header folding)
    LwsBegin,
    LwsLf,
    LwsSpHtBegin,
    LwsSpHt,

    // Body
    ContentBegin,
    Content,
    ContentEndless,
    ChunkSizeBegin,
    ChunkSize,
    ChunkLf1,
    ChunkBody,
    ChunkLf2,
    ChunkCr3,
    ChunkLf3,

    /// Terminal: the input violated the grammar. No transition leaves
    /// this state.
    SyntaxError,
}

/// Outcome of one `process` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseStatus {
    /// A full message was parsed; the parser is ready for the next one.
    Success = 0,
    /// The chunk was consumed mid-message; feed more input to continue.
    Partial = 1,
    /// A handler callback returned false and processing stopped.
    Aborted = 2,
    /// The input violated the grammar. Terminal and non-retryable.
    SyntaxError = 3,
}

impl ParseStatus {
    /// Numeric code, stable across releases.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Human-readable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Partial => "Partial",
            Self::Aborted => "Aborted",
            Self::SyntaxError => "Invalid Syntax",
        }
    }
}

impl std::fmt::Display for ParseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver for parser events.
///
/// Every method returns a continue/halt flag: `false` stops `process`
/// immediately with [`ParseStatus::Aborted`] and no further callbacks
/// fire in that call. All slice arguments borrow the input chunk (or the
/// parser's spill buffer) and die when the callback returns.
///
/// Defaults do nothing and continue, so implementations override only
/// what they care about.
pub trait MessageHandler {
    /// A request-line was parsed (Request mode only).
    fn on_request_begin(&mut self, method: &[u8], entity: &[u8], vmajor: u8, vminor: u8) -> bool {
        let _ = (method, entity, vmajor, vminor);
        true
    }

    /// A status-line was parsed (Response mode only).
    fn on_response_begin(&mut self, vmajor: u8, vminor: u8, code: u16, reason: &[u8]) -> bool {
        let _ = (vmajor, vminor, code, reason);
        true
    }

    /// A new message started (Message mode only, which has no start line).
    fn on_message_begin(&mut self) -> bool {
        true
    }

    /// A complete header field was parsed. Folded values keep their fold
    /// bytes; the name is as it appeared on the wire.
    fn on_message_header(&mut self, name: &[u8], value: &[u8]) -> bool {
        let _ = (name, value);
        true
    }

    /// The header block ended. Content callbacks, if any, follow.
    fn on_message_header_end(&mut self) -> bool {
        true
    }

    /// A run of body bytes, de-chunked if the message was chunked.
    /// Delivered in stream order, never overlapping.
    fn on_message_content(&mut self, content: &[u8]) -> bool {
        let _ = content;
        true
    }

    /// The message is complete.
    fn on_message_end(&mut self) -> bool {
        true
    }
}

/// Incremental HTTP/1.1 message parser.
///
/// One parser instance handles a sequence of messages on one stream:
/// after a message completes the machine returns to
/// [`ParserState::MessageBegin`] and the next bytes begin the next
/// message, so pipelined requests parse naturally.
///
/// # Resumption contract
///
/// `process` consumes bytes starting at `cursor - chunk.offset()` within
/// the chunk and advances the cursor by exactly the number of bytes it
/// consumed. On [`ParseStatus::Partial`] the caller continues with the
/// next chunk (in-flight token bytes have been copied out, so the old
/// chunk may be dropped). On [`ParseStatus::Aborted`] the caller must
/// resume with the *same* chunk and cursor, since open accumulators may
/// still reference it.
#[derive(Debug)]
pub struct MessageParser {
    mode: ParseMode,
    state: ParserState,

    // Continuation points for the LWS sub-machine, and how many
    // terminator bytes (LF alone, or CR LF) preceded it.
    lws_next: ParserState,
    lws_null: ParserState,
    lws_term_len: u8,

    method: Span,
    entity: Span,
    message: Span,
    name: Span,
    value: Span,

    version_major: u8,
    version_minor: u8,
    code: u16,
    content_length: i64,
    chunked: bool,
}

impl MessageParser {
    /// Creates a parser for the given message kind.
    #[must_use]
    pub fn new(mode: ParseMode) -> Self {
        Self {
            mode,
            state: ParserState::MessageBegin,
            lws_next: ParserState::MessageBegin,
            lws_null: ParserState::MessageBegin,
            lws_term_len: 2,
            method: Span::default(),
            entity: Span::default(),
            message: Span::default(),
            name: Span::default(),
            value: Span::default(),
            version_major: 0,
            version_minor: 0,
            code: 0,
            content_length: -1,
            chunked: false,
        }
    }

    /// The mode this parser was created with.
    #[must_use]
    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    /// Current machine state.
    #[must_use]
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Remaining body bytes of the current framing unit; -1 when no
    /// Content-Length applies.
    #[must_use]
    pub fn content_length(&self) -> i64 {
        self.content_length
    }

    /// Whether the current message declared `Transfer-Encoding: chunked`.
    #[must_use]
    pub fn is_chunked(&self) -> bool {
        self.chunked
    }

    /// Processes one chunk of the stream.
    ///
    /// `nparsed` is the caller's stream cursor: on entry it names the
    /// first unconsumed stream position (which must fall inside `chunk`),
    /// on return it has advanced by the number of bytes consumed.
    /// Callbacks fire synchronously, in wire order, from inside this
    /// call.
    pub fn process<H: MessageHandler>(
        &mut self,
        chunk: Chunk<'_>,
        nparsed: &mut usize,
        handler: &mut H,
    ) -> ParseStatus {
        let data = chunk.data();
        debug_assert!(*nparsed >= chunk.offset());
        debug_assert!(*nparsed <= chunk.end_offset());
        let mut i = *nparsed - chunk.offset();

        while i < data.len() {
            let byte = data[i];

            match self.state {
                ParserState::MessageBegin => {
                    self.content_length = -1;
                    self.chunked = false;
                    match self.mode {
                        ParseMode::Request => {
                            self.state = ParserState::RequestLineBegin;
                            self.version_major = 0;
                            self.version_minor = 0;
                        }
                        ParseMode::Response => {
                            self.state = ParserState::StatusLineBegin;
                            self.version_major = 0;
                            self.version_minor = 0;
                            self.code = 0;
                        }
                        ParseMode::Message => {
                            // No start line to wait for.
                            self.state = ParserState::HeaderNameBegin;
                            if !handler.on_message_begin() {
                                return ParseStatus::Aborted;
                            }
                        }
                    }
                }

                // ------------------------------------------------------
                // Request-line
                // ------------------------------------------------------
                ParserState::RequestLineBegin => {
                    if is_token(byte) {
                        self.state = ParserState::RequestMethod;
                        self.method.begin(*nparsed);
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::RequestMethod => {
                    if byte == SP {
                        self.state = ParserState::RequestEntityBegin;
                        *nparsed += 1;
                        i += 1;
                    } else if !is_token(byte) {
                        self.state = ParserState::SyntaxError;
                    } else {
                        self.method.grow(byte);
                        *nparsed += 1;
                        i += 1;
                    }
                }
                ParserState::RequestEntityBegin => {
                    if is_print(byte) {
                        self.entity.begin(*nparsed);
                        self.state = ParserState::RequestEntity;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::RequestEntity => {
                    if byte == SP {
                        self.state = ParserState::RequestProtocolBegin;
                        *nparsed += 1;
                        i += 1;
                    } else if is_print(byte) {
                        self.entity.grow(byte);
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::RequestProtocolBegin => {
                    if byte == b'H' {
                        self.state = ParserState::RequestProtocolT1;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::RequestProtocolT1 => {
                    if byte == b'T' {
                        self.state = ParserState::RequestProtocolT2;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::RequestProtocolT2 => {
                    if byte == b'T' {
                        self.state = ParserState::RequestProtocolP;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::RequestProtocolP => {
                    if byte == b'P' {
                        self.state = ParserState::RequestProtocolSlash;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::RequestProtocolSlash => {
                    if byte == b'/' {
                        self.state = ParserState::RequestVersionMajor;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::RequestVersionMajor => {
                    if byte == b'.' {
                        self.state = ParserState::RequestVersionMinor;
                        *nparsed += 1;
                        i += 1;
                    } else if byte.is_ascii_digit() {
                        self.version_major = self
                            .version_major
                            .saturating_mul(10)
                            .saturating_add(byte - b'0');
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::RequestVersionMinor => {
                    if byte == CR {
                        self.state = ParserState::RequestLineLf;
                        *nparsed += 1;
                        i += 1;
                    } else if cfg!(feature = "lenient-lf") && byte == LF {
                        self.state = ParserState::HeaderNameBegin;
                        *nparsed += 1;
                        i += 1;

                        let rv = handler.on_request_begin(
                            self.method.slice(chunk),
                            self.entity.slice(chunk),
                            self.version_major,
                            self.version_minor,
                        );
                        self.method.clear();
                        self.entity.clear();
                        if !rv {
                            return ParseStatus::Aborted;
                        }
                    } else if byte.is_ascii_digit() {
                        self.version_minor = self
                            .version_minor
                            .saturating_mul(10)
                            .saturating_add(byte - b'0');
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::RequestLineLf => {
                    if byte == LF {
                        self.state = ParserState::HeaderNameBegin;
                        *nparsed += 1;
                        i += 1;

                        let rv = handler.on_request_begin(
                            self.method.slice(chunk),
                            self.entity.slice(chunk),
                            self.version_major,
                            self.version_minor,
                        );
                        self.method.clear();
                        self.entity.clear();
                        if !rv {
                            return ParseStatus::Aborted;
                        }
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }

                // ------------------------------------------------------
                // Status-line
                // ------------------------------------------------------
                ParserState::StatusLineBegin | ParserState::StatusProtocolBegin => {
                    if byte == b'H' {
                        self.state = ParserState::StatusProtocolT1;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::StatusProtocolT1 => {
                    if byte == b'T' {
                        self.state = ParserState::StatusProtocolT2;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::StatusProtocolT2 => {
                    if byte == b'T' {
                        self.state = ParserState::StatusProtocolP;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::StatusProtocolP => {
                    if byte == b'P' {
                        self.state = ParserState::StatusProtocolSlash;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::StatusProtocolSlash => {
                    if byte == b'/' {
                        self.state = ParserState::StatusVersionMajor;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::StatusVersionMajor => {
                    if byte == b'.' {
                        self.state = ParserState::StatusVersionMinor;
                        *nparsed += 1;
                        i += 1;
                    } else if byte.is_ascii_digit() {
                        self.version_major = self
                            .version_major
                            .saturating_mul(10)
                            .saturating_add(byte - b'0');
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::StatusVersionMinor => {
                    if byte == SP {
                        self.state = ParserState::StatusCodeBegin;
                        *nparsed += 1;
                        i += 1;
                    } else if byte.is_ascii_digit() {
                        self.version_minor = self
                            .version_minor
                            .saturating_mul(10)
                            .saturating_add(byte - b'0');
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::StatusCodeBegin => {
                    if byte.is_ascii_digit() {
                        // Re-dispatch the digit in StatusCode.
                        self.state = ParserState::StatusCode;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::StatusCode => {
                    if byte.is_ascii_digit() {
                        self.code = self.code.saturating_mul(10).saturating_add(u16::from(byte - b'0'));
                        *nparsed += 1;
                        i += 1;
                    } else if byte == SP {
                        self.state = ParserState::StatusMessageBegin;
                        *nparsed += 1;
                        i += 1;
                    } else if byte == CR {
                        // Empty reason phrase.
                        self.state = ParserState::StatusMessageLf;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::StatusMessageBegin => {
                    if is_text(byte) {
                        self.state = ParserState::StatusMessage;
                        self.message.begin(*nparsed);
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::StatusMessage => {
                    if byte == CR {
                        self.state = ParserState::StatusMessageLf;
                        *nparsed += 1;
                        i += 1;
                    } else if is_text(byte) {
                        self.message.grow(byte);
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::StatusMessageLf => {
                    if byte == LF {
                        self.state = ParserState::HeaderNameBegin;
                        *nparsed += 1;
                        i += 1;

                        let rv = handler.on_response_begin(
                            self.version_major,
                            self.version_minor,
                            self.code,
                            self.message.slice(chunk),
                        );
                        self.message.clear();
                        if !rv {
                            return ParseStatus::Aborted;
                        }
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }

                // ------------------------------------------------------
                // Headers
                // ------------------------------------------------------
                ParserState::HeaderNameBegin => {
                    if is_token(byte) {
                        self.name.begin(*nparsed);
                        self.state = ParserState::HeaderName;
                        *nparsed += 1;
                        i += 1;
                    } else if byte == CR {
                        self.state = ParserState::HeaderEndLf;
                        *nparsed += 1;
                        i += 1;
                    } else if cfg!(feature = "lenient-lf") && byte == LF {
                        // The LF is consumed by HeaderEndLf.
                        self.state = ParserState::HeaderEndLf;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::HeaderName => {
                    if is_token(byte) {
                        self.name.grow(byte);
                        *nparsed += 1;
                        i += 1;
                    } else if byte == b':' {
                        self.state = ParserState::LwsBegin;
                        self.lws_next = ParserState::HeaderValueBegin;
                        // Bare CRLF after the colon means an empty value;
                        // carry on with the next header.
                        self.lws_null = ParserState::HeaderValueEnd;
                        *nparsed += 1;
                        i += 1;
                    } else if byte == CR {
                        // Folded before the colon.
                        self.state = ParserState::LwsLf;
                        self.lws_next = ParserState::HeaderColon;
                        self.lws_null = ParserState::SyntaxError;
                        self.lws_term_len = 2;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::HeaderColon => {
                    if byte == b':' {
                        self.state = ParserState::LwsBegin;
                        self.lws_next = ParserState::HeaderValueBegin;
                        self.lws_null = ParserState::HeaderValueEnd;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }

                // ------------------------------------------------------
                // LWS sub-machine
                // ------------------------------------------------------
                ParserState::LwsBegin => {
                    if byte == CR {
                        self.state = ParserState::LwsLf;
                        self.lws_term_len = 2;
                        *nparsed += 1;
                        i += 1;
                    } else if cfg!(feature = "lenient-lf") && byte == LF {
                        self.state = ParserState::LwsSpHtBegin;
                        self.lws_term_len = 1;
                        *nparsed += 1;
                        i += 1;
                    } else if byte == SP || byte == HT {
                        self.state = ParserState::LwsSpHt;
                        *nparsed += 1;
                        i += 1;
                    } else if is_print(byte) {
                        self.state = self.lws_next;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::LwsLf => {
                    if byte == LF {
                        self.state = ParserState::LwsSpHtBegin;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::LwsSpHtBegin => {
                    if byte == SP || byte == HT {
                        // A continuation line: rejoin the terminator and
                        // this whitespace byte into the value.
                        if !self.value.is_empty() {
                            if self.lws_term_len == 2 {
                                self.value.grow_over(&[CR, LF, byte]);
                            } else {
                                self.value.grow_over(&[LF, byte]);
                            }
                        }
                        self.state = ParserState::LwsSpHt;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        // Only the line terminator was parsed; the byte
                        // belongs to whatever comes next.
                        self.state = self.lws_null;
                    }
                }
                ParserState::LwsSpHt => {
                    if byte == SP || byte == HT {
                        if !self.value.is_empty() {
                            self.value.grow(byte);
                        }
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = self.lws_next;
                    }
                }

                ParserState::HeaderValueBegin => {
                    if is_text(byte) {
                        self.value.begin(*nparsed);
                        self.state = ParserState::HeaderValue;
                        *nparsed += 1;
                        i += 1;
                    } else if byte == CR {
                        self.state = ParserState::HeaderValueLf;
                        *nparsed += 1;
                        i += 1;
                    } else if cfg!(feature = "lenient-lf") && byte == LF {
                        self.state = ParserState::HeaderValueEnd;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::HeaderValue => {
                    if byte == CR {
                        self.state = ParserState::LwsLf;
                        self.lws_next = ParserState::HeaderValue;
                        self.lws_null = ParserState::HeaderValueEnd;
                        self.lws_term_len = 2;
                        *nparsed += 1;
                        i += 1;
                    } else if cfg!(feature = "lenient-lf") && byte == LF {
                        self.state = ParserState::LwsSpHtBegin;
                        self.lws_next = ParserState::HeaderValue;
                        self.lws_null = ParserState::HeaderValueEnd;
                        self.lws_term_len = 1;
                        *nparsed += 1;
                        i += 1;
                    } else if is_text(byte) {
                        self.value.grow(byte);
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::HeaderValueLf => {
                    if byte == LF {
                        self.state = ParserState::HeaderValueEnd;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::HeaderValueEnd => {
                    // Framing headers are the only ones the parser
                    // interprets itself.
                    let (is_content_length, declares_chunked, parsed_length) = {
                        let name = self.name.slice(chunk);
                        let value = self.value.slice(chunk);
                        let is_cl = name.eq_ignore_ascii_case(b"Content-Length");
                        let chunked = name.eq_ignore_ascii_case(b"Transfer-Encoding")
                            && value.eq_ignore_ascii_case(b"chunked");
                        let parsed = if is_cl { parse_decimal(value) } else { 0 };
                        (is_cl, chunked, parsed)
                    };
                    if is_content_length {
                        self.content_length = parsed_length;
                    }
                    if declares_chunked {
                        self.chunked = true;
                    }

                    let rv =
                        handler.on_message_header(self.name.slice(chunk), self.value.slice(chunk));
                    self.name.clear();
                    self.value.clear();
                    self.state = ParserState::HeaderNameBegin;
                    if !rv {
                        return ParseStatus::Aborted;
                    }
                }
                ParserState::HeaderEndLf => {
                    if byte == LF {
                        let content_expected = self.content_length > 0
                            || self.chunked
                            || self.mode == ParseMode::Message;

                        self.state = if content_expected {
                            ParserState::ContentBegin
                        } else {
                            ParserState::MessageBegin
                        };
                        *nparsed += 1;
                        i += 1;

                        if !handler.on_message_header_end() {
                            return ParseStatus::Aborted;
                        }
                        if !content_expected && !handler.on_message_end() {
                            return ParseStatus::Aborted;
                        }
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }

                // ------------------------------------------------------
                // Body
                // ------------------------------------------------------
                ParserState::ContentBegin => {
                    if self.chunked {
                        self.state = ParserState::ChunkSizeBegin;
                    } else if self.content_length >= 0 {
                        self.state = ParserState::Content;
                    } else {
                        self.state = ParserState::ContentEndless;
                    }
                }
                ParserState::ContentEndless => {
                    // Everything that arrives is body; end-of-message is
                    // the transport closing.
                    let slice = &data[i..];
                    *nparsed += slice.len();
                    i = data.len();

                    if !handler.on_message_content(slice) {
                        return ParseStatus::Aborted;
                    }
                }
                ParserState::Content => {
                    let available = data.len() - i;
                    let take = (self.content_length as usize).min(available);
                    let slice = &data[i..i + take];

                    self.content_length -= take as i64;
                    *nparsed += take;
                    i += take;

                    let rv = handler.on_message_content(slice);

                    if self.content_length == 0 {
                        self.state = ParserState::MessageBegin;
                    }
                    if !rv {
                        return ParseStatus::Aborted;
                    }
                    if self.state == ParserState::MessageBegin && !handler.on_message_end() {
                        return ParseStatus::Aborted;
                    }
                }
                ParserState::ChunkSizeBegin => {
                    if byte.is_ascii_hexdigit() {
                        // Re-dispatch the digit in ChunkSize.
                        self.state = ParserState::ChunkSize;
                        self.content_length = 0;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::ChunkSize => {
                    if byte == CR {
                        self.state = ParserState::ChunkLf1;
                        *nparsed += 1;
                        i += 1;
                    } else if let Some(digit) = hex_value(byte) {
                        self.content_length = self
                            .content_length
                            .saturating_mul(16)
                            .saturating_add(i64::from(digit));
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::ChunkLf1 => {
                    if byte == LF {
                        self.state = if self.content_length != 0 {
                            ParserState::ChunkBody
                        } else {
                            ParserState::ChunkCr3
                        };
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::ChunkBody => {
                    if self.content_length > 0 {
                        let available = data.len() - i;
                        let take = (self.content_length as usize).min(available);
                        let slice = &data[i..i + take];

                        self.content_length -= take as i64;
                        *nparsed += take;
                        i += take;

                        if !handler.on_message_content(slice) {
                            return ParseStatus::Aborted;
                        }
                    } else if byte == CR {
                        self.state = ParserState::ChunkLf2;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::ChunkLf2 => {
                    if byte == LF {
                        self.state = ParserState::ChunkSize;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::ChunkCr3 => {
                    if byte == CR {
                        self.state = ParserState::ChunkLf3;
                        *nparsed += 1;
                        i += 1;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }
                ParserState::ChunkLf3 => {
                    if byte == LF {
                        *nparsed += 1;
                        i += 1;

                        if !handler.on_message_end() {
                            return ParseStatus::Aborted;
                        }
                        self.state = ParserState::MessageBegin;
                    } else {
                        self.state = ParserState::SyntaxError;
                    }
                }

                ParserState::SyntaxError => {
                    // Terminal; the offending byte stays unconsumed.
                    return ParseStatus::SyntaxError;
                }
            }
        }

        // Chunk exhausted. If all headers arrived but nothing determines
        // a body, the message is already complete and the machine resets
        // so pipelined messages in later chunks parse cleanly.
        if self.state == ParserState::ContentBegin
            && self.content_length < 0
            && !self.chunked
            && self.mode != ParseMode::Message
        {
            if !handler.on_message_end() {
                return ParseStatus::Aborted;
            }
            self.state = ParserState::MessageBegin;
        }

        // The chunk is about to be dropped by the caller; any open
        // accumulator must stop referencing it.
        self.method.stash(chunk);
        self.entity.stash(chunk);
        self.message.stash(chunk);
        self.name.stash(chunk);
        self.value.stash(chunk);

        match self.state {
            ParserState::SyntaxError => ParseStatus::SyntaxError,
            ParserState::MessageBegin => ParseStatus::Success,
            _ => ParseStatus::Partial,
        }
    }
}

/// 7-bit ASCII.
fn is_char(byte: u8) -> bool {
    byte <= 127
}

fn is_control(byte: u8) -> bool {
    byte <= 31 || byte == 127
}

fn is_separator(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')'
            | b'<'
            | b'>'
            | b'@'
            | b','
            | b';'
            | b':'
            | b'\\'
            | b'"'
            | b'/'
            | b'['
            | b']'
            | b'?'
            | b'='
            | b'{'
            | b'}'
            | SP
            | HT
    )
}

fn is_token(byte: u8) -> bool {
    is_char(byte) && !is_control(byte) && !is_separator(byte)
}

/// TEXT = any OCTET except CTLs, but including SP and HT.
fn is_text(byte: u8) -> bool {
    !is_control(byte) || byte == SP || byte == HT
}

fn is_print(byte: u8) -> bool {
    (0x20..=0x7e).contains(&byte)
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(10 + byte - b'a'),
        b'A'..=b'F' => Some(10 + byte - b'A'),
        _ => None,
    }
}

/// Parses the leading decimal digits of `bytes`; anything after them is
/// ignored, no digits parses as 0.
fn parse_decimal(bytes: &[u8]) -> i64 {
    let mut out: i64 = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            break;
        }
        out = out.saturating_mul(10).saturating_add(i64::from(b - b'0'));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        RequestBegin(Vec<u8>, Vec<u8>, u8, u8),
        ResponseBegin(u8, u8, u16, Vec<u8>),
        MessageBegin,
        Header(Vec<u8>, Vec<u8>),
        HeaderEnd,
        Content(Vec<u8>),
        End,
    }

    #[derive(Debug, Default)]
    struct Recorder {
        events: Vec<Event>,
        // Return false from the callback with this 1-based ordinal.
        deny_call: Option<usize>,
        calls: usize,
    }

    impl Recorder {
        fn permit(&mut self) -> bool {
            self.calls += 1;
            Some(self.calls) != self.deny_call
        }
    }

    impl MessageHandler for Recorder {
        fn on_request_begin(&mut self, method: &[u8], entity: &[u8], vmaj: u8, vmin: u8) -> bool {
            self.events.push(Event::RequestBegin(
                method.to_vec(),
                entity.to_vec(),
                vmaj,
                vmin,
            ));
            self.permit()
        }

        fn on_response_begin(&mut self, vmaj: u8, vmin: u8, code: u16, reason: &[u8]) -> bool {
            self.events
                .push(Event::ResponseBegin(vmaj, vmin, code, reason.to_vec()));
            self.permit()
        }

        fn on_message_begin(&mut self) -> bool {
            self.events.push(Event::MessageBegin);
            self.permit()
        }

        fn on_message_header(&mut self, name: &[u8], value: &[u8]) -> bool {
            self.events
                .push(Event::Header(name.to_vec(), value.to_vec()));
            self.permit()
        }

        fn on_message_header_end(&mut self) -> bool {
            self.events.push(Event::HeaderEnd);
            self.permit()
        }

        fn on_message_content(&mut self, content: &[u8]) -> bool {
            self.events.push(Event::Content(content.to_vec()));
            self.permit()
        }

        fn on_message_end(&mut self) -> bool {
            self.events.push(Event::End);
            self.permit()
        }
    }

    fn run(mode: ParseMode, input: &[u8]) -> (ParseStatus, usize, Recorder) {
        let mut parser = MessageParser::new(mode);
        let mut handler = Recorder::default();
        let mut cursor = 0;
        let status = parser.process(Chunk::new(input, 0), &mut cursor, &mut handler);
        (status, cursor, handler)
    }

    #[test]
    fn simple_get() {
        let input: &[u8] = b"GET /x HTTP/1.1\r\nHost: a\r\n\r\n";
        let (status, consumed, rec) = run(ParseMode::Request, input);
        assert_eq!(status, ParseStatus::Success);
        assert_eq!(consumed, input.len());
        assert_eq!(
            rec.events,
            vec![
                Event::RequestBegin(b"GET".to_vec(), b"/x".to_vec(), 1, 1),
                Event::Header(b"Host".to_vec(), b"a".to_vec()),
                Event::HeaderEnd,
                Event::End,
            ]
        );
    }

    #[test]
    fn fixed_length_post() {
        let input: &[u8] = b"POST /p HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let (status, consumed, rec) = run(ParseMode::Request, input);
        assert_eq!(status, ParseStatus::Success);
        assert_eq!(consumed, input.len());
        assert_eq!(
            rec.events,
            vec![
                Event::RequestBegin(b"POST".to_vec(), b"/p".to_vec(), 1, 1),
                Event::Header(b"Content-Length".to_vec(), b"5".to_vec()),
                Event::HeaderEnd,
                Event::Content(b"hello".to_vec()),
                Event::End,
            ]
        );
    }

    #[test]
    fn chunked_response() {
        let (status, _, rec) = run(
            ParseMode::Response,
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n",
        );
        assert_eq!(status, ParseStatus::Success);
        assert_eq!(
            rec.events,
            vec![
                Event::ResponseBegin(1, 1, 200, b"OK".to_vec()),
                Event::Header(b"Transfer-Encoding".to_vec(), b"chunked".to_vec()),
                Event::HeaderEnd,
                Event::Content(b"hello".to_vec()),
                Event::End,
            ]
        );
    }

    #[test]
    fn response_empty_reason() {
        let (status, _, rec) = run(ParseMode::Response, b"HTTP/1.1 204\r\n\r\n");
        assert_eq!(status, ParseStatus::Success);
        assert_eq!(rec.events[0], Event::ResponseBegin(1, 1, 204, Vec::new()));
    }

    #[test]
    fn syntax_error_leaves_offender_unconsumed() {
        let (status, consumed, _) = run(ParseMode::Request, b"GE@ / HTTP/1.1\r\n");
        assert_eq!(status, ParseStatus::SyntaxError);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn syntax_error_is_terminal() {
        let mut parser = MessageParser::new(ParseMode::Request);
        let mut handler = Recorder::default();
        let mut cursor = 0;
        let chunk = Chunk::new(b"GE@ / HTTP/1.1\r\n", 0);

        assert_eq!(
            parser.process(chunk, &mut cursor, &mut handler),
            ParseStatus::SyntaxError
        );
        let stalled = cursor;
        for _ in 0..3 {
            assert_eq!(
                parser.process(chunk, &mut cursor, &mut handler),
                ParseStatus::SyntaxError
            );
            assert_eq!(cursor, stalled);
            assert_eq!(parser.state(), ParserState::SyntaxError);
        }
    }

    #[test]
    fn bad_status_code_first_digit_keeps_code_clean() {
        let mut parser = MessageParser::new(ParseMode::Response);
        let mut handler = Recorder::default();
        let mut cursor = 0;

        let status = parser.process(
            Chunk::new(b"HTTP/1.1 x99 Nope\r\n\r\n", 0),
            &mut cursor,
            &mut handler,
        );
        assert_eq!(status, ParseStatus::SyntaxError);
        assert_eq!(parser.state(), ParserState::SyntaxError);
        assert_eq!(parser.code, 0);
    }

    #[test]
    fn framing_headers_are_interpreted() {
        let mut parser = MessageParser::new(ParseMode::Request);
        let mut handler = Recorder::default();
        let mut cursor = 0;
        parser.process(
            Chunk::new(b"PUT /u HTTP/1.1\r\nContent-Length: 12\r\n", 0),
            &mut cursor,
            &mut handler,
        );
        assert_eq!(parser.content_length(), 12);
        assert!(!parser.is_chunked());

        let mut parser = MessageParser::new(ParseMode::Request);
        let mut cursor = 0;
        parser.process(
            Chunk::new(b"PUT /u HTTP/1.1\r\ntransfer-encoding: CHUNKED\r\n", 0),
            &mut cursor,
            &mut handler,
        );
        assert!(parser.is_chunked());
    }

    #[test]
    fn chunked_takes_precedence_over_content_length() {
        // With both framings declared, the chunked dispatch wins and the
        // Content-Length value is ignored.
        let (status, _, rec) = run(
            ParseMode::Response,
            b"HTTP/1.1 200 OK\r\nContent-Length: 999\r\nTransfer-Encoding: chunked\r\n\r\n\
              3\r\nabc\r\n0\r\n\r\n",
        );
        assert_eq!(status, ParseStatus::Success);
        assert!(rec.events.contains(&Event::Content(b"abc".to_vec())));
        assert_eq!(rec.events.last(), Some(&Event::End));
    }

    #[test]
    fn message_mode_fires_begin_and_streams_endlessly() {
        let (status, consumed, rec) = run(ParseMode::Message, b"X: 1\r\n\r\nraw bytes");
        assert_eq!(status, ParseStatus::Partial);
        assert_eq!(consumed, 17);
        assert_eq!(
            rec.events,
            vec![
                Event::MessageBegin,
                Event::Header(b"X".to_vec(), b"1".to_vec()),
                Event::HeaderEnd,
                Event::Content(b"raw bytes".to_vec()),
            ]
        );
    }

    #[cfg(feature = "lenient-lf")]
    #[test]
    fn bare_lf_line_endings_accepted() {
        let (status, consumed, rec) = run(ParseMode::Request, b"GET /x HTTP/1.1\nHost: a\n\n");
        assert_eq!(status, ParseStatus::Success);
        assert_eq!(consumed, 25);
        assert_eq!(
            rec.events,
            vec![
                Event::RequestBegin(b"GET".to_vec(), b"/x".to_vec(), 1, 1),
                Event::Header(b"Host".to_vec(), b"a".to_vec()),
                Event::HeaderEnd,
                Event::End,
            ]
        );
    }

    #[test]
    fn folded_header_keeps_fold_bytes() {
        let (status, _, rec) = run(ParseMode::Request, b"GET / HTTP/1.1\r\nX: a\r\n b\r\n\r\n");
        assert_eq!(status, ParseStatus::Success);
        assert!(
            rec.events
                .contains(&Event::Header(b"X".to_vec(), b"a\r\n b".to_vec())),
            "events: {:?}",
            rec.events
        );
    }

    #[cfg(feature = "lenient-lf")]
    #[test]
    fn lf_fold_rejoins_two_bytes_not_three() {
        let (status, _, rec) = run(ParseMode::Request, b"GET / HTTP/1.1\r\nX: a\n b\r\n\r\n");
        assert_eq!(status, ParseStatus::Success);
        assert!(
            rec.events
                .contains(&Event::Header(b"X".to_vec(), b"a\n b".to_vec())),
            "events: {:?}",
            rec.events
        );
    }

    #[test]
    fn empty_header_value() {
        let (status, _, rec) = run(ParseMode::Request, b"GET / HTTP/1.1\r\nX-Empty:\r\n\r\n");
        assert_eq!(status, ParseStatus::Success);
        assert!(rec
            .events
            .contains(&Event::Header(b"X-Empty".to_vec(), Vec::new())));
    }

    #[test]
    fn leading_value_whitespace_is_skipped() {
        let (status, _, rec) = run(ParseMode::Request, b"GET / HTTP/1.1\r\nX:    spaced\r\n\r\n");
        assert_eq!(status, ParseStatus::Success);
        assert!(rec
            .events
            .contains(&Event::Header(b"X".to_vec(), b"spaced".to_vec())));
    }

    #[test]
    fn callback_false_halts_processing() {
        // Callback ordinals for a body-carrying request:
        // 1 request begin, 2 header, 3 header end, 4 content, 5 end.
        let input: &[u8] = b"POST /p HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        for deny in 1..=5 {
            let mut parser = MessageParser::new(ParseMode::Request);
            let mut handler = Recorder {
                deny_call: Some(deny),
                ..Recorder::default()
            };
            let mut cursor = 0;
            let status = parser.process(Chunk::new(input, 0), &mut cursor, &mut handler);
            assert_eq!(status, ParseStatus::Aborted, "deny={deny}");
            assert_eq!(handler.calls, deny, "no callbacks after the denial");
        }
    }

    #[test]
    fn pipelined_requests_parse_in_turn() {
        let input: &[u8] = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
        let mut parser = MessageParser::new(ParseMode::Request);
        let mut handler = Recorder::default();
        let mut cursor = 0;
        let chunk = Chunk::new(input, 0);

        assert_eq!(
            parser.process(chunk, &mut cursor, &mut handler),
            ParseStatus::Success
        );
        assert_eq!(cursor, input.len());

        let begins: Vec<_> = handler
            .events
            .iter()
            .filter_map(|e| match e {
                Event::RequestBegin(_, entity, _, _) => Some(entity.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(begins, vec![b"/a".to_vec(), b"/b".to_vec()]);
    }

    #[test]
    fn character_classes() {
        assert!(is_token(b'G'));
        assert!(is_token(b'!'));
        assert!(!is_token(b'@'));
        assert!(!is_token(b'('));
        assert!(!is_token(SP));
        assert!(!is_token(0x80));
        assert!(is_text(0x80));
        assert!(is_text(HT));
        assert!(!is_text(CR));
        assert_eq!(hex_value(b'a'), Some(10));
        assert_eq!(hex_value(b'F'), Some(15));
        assert_eq!(hex_value(b'g'), None);
    }

    #[test]
    fn decimal_prefix_parsing() {
        assert_eq!(parse_decimal(b"5"), 5);
        assert_eq!(parse_decimal(b"1234"), 1234);
        assert_eq!(parse_decimal(b"12kb"), 12);
        assert_eq!(parse_decimal(b""), 0);
        assert_eq!(parse_decimal(b"x"), 0);
    }

    #[test]
    fn status_name_mapping() {
        assert_eq!(ParseStatus::Success.code(), 0);
        assert_eq!(ParseStatus::Partial.code(), 1);
        assert_eq!(ParseStatus::Aborted.code(), 2);
        assert_eq!(ParseStatus::SyntaxError.code(), 3);
        assert_eq!(ParseStatus::Success.as_str(), "Success");
        assert_eq!(ParseStatus::SyntaxError.to_string(), "Invalid Syntax");
    }
}
