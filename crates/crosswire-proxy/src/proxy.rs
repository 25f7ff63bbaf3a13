//! The proxy connection state machine.

use crate::config::ProxyConfig;
use crate::connect::{OriginStream, connect_origin};
use crate::filter::{forward_request_header, forward_response_header};
use crate::timer::{Deadline, bounded};
use asupersync::Cx;
use asupersync::io::{AsyncRead, AsyncWrite, ReadBuf};
use crosswire_core::{ClientExchange, HttpStatus};
use crosswire_http::{Chunk, MessageHandler, MessageParser, ParseMode, ParseStatus, ParserState};
use std::fmt;
use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::task::Poll;

/// How much the response read buffer grows each time it fills.
const READ_BUFFER_INCREMENT: usize = 4096;

/// Connection lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    /// No origin socket yet.
    Disconnected,
    /// About to initiate the connect.
    AboutToConnect,
    /// Connect in flight.
    Connecting,
    /// Origin socket up, nothing written yet.
    Connected,
    /// Forwarding the request head and body to the origin.
    Writing,
    /// Consuming the origin's response.
    Reading,
}

/// How a proxy connection failed.
#[derive(Debug)]
pub enum ProxyError {
    /// The origin could not be reached; the client gets 503.
    ServiceUnavailable,
    /// The origin sent something that is not an HTTP/1.1 response; the
    /// client gets 500.
    UpstreamProtocol,
    /// A read- or write-phase deadline fired; the client gets 504.
    GatewayTimeout,
    /// The request was cancelled (client abort); the connection winds
    /// down silently.
    Aborted,
    /// Transport failure talking to the origin or the client.
    Io(io::Error),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceUnavailable => write!(f, "origin unavailable"),
            Self::UpstreamProtocol => write!(f, "origin sent an unparseable response"),
            Self::GatewayTimeout => write!(f, "origin deadline fired"),
            Self::Aborted => write!(f, "request aborted"),
            Self::Io(err) => write!(f, "transport error: {err}"),
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ProxyError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// One client request being fulfilled against an origin.
///
/// Created per request, consumed by [`run`](Self::run), gone when the
/// response has been forwarded or the attempt failed. The origin socket
/// is owned exclusively by this object and closed when it drops.
///
/// Backpressure: response body slices surfaced while parsing a read are
/// queued, then written to the client one by one, each awaited to
/// completion, before the next origin read is issued. The client's write
/// pace is the origin's read pace.
#[derive(Debug)]
pub struct ProxyConnection {
    config: ProxyConfig,
    state: ProxyState,
    parser: MessageParser,
    write_buffer: Vec<u8>,
    write_offset: usize,
    read_buffer: Vec<u8>,
    response_cursor: usize,
}

impl ProxyConnection {
    /// Creates a connection for one request under the given
    /// configuration.
    #[must_use]
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            state: ProxyState::Disconnected,
            parser: MessageParser::new(ParseMode::Response),
            write_buffer: Vec::with_capacity(1024),
            write_offset: 0,
            read_buffer: Vec::new(),
            response_cursor: 0,
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn state(&self) -> ProxyState {
        self.state
    }

    /// Fulfills the request: connect, forward, stream the response back.
    ///
    /// Always finishes the client exchange, with the status the origin
    /// produced on success, 503 when the origin was unreachable, 500 when
    /// its response was unparseable, and the response untouched on
    /// transport errors and cancellation.
    ///
    /// Each configured phase deadline (connect, write, read) is armed
    /// when its phase begins and disarmed when the phase completes or
    /// transitions; a fired timer terminates the connection, as 503 for
    /// the connect phase and 504 for the others. Cancellation on `cx`
    /// (client abort) is observed at every suspension point and tears
    /// the connection down as well.
    ///
    /// # Errors
    ///
    /// See [`ProxyError`]. The error has already been translated onto the
    /// client exchange by the time it is returned.
    pub async fn run<C: ClientExchange>(
        mut self,
        cx: &Cx,
        client: &mut C,
    ) -> Result<(), ProxyError> {
        let result = self.drive(cx, client).await;

        match &result {
            Ok(()) => {}
            Err(ProxyError::ServiceUnavailable) => {
                client.set_status(HttpStatus::SERVICE_UNAVAILABLE);
            }
            Err(ProxyError::UpstreamProtocol) => {
                client.set_status(HttpStatus::INTERNAL_SERVER_ERROR);
            }
            Err(ProxyError::GatewayTimeout) => {
                client.set_status(HttpStatus::GATEWAY_TIMEOUT);
            }
            // Transport failures and cancellation leave the response as
            // it stands; there is nothing useful to tell the client.
            Err(ProxyError::Aborted | ProxyError::Io(_)) => {}
        }

        client.finish();
        result
    }

    async fn drive<C: ClientExchange>(
        &mut self,
        cx: &Cx,
        client: &mut C,
    ) -> Result<(), ProxyError> {
        self.serialize_request_head(client);

        // Connect, under the connect deadline.
        check_cancel(cx)?;
        self.state = ProxyState::AboutToConnect;
        cx.trace(&format!("proxy: connecting to {}", self.config.origin()));
        let mut connect_deadline = self.config.connect_timeout().map(Deadline::after);
        self.state = ProxyState::Connecting;
        let mut stream = match bounded(
            connect_deadline.as_mut(),
            connect_origin(self.config.origin()),
        )
        .await
        {
            Some(Ok(stream)) => stream,
            Some(Err(err)) => {
                cx.trace(&format!("proxy: connect failed: {err}"));
                return Err(ProxyError::ServiceUnavailable);
            }
            None => {
                cx.trace("proxy: connect deadline fired");
                return Err(ProxyError::ServiceUnavailable);
            }
        };
        drop(connect_deadline);
        self.state = ProxyState::Connected;

        // Forward the request: first the serialized head, then body
        // chunks pulled from the client as the buffer drains. The write
        // deadline covers the whole phase and is disarmed on the
        // transition to reading.
        self.state = ProxyState::Writing;
        let mut write_deadline = self.config.write_timeout().map(Deadline::after);
        loop {
            check_cancel(cx)?;
            while self.write_offset < self.write_buffer.len() {
                let n = match bounded(
                    write_deadline.as_mut(),
                    write_some(&mut stream, &self.write_buffer[self.write_offset..]),
                )
                .await
                {
                    Some(written) => written?,
                    None => return Err(ProxyError::GatewayTimeout),
                };
                if n == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "origin stopped accepting the request",
                    )
                    .into());
                }
                self.write_offset += n;
            }
            self.write_buffer.clear();
            self.write_offset = 0;

            if !client.body_available() {
                break;
            }
            let pulled = match bounded(write_deadline.as_mut(), client.read_body_chunk()).await {
                Some(chunk) => chunk?,
                None => return Err(ProxyError::GatewayTimeout),
            };
            match pulled {
                Some(body_chunk) => self.write_buffer.extend_from_slice(&body_chunk),
                None => break,
            }
        }
        drop(write_deadline);
        cx.trace("proxy: request forwarded, reading response");

        // Stream the response back, under the read deadline.
        self.state = ProxyState::Reading;
        let mut read_deadline = self.config.read_timeout().map(Deadline::after);
        loop {
            check_cancel(cx)?;
            let read = match bounded(
                read_deadline.as_mut(),
                read_append(&mut stream, &mut self.read_buffer),
            )
            .await
            {
                Some(appended) => appended?,
                None => return Err(ProxyError::GatewayTimeout),
            };
            if read == 0 {
                // Origin closed. A body that runs to end-of-stream is
                // complete now; anything else was cut off mid-message.
                return if self.parser.state() == ParserState::ContentEndless {
                    Ok(())
                } else {
                    Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "origin closed before the response completed",
                    )
                    .into())
                };
            }

            let lower = self.read_buffer.len() - read;
            debug_assert_eq!(self.response_cursor, lower);

            let mut forwarder = ResponseForwarder {
                client: &mut *client,
                cloak: self.config.cloak_server_header(),
                pending: Vec::new(),
            };
            let status = self.parser.process(
                Chunk::new(&self.read_buffer[lower..], lower),
                &mut self.response_cursor,
                &mut forwarder,
            );

            let pending = forwarder.pending;
            for piece in &pending {
                check_cancel(cx)?;
                // Awaiting the write is the backpressure: no further
                // origin read until the client drained this slice.
                match bounded(read_deadline.as_mut(), client.write_body(piece)).await {
                    Some(written) => written?,
                    None => return Err(ProxyError::GatewayTimeout),
                }
            }

            match status {
                ParseStatus::Success => {
                    cx.trace("proxy: response complete");
                    return Ok(());
                }
                ParseStatus::Partial => {}
                ParseStatus::Aborted | ParseStatus::SyntaxError => {
                    return Err(ProxyError::UpstreamProtocol);
                }
            }
        }
    }

    /// Serializes the origin-facing request head: the client's
    /// request-line and headers minus the dropped set, body not
    /// included.
    fn serialize_request_head<C: ClientExchange>(&mut self, client: &C) {
        let head = &mut self.write_buffer;
        head.extend_from_slice(client.method());
        head.push(b' ');
        head.extend_from_slice(client.uri());
        head.extend_from_slice(b" HTTP/1.1\r\n");

        for field in client.request_headers() {
            if !forward_request_header(&field.name) {
                continue;
            }
            head.extend_from_slice(&field.name);
            head.extend_from_slice(b": ");
            head.extend_from_slice(&field.value);
            head.extend_from_slice(b"\r\n");
        }

        head.extend_from_slice(b"\r\n");
    }
}

/// Routes parser events onto the client exchange.
///
/// Status and headers go straight through (filtered); body slices are
/// only valid during `process`, so they are copied into a queue the
/// driver writes out afterwards.
struct ResponseForwarder<'a, C: ClientExchange> {
    client: &'a mut C,
    cloak: bool,
    pending: Vec<Vec<u8>>,
}

impl<C: ClientExchange> MessageHandler for ResponseForwarder<'_, C> {
    fn on_response_begin(&mut self, _vmajor: u8, _vminor: u8, code: u16, _reason: &[u8]) -> bool {
        // The reason phrase is the origin's; the client response renders
        // its own canonical one.
        self.client.set_status(HttpStatus::from_u16(code));
        true
    }

    fn on_message_header(&mut self, name: &[u8], value: &[u8]) -> bool {
        if forward_response_header(name, self.cloak) {
            self.client.append_header(name, value);
        }
        true
    }

    fn on_message_content(&mut self, content: &[u8]) -> bool {
        self.pending.push(content.to_vec());
        true
    }
}

fn check_cancel(cx: &Cx) -> Result<(), ProxyError> {
    if cx.is_cancel_requested() {
        Err(ProxyError::Aborted)
    } else {
        Ok(())
    }
}

async fn write_some(stream: &mut OriginStream, buf: &[u8]) -> io::Result<usize> {
    poll_fn(|cx| Pin::new(&mut *stream).poll_write(cx, buf)).await
}

/// Reads into the spare tail of `buffer`, growing it by
/// [`READ_BUFFER_INCREMENT`] when full. Returns the number of bytes
/// appended, 0 at end-of-stream.
async fn read_append(stream: &mut OriginStream, buffer: &mut Vec<u8>) -> io::Result<usize> {
    if buffer.len() == buffer.capacity() {
        buffer.reserve(READ_BUFFER_INCREMENT);
    }
    let lower = buffer.len();
    let upper = buffer.capacity();
    buffer.resize(upper, 0);

    let result = poll_fn(|cx| {
        let mut read_buf = ReadBuf::new(&mut buffer[lower..]);
        match Pin::new(&mut *stream).poll_read(cx, &mut read_buf) {
            Poll::Ready(Ok(())) => Poll::Ready(Ok(read_buf.filled().len())),
            Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
            Poll::Pending => Poll::Pending,
        }
    })
    .await;

    match result {
        Ok(n) => {
            buffer.truncate(lower + n);
            Ok(n)
        }
        Err(err) => {
            buffer.truncate(lower);
            Err(err)
        }
    }
}
