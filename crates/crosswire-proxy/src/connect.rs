//! Origin connection establishment.

use crate::origin::Origin;
use asupersync::io::{AsyncRead, AsyncWrite, ReadBuf};
use asupersync::net::TcpStream;
#[cfg(unix)]
use asupersync::net::UnixStream;
use std::io;
use std::net::ToSocketAddrs;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A connected origin transport.
///
/// Both variants are plain byte streams; everything above the connect
/// call treats them uniformly.
#[derive(Debug)]
pub enum OriginStream {
    /// TCP connection.
    Tcp(TcpStream),
    /// Unix-domain connection.
    #[cfg(unix)]
    Unix(UnixStream),
}

/// Connects to the origin.
///
/// TCP origins resolve through DNS and every returned address is tried
/// in order; the first stream to come up wins and the last error is
/// reported when none does. Whether a given attempt completed
/// immediately or in the background is the connect future's business.
///
/// # Errors
///
/// Any resolution or connection failure. The proxy maps all of them to
/// its service-unavailable outcome.
pub async fn connect_origin(origin: &Origin) -> io::Result<OriginStream> {
    match origin {
        Origin::Tcp { host, port } => {
            let addrs: Vec<_> = (host.as_str(), *port).to_socket_addrs()?.collect();

            let mut last_error = None;
            for addr in addrs {
                match TcpStream::connect(addr).await {
                    Ok(stream) => return Ok(OriginStream::Tcp(stream)),
                    Err(err) => last_error = Some(err),
                }
            }
            Err(last_error.unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses resolved")
            }))
        }
        #[cfg(unix)]
        Origin::Unix { path } => Ok(OriginStream::Unix(UnixStream::connect(path).await?)),
        #[cfg(not(unix))]
        Origin::Unix { .. } => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "unix-domain origins require a unix platform",
        )),
    }
}

impl AsyncRead for OriginStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(unix)]
            Self::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for OriginStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(unix)]
            Self::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(unix)]
            Self::Unix(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(unix)]
            Self::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}
