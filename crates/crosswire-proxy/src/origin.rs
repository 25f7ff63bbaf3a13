//! Origin addresses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Port used when a TCP origin names none.
pub const DEFAULT_ORIGIN_PORT: u16 = 80;

/// Where a proxy connection goes.
///
/// Written in configuration as `unix:<path>` for Unix-domain sockets or
/// `<host>[:<port>]` for TCP, the port defaulting to 80.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// TCP origin, resolved through DNS at connect time.
    Tcp {
        /// Hostname or address literal.
        host: String,
        /// Destination port.
        port: u16,
    },
    /// Unix-domain stream socket.
    Unix {
        /// Filesystem path of the socket.
        path: PathBuf,
    },
}

impl Origin {
    /// Parses an origin directive.
    ///
    /// Parsing never fails: a malformed port parses as 0 and surfaces as
    /// a connect failure later, which is where address problems are
    /// reported anyway.
    #[must_use]
    pub fn parse(origin: &str) -> Self {
        if let Some(path) = origin.strip_prefix("unix:") {
            return Self::Unix {
                path: PathBuf::from(path),
            };
        }

        match origin.rfind(':') {
            Some(pos) => Self::Tcp {
                host: origin[..pos].to_string(),
                port: origin[pos + 1..].parse().unwrap_or(0),
            },
            None => Self::Tcp {
                host: origin.to_string(),
                port: DEFAULT_ORIGIN_PORT,
            },
        }
    }

    /// Returns true for Unix-domain origins.
    #[must_use]
    pub fn is_unix(&self) -> bool {
        matches!(self, Self::Unix { .. })
    }
}

impl From<&str> for Origin {
    fn from(origin: &str) -> Self {
        Self::parse(origin)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(f, "{host}:{port}"),
            Self::Unix { path } => write!(f, "unix:{}", path.display()),
        }
    }
}
