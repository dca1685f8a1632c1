//! Crate error types
//!
//! A single error enum covers construction, address resolution and
//! transport failures. Steady-state per-peer errors are never surfaced
//! through this type; the broker absorbs them and evicts the peer.

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, PlexError>;

/// Error type for broker operations
#[derive(Debug)]
pub enum PlexError {
    /// Buffer size of zero was passed at construction
    InvalidBufferSize,
    /// Operation attempted on a closed broker
    Closed,
    /// Address resolved to no usable endpoint
    Resolve(String),
    /// Underlying socket error (bind, dial, send, recv)
    Io(std::io::Error),
}

impl std::fmt::Display for PlexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlexError::InvalidBufferSize => write!(f, "buffer size must be non-zero"),
            PlexError::Closed => write!(f, "broker is closed"),
            PlexError::Resolve(addr) => write!(f, "address resolved to no endpoint: {}", addr),
            PlexError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for PlexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlexError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PlexError {
    fn from(e: std::io::Error) -> Self {
        PlexError::Io(e)
    }
}
