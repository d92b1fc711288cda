//! # Transport Error Types

use thiserror::Error;

/// Errors raised by the link layer.
///
/// These never cross the send/receive boundary as panics or results on the
/// hot path; they are reported to the injected [`crate::TransportHandler`]
/// or logged, and connection-level failures surface as a
/// connectivity-changed notification instead.
#[derive(Error, Debug)]
pub enum NetError {
    /// The OS socket failed (bind, send or receive).
    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),
}

/// Convenience alias for link-layer results.
pub type NetResult<T> = Result<T, NetError>;
