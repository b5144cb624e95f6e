use std::io;
use thiserror::Error;

/// The primary error type for the `openthings-lib` library.
///
/// Malformed inbound frames are deliberately absent: the decoder logs and
/// drops them without surfacing an error, so the engine keeps running across
/// radio noise. This enum covers caller programming errors and the transport
/// boundary.
#[derive(Error, Debug)]
pub enum Error {
    #[error("encoded frame is {len} bytes, the transceiver FIFO holds at most {max}")]
    FrameTooLong { len: usize, max: usize },

    #[error("record value is {0} bytes, a record can carry at most 15")]
    ValueTooLong(usize),

    #[error("invalid socket number: {0} (expected 0-4, 0 meaning all sockets)")]
    InvalidSocket(u8),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("transport error: {0}")]
    Transport(String),
}
