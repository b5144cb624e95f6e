//! Byte-level port onto the radio transceiver.
//!
//! The protocol engine never touches transceiver registers; everything it
//! needs from the hardware fits behind this trait. The reference deployment
//! implements it over an RFM69-class module on SPI.

use crate::error::Error;
use std::time::Duration;
use strum_macros::Display;

/// Transceiver status flags the driver sequences on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StatusFlag {
    ModeReady,
    TxReady,
    FifoLevel,
    FifoNotEmpty,
    PacketSent,
    PayloadReady,
}

/// Radio modulation schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Modulation {
    /// Frequency-shift keying, carrying the encrypted OpenThings protocol.
    Fsk,
    /// On-off keying, carrying the legacy unencrypted switch protocol.
    Ook,
}

/// Byte transport over the radio transceiver.
///
/// The transceiver is a single half-duplex resource: callers hold exclusive
/// access (`&mut self`) for a whole send or receive operation, and the
/// implementation owns the TX/RX operating-mode switching that goes with
/// reads and writes.
pub trait Transport {
    /// Read the next available byte from the receive FIFO.
    fn read_byte(&mut self) -> Result<u8, Error>;

    /// Queue bytes for transmission.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error>;

    /// Poll until `flag` reads as `expected` or `timeout` elapses. On
    /// timeout this returns `false` and the caller logs and proceeds
    /// best-effort rather than hanging.
    fn wait_for_flag(&mut self, flag: StatusFlag, expected: bool, timeout: Duration) -> bool;

    /// Switch modulation scheme.
    fn set_modulation(&mut self, modulation: Modulation) -> Result<(), Error>;
}
