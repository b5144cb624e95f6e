//! Legacy one-way on/off switch codec.
//!
//! A much older protocol than OpenThings: a fixed unencrypted frame with no
//! checksum and no receive path, transmitted under OOK modulation. The
//! receiving sockets latch two control bytes selected by socket number;
//! reliability comes from repeating the burst, not from acknowledgements.

use crate::error::Error;

/// Preamble, address and control bytes.
pub const FRAME_SIZE: usize = 16;

/// Bytes of the preamble/sync prefix at the start of each frame.
pub const PREAMBLE_SIZE: usize = 4;

/// Bytes of device address carried in each frame.
pub const ADDRESS_SIZE: usize = 10;

/// Highest addressable socket; 0 switches every socket on the address.
pub const MAX_SOCKET: u8 = 4;

// Control byte pairs encode the D0-D3 line levels the sockets decode.
const CONTROL_ON: [[u8; 2]; 5] = [
    [0xEE, 0x8E], // all sockets
    [0xEE, 0xEE],
    [0x8E, 0xEE],
    [0xE8, 0xEE],
    [0x88, 0xEE],
];
const CONTROL_OFF: [[u8; 2]; 5] = [
    [0xEE, 0x88], // all sockets
    [0xEE, 0xE8],
    [0x8E, 0xE8],
    [0xE8, 0xE8],
    [0x88, 0xE8],
];

/// Build the switch frame for `socket` on the addressed socket group.
pub fn switch_frame(
    address: &[u8; ADDRESS_SIZE],
    socket: u8,
    on: bool,
) -> Result<[u8; FRAME_SIZE], Error> {
    let table = if on { &CONTROL_ON } else { &CONTROL_OFF };
    let control = table
        .get(usize::from(socket))
        .ok_or(Error::InvalidSocket(socket))?;

    let mut frame = [0u8; FRAME_SIZE];
    frame[0] = 0x80; // 32-bit preamble enclosed in the sync words
    frame[PREAMBLE_SIZE..PREAMBLE_SIZE + ADDRESS_SIZE].copy_from_slice(address);
    frame[14] = control[0];
    frame[15] = control[1];
    Ok(frame)
}
