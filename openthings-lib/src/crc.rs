//! CRC-16/CCITT over the validated span of a message.

/// Compute the message checksum: polynomial 0x1021, initial remainder 0,
/// MSB first, no final XOR. Covers the sensor id through the last record
/// byte; the two CRC bytes themselves are excluded.
pub fn crc16(data: &[u8]) -> u16 {
    let mut rem: u16 = 0;
    for &byte in data {
        rem ^= u16::from(byte) << 8;
        for _ in 0..8 {
            rem = if rem & 0x8000 != 0 {
                (rem << 1) ^ 0x1021
            } else {
                rem << 1
            };
        }
    }
    rem
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // CRC-16/XMODEM check value for "123456789".
        assert_eq!(crc16(b"123456789"), 0x31C3);
    }

    #[test]
    fn deterministic() {
        let data = [0x01, 0x49, 0x74, 0x12, 0x01, 0x80, 0x00];
        assert_eq!(crc16(&data), crc16(&data));
    }

    #[test]
    fn order_sensitive() {
        assert_ne!(crc16(&[0x12, 0x34]), crc16(&[0x34, 0x12]));
    }

    #[test]
    fn single_byte_change_detected() {
        let data = [0x00, 0x01, 0x49, 0x74, 0x12, 0x00, 0xF0, 0x00];
        let base = crc16(&data);
        for i in 0..data.len() {
            let mut corrupted = data;
            corrupted[i] ^= 0x01;
            assert_ne!(crc16(&corrupted), base, "flip at {i} undetected");
        }
    }
}
