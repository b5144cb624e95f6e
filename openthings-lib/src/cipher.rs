//! Keystream cipher protecting OpenThings messages.
//!
//! Every message is XOR-scrambled with a byte stream drawn from a 16-bit
//! linear feedback register, seeded from the encryption id and the
//! per-message random pip. The transform is its own inverse, so the same
//! routine both encrypts and decrypts.

/// Feedback taps applied when the low bit of the register is set.
const FEEDBACK: u16 = 62965;

/// Whitening constant XORed into every output byte.
const WHITEN: u8 = 90;

/// Per-message keystream state.
///
/// Seeded once at the start of a message and advanced exactly once per wire
/// byte, in order. An instance must never be reused for a second message;
/// the fresh pip in each frame exists to prevent keystream reuse.
#[derive(Debug, Clone)]
pub struct Keystream {
    state: u16,
}

impl Keystream {
    /// Seed the register from the encryption id and the message pip.
    pub fn seed(encryption_id: u8, pip: u16) -> Self {
        Keystream {
            state: (u16::from(encryption_id) << 8) ^ pip,
        }
    }

    /// Encrypt or decrypt one byte, advancing the register five steps.
    pub fn apply(&mut self, byte: u8) -> u8 {
        for _ in 0..5 {
            self.state = if self.state & 1 != 0 {
                (self.state >> 1) ^ FEEDBACK
            } else {
                self.state >> 1
            };
        }
        (self.state as u8) ^ byte ^ WHITEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_yields_same_stream() {
        let mut a = Keystream::seed(0xF2, 0x1234);
        let mut b = Keystream::seed(0xF2, 0x1234);
        for byte in 0..=255u8 {
            assert_eq!(a.apply(byte), b.apply(byte));
        }
    }

    #[test]
    fn cipher_is_involutive() {
        let plain: Vec<u8> = (0..64u8).map(|i| i.wrapping_mul(37)).collect();
        let mut enc = Keystream::seed(0xF2, 0xBEEF);
        let scrambled: Vec<u8> = plain.iter().map(|&b| enc.apply(b)).collect();
        assert_ne!(scrambled, plain);

        let mut dec = Keystream::seed(0xF2, 0xBEEF);
        let recovered: Vec<u8> = scrambled.iter().map(|&b| dec.apply(b)).collect();
        assert_eq!(recovered, plain);
    }

    #[test]
    fn different_pip_yields_different_stream() {
        let mut a = Keystream::seed(0xF2, 0x0001);
        let mut b = Keystream::seed(0xF2, 0x0002);
        let sa: Vec<u8> = (0..16).map(|_| a.apply(0)).collect();
        let sb: Vec<u8> = (0..16).map(|_| b.apply(0)).collect();
        assert_ne!(sa, sb);
    }
}
