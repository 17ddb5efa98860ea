// CRC16 implementation for frame integrity checking
// Polynomial: x^16 + x^15 + x^2 + 1 (0x8005), MSB first, no reflection

use crate::utils::consts::{CRC16_INIT, CRC16_POLYNOMIAL};

/// Polynomial and initial value pair. Both ends of the link must agree on
/// these or every frame is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc16 {
    pub polynomial: u16,
    pub init: u16,
}

impl Crc16 {
    pub const fn new(polynomial: u16, init: u16) -> Self {
        Self { polynomial, init }
    }

    pub fn checksum(&self, data: &[u8]) -> u16 {
        compute_crc16(data, self.polynomial, self.init)
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new(CRC16_POLYNOMIAL, CRC16_INIT)
    }
}

/// Bit-serial CRC16 over `data`
pub fn compute_crc16(data: &[u8], polynomial: u16, init: u16) -> u16 {
    let mut crc: u16 = init;

    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ polynomial;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}

/// Calculate CRC16 with the link defaults (0x8005, init 0)
pub fn calculate_crc16(data: &[u8]) -> u16 {
    compute_crc16(data, CRC16_POLYNOMIAL, CRC16_INIT)
}

/// Verify CRC16 checksum with the link defaults
pub fn verify_crc16(data: &[u8], expected_crc: u16) -> bool {
    calculate_crc16(data) == expected_crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    #[test]
    fn test_crc16_check_value() {
        assert_eq!(calculate_crc16(b"123456789"), 0xFEE8);
    }

    #[test]
    fn test_crc16_empty_is_init() {
        assert_eq!(calculate_crc16(&[]), 0);
        assert_eq!(compute_crc16(&[], 0x8005, 0x1234), 0x1234);
    }

    #[test]
    fn test_crc16_packed_u16_regression() {
        // [1, 2, 3, 4] as little-endian u16
        let data = [0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04, 0x00];
        assert_eq!(calculate_crc16(&data), 0xC406);
    }

    #[test]
    fn test_crc16_zero_bytes_stay_zero() {
        assert_eq!(calculate_crc16(&[0u8; 128]), 0);
    }

    #[test]
    fn test_crc16_deterministic() {
        let mut rng = StdRng::seed_from_u64(7);
        for len in [0usize, 1, 2, 17, 128, 1536] {
            let data: Vec<u8> = (0..len).map(|_| rng.random()).collect();
            assert_eq!(calculate_crc16(&data), calculate_crc16(&data));
        }
    }

    #[test]
    fn test_crc16_matches_reference() {
        let reference = crc::Crc::<u16>::new(&crc::CRC_16_UMTS);
        let mut rng = StdRng::seed_from_u64(42);
        for len in [1usize, 3, 64, 256, 3072] {
            let data: Vec<u8> = (0..len).map(|_| rng.random()).collect();
            assert_eq!(calculate_crc16(&data), reference.checksum(&data));
        }
    }

    #[test]
    fn test_verify_detects_change() {
        let data = b"X 134 10 20 30";
        let crc = calculate_crc16(data);
        assert!(verify_crc16(data, crc));

        let mut modified = data.to_vec();
        modified[6] ^= 0x01;
        assert!(!verify_crc16(&modified, crc));
    }

    #[test]
    fn test_params_struct_matches_free_fn() {
        let params = Crc16::new(0x1021, 0xFFFF);
        let data = b"sensor";
        assert_eq!(params.checksum(data), compute_crc16(data, 0x1021, 0xFFFF));
        assert_eq!(Crc16::default().checksum(data), calculate_crc16(data));
    }
}
