//! Common Utilities
//!
//! Bit packing and CRC helpers shared by the channel encoders.
//! Bit vectors hold one bit per `u8` (0 or 1), MSB first.

use bytes::{Bytes, BytesMut, BufMut};
use tracing::trace;

/// CRC-24A generator polynomial (36.212 5.1.1)
pub const CRC24A_POLY: u32 = 0x864CFB;

/// CRC-16 generator polynomial (36.212 5.1.1)
pub const CRC16_POLY: u32 = 0x1021;

/// Convert a byte slice to hex string for debugging
pub fn bytes_to_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compute a CRC of `len` bits over a bit vector
pub fn crc_bits(bits: &[u8], poly: u32, len: u32) -> u32 {
    let top = 1u32 << (len - 1);
    let mask = ((1u64 << len) - 1) as u32;
    let mut crc: u32 = 0;

    for &bit in bits {
        let feedback = ((crc & top) != 0) ^ (bit & 1 != 0);
        crc = (crc << 1) & mask;
        if feedback {
            crc ^= poly & mask;
        }
    }

    crc
}

/// Append a `len`-bit CRC (MSB first) to a bit vector
pub fn attach_crc(bits: &[u8], poly: u32, len: u32) -> Vec<u8> {
    let crc = crc_bits(bits, poly, len);
    let mut out = Vec::with_capacity(bits.len() + len as usize);
    out.extend_from_slice(bits);
    append_bits(&mut out, crc, len as usize);
    trace!("Attached {}-bit CRC 0x{:06x} to {} bits", len, crc, bits.len());
    out
}

/// Append the `nbits` least significant bits of `value`, MSB first
pub fn append_bits(bits: &mut Vec<u8>, value: u32, nbits: usize) {
    for i in (0..nbits).rev() {
        bits.push(((value >> i) & 1) as u8);
    }
}

/// Pack bits into bytes (MSB first)
pub fn pack_bits(bits: &[u8]) -> Bytes {
    let mut bytes = BytesMut::with_capacity(bits.len().div_ceil(8));

    for chunk in bits.chunks(8) {
        let mut byte = 0u8;
        for (i, &bit) in chunk.iter().enumerate() {
            if bit & 1 != 0 {
                byte |= 1 << (7 - i);
            }
        }
        bytes.put_u8(byte);
    }

    bytes.freeze()
}

/// Unpack bytes into bits (MSB first)
pub fn unpack_bits(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);

    for &byte in bytes {
        for i in 0..8 {
            bits.push((byte >> (7 - i)) & 1);
        }
    }

    bits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_hex() {
        let data = vec![0x12, 0x34, 0xAB, 0xCD];
        assert_eq!(bytes_to_hex(&data), "12 34 ab cd");
    }

    #[test]
    fn test_crc_residue_is_zero() {
        let bits = unpack_bits(b"LTE");
        let with_crc = attach_crc(&bits, CRC24A_POLY, 24);
        assert_eq!(with_crc.len(), 24 + 24);
        assert_eq!(crc_bits(&with_crc, CRC24A_POLY, 24), 0);

        let with_crc16 = attach_crc(&bits, CRC16_POLY, 16);
        assert_eq!(crc_bits(&with_crc16, CRC16_POLY, 16), 0);
    }

    #[test]
    fn test_crc16_check_value() {
        // CRC-16/XMODEM check value for "123456789"
        let bits = unpack_bits(b"123456789");
        assert_eq!(crc_bits(&bits, CRC16_POLY, 16), 0x31C3);
    }

    #[test]
    fn test_bit_packing() {
        let bits = vec![1, 0, 1, 0, 1, 0, 1, 0, 1];
        let packed = pack_bits(&bits);
        assert_eq!(packed.len(), 2);
        assert_eq!(packed[0], 0xAA); // 10101010
        assert_eq!(packed[1], 0x80);

        let unpacked = unpack_bits(&packed);
        assert_eq!(unpacked[..9], bits[..]);
    }

    #[test]
    fn test_append_bits() {
        let mut bits = Vec::new();
        append_bits(&mut bits, 0b101, 5);
        assert_eq!(bits, vec![0, 0, 1, 0, 1]);
    }
}
