//! Packed (variable-length) unsigned integers.
//!
//! Seven bits per byte, least significant group first. A set high bit means
//! another byte follows. A 32-bit value takes at most five bytes.

use bytes::{Buf, BufMut};

use crate::error::ProtocolError;

/// Longest encoding of a `u32`.
pub const MAX_PACKED_LEN: usize = 5;

pub fn write_packed(out: &mut impl BufMut, mut value: u32) {
    loop {
        let group = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.put_u8(group);
            return;
        }
        out.put_u8(group | 0x80);
    }
}

pub fn read_packed(input: &mut impl Buf) -> Result<u32, ProtocolError> {
    let mut value = 0u32;
    for index in 0..MAX_PACKED_LEN {
        if !input.has_remaining() {
            return Err(ProtocolError::TruncatedBody);
        }
        let byte = input.get_u8();
        let group = u32::from(byte & 0x7f);
        // Only four bits of the fifth group fit in a u32.
        if index == MAX_PACKED_LEN - 1 && group > 0x0f {
            return Err(ProtocolError::CorruptPayload(
                "packed integer overflows 32 bits".into(),
            ));
        }
        value |= group << (7 * index as u32);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(ProtocolError::CorruptPayload(format!(
        "packed integer longer than {} bytes",
        MAX_PACKED_LEN
    )))
}

/// Number of bytes `write_packed` emits for `value`.
pub fn packed_len(value: u32) -> usize {
    let bits = 32 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}
