// 7-bit little-endian-continuation varints, as used to prefix every tuple
// field (see `include/pickle.h`'s `read_varint32`/`write_varint32`/
// `varint32_sizeof`). The continuation flag is the MSB of each byte; values
// up to 2,097,151 (3 groups of 7 bits) fit in 3 bytes, which is the common
// case for field lengths and gets an inlined fast path.

use boxdb_base::{kind_err, Kind, Result};

const CONT: u8 = 0x80;
const MASK: u8 = 0x7f;

/// Number of bytes `encode_varint32` will produce for `v`.
pub fn varint32_sizeof(v: u32) -> usize {
    match v {
        0..=0x7f => 1,
        0x80..=0x3fff => 2,
        0x4000..=0x1f_ffff => 3,
        0x20_0000..=0xfff_ffff => 4,
        _ => 5,
    }
}

/// Appends the varint encoding of `v` to `out`.
pub fn encode_varint32(v: u32, out: &mut Vec<u8>) {
    let n = varint32_sizeof(v);
    for i in (0..n).rev() {
        let byte = ((v >> (7 * i)) & MASK as u32) as u8;
        if i == 0 {
            out.push(byte);
        } else {
            out.push(byte | CONT);
        }
    }
}

/// Reads one varint starting at `buf[0]`, returning `(value, bytes_consumed)`.
/// Fails with `TruncatedField` if `buf` runs out before a terminating byte
/// (high bit clear) is found.
pub fn decode_varint32(buf: &[u8]) -> Result<(u32, usize)> {
    let mut value: u32 = 0;
    for (i, &byte) in buf.iter().enumerate() {
        value = (value << 7) | (byte & MASK) as u32;
        if byte & CONT == 0 {
            return Ok((value, i + 1));
        }
        if i == 4 {
            return Err(kind_err(Kind::MalformedTuple, "varint longer than 5 bytes"));
        }
    }
    Err(kind_err(Kind::TruncatedField, "truncated varint"))
}
