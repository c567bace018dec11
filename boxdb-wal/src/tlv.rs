// Request framing: `{u16 tag, u32 len, bytes value}`, little-endian,
// packed. `BOX_OP` (127) carries one operation; `BOX_MULTI_OP` (128)
// carries a sequence of inner `BOX_OP` TLVs in submission order.

use boxdb_base::{kind_err, Kind, Result};

pub const TAG_BOX_OP: u16 = 127;
pub const TAG_BOX_MULTI_OP: u16 = 128;

pub fn encode_tlv(tag: u16, value: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(&tag.to_le_bytes());
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value);
}

/// Decodes one TLV off the front of `buf`, returning `(tag, value, consumed)`.
pub fn decode_tlv(buf: &[u8]) -> Result<(u16, &[u8], usize)> {
    if buf.len() < 6 {
        return Err(kind_err(Kind::TruncatedField, "TLV header truncated"));
    }
    let tag = u16::from_le_bytes(buf[0..2].try_into().unwrap());
    let len = u32::from_le_bytes(buf[2..6].try_into().unwrap()) as usize;
    if buf.len() < 6 + len {
        return Err(kind_err(Kind::TruncatedField, "TLV value truncated"));
    }
    Ok((tag, &buf[6..6 + len], 6 + len))
}

/// Splits a `BOX_MULTI_OP` value into its inner `BOX_OP` TLV payloads, in
/// submission order.
pub fn split_multi_op(mut buf: &[u8]) -> Result<Vec<&[u8]>> {
    let mut out = Vec::new();
    while !buf.is_empty() {
        let (tag, value, consumed) = decode_tlv(buf)?;
        if tag != TAG_BOX_OP {
            return Err(kind_err(Kind::MalformedTuple, format!("expected BOX_OP inside BOX_MULTI_OP, got tag {}", tag)));
        }
        out.push(value);
        buf = &buf[consumed..];
    }
    Ok(out)
}

pub fn encode_box_op(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_tlv(TAG_BOX_OP, payload, &mut out);
    out
}

pub fn encode_box_multi_op(ops: &[Vec<u8>]) -> Vec<u8> {
    let mut inner = Vec::new();
    for op in ops {
        encode_tlv(TAG_BOX_OP, op, &mut inner);
    }
    let mut out = Vec::new();
    encode_tlv(TAG_BOX_MULTI_OP, &inner, &mut out);
    out
}
