// The tuple object model: a sequence of length-prefixed fields packed into
// a byte blob preceded by a fixed header `{byte_size, cardinality}`. Two
// physical layouts share one logical contract:
//
//  - `Small`: body <= 255 bytes, 1-byte header fields (saves 6 bytes per
//    record versus `Big`).
//  - `Big`: 4-byte header fields, no size restriction on the body.
//
// The layout is chosen by body length at construction time and is
// invisible to every accessor except `layout_tag`, which callers use only
// for diagnostics (it has no effect on the wire encoding, which always
// uses a 4-byte cardinality; see `boxdb-wal` for that encoding).

use std::sync::Arc;

use boxdb_base::{kind_err, Kind, Result};

use crate::varint::{decode_varint32, encode_varint32, varint32_sizeof};

/// Physical layout discriminant, mirroring `BOX_TUPLE` / `BOX_SMALL_TUPLE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Big,
    Small,
}

/// One record: a reference-counted, immutable blob of encoded fields plus
/// the cardinality and chosen physical layout.
#[derive(Debug, Clone)]
pub struct Tuple {
    layout: Layout,
    cardinality: u32,
    body: Arc<[u8]>,
}

impl Tuple {
    /// Builds a tuple from already-separated field byte strings, choosing
    /// Small vs. Big layout from the encoded body length.
    pub fn from_fields(fields: &[&[u8]]) -> Tuple {
        let mut body = Vec::new();
        for f in fields {
            encode_varint32(f.len() as u32, &mut body);
            body.extend_from_slice(f);
        }
        Tuple::from_body(fields.len() as u32, body)
    }

    fn from_body(cardinality: u32, body: Vec<u8>) -> Tuple {
        let layout = if body.len() <= 255 && cardinality <= 255 {
            Layout::Small
        } else {
            Layout::Big
        };
        Tuple {
            layout,
            cardinality,
            body: Arc::from(body),
        }
    }

    /// Decodes a tuple from a cardinality plus the raw concatenated
    /// field encoding, as read off the wire or out of a snapshot row.
    /// Fails with `TruncatedField` if `buf` does not contain exactly
    /// `cardinality` complete fields, and with `MalformedTuple` if there is
    /// trailing data after the last field.
    pub fn decode(cardinality: u32, buf: &[u8]) -> Result<Tuple> {
        let consumed = fields_bsize(cardinality, buf)?;
        if consumed != buf.len() {
            return Err(kind_err(
                Kind::MalformedTuple,
                format!(
                    "tuple body has {} trailing bytes after {} fields",
                    buf.len() - consumed,
                    cardinality
                ),
            ));
        }
        Ok(Tuple::from_body(cardinality, buf.to_vec()))
    }

    pub fn layout_tag(&self) -> u8 {
        match self.layout {
            Layout::Big => 1,
            Layout::Small => 2,
        }
    }

    pub fn cardinality(&self) -> u32 {
        self.cardinality
    }

    /// Size of the encoded body in bytes. Matches `byte_size` in the spec.
    pub fn byte_size(&self) -> usize {
        self.body.len()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the bytes of field `i`, walking varint lengths from the
    /// start of the data region. Fails with `UpdateOutOfRange` if `i` is
    /// beyond `cardinality`, and with `TruncatedField`/`MalformedTuple` if
    /// the body is corrupt (should not happen for a `Tuple` built through
    /// `from_fields`/`decode`, but `field` is also used on tuples rebuilt
    /// from less-trusted sources during recovery).
    pub fn field(&self, i: u32) -> Result<&[u8]> {
        if i >= self.cardinality {
            return Err(kind_err(
                Kind::UpdateOutOfRange,
                format!("field {} out of range for cardinality {}", i, self.cardinality),
            ));
        }
        let mut pos = 0usize;
        for field_index in 0..=i {
            let (len, hdr) = decode_varint32(&self.body[pos..])?;
            pos += hdr;
            let len = len as usize;
            if pos + len > self.body.len() {
                return Err(kind_err(Kind::TruncatedField, "field runs past tuple body"));
            }
            if field_index == i {
                return Ok(&self.body[pos..pos + len]);
            }
            pos += len;
        }
        unreachable!("loop always returns by field_index == i")
    }

    pub fn fields(&self) -> Result<Vec<&[u8]>> {
        (0..self.cardinality).map(|i| self.field(i)).collect()
    }

    /// Sums the varint-length-prefixed fields and checks the total equals
    /// the header `byte_size`, per the spec's `validate`.
    pub fn validate(&self) -> Result<()> {
        let consumed = fields_bsize(self.cardinality, &self.body)?;
        if consumed != self.body.len() {
            return Err(kind_err(
                Kind::MalformedTuple,
                "tuple byte_size does not match sum of field encodings",
            ));
        }
        Ok(())
    }
}

/// Computes the encoded size of `cardinality` sequential fields at the
/// start of `buf`. Fails with `TruncatedField` if the count cannot be
/// satisfied within `buf.len()`.
pub fn fields_bsize(cardinality: u32, buf: &[u8]) -> Result<usize> {
    let mut pos = 0usize;
    for _ in 0..cardinality {
        if pos >= buf.len() {
            return Err(kind_err(Kind::TruncatedField, "truncated field length"));
        }
        let (len, hdr) = decode_varint32(&buf[pos..])?;
        pos += hdr;
        let len = len as usize;
        if pos + len > buf.len() {
            return Err(kind_err(Kind::TruncatedField, "truncated field data"));
        }
        pos += len;
    }
    Ok(pos)
}

/// Byte length a field of `len` bytes will occupy once length-prefixed.
pub fn encoded_field_len(len: usize) -> usize {
    varint32_sizeof(len as u32) + len
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn small_layout_at_boundary() {
        // 255 1-byte fields with empty bodies is 255 bytes: still small.
        let owned: Vec<Vec<u8>> = (0..255u32).map(|_| Vec::new()).collect();
        let refs: Vec<&[u8]> = owned.iter().map(|v| v.as_slice()).collect();
        let t = Tuple::from_fields(&refs);
        assert_eq!(t.layout_tag(), 2);
        assert_eq!(t.byte_size(), 255);
    }

    #[test]
    fn big_layout_just_past_boundary() {
        let field = vec![0u8; 255];
        let t = Tuple::from_fields(&[&field]);
        // varint(255) is 2 bytes + 255 body bytes == 257 > 255
        assert_eq!(t.layout_tag(), 1);
        assert_eq!(t.byte_size(), 257);
    }

    #[test]
    fn field_access_round_trips() {
        let a = b"hello".as_slice();
        let b = b"".as_slice();
        let c = b"world!!".as_slice();
        let t = Tuple::from_fields(&[a, b, c]);
        assert_eq!(t.cardinality(), 3);
        assert_eq!(t.field(0).unwrap(), a);
        assert_eq!(t.field(1).unwrap(), b);
        assert_eq!(t.field(2).unwrap(), c);
        assert!(t.field(3).is_err());
        t.validate().unwrap();
    }

    #[test]
    fn decode_rejects_trailing_garbage() {
        let t = Tuple::from_fields(&[b"x".as_slice()]);
        let mut body = t.body().to_vec();
        body.push(0xff);
        assert!(Tuple::decode(1, &body).is_err());
    }

    #[test]
    fn decode_rejects_truncated_fields() {
        let t = Tuple::from_fields(&[b"hello".as_slice(), b"world".as_slice()]);
        let body = t.body();
        // Claim two fields but only hand over enough bytes for the first.
        let half = &body[..2];
        assert!(Tuple::decode(2, half).is_err());
    }

    #[test]
    fn wire_round_trip() {
        let t = Tuple::from_fields(&[b"a".as_slice(), b"bb".as_slice()]);
        let decoded = Tuple::decode(t.cardinality(), t.body()).unwrap();
        assert_eq!(decoded.body(), t.body());
        assert_eq!(decoded.cardinality(), t.cardinality());
    }
}
