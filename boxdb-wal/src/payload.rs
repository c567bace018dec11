// The byte layout of one box-op's request body, as it appears inside a
// `BOX_OP` TLV: `{u32 table_id, u16 opcode, u32 flags, body}`, where `body`
// depends on the opcode. Tuple and field encoding follow §6 exactly
// (`{u32 cardinality}` + fields for a tuple; `{varint length, bytes}` per
// field); the update-list and key encodings are this crate's own wire
// shape for the operand kinds §4.3 names, since the distilled spec fixes
// only the tuple/field contract, not a byte-for-byte update-list format.

use boxdb_base::{kind_err, Kind, Result};
use boxdb_tuple::{decode_varint32, encode_varint32, Tuple};
use boxdb_txn::{ArithOp, FieldUpdate, OpPayload, Opcode};

fn encode_key(key: &[u8], out: &mut Vec<u8>) {
    encode_varint32(key.len() as u32, out);
    out.extend_from_slice(key);
}

fn decode_key<'a>(buf: &'a [u8]) -> Result<(&'a [u8], usize)> {
    let (len, hdr) = decode_varint32(buf)?;
    let len = len as usize;
    if buf.len() < hdr + len {
        return Err(kind_err(Kind::TruncatedField, "key truncated"));
    }
    Ok((&buf[hdr..hdr + len], hdr + len))
}

fn arith_tag(op: ArithOp) -> u8 {
    match op {
        ArithOp::Add => 0,
        ArithOp::And => 1,
        ArithOp::Or => 2,
        ArithOp::Xor => 3,
    }
}

fn arith_from_tag(tag: u8) -> Result<ArithOp> {
    Ok(match tag {
        0 => ArithOp::Add,
        1 => ArithOp::And,
        2 => ArithOp::Or,
        3 => ArithOp::Xor,
        other => return Err(kind_err(Kind::MalformedTuple, format!("unknown arithmetic op tag {}", other))),
    })
}

fn encode_update(u: &FieldUpdate, out: &mut Vec<u8>) {
    match u {
        FieldUpdate::Set { field, value } => {
            out.push(0);
            out.extend_from_slice(&field.to_le_bytes());
            encode_varint32(value.len() as u32, out);
            out.extend_from_slice(value);
        }
        FieldUpdate::Splice { field, offset, length, value } => {
            out.push(1);
            out.extend_from_slice(&field.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(&length.to_le_bytes());
            encode_varint32(value.len() as u32, out);
            out.extend_from_slice(value);
        }
        FieldUpdate::Arith { field, op, operand } => {
            out.push(2);
            out.extend_from_slice(&field.to_le_bytes());
            out.push(arith_tag(*op));
            out.extend_from_slice(&operand.to_le_bytes());
        }
        FieldUpdate::InsertField { field, value } => {
            out.push(3);
            out.extend_from_slice(&field.to_le_bytes());
            encode_varint32(value.len() as u32, out);
            out.extend_from_slice(value);
        }
        FieldUpdate::DeleteField { field } => {
            out.push(4);
            out.extend_from_slice(&field.to_le_bytes());
        }
    }
}

fn decode_update(buf: &[u8]) -> Result<(FieldUpdate, usize)> {
    if buf.is_empty() {
        return Err(kind_err(Kind::TruncatedField, "update list truncated"));
    }
    let tag = buf[0];
    let rest = &buf[1..];
    let need = |n: usize| -> Result<()> {
        if rest.len() < n {
            Err(kind_err(Kind::TruncatedField, "update operand truncated"))
        } else {
            Ok(())
        }
    };
    match tag {
        0 => {
            need(4)?;
            let field = u32::from_le_bytes(rest[0..4].try_into().unwrap());
            let (len, hdr) = decode_varint32(&rest[4..])?;
            let start = 4 + hdr;
            let end = start + len as usize;
            if rest.len() < end {
                return Err(kind_err(Kind::TruncatedField, "set value truncated"));
            }
            Ok((FieldUpdate::Set { field, value: rest[start..end].to_vec() }, 1 + end))
        }
        1 => {
            need(4 + 4 + 4)?;
            let field = u32::from_le_bytes(rest[0..4].try_into().unwrap());
            let offset = i32::from_le_bytes(rest[4..8].try_into().unwrap());
            let length = i32::from_le_bytes(rest[8..12].try_into().unwrap());
            let (len, hdr) = decode_varint32(&rest[12..])?;
            let start = 12 + hdr;
            let end = start + len as usize;
            if rest.len() < end {
                return Err(kind_err(Kind::TruncatedField, "splice value truncated"));
            }
            Ok((FieldUpdate::Splice { field, offset, length, value: rest[start..end].to_vec() }, 1 + end))
        }
        2 => {
            need(4 + 1 + 4)?;
            let field = u32::from_le_bytes(rest[0..4].try_into().unwrap());
            let op = arith_from_tag(rest[4])?;
            let operand = u32::from_le_bytes(rest[5..9].try_into().unwrap());
            Ok((FieldUpdate::Arith { field, op, operand }, 1 + 9))
        }
        3 => {
            need(4)?;
            let field = u32::from_le_bytes(rest[0..4].try_into().unwrap());
            let (len, hdr) = decode_varint32(&rest[4..])?;
            let start = 4 + hdr;
            let end = start + len as usize;
            if rest.len() < end {
                return Err(kind_err(Kind::TruncatedField, "insert-field value truncated"));
            }
            Ok((FieldUpdate::InsertField { field, value: rest[start..end].to_vec() }, 1 + end))
        }
        4 => {
            need(4)?;
            let field = u32::from_le_bytes(rest[0..4].try_into().unwrap());
            Ok((FieldUpdate::DeleteField { field }, 1 + 4))
        }
        other => Err(kind_err(Kind::BadOpcode, format!("unknown field-update tag {}", other))),
    }
}

pub fn encode_op_payload(table_id: u32, opcode: Opcode, flags: u32, payload: &OpPayload) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&table_id.to_le_bytes());
    out.extend_from_slice(&opcode.code().to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    match payload {
        OpPayload::Insert { tuple } => {
            out.extend_from_slice(&tuple.cardinality().to_le_bytes());
            out.extend_from_slice(tuple.body());
        }
        OpPayload::UpdateFields { key, updates } => {
            encode_key(key, &mut out);
            out.extend_from_slice(&(updates.len() as u32).to_le_bytes());
            for u in updates {
                encode_update(u, &mut out);
            }
        }
        OpPayload::Delete { key } => {
            encode_key(key, &mut out);
        }
        OpPayload::Nop => {}
    }
    out
}

pub fn decode_op_payload(buf: &[u8]) -> Result<(u32, Opcode, u32, OpPayload)> {
    if buf.len() < 10 {
        return Err(kind_err(Kind::TruncatedField, "op payload header truncated"));
    }
    let table_id = u32::from_le_bytes(buf[0..4].try_into().unwrap());
    let code = u16::from_le_bytes(buf[4..6].try_into().unwrap());
    let flags = u32::from_le_bytes(buf[6..10].try_into().unwrap());
    let opcode = Opcode::from_code(code)?;
    let body = &buf[10..];

    let payload = match opcode {
        Opcode::Insert => {
            if body.len() < 4 {
                return Err(kind_err(Kind::TruncatedField, "insert payload truncated"));
            }
            let cardinality = u32::from_le_bytes(body[0..4].try_into().unwrap());
            let tuple = Tuple::decode(cardinality, &body[4..])?;
            OpPayload::Insert { tuple }
        }
        Opcode::UpdateFields => {
            let (key, consumed) = decode_key(body)?;
            let key = key.to_vec();
            let mut pos = consumed;
            if body.len() < pos + 4 {
                return Err(kind_err(Kind::TruncatedField, "update-fields count truncated"));
            }
            let count = u32::from_le_bytes(body[pos..pos + 4].try_into().unwrap());
            pos += 4;
            let mut updates = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (u, n) = decode_update(&body[pos..])?;
                updates.push(u);
                pos += n;
            }
            OpPayload::UpdateFields { key, updates }
        }
        Opcode::Delete | Opcode::Delete13 => {
            let (key, _) = decode_key(body)?;
            OpPayload::Delete { key: key.to_vec() }
        }
        Opcode::Nop => OpPayload::Nop,
        other => return Err(kind_err(Kind::BadOpcode, format!("{:?} has no recognised replay payload", other))),
    };

    Ok((table_id, opcode, flags, payload))
}
