// UPDATE_FIELDS operand list: per-field edits applied to a materialised
// tuple to produce the replacement, grounded in the tuple header's own
// field-update opcodes (set / splice / arithmetic / insert / delete).

use boxdb_base::{kind_err, Kind, Result};
use boxdb_tuple::Tuple;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone)]
pub enum FieldUpdate {
    Set { field: u32, value: Vec<u8> },
    Splice { field: u32, offset: i32, length: i32, value: Vec<u8> },
    Arith { field: u32, op: ArithOp, operand: u32 },
    InsertField { field: u32, value: Vec<u8> },
    DeleteField { field: u32 },
}

fn field_as_u32(bytes: &[u8]) -> Result<u32> {
    if bytes.len() != 4 {
        return Err(kind_err(Kind::MalformedTuple, "arithmetic update operand is not a 4-byte integer"));
    }
    Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
}

fn splice_index(offset: i32, len: usize) -> usize {
    if offset < 0 {
        (len as i32 + offset).max(0) as usize
    } else {
        (offset as usize).min(len)
    }
}

/// Applies `updates` in order against `base`, returning the new tuple.
/// Each update references a field index into the *current* (possibly
/// already-edited) field list, matching the header's per-field update
/// semantics rather than reading positions from the original tuple only.
pub fn apply_updates(base: &Tuple, updates: &[FieldUpdate]) -> Result<Tuple> {
    let mut fields: Vec<Vec<u8>> = base.fields()?.into_iter().map(|f| f.to_vec()).collect();

    for upd in updates {
        match upd {
            FieldUpdate::Set { field, value } => {
                let f = field_mut(&mut fields, *field)?;
                *f = value.clone();
            }
            FieldUpdate::Splice { field, offset, length, value } => {
                let f = field_mut(&mut fields, *field)?;
                let start = splice_index(*offset, f.len());
                let cut = if *length < 0 {
                    (f.len() as i32 + *length - start as i32).max(0) as usize
                } else {
                    (*length as usize).min(f.len() - start)
                };
                let mut spliced = f[..start].to_vec();
                spliced.extend_from_slice(value);
                spliced.extend_from_slice(&f[start + cut..]);
                *f = spliced;
            }
            FieldUpdate::Arith { field, op, operand } => {
                let f = field_mut(&mut fields, *field)?;
                let cur = field_as_u32(f)?;
                let next = match op {
                    ArithOp::Add => cur.wrapping_add(*operand),
                    ArithOp::And => cur & operand,
                    ArithOp::Or => cur | operand,
                    ArithOp::Xor => cur ^ operand,
                };
                *f = next.to_le_bytes().to_vec();
            }
            FieldUpdate::InsertField { field, value } => {
                let idx = (*field as usize).min(fields.len());
                fields.insert(idx, value.clone());
            }
            FieldUpdate::DeleteField { field } => {
                let idx = *field as usize;
                if idx >= fields.len() {
                    return Err(kind_err(
                        Kind::UpdateOutOfRange,
                        format!("delete-field {} out of range for cardinality {}", idx, fields.len()),
                    ));
                }
                fields.remove(idx);
            }
        }
    }

    let refs: Vec<&[u8]> = fields.iter().map(|f| f.as_slice()).collect();
    Ok(Tuple::from_fields(&refs))
}

fn field_mut(fields: &mut [Vec<u8>], field: u32) -> Result<&mut Vec<u8>> {
    fields.get_mut(field as usize).ok_or_else(|| {
        kind_err(
            Kind::UpdateOutOfRange,
            format!("update field {} out of range for cardinality {}", field, fields.len()),
        )
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn tup(fields: &[&[u8]]) -> Tuple {
        Tuple::from_fields(fields)
    }

    #[test]
    fn set_field_replaces_bytes() {
        let t = tup(&[b"1", b"a"]);
        let updated = apply_updates(&t, &[FieldUpdate::Set { field: 1, value: b"b".to_vec() }]).unwrap();
        assert_eq!(updated.field(1).unwrap(), b"b");
        assert_eq!(updated.field(0).unwrap(), b"1");
    }

    #[test]
    fn arithmetic_add_wraps_on_overflow() {
        let t = tup(&[u32::MAX.to_le_bytes().as_slice()]);
        let updated = apply_updates(
            &t,
            &[FieldUpdate::Arith { field: 0, op: ArithOp::Add, operand: 1 }],
        )
        .unwrap();
        assert_eq!(u32::from_le_bytes(updated.field(0).unwrap().try_into().unwrap()), 0);
    }

    #[test]
    fn splice_replaces_middle_range() {
        let t = tup(&[b"hello world"]);
        let updated =
            apply_updates(&t, &[FieldUpdate::Splice { field: 0, offset: 6, length: 5, value: b"there".to_vec() }])
                .unwrap();
        assert_eq!(updated.field(0).unwrap(), b"hello there");
    }

    #[test]
    fn insert_then_delete_field_round_trips_cardinality() {
        let t = tup(&[b"a", b"c"]);
        let updated = apply_updates(
            &t,
            &[
                FieldUpdate::InsertField { field: 1, value: b"b".to_vec() },
                FieldUpdate::DeleteField { field: 0 },
            ],
        )
        .unwrap();
        assert_eq!(updated.cardinality(), 2);
        assert_eq!(updated.field(0).unwrap(), b"b");
        assert_eq!(updated.field(1).unwrap(), b"c");
    }

    #[test]
    fn out_of_range_field_is_an_error() {
        let t = tup(&[b"a"]);
        let err = apply_updates(&t, &[FieldUpdate::Set { field: 5, value: b"x".to_vec() }]).unwrap_err();
        assert_eq!(err.kind(), Kind::UpdateOutOfRange);
    }
}
