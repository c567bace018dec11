// One box-op: a single mutation dispatched against an object space,
// carrying enough state (old/new tuple, the index cells it installed) for
// its owning transaction to fold or undo it later.

use std::sync::Arc;

use boxdb_base::{kind_err, Kind, Result};
use boxdb_index::{Key, ObjectSpace, OpId};
use boxdb_tuple::Tuple;

use crate::opcode::{flags, Opcode};
use crate::update::{apply_updates, FieldUpdate};

/// The parsed request body for one op, already decoded off the wire (or
/// constructed directly by an embedder). Wire decoding itself lives in
/// `boxdb-wal`; this type is the boundary between "bytes" and "dispatch".
#[derive(Debug, Clone)]
pub enum OpPayload {
    Insert { tuple: Tuple },
    UpdateFields { key: Key, updates: Vec<FieldUpdate> },
    Delete { key: Key },
    Nop,
}

#[derive(Debug)]
pub struct BoxOp {
    pub op_id: OpId,
    pub opcode: Opcode,
    pub flags: u32,
    pub table_id: u32,
    pub old_obj: Option<Arc<Tuple>>,
    pub new_obj: Option<Arc<Tuple>>,
    pub obj_affected: u32,
    plan: Vec<(usize, Key)>,
}

impl BoxOp {
    /// Whichever of `old_obj`/`new_obj` the client asked to have echoed
    /// back, per `RETURN_TUPLE` and the opcode (inserts/updates echo the
    /// new value, deletes echo the one that was removed).
    pub fn ret_obj(&self) -> Option<&Arc<Tuple>> {
        if self.flags & flags::RETURN_TUPLE == 0 {
            return None;
        }
        if self.opcode.is_delete() {
            self.old_obj.as_ref()
        } else {
            self.new_obj.as_ref().or(self.old_obj.as_ref())
        }
    }

    /// Dispatches one op against `space`, installing phi cells into every
    /// affected index. On any error between reading old state and fully
    /// installing cells, unwinds whatever partial binding it made before
    /// returning, per the error propagation policy - `prepare` failures do
    /// not poison the owning transaction.
    pub fn prepare(
        op_id: OpId,
        table_id: u32,
        opcode: Opcode,
        op_flags: u32,
        payload: OpPayload,
        space: &mut ObjectSpace,
    ) -> Result<BoxOp> {
        match (&opcode, payload) {
            (Opcode::Insert, OpPayload::Insert { tuple }) => {
                Self::prepare_insert(op_id, table_id, op_flags, tuple, space)
            }
            (Opcode::UpdateFields, OpPayload::UpdateFields { key, updates }) => {
                Self::prepare_update(op_id, table_id, op_flags, key, &updates, space)
            }
            (Opcode::Delete | Opcode::Delete13, OpPayload::Delete { key }) => {
                Self::prepare_delete(op_id, table_id, opcode, op_flags, key, space)
            }
            (Opcode::Nop, OpPayload::Nop) => Ok(BoxOp {
                op_id,
                opcode,
                flags: op_flags,
                table_id,
                old_obj: None,
                new_obj: None,
                obj_affected: 0,
                plan: Vec::new(),
            }),
            _ => Err(kind_err(Kind::BadOpcode, "payload does not match opcode")),
        }
    }

    fn prepare_insert(
        op_id: OpId,
        table_id: u32,
        op_flags: u32,
        tuple: Tuple,
        space: &mut ObjectSpace,
    ) -> Result<BoxOp> {
        let add = op_flags & flags::ADD != 0;
        let replace = op_flags & flags::REPLACE != 0;
        let key = space.primary().derive_key(&tuple)?;
        let existing = space.primary().visible_right(&key);

        if add && existing.is_some() {
            return Err(kind_err(Kind::DuplicateKey, format!("key {:?} already exists", key)));
        }
        if replace && existing.is_none() {
            return Err(kind_err(Kind::NoSuchKey, format!("key {:?} does not exist", key)));
        }

        let new_obj = Arc::new(tuple);
        let obj_affected = if existing.is_some() { 2 } else { 1 };
        let plan = space.apply_op(op_id, existing.as_ref(), Some(&new_obj))?;

        Ok(BoxOp {
            op_id,
            opcode: Opcode::Insert,
            flags: op_flags,
            table_id,
            old_obj: existing,
            new_obj: Some(new_obj),
            obj_affected,
            plan,
        })
    }

    fn prepare_update(
        op_id: OpId,
        table_id: u32,
        op_flags: u32,
        key: Key,
        updates: &[FieldUpdate],
        space: &mut ObjectSpace,
    ) -> Result<BoxOp> {
        let existing = space.primary().visible_right(&key);
        let Some(existing) = existing else {
            return Err(kind_err(Kind::NoSuchKey, format!("key {:?} does not exist", key)));
        };

        let updated = apply_updates(&existing, updates)?;
        let new_obj = Arc::new(updated);
        // Per tie-break (iii) as clarified for this op: an UPDATE_FIELDS
        // always affects exactly one logical record, whether or not it
        // rewrites the primary key's own value.
        let obj_affected = 1;
        let plan = space.apply_op(op_id, Some(&existing), Some(&new_obj))?;

        Ok(BoxOp {
            op_id,
            opcode: Opcode::UpdateFields,
            flags: op_flags,
            table_id,
            old_obj: Some(existing),
            new_obj: Some(new_obj),
            obj_affected,
            plan,
        })
    }

    fn prepare_delete(
        op_id: OpId,
        table_id: u32,
        opcode: Opcode,
        op_flags: u32,
        key: Key,
        space: &mut ObjectSpace,
    ) -> Result<BoxOp> {
        let existing = space.primary().visible_right(&key);
        let (obj_affected, plan) = match &existing {
            Some(t) => (1, space.apply_op(op_id, Some(t), None)?),
            // A delete that found no key is a no-op, still counted as an
            // op on the transaction, but it installs nothing and affects
            // nothing.
            None => (0, Vec::new()),
        };

        Ok(BoxOp {
            op_id,
            opcode,
            flags: op_flags,
            table_id,
            old_obj: existing,
            new_obj: None,
            obj_affected,
            plan,
        })
    }

    pub(crate) fn fold(&self, space: &mut ObjectSpace) {
        space.fold_op(self.op_id, &self.plan);
    }

    pub(crate) fn unbind(&self, space: &mut ObjectSpace) {
        space.unbind_op(self.op_id, &self.plan);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use boxdb_index::IndexConf;

    fn space() -> ObjectSpace {
        let pk = IndexConf { fields: vec![0], unique: true, partial: false };
        ObjectSpace::new(0, None, false, true, true, pk)
    }

    #[test]
    fn insert_add_then_duplicate_add_fails() {
        let mut sp = space();
        let t = Tuple::from_fields(&[b"42", b"a"]);
        let op = BoxOp::prepare(OpId(1), 0, Opcode::Insert, flags::ADD, OpPayload::Insert { tuple: t.clone() }, &mut sp)
            .unwrap();
        op.fold(&mut sp);
        assert_eq!(op.obj_affected, 1);

        let dup = Tuple::from_fields(&[b"42", b"b"]);
        let err = BoxOp::prepare(OpId(2), 0, Opcode::Insert, flags::ADD, OpPayload::Insert { tuple: dup }, &mut sp)
            .unwrap_err();
        assert_eq!(err.kind(), Kind::DuplicateKey);
    }

    #[test]
    fn replace_without_existing_key_fails_no_such_key() {
        let mut sp = space();
        let t = Tuple::from_fields(&[b"1", b"a"]);
        let err = BoxOp::prepare(OpId(1), 0, Opcode::Insert, flags::REPLACE, OpPayload::Insert { tuple: t }, &mut sp)
            .unwrap_err();
        assert_eq!(err.kind(), Kind::NoSuchKey);
    }

    #[test]
    fn delete_missing_key_is_a_counted_no_op() {
        let mut sp = space();
        let op = BoxOp::prepare(OpId(1), 0, Opcode::Delete, 0, OpPayload::Delete { key: vec![1, b'9'] }, &mut sp)
            .unwrap();
        assert_eq!(op.obj_affected, 0);
        assert!(op.old_obj.is_none());
    }

    #[test]
    fn failed_prepare_leaves_no_overlay_behind() {
        let mut sp = space();
        let t = Tuple::from_fields(&[b"1", b"a"]);
        let op = BoxOp::prepare(OpId(1), 0, Opcode::Insert, flags::ADD, OpPayload::Insert { tuple: t.clone() }, &mut sp)
            .unwrap();
        op.fold(&mut sp);

        let dup = Tuple::from_fields(&[b"1", b"b"]);
        let result = BoxOp::prepare(OpId(2), 0, Opcode::Insert, flags::ADD, OpPayload::Insert { tuple: dup }, &mut sp);
        assert!(result.is_err());
        let key = sp.primary().derive_key(&t).unwrap();
        assert!(!sp.primary().has_overlay(&key));
    }
}
