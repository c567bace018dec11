// The transaction state machine: Undecided -> Commit | Rollback, no further
// transitions. Durability itself (the WAL round-trip inside `submit`) is
// owned by `boxdb-wal`; this crate only defines the shape of the
// transaction and what commit/rollback do to the indices once durability
// has been decided one way or the other.

use boxdb_base::{fatal, kind_err, Kind, Result};
use boxdb_index::{ObjectSpaceRegistry, OpId};

use crate::op::{BoxOp, OpPayload};
use crate::opcode::Opcode;
use crate::update::FieldUpdate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnMode {
    Ro,
    Rw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Undecided,
    Commit,
    Rollback,
}

#[derive(Debug)]
pub struct BoxTxn {
    pub mode: TxnMode,
    pub state: TxnState,
    pub id: u64,
    pub name: String,
    pub obj_affected: u32,
    ops: Vec<BoxOp>,
    next_op_seq: u64,
}

impl BoxTxn {
    /// Allocates a new transaction against `shard_id`. `shard_ready` stands
    /// in for "the addressed table group exists, is writable, and this
    /// replica is its leader" - a single-process embedding has no real
    /// shard map, so callers that do have one should compute this
    /// themselves and pass the result in.
    pub fn alloc(id: u64, shard_id: u32, mode: TxnMode, name: impl Into<String>, shard_ready: bool) -> Result<BoxTxn> {
        if !shard_ready {
            return Err(kind_err(Kind::ShardUnavailable, format!("shard {} is not available for writes", shard_id)));
        }
        Ok(BoxTxn {
            mode,
            state: TxnState::Undecided,
            id,
            name: name.into(),
            obj_affected: 0,
            ops: Vec::new(),
            next_op_seq: 0,
        })
    }

    pub fn ops(&self) -> &[BoxOp] {
        &self.ops
    }

    fn alloc_op_id(&mut self) -> OpId {
        let seq = self.next_op_seq;
        self.next_op_seq += 1;
        // Op ids are unique within a single in-flight transaction, which is
        // all that's required since only one mutating transaction is ever
        // in flight system-wide; folding the txn id into the high bits
        // keeps ids unique across transactions too, for diagnostics.
        OpId((self.id << 32) | seq)
    }

    /// Prepares one op against `registry`, appending it to the
    /// transaction's op list on success. A read-only transaction may not
    /// prepare mutating ops.
    pub fn prepare(
        &mut self,
        registry: &mut ObjectSpaceRegistry,
        table_id: u32,
        opcode: Opcode,
        op_flags: u32,
        payload: OpPayload,
    ) -> Result<&BoxOp> {
        if self.state != TxnState::Undecided {
            return Err(kind_err(Kind::Other, "cannot prepare an op on a decided transaction"));
        }
        if self.mode == TxnMode::Ro && !matches!(opcode, Opcode::Nop) {
            return Err(kind_err(Kind::ReadOnly, "cannot mutate inside a read-only transaction"));
        }

        let op_id = self.alloc_op_id();
        let space = registry.get_mut(table_id)?;
        let op = BoxOp::prepare(op_id, table_id, opcode, op_flags, payload, space)?;
        self.obj_affected += op.obj_affected;
        self.ops.push(op);
        Ok(self.ops.last().unwrap())
    }

    pub fn prepare_insert(
        &mut self,
        registry: &mut ObjectSpaceRegistry,
        table_id: u32,
        op_flags: u32,
        tuple: boxdb_tuple::Tuple,
    ) -> Result<&BoxOp> {
        self.prepare(registry, table_id, Opcode::Insert, op_flags, OpPayload::Insert { tuple })
    }

    pub fn prepare_update(
        &mut self,
        registry: &mut ObjectSpaceRegistry,
        table_id: u32,
        key: Vec<u8>,
        updates: Vec<FieldUpdate>,
    ) -> Result<&BoxOp> {
        self.prepare(registry, table_id, Opcode::UpdateFields, 0, OpPayload::UpdateFields { key, updates })
    }

    pub fn prepare_delete(
        &mut self,
        registry: &mut ObjectSpaceRegistry,
        table_id: u32,
        key: Vec<u8>,
    ) -> Result<&BoxOp> {
        self.prepare(registry, table_id, Opcode::Delete, 0, OpPayload::Delete { key })
    }

    /// Folds every op's phi cells to their tips, committing the
    /// transaction's effects for good. Per the error handling design,
    /// commit cannot fail: once the caller has decided durability (having
    /// driven `submit` to success through `boxdb-wal`), this step is
    /// mandatory and any internal inconsistency is a fatal invariant
    /// violation rather than a recoverable error.
    pub fn commit(&mut self, registry: &mut ObjectSpaceRegistry) {
        if self.state != TxnState::Undecided {
            fatal!("commit called on a transaction already in state {:?}", self.state);
        }
        for op in &self.ops {
            match registry.get_mut(op.table_id) {
                Ok(space) => op.fold(space),
                Err(e) => fatal!("commit could not find table {} for a prepared op: {e}", op.table_id),
            }
        }
        self.state = TxnState::Commit;
    }

    /// Undoes every op's phi cells in reverse order, in reverse, restoring
    /// each overlay's pre-transaction base object. Safe to call on a
    /// transaction whose `submit` never ran.
    pub fn rollback(&mut self, registry: &mut ObjectSpaceRegistry) {
        if self.state != TxnState::Undecided {
            return;
        }
        for op in self.ops.iter().rev() {
            match registry.get_mut(op.table_id) {
                Ok(space) => op.unbind(space),
                Err(e) => fatal!("rollback could not find table {} for a prepared op: {e}", op.table_id),
            }
        }
        self.state = TxnState::Rollback;
    }
}


#[cfg(test)]
mod proptest_invariants {
    use super::*;
    use boxdb_index::IndexConf;
    use boxdb_tuple::Tuple;
    use proptest::collection::vec as prop_vec;
    use proptest::prelude::*;

    fn registry() -> ObjectSpaceRegistry {
        let mut reg = ObjectSpaceRegistry::new();
        let pk = IndexConf { fields: vec![0], unique: true, partial: false };
        reg.create(boxdb_index::ObjectSpace::new(0, None, false, true, true, pk)).unwrap();
        reg
    }

    fn key_for(k: u8) -> Vec<u8> {
        let t = Tuple::from_fields(&[&[k]]);
        let idx = IndexConf { fields: vec![0], unique: true, partial: false };
        boxdb_index::Index::new(idx).derive_key(&t).unwrap()
    }

    proptest! {
        // Invariant 5 ("read-your-writes"): after each write inside a
        // still-open transaction, `visible_right` on that key reflects the
        // write just made, no matter how many earlier ops in the same
        // transaction touched the same key.
        #[test]
        fn read_your_writes_holds_after_every_op_in_a_transaction(
            values in prop_vec(0u8..4, 1..8),
        ) {
            let mut reg = registry();
            let mut txn = BoxTxn::alloc(1, 0, TxnMode::Rw, "t", true).unwrap();
            let key = key_for(1);

            for v in values {
                txn.prepare_insert(&mut reg, 0, 0, Tuple::from_fields(&[&[1u8], &[v]])).unwrap();
                let space = reg.get(0).unwrap();
                let seen = space.primary().visible_right(&key).unwrap();
                prop_assert_eq!(seen.field(1).unwrap(), &[v][..]);
            }

            txn.rollback(&mut reg);
        }

        // Invariant 2 ("commit resolves"), exercised through the full
        // BoxTxn state machine rather than directly against ObjectSpace:
        // once `commit` returns, no overlay belonging to this transaction
        // remains at any key it touched.
        #[test]
        fn commit_through_box_txn_leaves_no_overlay(
            values in prop_vec(0u8..4, 0..8),
        ) {
            let mut reg = registry();
            let mut txn = BoxTxn::alloc(1, 0, TxnMode::Rw, "t", true).unwrap();
            for v in &values {
                txn.prepare_insert(&mut reg, 0, 0, Tuple::from_fields(&[&[1u8], &[*v]])).unwrap();
            }
            txn.commit(&mut reg);

            let space = reg.get(0).unwrap();
            prop_assert!(!space.primary().has_overlay(&key_for(1)));
        }
    }
}
