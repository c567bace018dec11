// The engine facade: the one entry point an embedder drives directly.
// Wires together decode -> `BoxTxn::prepare` (one or more times) ->
// `WalBridge::submit` -> commit/rollback, exactly the control flow a
// mutating request follows. A server loop, fiber scheduler, and network
// transport would sit in front of this and are out of scope here; this
// crate implements everything up to and including the durability
// decision.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use boxdb_admin::{Stats, TableConf};
use boxdb_base::Result;
use boxdb_index::{ObjectSpace, ObjectSpaceRegistry};
use boxdb_tuple::Tuple;
use boxdb_txn::{BoxOp, BoxTxn, OpPayload, Opcode, TxnMode};
use boxdb_wal::{encode_box_multi_op, encode_box_op, encode_op_payload, RowV12, WalBridge, TAG_BOX_MULTI_OP, TAG_BOX_OP};

pub struct Engine {
    registry: ObjectSpaceRegistry,
    wal: Box<dyn WalBridge>,
    stats: Stats,
    next_txn_id: AtomicU64,
}

/// A transaction in progress: the underlying `BoxTxn` plus the wire
/// encoding of each op prepared on it so far, kept around purely so
/// `submit` can reserialise the group without re-deriving bytes from
/// already-committed index state.
pub struct PendingTxn {
    pub txn: BoxTxn,
    encoded_ops: Vec<Vec<u8>>,
}

impl Engine {
    pub fn new(wal: Box<dyn WalBridge>) -> Engine {
        Engine { registry: ObjectSpaceRegistry::new(), wal, stats: Stats::new(), next_txn_id: AtomicU64::new(1) }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn create_table(&mut self, conf: &TableConf) -> Result<()> {
        let mut indices = conf.indices.iter();
        let primary = indices.next().expect("TableConf::validate guarantees at least one index").clone().into_runtime();
        let space = ObjectSpace::new(conf.id, conf.cardinality, conf.ignored, conf.wal, conf.snap, primary);
        self.registry.create(space)?;
        for extra in indices {
            self.registry.get_mut(conf.id)?.create_index(extra.clone().into_runtime())?;
        }
        Ok(())
    }

    /// Reads never create phi cells and never block; they resolve
    /// whatever overlay an in-flight transaction left behind to the
    /// caller's own visible version. Ordinary (non-owning) readers always
    /// want `visible_right`, which for a key no active transaction is
    /// touching is simply the concrete tuple.
    ///
    /// An `ignored` table is dropped from `SELECT` entirely, same as it is
    /// from recovery.
    pub fn select(&self, table_id: u32, key: &[u8]) -> Result<Option<Arc<Tuple>>> {
        let space = self.registry.get(table_id)?;
        if space.ignored {
            return Ok(None);
        }
        Ok(space.primary().visible_right(key))
    }

    pub fn begin(&self, mode: TxnMode, name: impl Into<String>) -> Result<PendingTxn> {
        let id = self.next_txn_id.fetch_add(1, Ordering::Relaxed);
        let txn = BoxTxn::alloc(id, 0, mode, name, true)?;
        Ok(PendingTxn { txn, encoded_ops: Vec::new() })
    }

    /// Prepares one op on `pending`. On success the op's wire encoding is
    /// retained for `submit`; on failure nothing is retained and the
    /// transaction remains usable, per the error propagation policy.
    pub fn prepare(&mut self, pending: &mut PendingTxn, table_id: u32, opcode: Opcode, flags: u32, payload: OpPayload) -> Result<&BoxOp> {
        let encoded = encode_op_payload(table_id, opcode, flags, &payload);
        let op = pending.txn.prepare(&mut self.registry, table_id, opcode, flags, payload)?;
        self.stats.record_op(&opcode);
        pending.encoded_ops.push(encoded);
        Ok(op)
    }

    /// Serialises the group, blocks on the WAL bridge for durability, and
    /// commits or rolls back the transaction depending on the result.
    /// Returns the assigned LSN on success.
    ///
    /// An op against a table with `wal = false` still commits in memory
    /// like any other op, it just never reaches the WAL bridge. If every
    /// op in the group targets a `wal = false` table there is nothing to
    /// make durable, so the group commits straight away with no round
    /// trip through the bridge.
    pub fn submit(&mut self, mut pending: PendingTxn) -> Result<i64> {
        let durable_ops: Vec<Vec<u8>> = pending
            .txn
            .ops()
            .iter()
            .zip(pending.encoded_ops.iter())
            .filter(|(op, _)| self.registry.get(op.table_id).map(|space| space.wal).unwrap_or(true))
            .map(|(_, encoded)| encoded.clone())
            .collect();

        if durable_ops.is_empty() {
            pending.txn.commit(&mut self.registry);
            self.stats.record_commit();
            return Ok(0);
        }

        let (tag, framed) = if durable_ops.len() == 1 {
            (TAG_BOX_OP, encode_box_op(&durable_ops[0]))
        } else {
            (TAG_BOX_MULTI_OP, encode_box_multi_op(&durable_ops))
        };
        self.stats.record_wal_bytes(framed.len() as u64);

        match self.wal.submit(tag, pending.txn.id, framed) {
            Ok(lsn) => {
                pending.txn.commit(&mut self.registry);
                self.stats.record_commit();
                Ok(lsn)
            }
            Err(e) => {
                pending.txn.rollback(&mut self.registry);
                self.stats.record_rollback();
                Err(e)
            }
        }
    }

    /// Rolls back a transaction whose `submit` never ran - a validation
    /// failure path, or an embedder's own decision to abandon the group.
    pub fn abort(&mut self, mut pending: PendingTxn) {
        pending.txn.rollback(&mut self.registry);
        self.stats.record_rollback();
    }

    pub fn recover_snapshot(&mut self, snapshot: &[u8]) -> Result<()> {
        boxdb_wal::replay_snapshot(&mut self.registry, snapshot)
    }

    pub fn recover_wal(&mut self, rows: &[RowV12]) -> Result<()> {
        boxdb_wal::replay_wal(&mut self.registry, rows)
    }
}
