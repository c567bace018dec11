// Tiny atomic counters struct, in the spirit of the teacher's reserved
// admin slot ("Admin, config, system policies, logging, audit, metrics").
// No histograms or percentiles - just running totals an operator can read
// off periodically.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Stats {
    pub txns_committed: AtomicU64,
    pub txns_rolled_back: AtomicU64,
    pub ops_insert: AtomicU64,
    pub ops_update_fields: AtomicU64,
    pub ops_delete: AtomicU64,
    pub ops_nop: AtomicU64,
    pub wal_bytes_submitted: AtomicU64,
}

impl Stats {
    pub fn new() -> Stats {
        Stats::default()
    }

    pub fn record_commit(&self) {
        self.txns_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rollback(&self) {
        self.txns_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_op(&self, opcode: &boxdb_txn::Opcode) {
        let counter = match opcode {
            boxdb_txn::Opcode::Insert => &self.ops_insert,
            boxdb_txn::Opcode::UpdateFields => &self.ops_update_fields,
            boxdb_txn::Opcode::Delete | boxdb_txn::Opcode::Delete13 => &self.ops_delete,
            _ => &self.ops_nop,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wal_bytes(&self, n: u64) {
        self.wal_bytes_submitted.fetch_add(n, Ordering::Relaxed);
    }
}
