// Recovery: replay the most recent snapshot, then every WAL row after it,
// in LSN order. Snapshot rows install directly (§4.7); WAL rows replay as
// ordinary auto-commit transactions through the same box-txn state
// machine a live request would use, so recovery exercises exactly the
// commit path it needs to reproduce.

use std::sync::Arc;

use boxdb_base::{kind_err, Kind, Result};
use boxdb_index::ObjectSpaceRegistry;
use boxdb_txn::{BoxTxn, TxnMode};

use crate::payload::decode_op_payload;
use crate::row::RowV12;
use crate::snapshot::decode_all as decode_snapshot_rows;
use crate::tlv::{decode_tlv, split_multi_op, TAG_BOX_MULTI_OP, TAG_BOX_OP};

/// Installs every row in `snapshot` directly into its target table,
/// bypassing the overlay machinery. The registry must already have every
/// referenced table created (from object space configuration loaded
/// before recovery starts).
pub fn replay_snapshot(registry: &mut ObjectSpaceRegistry, snapshot: &[u8]) -> Result<()> {
    for row in decode_snapshot_rows(snapshot)? {
        let space = registry.get_mut(row.table_id)?;
        if space.ignored {
            continue;
        }
        let tuple = Arc::new(row.to_tuple()?);
        space.install_everywhere(&tuple)?;
    }
    Ok(())
}

/// Replays WAL rows in the order given (the caller is responsible for
/// having sorted them by LSN, typically just the order they were read off
/// disk). Each row becomes one auto-commit transaction; a single `BOX_OP`
/// row is one op, a `BOX_MULTI_OP` row is the group of ops that were
/// originally submitted together.
pub fn replay_wal(registry: &mut ObjectSpaceRegistry, rows: &[RowV12]) -> Result<()> {
    for row in rows {
        replay_row(registry, row)
            .map_err(|e| kind_err(Kind::CorruptLog, format!("WAL row lsn={} failed to replay: {e}", row.lsn)))?;
    }
    Ok(())
}

fn replay_row(registry: &mut ObjectSpaceRegistry, row: &RowV12) -> Result<()> {
    let (tag, value, _) = decode_tlv(&row.data)?;
    let op_payloads: Vec<&[u8]> = match tag {
        TAG_BOX_OP => vec![value],
        TAG_BOX_MULTI_OP => split_multi_op(value)?,
        other => return Err(kind_err(Kind::MalformedTuple, format!("unexpected WAL row tag {}", other))),
    };

    let mut txn = BoxTxn::alloc(row.lsn as u64, 0, TxnMode::Rw, "recovery", true)?;
    for raw in op_payloads {
        let (table_id, opcode, flags, payload) = decode_op_payload(raw)?;
        // An ignored table is dropped from recovery entirely, even if a
        // stray row for it turns up in the log.
        if registry.get(table_id)?.ignored {
            continue;
        }
        if let Err(e) = txn.prepare(registry, table_id, opcode, flags, payload) {
            txn.rollback(registry);
            return Err(e);
        }
    }
    txn.commit(registry);
    Ok(())
}
