mod bridge;
mod payload;
mod recovery;
mod row;
mod snapshot;
mod tlv;

pub use bridge::{ChannelWal, WalBridge};
pub use payload::{decode_op_payload, encode_op_payload};
pub use recovery::{replay_snapshot, replay_wal};
pub use row::{RowV11, RowV12};
pub use snapshot::{decode_all as decode_snapshot_rows, SnapshotRow};
pub use tlv::{
    decode_tlv, encode_box_multi_op, encode_box_op, encode_tlv, split_multi_op, TAG_BOX_MULTI_OP, TAG_BOX_OP,
};
