// The WAL bridge: the channel a `box_submit` blocks on while waiting for
// durability. The real WAL writer is a separate OS process communicating
// by message-passing (§5, "Shared resources"); `ChannelWal` stands that
// process in with a background thread draining an `mpsc` queue of
// submissions and handing back assigned LSNs.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use boxdb_base::{kind_err, Kind, Result};

use crate::row::RowV12;

pub trait WalBridge: Send + Sync {
    /// Submits one already-framed row for durability, blocking the caller
    /// until the writer reports success or failure. Returns the assigned
    /// LSN on success.
    fn submit(&self, tag: u16, cookie: u64, data: Vec<u8>) -> Result<i64>;
}

struct WalRequest {
    tag: u16,
    cookie: u64,
    data: Vec<u8>,
    reply: mpsc::Sender<Result<i64>>,
}

/// An in-process stand-in for the external WAL-writer process: a
/// background thread owns the log and assigns monotonically increasing
/// LSNs to whatever comes in over the channel.
pub struct ChannelWal {
    tx: mpsc::Sender<WalRequest>,
    log: Arc<Mutex<Vec<RowV12>>>,
}

impl ChannelWal {
    pub fn spawn() -> ChannelWal {
        let (tx, rx) = mpsc::channel::<WalRequest>();
        let log = Arc::new(Mutex::new(Vec::new()));
        let writer_log = log.clone();

        thread::spawn(move || {
            let mut next_lsn: i64 = 1;
            for req in rx {
                let row = RowV12::new(next_lsn, next_lsn, req.tag, req.cookie, 0.0, req.data);
                writer_log.lock().unwrap().push(row);
                // The writer is the only place a real implementation would
                // fsync and potentially fail; a closed reply channel just
                // means the caller gave up waiting, which is fine to
                // ignore here.
                let _ = req.reply.send(Ok(next_lsn));
                next_lsn += 1;
            }
        });

        ChannelWal { tx, log }
    }

    pub fn committed_rows(&self) -> Vec<RowV12> {
        self.log.lock().unwrap().clone()
    }
}

impl WalBridge for ChannelWal {
    fn submit(&self, tag: u16, cookie: u64, data: Vec<u8>) -> Result<i64> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(WalRequest { tag, cookie, data, reply: reply_tx })
            .map_err(|_| kind_err(Kind::WalFailure, "WAL writer channel closed"))?;
        reply_rx
            .recv()
            .map_err(|_| kind_err(Kind::WalFailure, "WAL writer did not reply"))?
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tlv::{encode_box_op, TAG_BOX_OP};

    #[test]
    fn submissions_receive_increasing_lsns() {
        let wal = ChannelWal::spawn();
        let lsn1 = wal.submit(TAG_BOX_OP, 0, encode_box_op(b"one")).unwrap();
        let lsn2 = wal.submit(TAG_BOX_OP, 0, encode_box_op(b"two")).unwrap();
        assert!(lsn2 > lsn1);
        assert_eq!(wal.committed_rows().len(), 2);
    }
}
