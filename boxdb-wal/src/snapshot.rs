// Snapshot rows: `{u32 table_id, u32 tuple_size, u32 data_size, bytes
// data}`, one row per tuple, grouped by table id. Snapshot rows bypass the
// overlay machinery entirely - a snapshot only ever contains committed,
// concrete tuples - and are installed directly into the target index.

use boxdb_base::{kind_err, Kind, Result};
use boxdb_tuple::Tuple;

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub table_id: u32,
    pub tuple_size: u32,
    pub data: Vec<u8>,
}

impl SnapshotRow {
    pub fn from_tuple(table_id: u32, tuple: &Tuple) -> SnapshotRow {
        SnapshotRow { table_id, tuple_size: tuple.cardinality(), data: tuple.body().to_vec() }
    }

    pub fn to_tuple(&self) -> Result<Tuple> {
        Tuple::decode(self.tuple_size, &self.data)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + self.data.len());
        out.extend_from_slice(&self.table_id.to_le_bytes());
        out.extend_from_slice(&self.tuple_size.to_le_bytes());
        out.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    /// Decodes one row from the front of `buf`, returning the row and the
    /// number of bytes consumed so the caller can keep walking a snapshot
    /// file.
    pub fn decode(buf: &[u8]) -> Result<(SnapshotRow, usize)> {
        if buf.len() < 12 {
            return Err(kind_err(Kind::TruncatedField, "snapshot row header truncated"));
        }
        let table_id = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let tuple_size = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        let data_size = u32::from_le_bytes(buf[8..12].try_into().unwrap()) as usize;
        if buf.len() < 12 + data_size {
            return Err(kind_err(Kind::TruncatedField, "snapshot row data truncated"));
        }
        let data = buf[12..12 + data_size].to_vec();
        Ok((SnapshotRow { table_id, tuple_size, data }, 12 + data_size))
    }
}

/// Walks a full snapshot buffer, yielding one `SnapshotRow` at a time.
pub fn decode_all(mut buf: &[u8]) -> Result<Vec<SnapshotRow>> {
    let mut rows = Vec::new();
    while !buf.is_empty() {
        let (row, consumed) = SnapshotRow::decode(buf)?;
        buf = &buf[consumed..];
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn snapshot_row_round_trips() {
        let t = Tuple::from_fields(&[b"1", b"hello"]);
        let row = SnapshotRow::from_tuple(3, &t);
        let encoded = row.encode();
        let (decoded, consumed) = SnapshotRow::decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, row);
        let back = decoded.to_tuple().unwrap();
        assert_eq!(back.body(), t.body());
    }

    #[test]
    fn decode_all_walks_concatenated_rows() {
        let t1 = Tuple::from_fields(&[b"1"]);
        let t2 = Tuple::from_fields(&[b"2", b"x"]);
        let mut buf = Vec::new();
        buf.extend(SnapshotRow::from_tuple(0, &t1).encode());
        buf.extend(SnapshotRow::from_tuple(0, &t2).encode());
        let rows = decode_all(&buf).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].to_tuple().unwrap().body(), t1.body());
        assert_eq!(rows[1].to_tuple().unwrap().body(), t2.body());
    }
}
