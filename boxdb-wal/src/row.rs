// The on-disk/on-wire WAL row. `row_v12` is the current format; legacy
// `_row_v11` rows (no scn/tag/cookie) are up-converted to `row_v12` on
// read, per `log_io.h`. Both header and data carry a CRC (`crc32fast`
// stands in for the original CRC-32C/Castagnoli - see DESIGN.md); a
// mismatch on either is `CorruptLog` and stops recovery.

use boxdb_base::{kind_err, Kind, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct RowV12 {
    pub lsn: i64,
    pub scn: i64,
    pub tag: u16,
    pub cookie: u64,
    pub timestamp: f64,
    pub data: Vec<u8>,
}

fn data_crc32c(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

fn header_crc32c(lsn: i64, scn: i64, tag: u16, cookie: u64, timestamp: f64, len: u32, data_crc: u32) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&lsn.to_le_bytes());
    hasher.update(&scn.to_le_bytes());
    hasher.update(&tag.to_le_bytes());
    hasher.update(&cookie.to_le_bytes());
    hasher.update(&timestamp.to_le_bytes());
    hasher.update(&len.to_le_bytes());
    hasher.update(&data_crc.to_le_bytes());
    hasher.finalize()
}

impl RowV12 {
    pub fn new(lsn: i64, scn: i64, tag: u16, cookie: u64, timestamp: f64, data: Vec<u8>) -> RowV12 {
        RowV12 { lsn, scn, tag, cookie, timestamp, data }
    }

    /// Packs the row: `{u32 header_crc32c, i64 lsn, i64 scn, u16 tag, u64
    /// cookie, double timestamp, u32 len, u32 data_crc32c, bytes data}`,
    /// little-endian, packed.
    pub fn encode(&self) -> Vec<u8> {
        let len = self.data.len() as u32;
        let data_crc = data_crc32c(&self.data);
        let header_crc = header_crc32c(self.lsn, self.scn, self.tag, self.cookie, self.timestamp, len, data_crc);

        let mut out = Vec::with_capacity(4 + 8 + 8 + 2 + 8 + 8 + 4 + 4 + self.data.len());
        out.extend_from_slice(&header_crc.to_le_bytes());
        out.extend_from_slice(&self.lsn.to_le_bytes());
        out.extend_from_slice(&self.scn.to_le_bytes());
        out.extend_from_slice(&self.tag.to_le_bytes());
        out.extend_from_slice(&self.cookie.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&data_crc.to_le_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<RowV12> {
        const FIXED_LEN: usize = 4 + 8 + 8 + 2 + 8 + 8 + 4 + 4;
        if buf.len() < FIXED_LEN {
            return Err(kind_err(Kind::TruncatedField, "row_v12 header truncated"));
        }
        let header_crc = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let lsn = i64::from_le_bytes(buf[4..12].try_into().unwrap());
        let scn = i64::from_le_bytes(buf[12..20].try_into().unwrap());
        let tag = u16::from_le_bytes(buf[20..22].try_into().unwrap());
        let cookie = u64::from_le_bytes(buf[22..30].try_into().unwrap());
        let timestamp = f64::from_le_bytes(buf[30..38].try_into().unwrap());
        let len = u32::from_le_bytes(buf[38..42].try_into().unwrap());
        let data_crc = u32::from_le_bytes(buf[42..46].try_into().unwrap());

        if buf.len() < FIXED_LEN + len as usize {
            return Err(kind_err(Kind::TruncatedField, "row_v12 data truncated"));
        }
        let data = buf[FIXED_LEN..FIXED_LEN + len as usize].to_vec();

        if data_crc32c(&data) != data_crc {
            return Err(kind_err(Kind::CorruptLog, "row_v12 data_crc32c mismatch"));
        }
        let expect_header_crc = header_crc32c(lsn, scn, tag, cookie, timestamp, len, data_crc);
        if expect_header_crc != header_crc {
            return Err(kind_err(Kind::CorruptLog, "row_v12 header_crc32c mismatch"));
        }

        Ok(RowV12 { lsn, scn, tag, cookie, timestamp, data })
    }
}

/// Legacy format: no `scn`/`tag`/`cookie`. Reads upconvert by setting
/// `scn = lsn` (no separate commit-sequence tracking existed yet) and
/// `tag = 0`/`cookie = 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct RowV11 {
    pub lsn: i64,
    pub timestamp: f64,
    pub data: Vec<u8>,
}

impl RowV11 {
    pub fn encode(&self) -> Vec<u8> {
        let len = self.data.len() as u32;
        let data_crc = data_crc32c(&self.data);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.lsn.to_le_bytes());
        hasher.update(&self.timestamp.to_le_bytes());
        hasher.update(&len.to_le_bytes());
        hasher.update(&data_crc.to_le_bytes());
        let header_crc = hasher.finalize();

        let mut out = Vec::with_capacity(4 + 8 + 8 + 4 + 4 + self.data.len());
        out.extend_from_slice(&header_crc.to_le_bytes());
        out.extend_from_slice(&self.lsn.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&data_crc.to_le_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<RowV11> {
        const FIXED_LEN: usize = 4 + 8 + 8 + 4 + 4;
        if buf.len() < FIXED_LEN {
            return Err(kind_err(Kind::TruncatedField, "_row_v11 header truncated"));
        }
        let header_crc = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let lsn = i64::from_le_bytes(buf[4..12].try_into().unwrap());
        let timestamp = f64::from_le_bytes(buf[12..20].try_into().unwrap());
        let len = u32::from_le_bytes(buf[20..24].try_into().unwrap());
        let data_crc = u32::from_le_bytes(buf[24..28].try_into().unwrap());

        if buf.len() < FIXED_LEN + len as usize {
            return Err(kind_err(Kind::TruncatedField, "_row_v11 data truncated"));
        }
        let data = buf[FIXED_LEN..FIXED_LEN + len as usize].to_vec();
        if data_crc32c(&data) != data_crc {
            return Err(kind_err(Kind::CorruptLog, "_row_v11 data_crc32c mismatch"));
        }

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&lsn.to_le_bytes());
        hasher.update(&timestamp.to_le_bytes());
        hasher.update(&len.to_le_bytes());
        hasher.update(&data_crc.to_le_bytes());
        if hasher.finalize() != header_crc {
            return Err(kind_err(Kind::CorruptLog, "_row_v11 header_crc32c mismatch"));
        }

        Ok(RowV11 { lsn, timestamp, data })
    }

    pub fn upconvert(self) -> RowV12 {
        RowV12 { lsn: self.lsn, scn: self.lsn, tag: 0, cookie: 0, timestamp: self.timestamp, data: self.data }
    }
}
