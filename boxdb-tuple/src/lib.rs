mod tuple;
mod varint;

pub use tuple::{fields_bsize, encoded_field_len, Layout, Tuple};
pub use varint::{decode_varint32, encode_varint32, varint32_sizeof};
