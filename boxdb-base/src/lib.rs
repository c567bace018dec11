mod bitmap256;
mod error;

pub use bitmap256::{Bitmap256, DoubleBitmap256};
pub use error::{err, kind_err, Error, Kind, Result};
