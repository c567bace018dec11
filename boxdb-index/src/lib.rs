mod index;
mod overlay;
mod space;

pub use index::{duplicate_key_err, Index, IndexConf, Key};
pub use overlay::{OpId, PhiCell, PhiOverlay, Slot};
pub use space::{ObjectSpace, ObjectSpaceRegistry, MAX_INDICES_PER_SPACE, MAX_OBJECT_SPACES};
