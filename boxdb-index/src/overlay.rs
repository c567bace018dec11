// The per-index phi chain: a transient node that impersonates a committed
// tuple in an index slot while a transaction holds pending versions of that
// key. Grounded in `tuple.h`'s `box_phi`/`box_phi_cell` and in the linear,
// submission-ordered history chain of `historied-data`'s `History<V>` (kept
// here as a plain `Vec` in submission order rather than an intrusive
// tail-queue, per the rewrite's own design note: "a tagged sum ... with a
// single accessor trait, no pointer-identity trick needed").

use std::sync::Arc;

use boxdb_tuple::Tuple;

/// Identifies the box-op that produced a given phi cell. Only one
/// mutating transaction is ever in flight system-wide (see the
/// concurrency model), so an `OpId` alone - without a transaction id - is
/// enough to uniquely name "the op that installed this version".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpId(pub u64);

/// One version step inside an overlay, produced by one op.
#[derive(Debug, Clone)]
pub struct PhiCell {
    pub op_id: OpId,
    pub new_obj: Option<Arc<Tuple>>,
}

/// The list of in-flight versions of one (index, key) pair, in submission
/// order, plus the committed pre-transaction value it overlays.
#[derive(Debug, Clone)]
pub struct PhiOverlay {
    pub base_obj: Option<Arc<Tuple>>,
    pub cells: Vec<PhiCell>,
}

impl PhiOverlay {
    fn tip(&self) -> Option<Arc<Tuple>> {
        self.cells.last().and_then(|c| c.new_obj.clone())
    }
}

/// What an index slot currently holds: a concrete tuple, or exactly one
/// overlay. Invariant 1 (overlay occupancy) is exactly "this enum has no
/// third case".
#[derive(Debug, Clone)]
pub enum Slot {
    Tuple(Arc<Tuple>),
    Overlay(PhiOverlay),
}

impl Slot {
    /// `visible_left`: the committed pre-transaction value. Used by any
    /// reader that must see committed-only state (snapshot emission, WAL
    /// shipping, replication).
    pub fn visible_left(slot: Option<&Slot>) -> Option<Arc<Tuple>> {
        match slot {
            None => None,
            Some(Slot::Tuple(t)) => Some(t.clone()),
            Some(Slot::Overlay(o)) => o.base_obj.clone(),
        }
    }

    /// `visible_right`: the transaction's tip for this key. Used by the
    /// owning transaction to observe its own writes, and by ordinary
    /// readers when no overlay is present (then it's just the concrete
    /// tuple).
    pub fn visible_right(slot: Option<&Slot>) -> Option<Arc<Tuple>> {
        match slot {
            None => None,
            Some(Slot::Tuple(t)) => Some(t.clone()),
            Some(Slot::Overlay(o)) => o.tip(),
        }
    }

    /// `phi_obj`: the first meaningful real tuple in the chain -
    /// `base_obj` if non-null, else the first cell's `new_obj` (the key
    /// did not exist before the transaction). Used by accessors that must
    /// answer a question about the tuple without caring which side of an
    /// in-flight transaction the caller sits on (e.g. "how many fields?").
    pub fn phi_obj(slot: Option<&Slot>) -> Option<Arc<Tuple>> {
        match slot {
            None => None,
            Some(Slot::Tuple(t)) => Some(t.clone()),
            Some(Slot::Overlay(o)) => o
                .base_obj
                .clone()
                .or_else(|| o.cells.first().and_then(|c| c.new_obj.clone())),
        }
    }
}
