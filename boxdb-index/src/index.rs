// One index over one table's tuples: a key-ordered map from derived key
// bytes to a `Slot` (concrete tuple or phi overlay), plus the index
// binding protocol from the component design (prepare-time install, and
// the commit/rollback splice-out that either of those produces needs).
//
// The actual index data structure (hash vs. tree) is out of scope - only
// the overlay behaviour that has to work no matter which one backs a given
// index is. `BTreeMap` stands in for "some keyed index"; nothing here
// depends on ordering, only on keyed lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use boxdb_base::{kind_err, Kind, Result};
use boxdb_tuple::Tuple;

use crate::overlay::{OpId, PhiCell, PhiOverlay, Slot};

pub type Key = Vec<u8>;

#[derive(Debug, Clone)]
pub struct IndexConf {
    /// Field positions (into the tuple) that make up this index's key, in
    /// order.
    pub fields: Vec<u32>,
    pub unique: bool,
    /// A partial index does not bind tuples whose indexed fields are
    /// missing or zero-length.
    pub partial: bool,
}

#[derive(Debug)]
pub struct Index {
    pub conf: IndexConf,
    slots: BTreeMap<Key, Slot>,
}

impl Index {
    pub fn new(conf: IndexConf) -> Index {
        Index { conf, slots: BTreeMap::new() }
    }

    /// Whether `tuple` should be bound in this index at all; `false` for a
    /// partial index whose indexed field(s) are absent or zero-length.
    pub fn tuple_matches(&self, tuple: &Tuple) -> bool {
        if !self.conf.partial {
            return true;
        }
        self.conf.fields.iter().all(|&f| match tuple.field(f) {
            Ok(bytes) => !bytes.is_empty(),
            Err(_) => false,
        })
    }

    /// The key this index derives from `tuple`: the concatenation of the
    /// length-prefixed indexed fields, in index field order.
    pub fn derive_key(&self, tuple: &Tuple) -> Result<Key> {
        let mut key = Vec::new();
        for &f in &self.conf.fields {
            let bytes = tuple.field(f)?;
            boxdb_tuple::encode_varint32(bytes.len() as u32, &mut key);
            key.extend_from_slice(bytes);
        }
        Ok(key)
    }

    pub fn visible_left(&self, key: &Key) -> Option<Arc<Tuple>> {
        Slot::visible_left(self.slots.get(key))
    }

    pub fn visible_right(&self, key: &Key) -> Option<Arc<Tuple>> {
        Slot::visible_right(self.slots.get(key))
    }

    pub fn phi_obj(&self, key: &Key) -> Option<Arc<Tuple>> {
        Slot::phi_obj(self.slots.get(key))
    }

    pub fn is_empty_key(&self, key: &Key) -> bool {
        !self.slots.contains_key(key)
    }

    /// Step 1-2 of the index binding protocol (§4.4): install a new cell
    /// for `op_id` at `key`, either extending the overlay already present
    /// (belonging, necessarily, to the one active transaction) or standing
    /// up a fresh overlay over whatever concrete tuple (or nothing) was
    /// there before.
    pub fn bind(&mut self, key: Key, op_id: OpId, new_obj: Option<Arc<Tuple>>) {
        match self.slots.remove(&key) {
            Some(Slot::Overlay(mut ov)) => {
                ov.cells.push(PhiCell { op_id, new_obj });
                self.slots.insert(key, Slot::Overlay(ov));
            }
            Some(Slot::Tuple(t)) => {
                let overlay = PhiOverlay {
                    base_obj: Some(t),
                    cells: vec![PhiCell { op_id, new_obj }],
                };
                self.slots.insert(key, Slot::Overlay(overlay));
            }
            None => {
                let overlay = PhiOverlay {
                    base_obj: None,
                    cells: vec![PhiCell { op_id, new_obj }],
                };
                self.slots.insert(key, Slot::Overlay(overlay));
            }
        }
    }

    /// Removes the cell produced by `op_id` at `key`. If that empties the
    /// overlay, installs `on_empty` (the overlay's `base_obj` for a
    /// rollback/undo, or the just-removed cell's `new_obj` for a commit)
    /// in the slot, clearing it if `on_empty` resolves to `None`.
    fn remove_cell(
        &mut self,
        key: &Key,
        op_id: OpId,
        on_empty: impl FnOnce(&PhiOverlay, Option<Arc<Tuple>>) -> Option<Arc<Tuple>>,
    ) {
        let Some(Slot::Overlay(mut ov)) = self.slots.remove(key) else {
            return;
        };
        let Some(pos) = ov.cells.iter().position(|c| c.op_id == op_id) else {
            self.slots.insert(key.clone(), Slot::Overlay(ov));
            return;
        };
        let removed = ov.cells.remove(pos);
        if ov.cells.is_empty() {
            match on_empty(&ov, removed.new_obj) {
                Some(t) => {
                    self.slots.insert(key.clone(), Slot::Tuple(t));
                }
                None => {
                    // slot already removed above; leave it empty
                }
            }
        } else {
            self.slots.insert(key.clone(), Slot::Overlay(ov));
        }
    }

    /// Undo (prepare-time failure, or full rollback): restores `base_obj`
    /// once the overlay has no cells left.
    pub fn unbind(&mut self, key: &Key, op_id: OpId) {
        self.remove_cell(key, op_id, |ov, _removed| ov.base_obj.clone());
    }

    /// Commit: folds the overlay to its tip once all of the active
    /// transaction's ops have had their cells removed.
    pub fn fold(&mut self, key: &Key, op_id: OpId) {
        self.remove_cell(key, op_id, |_ov, removed| removed);
    }

    /// True if `key`'s slot holds a concrete tuple or no overlay at all;
    /// used by invariant checks and recovery (which never leaves an
    /// overlay behind).
    pub fn has_overlay(&self, key: &Key) -> bool {
        matches!(self.slots.get(key), Some(Slot::Overlay(_)))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Directly installs a concrete tuple, bypassing the overlay
    /// machinery entirely. Used by snapshot replay (§4.7) and by
    /// `truncate`.
    pub fn install_concrete(&mut self, key: Key, tuple: Option<Arc<Tuple>>) {
        match tuple {
            Some(t) => {
                self.slots.insert(key, Slot::Tuple(t));
            }
            None => {
                self.slots.remove(&key);
            }
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn iter_concrete(&self) -> impl Iterator<Item = (&Key, &Arc<Tuple>)> {
        self.slots.iter().filter_map(|(k, s)| match s {
            Slot::Tuple(t) => Some((k, t)),
            Slot::Overlay(_) => None,
        })
    }
}

pub fn duplicate_key_err(key: &Key) -> boxdb_base::Error {
    kind_err(Kind::DuplicateKey, format!("duplicate key {:?}", key))
}

#[cfg(test)]
mod test {
    use super::*;

    fn conf(fields: &[u32], unique: bool, partial: bool) -> IndexConf {
        IndexConf { fields: fields.to_vec(), unique, partial }
    }

    fn tup(fields: &[&[u8]]) -> Arc<Tuple> {
        Arc::new(Tuple::from_fields(fields))
    }

    #[test]
    fn bind_then_fold_installs_tip() {
        let mut idx = Index::new(conf(&[0], true, false));
        let t = tup(&[b"42", b"a"]);
        let key = idx.derive_key(&t).unwrap();
        idx.bind(key.clone(), OpId(1), Some(t.clone()));
        assert!(idx.has_overlay(&key));
        assert_eq!(idx.visible_right(&key).unwrap().body(), t.body());
        assert!(idx.visible_left(&key).is_none());

        idx.fold(&key, OpId(1));
        assert!(!idx.has_overlay(&key));
        assert_eq!(idx.visible_right(&key).unwrap().body(), t.body());
    }

    #[test]
    fn bind_then_unbind_restores_base() {
        let mut idx = Index::new(conf(&[0], true, false));
        let base = tup(&[b"42", b"a"]);
        let key = idx.derive_key(&base).unwrap();
        idx.install_concrete(key.clone(), Some(base.clone()));

        let replacement = tup(&[b"42", b"b"]);
        idx.bind(key.clone(), OpId(1), Some(replacement.clone()));
        assert_eq!(idx.visible_right(&key).unwrap().body(), replacement.body());
        assert_eq!(idx.visible_left(&key).unwrap().body(), base.body());

        idx.unbind(&key, OpId(1));
        assert!(!idx.has_overlay(&key));
        assert_eq!(idx.visible_right(&key).unwrap().body(), base.body());
    }

    #[test]
    fn multiple_ops_same_key_chain_in_order() {
        let mut idx = Index::new(conf(&[0], true, false));
        let v1 = tup(&[b"1", b"a"]);
        let v2 = tup(&[b"1", b"b"]);
        let key = idx.derive_key(&v1).unwrap();

        idx.bind(key.clone(), OpId(1), Some(v1.clone()));
        idx.bind(key.clone(), OpId(2), Some(v2.clone()));
        assert_eq!(idx.visible_right(&key).unwrap().body(), v2.body());
        assert!(idx.visible_left(&key).is_none());
        assert_eq!(idx.phi_obj(&key).unwrap().body(), v1.body());

        // Commit folds in submission order.
        idx.fold(&key, OpId(1));
        assert!(idx.has_overlay(&key)); // op 2's cell remains
        idx.fold(&key, OpId(2));
        assert!(!idx.has_overlay(&key));
        assert_eq!(idx.visible_right(&key).unwrap().body(), v2.body());
    }

    #[test]
    fn delete_tip_empties_slot_on_commit() {
        let mut idx = Index::new(conf(&[0], true, false));
        let base = tup(&[b"1", b"a"]);
        let key = idx.derive_key(&base).unwrap();
        idx.install_concrete(key.clone(), Some(base));

        idx.bind(key.clone(), OpId(9), None);
        assert!(idx.visible_right(&key).is_none());
        idx.fold(&key, OpId(9));
        assert!(idx.is_empty_key(&key));
    }

    #[test]
    fn partial_index_skips_missing_field() {
        let idx = Index::new(conf(&[1], false, true));
        let t = tup(&[b"1"]); // cardinality 1, field 1 does not exist
        assert!(!idx.tuple_matches(&t));
        let t2 = tup(&[b"1", b""]); // field 1 present but empty
        assert!(!idx.tuple_matches(&t2));
        let t3 = tup(&[b"1", b"x"]);
        assert!(idx.tuple_matches(&t3));
    }
}
