// An object space: one table's row storage, expressed purely as a set of
// indices over the same tuples (index 0 is always the primary key). There
// is no separate "heap" of tuples distinct from index 0 - a tuple is only
// ever reachable through whichever indices bind it, matching the object
// header's own `index[]` array.

use std::sync::Arc;

use boxdb_base::{kind_err, Kind, Result};
use boxdb_tuple::Tuple;

use crate::index::{duplicate_key_err, Index, IndexConf, Key};
use crate::overlay::OpId;

pub const MAX_INDICES_PER_SPACE: usize = 10;
pub const MAX_OBJECT_SPACES: usize = 1024;

#[derive(Debug)]
pub struct ObjectSpace {
    pub id: u32,
    /// `None` means the space accepts tuples of any cardinality.
    pub cardinality: Option<u32>,
    /// Dropped from recovery and from `SELECT` entirely (scratch space).
    pub ignored: bool,
    /// Committed rows are appended to the WAL when this is set; when it
    /// isn't, ops against this space still run through the overlay
    /// machinery and commit in memory, they just never reach the log, so
    /// the space starts empty again on the next restart.
    pub wal: bool,
    /// Whether this space's rows belong in a snapshot. There is no
    /// snapshot-writer in this crate (only snapshot replay on recovery),
    /// so this flag is carried for a future writer rather than consulted
    /// anywhere yet.
    pub snap: bool,
    indices: Vec<Index>,
}

impl ObjectSpace {
    pub fn new(id: u32, cardinality: Option<u32>, ignored: bool, wal: bool, snap: bool, primary: IndexConf) -> ObjectSpace {
        ObjectSpace { id, cardinality, ignored, wal, snap, indices: vec![Index::new(primary)] }
    }

    pub fn primary(&self) -> &Index {
        &self.indices[0]
    }

    pub fn index(&self, i: usize) -> Result<&Index> {
        self.indices
            .get(i)
            .ok_or_else(|| kind_err(Kind::NoSuchIndex, format!("no index {} on space {}", i, self.id)))
    }

    pub fn index_mut(&mut self, i: usize) -> Result<&mut Index> {
        let id = self.id;
        self.indices
            .get_mut(i)
            .ok_or_else(|| kind_err(Kind::NoSuchIndex, format!("no index {} on space {}", i, id)))
    }

    pub fn num_indices(&self) -> usize {
        self.indices.len()
    }

    pub fn create_index(&mut self, conf: IndexConf) -> Result<usize> {
        if self.indices.len() >= MAX_INDICES_PER_SPACE {
            return Err(kind_err(
                Kind::Other,
                format!("space {} already has the maximum {} indices", self.id, MAX_INDICES_PER_SPACE),
            ));
        }
        // A secondary index built against an already-populated space must
        // be backfilled from the primary index's committed contents; there
        // must be no in-flight transaction while this happens (see the
        // concurrency model's one-mutator-at-a-time rule).
        let mut fresh = Index::new(conf);
        for (_, tuple) in self.indices[0].iter_concrete() {
            if !fresh.tuple_matches(tuple) {
                continue;
            }
            let key = fresh.derive_key(tuple)?;
            if fresh.conf.unique && !fresh.is_empty_key(&key) {
                return Err(duplicate_key_err(&key));
            }
            fresh.install_concrete(key, Some(tuple.clone()));
        }
        self.indices.push(fresh);
        Ok(self.indices.len() - 1)
    }

    pub fn drop_index(&mut self, i: usize) -> Result<()> {
        if i == 0 {
            return Err(kind_err(Kind::Other, "cannot drop the primary index"));
        }
        if i >= self.indices.len() {
            return Err(kind_err(Kind::NoSuchIndex, format!("no index {} on space {}", i, self.id)));
        }
        self.indices.remove(i);
        Ok(())
    }

    pub fn truncate(&mut self) {
        for idx in &mut self.indices {
            idx.clear();
        }
    }

    /// Installs `tuple` directly into every matching index, bypassing the
    /// overlay machinery entirely. Used by snapshot replay, which only
    /// ever deals in committed, concrete tuples.
    pub fn install_everywhere(&mut self, tuple: &Arc<Tuple>) -> Result<()> {
        for idx in &mut self.indices {
            if !idx.tuple_matches(tuple) {
                continue;
            }
            let key = idx.derive_key(tuple)?;
            idx.install_concrete(key, Some(tuple.clone()));
        }
        Ok(())
    }

    fn check_cardinality(&self, tuple: &Tuple) -> Result<()> {
        if let Some(expect) = self.cardinality {
            if tuple.cardinality() != expect {
                return Err(kind_err(
                    Kind::CardinalityMismatch,
                    format!(
                        "space {} expects cardinality {}, got {}",
                        self.id,
                        expect,
                        tuple.cardinality()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Binds an op's effect into every matching index. Per index, this
    /// derives `old_key` from `old_obj` and `new_key` from `new_obj`
    /// (skipping a side whose tuple doesn't match a partial index). If
    /// both keys exist and are equal, a single cell replaces the binding
    /// in place; if they differ (an update rewrote an indexed field, per
    /// tie-break (ii)), the old key gets a null-tip cell and the new key
    /// gets the tuple. A pure insert has no `old_key`; a pure delete has
    /// no `new_key`.
    ///
    /// Checks uniqueness against the new key's `visible_right` before
    /// binding anything, so a duplicate key aborts the whole op with no
    /// partial binding across indices.
    pub fn apply_op(
        &mut self,
        op_id: OpId,
        old_obj: Option<&Arc<Tuple>>,
        new_obj: Option<&Arc<Tuple>>,
    ) -> Result<Vec<(usize, Key)>> {
        if let Some(t) = new_obj {
            self.check_cardinality(t)?;
        }

        struct PerIndex {
            i: usize,
            old_key: Option<Key>,
            new_key: Option<Key>,
        }
        let mut steps = Vec::with_capacity(self.indices.len());
        for (i, idx) in self.indices.iter().enumerate() {
            let old_key = match old_obj {
                Some(t) if idx.tuple_matches(t) => Some(idx.derive_key(t)?),
                _ => None,
            };
            let new_key = match new_obj {
                Some(t) if idx.tuple_matches(t) => Some(idx.derive_key(t)?),
                _ => None,
            };
            if old_key.is_none() && new_key.is_none() {
                continue;
            }
            if idx.conf.unique {
                if let Some(ref nk) = new_key {
                    if old_key.as_ref() != Some(nk) {
                        if let Some(existing) = idx.visible_right(nk) {
                            let is_same_row =
                                old_obj.map(|o| Arc::ptr_eq(o, &existing)).unwrap_or(false);
                            if !is_same_row {
                                return Err(duplicate_key_err(nk));
                            }
                        }
                    }
                }
            }
            steps.push(PerIndex { i, old_key, new_key });
        }

        let mut plan = Vec::new();
        for step in steps {
            match (step.old_key, step.new_key) {
                (Some(ok), Some(nk)) if ok == nk => {
                    self.indices[step.i].bind(ok.clone(), op_id, new_obj.cloned());
                    plan.push((step.i, ok));
                }
                (old_key, new_key) => {
                    if let Some(ok) = old_key {
                        self.indices[step.i].bind(ok.clone(), op_id, None);
                        plan.push((step.i, ok));
                    }
                    if let Some(nk) = new_key {
                        self.indices[step.i].bind(nk.clone(), op_id, new_obj.cloned());
                        plan.push((step.i, nk));
                    }
                }
            }
        }
        Ok(plan)
    }

    pub fn fold_op(&mut self, op_id: OpId, plan: &[(usize, Key)]) {
        for (i, key) in plan {
            self.indices[*i].fold(key, op_id);
        }
    }

    pub fn unbind_op(&mut self, op_id: OpId, plan: &[(usize, Key)]) {
        for (i, key) in plan {
            self.indices[*i].unbind(key, op_id);
        }
    }
}

#[derive(Debug, Default)]
pub struct ObjectSpaceRegistry {
    spaces: Vec<Option<ObjectSpace>>,
}

impl ObjectSpaceRegistry {
    pub fn new() -> ObjectSpaceRegistry {
        ObjectSpaceRegistry { spaces: Vec::new() }
    }

    pub fn create(&mut self, space: ObjectSpace) -> Result<()> {
        let id = space.id as usize;
        if id >= MAX_OBJECT_SPACES {
            return Err(kind_err(Kind::Other, format!("object space id {} exceeds the maximum of {}", id, MAX_OBJECT_SPACES)));
        }
        if id >= self.spaces.len() {
            self.spaces.resize_with(id + 1, || None);
        }
        if self.spaces[id].is_some() {
            return Err(kind_err(Kind::Other, format!("object space {} already exists", id)));
        }
        self.spaces[id] = Some(space);
        Ok(())
    }

    pub fn drop(&mut self, id: u32) -> Result<()> {
        let slot = self.spaces.get_mut(id as usize);
        match slot {
            Some(s @ Some(_)) => {
                *s = None;
                Ok(())
            }
            _ => Err(kind_err(Kind::NoSuchTable, format!("no object space {}", id))),
        }
    }

    pub fn get(&self, id: u32) -> Result<&ObjectSpace> {
        self.spaces
            .get(id as usize)
            .and_then(|s| s.as_ref())
            .ok_or_else(|| kind_err(Kind::NoSuchTable, format!("no object space {}", id)))
    }

    pub fn get_mut(&mut self, id: u32) -> Result<&mut ObjectSpace> {
        self.spaces
            .get_mut(id as usize)
            .and_then(|s| s.as_mut())
            .ok_or_else(|| kind_err(Kind::NoSuchTable, format!("no object space {}", id)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectSpace> {
        self.spaces.iter().filter_map(|s| s.as_ref())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::index::IndexConf;

    fn tup(a: &str, b: &str) -> Arc<Tuple> {
        Arc::new(Tuple::from_fields(&[a.as_bytes(), b.as_bytes()]))
    }

    fn pk() -> IndexConf {
        IndexConf { fields: vec![0], unique: true, partial: false }
    }

    #[test]
    fn insert_commit_then_delete_rollback() {
        let mut space = ObjectSpace::new(0, None, false, true, true, pk());
        let t = tup("1", "a");
        let plan = space.apply_op(OpId(1), None, Some(&t)).unwrap();
        space.fold_op(OpId(1), &plan);
        assert_eq!(space.primary().len(), 1);

        let plan2 = space.apply_op(OpId(2), Some(&t), None).unwrap();
        space.unbind_op(OpId(2), &plan2);
        // rollback restores the previously-committed tuple
        let key = space.primary().derive_key(&t).unwrap();
        assert!(space.primary().visible_right(&key).is_some());
    }

    #[test]
    fn duplicate_key_rejected_before_any_binding() {
        let mut space = ObjectSpace::new(0, None, false, true, true, pk());
        let t = tup("1", "a");
        let plan = space.apply_op(OpId(1), None, Some(&t)).unwrap();
        space.fold_op(OpId(1), &plan);

        let dup = tup("1", "b");
        let err = space.apply_op(OpId(2), None, Some(&dup)).unwrap_err();
        assert_eq!(err.kind(), boxdb_base::Kind::DuplicateKey);
    }

    #[test]
    fn secondary_index_backfills_from_primary() {
        let mut space = ObjectSpace::new(0, None, false, true, true, pk());
        let t1 = tup("1", "x");
        let t2 = tup("2", "y");
        for (i, t) in [(1u64, &t1), (2u64, &t2)] {
            let plan = space.apply_op(OpId(i), None, Some(t)).unwrap();
            space.fold_op(OpId(i), &plan);
        }
        let sec = IndexConf { fields: vec![1], unique: true, partial: false };
        let idx = space.create_index(sec).unwrap();
        assert_eq!(space.index(idx).unwrap().len(), 2);
    }

    #[test]
    fn cardinality_mismatch_rejected() {
        let mut space = ObjectSpace::new(0, Some(3), false, true, true, pk());
        let t = tup("1", "a");
        let err = space.apply_op(OpId(1), None, Some(&t)).unwrap_err();
        assert_eq!(err.kind(), boxdb_base::Kind::CardinalityMismatch);
    }

    #[test]
    fn update_rewriting_secondary_field_rebinds_it() {
        let mut space = ObjectSpace::new(0, None, false, true, true, pk());
        let sec = IndexConf { fields: vec![1], unique: true, partial: false };
        space.create_index(sec).unwrap();

        let old = tup("1", "a");
        let plan = space.apply_op(OpId(1), None, Some(&old)).unwrap();
        space.fold_op(OpId(1), &plan);

        let new = tup("1", "b");
        let plan2 = space.apply_op(OpId(2), Some(&old), Some(&new)).unwrap();
        space.fold_op(OpId(2), &plan2);

        let sec_idx = space.index(1).unwrap();
        let old_key = sec_idx.derive_key(&old).unwrap();
        let new_key = sec_idx.derive_key(&new).unwrap();
        assert!(sec_idx.visible_right(&old_key).is_none());
        assert_eq!(sec_idx.visible_right(&new_key).unwrap().body(), new.body());
    }
}

#[cfg(test)]
mod proptest_invariants {
    use super::*;
    use crate::index::IndexConf;
    use proptest::collection::vec as prop_vec;
    use proptest::prelude::*;

    fn pk() -> IndexConf {
        IndexConf { fields: vec![0], unique: true, partial: false }
    }

    #[derive(Debug, Clone)]
    enum Step {
        Insert(u8, u8),
        Delete(u8),
    }

    fn steps_strategy() -> impl Strategy<Value = Vec<Step>> {
        prop_vec(
            prop_oneof![(0u8..4, 0u8..4).prop_map(|(k, v)| Step::Insert(k, v)), (0u8..4).prop_map(Step::Delete)],
            0..12,
        )
    }

    fn snapshot(space: &ObjectSpace) -> Vec<(Key, Vec<u8>)> {
        space.primary().iter_concrete().map(|(k, t)| (k.clone(), t.body().to_vec())).collect()
    }

    proptest! {
        // Invariant 3 ("rollback erases"): undoing every op of a single
        // simulated transaction, in reverse submission order, always
        // restores the exact pre-transaction index contents, regardless of
        // how the random op sequence mixed inserts and deletes on
        // overlapping keys.
        #[test]
        fn rollback_always_restores_pre_txn_state(steps in steps_strategy()) {
            let mut space = ObjectSpace::new(0, None, false, true, true, pk());
            let before = snapshot(&space);

            let mut applied = Vec::new();
            for (seq, step) in steps.iter().enumerate() {
                let op_id = OpId(seq as u64 + 1);
                let key_tuple = Tuple::from_fields(&[&[match step { Step::Insert(k, _) => *k, Step::Delete(k) => *k }]]);
                let key = space.primary().derive_key(&key_tuple).unwrap();
                let old = space.primary().visible_right(&key);
                let plan = match step {
                    Step::Insert(k, v) => {
                        let t = Arc::new(Tuple::from_fields(&[&[*k], &[*v]]));
                        space.apply_op(op_id, old.as_ref(), Some(&t)).unwrap()
                    }
                    Step::Delete(_) => match &old {
                        Some(t) => space.apply_op(op_id, Some(t), None).unwrap(),
                        None => Vec::new(),
                    },
                };
                applied.push((op_id, plan));
            }

            // Invariant 1 ("overlay occupancy") holds structurally: `Slot`
            // is an enum, so a key can never simultaneously be a concrete
            // tuple and an overlay. What's worth checking here is that
            // every key this sequence touched is mid-transaction bound to
            // exactly one overlay's worth of cells, i.e. `has_overlay`
            // agrees with "this key was touched and not yet folded".
            for (_, plan) in &applied {
                for (i, key) in plan {
                    prop_assert!(space.index(*i).unwrap().has_overlay(key));
                }
            }

            for (op_id, plan) in applied.iter().rev() {
                space.unbind_op(*op_id, plan);
            }
            prop_assert_eq!(snapshot(&space), before);
        }

        // Invariant 2 ("commit resolves"): folding every op of a simulated
        // transaction, in submission order, leaves no overlay behind at
        // any key the transaction touched.
        #[test]
        fn commit_always_resolves_every_overlay(steps in steps_strategy()) {
            let mut space = ObjectSpace::new(0, None, false, true, true, pk());

            let mut applied = Vec::new();
            for (seq, step) in steps.iter().enumerate() {
                let op_id = OpId(seq as u64 + 1);
                let key_tuple = Tuple::from_fields(&[&[match step { Step::Insert(k, _) => *k, Step::Delete(k) => *k }]]);
                let key = space.primary().derive_key(&key_tuple).unwrap();
                let old = space.primary().visible_right(&key);
                let plan = match step {
                    Step::Insert(k, v) => {
                        let t = Arc::new(Tuple::from_fields(&[&[*k], &[*v]]));
                        space.apply_op(op_id, old.as_ref(), Some(&t)).unwrap()
                    }
                    Step::Delete(_) => match &old {
                        Some(t) => space.apply_op(op_id, Some(t), None).unwrap(),
                        None => Vec::new(),
                    },
                };
                applied.push((op_id, plan));
            }

            for (op_id, plan) in &applied {
                space.fold_op(*op_id, plan);
            }

            for (_, plan) in &applied {
                for (i, key) in plan {
                    prop_assert!(!space.index(*i).unwrap().has_overlay(key));
                }
            }
        }
    }
}
