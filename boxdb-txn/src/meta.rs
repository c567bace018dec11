// The metadata sub-machine: CREATE/DROP OBJECT_SPACE, CREATE/DROP INDEX,
// TRUNCATE. These reuse the same prepare/commit/rollback shape as a data
// transaction, but operate on the object space registry's structure
// instead of on tuples.

use boxdb_base::{kind_err, Kind, Result};
use boxdb_index::{IndexConf, ObjectSpace, ObjectSpaceRegistry};

#[derive(Debug, Clone)]
pub enum MetaOp {
    CreateObjectSpace { id: u32, cardinality: Option<u32>, ignored: bool, wal: bool, snap: bool, primary: IndexConf },
    DropObjectSpace { id: u32 },
    CreateIndex { table: u32, conf: IndexConf },
    DropIndex { table: u32, index: usize },
    Truncate { table: u32 },
}

/// What `commit`/`rollback` need after a successful `prepare`: enough
/// information to either apply the change for real, or to do nothing
/// (prepare never mutates the registry).
enum Prepared {
    CreateObjectSpace(ObjectSpace),
    DropObjectSpace { id: u32 },
    CreateIndex { table: u32, conf: IndexConf },
    DropIndex { table: u32, index: usize },
    Truncate { table: u32 },
}

pub struct MetaTxn {
    op: MetaOp,
    prepared: Option<Prepared>,
}

impl MetaTxn {
    pub fn new(op: MetaOp) -> MetaTxn {
        MetaTxn { op, prepared: None }
    }

    /// Validates feasibility without mutating the registry: the target
    /// table number must be free (create) or present (drop/truncate/index
    /// ops), and an index definition must parse (trivially true here,
    /// since `IndexConf` arrives already-structured).
    pub fn prepare(&mut self, registry: &ObjectSpaceRegistry) -> Result<()> {
        self.prepared = Some(match self.op.clone() {
            MetaOp::CreateObjectSpace { id, cardinality, ignored, wal, snap, primary } => {
                if registry.get(id).is_ok() {
                    return Err(kind_err(Kind::Other, format!("object space {} already exists", id)));
                }
                Prepared::CreateObjectSpace(ObjectSpace::new(id, cardinality, ignored, wal, snap, primary))
            }
            MetaOp::DropObjectSpace { id } => {
                registry.get(id)?;
                Prepared::DropObjectSpace { id }
            }
            MetaOp::CreateIndex { table, conf } => {
                registry.get(table)?;
                Prepared::CreateIndex { table, conf }
            }
            MetaOp::DropIndex { table, index } => {
                let space = registry.get(table)?;
                space.index(index)?;
                Prepared::DropIndex { table, index }
            }
            MetaOp::Truncate { table } => {
                registry.get(table)?;
                Prepared::Truncate { table }
            }
        });
        Ok(())
    }

    /// Makes the structural change. Only valid after a successful
    /// `prepare`.
    pub fn commit(&mut self, registry: &mut ObjectSpaceRegistry) -> Result<()> {
        match self.prepared.take() {
            Some(Prepared::CreateObjectSpace(space)) => registry.create(space),
            Some(Prepared::DropObjectSpace { id }) => registry.drop(id),
            Some(Prepared::CreateIndex { table, conf }) => {
                registry.get_mut(table)?.create_index(conf).map(|_| ())
            }
            Some(Prepared::DropIndex { table, index }) => registry.get_mut(table)?.drop_index(index),
            Some(Prepared::Truncate { table }) => {
                registry.get_mut(table)?.truncate();
                Ok(())
            }
            None => Err(kind_err(Kind::Other, "commit called before a successful prepare")),
        }
    }

    /// Discards prepared-but-uncommitted structure. Prepare never mutated
    /// the registry, so this only needs to drop the staged state.
    pub fn rollback(&mut self) {
        self.prepared = None;
    }
}
