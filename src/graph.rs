//! Cell arena behind the optimizing backend.
//!
//! A cell is one memoised value: the model root, a node evaluated under
//! specific lambda bindings, or a slot (one key read out of another cell).
//! Cells record the cells they read, in order, and two revisions: when their
//! value last changed and when it was last known to be current.

use std::{collections::HashMap, rc::Rc};

use tracing::debug;

use crate::{ast::LambdaId, program::NodeId, value::Value};

/// Handle of a cell in a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct CellId(u32);

impl CellId {
    /// The model root, always present.
    pub(crate) const MODEL: CellId = CellId(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Recompute pass counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Revision(u64);

impl Revision {
    pub(crate) fn get(self) -> u64 {
        self.0
    }
}

/// Where a value comes from: a cell, or a constant needing no tracking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Handle {
    Cell(CellId),
    Const(Value),
}

/// What one lambda is bound to while its callback runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Binding {
    pub(crate) val: Handle,
    pub(crate) key: Value,
    pub(crate) context: Option<Handle>,
}

/// Bindings sorted by lambda id.
pub(crate) type Env = Rc<[(LambdaId, Binding)]>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum CellKey {
    Model,
    /// A node under the bindings of its free lambdas only
    Node { node: NodeId, env: Env },
    /// `get(source, key)`
    Slot { source: CellId, key: Value },
    /// Freed slot awaiting reuse
    Vacant,
}

impl CellKey {
    /// Cells this key refers to.
    fn references(&self, out: &mut Vec<CellId>) {
        match self {
            CellKey::Node { env, .. } => {
                for (_, binding) in env.iter() {
                    if let Handle::Cell(id) = binding.val {
                        out.push(id);
                    }
                    if let Some(Handle::Cell(id)) = binding.context {
                        out.push(id);
                    }
                }
            }
            CellKey::Slot { source, .. } => out.push(*source),
            CellKey::Model | CellKey::Vacant => {}
        }
    }
}

#[derive(Debug)]
pub(crate) struct Cell {
    pub(crate) key: CellKey,
    /// `None` until first computed
    pub(crate) value: Option<Value>,
    pub(crate) changed_at: Revision,
    pub(crate) verified_at: Revision,
    /// Cells read during the last computation, in read order
    pub(crate) deps: Vec<CellId>,
}

impl Cell {
    fn new(key: CellKey) -> Self {
        Cell {
            key,
            value: None,
            changed_at: Revision::default(),
            verified_at: Revision::default(),
            deps: Vec::new(),
        }
    }
}

/// Arena sizes below this never trigger a sweep.
const MIN_SWEEP: usize = 64;

pub(crate) struct Graph {
    cells: Vec<Cell>,
    free: Vec<CellId>,
    index: HashMap<CellKey, CellId>,
    revision: Revision,
    /// Live cells after the last sweep
    live: usize,
}

impl Graph {
    pub(crate) fn new() -> Self {
        let mut index = HashMap::new();
        index.insert(CellKey::Model, CellId::MODEL);
        Graph {
            cells: vec![Cell::new(CellKey::Model)],
            free: Vec::new(),
            index,
            revision: Revision::default(),
            live: 1,
        }
    }

    pub(crate) fn revision(&self) -> Revision {
        self.revision
    }

    /// Starts a new recompute pass.
    pub(crate) fn advance(&mut self) -> Revision {
        self.revision = Revision(self.revision.0 + 1);
        self.revision
    }

    /// Returns the cell for `key`, creating it on first use.
    pub(crate) fn intern(&mut self, key: CellKey) -> CellId {
        if let Some(id) = self.index.get(&key) {
            return *id;
        }
        let cell = Cell::new(key.clone());
        let id = match self.free.pop() {
            Some(id) => {
                self.cells[id.index()] = cell;
                id
            }
            None => {
                self.cells.push(cell);
                CellId(self.cells.len() as u32 - 1)
            }
        };
        self.index.insert(key, id);
        id
    }

    pub(crate) fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.index()]
    }

    pub(crate) fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        &mut self.cells[id.index()]
    }

    /// Stores the model for the current revision. An equal model keeps its
    /// previous `changed_at`.
    pub(crate) fn set_model(&mut self, model: Value) -> bool {
        let revision = self.revision;
        let cell = self.cell_mut(CellId::MODEL);
        let changed = cell.value.as_ref() != Some(&model);
        if changed {
            cell.value = Some(model);
            cell.changed_at = revision;
        }
        cell.verified_at = revision;
        changed
    }

    /// Live cells.
    pub(crate) fn len(&self) -> usize {
        self.cells.len() - self.free.len()
    }

    /// Whether the arena has doubled since the last sweep.
    pub(crate) fn wants_sweep(&self) -> bool {
        self.len() > 2 * self.live.max(MIN_SWEEP)
    }

    /// Frees every cell not reachable from `roots`, following dependencies
    /// and the cells named in keys. Returns the number of cells freed.
    pub(crate) fn sweep(&mut self, roots: &[CellId]) -> usize {
        let mut marked = vec![false; self.cells.len()];
        let mut stack: Vec<CellId> = roots.to_vec();
        stack.push(CellId::MODEL);
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut marked[id.index()], true) {
                continue;
            }
            let cell = &self.cells[id.index()];
            stack.extend(cell.deps.iter().copied());
            cell.key.references(&mut stack);
        }

        let mut freed = 0;
        for (i, live) in marked.into_iter().enumerate() {
            if live || self.cells[i].key == CellKey::Vacant {
                continue;
            }
            let dead = std::mem::replace(&mut self.cells[i], Cell::new(CellKey::Vacant));
            self.index.remove(&dead.key);
            self.free.push(CellId(i as u32));
            freed += 1;
        }
        self.live = self.len();
        debug!(freed, live = self.live, "swept cells");
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(source: CellId, key: i64) -> CellKey {
        CellKey::Slot {
            source,
            key: Value::Integer(key),
        }
    }

    #[test]
    fn test_intern_returns_the_same_cell() {
        let mut graph = Graph::new();
        let a = graph.intern(slot(CellId::MODEL, 0));
        let b = graph.intern(slot(CellId::MODEL, 0));
        let c = graph.intern(slot(CellId::MODEL, 1));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(graph.intern(CellKey::Model), CellId::MODEL);
    }

    #[test]
    fn test_equal_model_keeps_changed_at() {
        let mut graph = Graph::new();
        graph.advance();
        assert!(graph.set_model(Value::Integer(1)));
        let first = graph.cell(CellId::MODEL).changed_at;

        graph.advance();
        assert!(!graph.set_model(Value::Float(1.0)));
        assert_eq!(graph.cell(CellId::MODEL).changed_at, first);
        assert_eq!(graph.cell(CellId::MODEL).verified_at, graph.revision());
    }

    #[test]
    fn test_sweep_keeps_reachable_cells() {
        let mut graph = Graph::new();
        let root = graph.intern(slot(CellId::MODEL, 0));
        let dep = graph.intern(slot(CellId::MODEL, 1));
        let nested = graph.intern(CellKey::Slot {
            source: dep,
            key: Value::from("x"),
        });
        let orphan = graph.intern(slot(CellId::MODEL, 2));
        graph.cell_mut(root).deps.push(nested);

        assert_eq!(graph.sweep(&[root]), 1);
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.cell(orphan).key, CellKey::Vacant);
        assert_ne!(graph.cell(dep).key, CellKey::Vacant);

        // freed ids are reused for new keys
        let reused = graph.intern(slot(CellId::MODEL, 3));
        assert_eq!(reused, orphan);
    }
}
