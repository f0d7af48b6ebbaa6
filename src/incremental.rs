//! Optimizing backend: dependency-tracked incremental recomputation.
//!
//! Every composite node evaluates into a cell keyed by the node and the
//! bindings of the lambdas it actually reads, so a subtree that ignores an
//! enclosing lambda is computed once for the whole iteration. `get` and
//! element bindings are slot cells on their source, so a write to one
//! element only reaches the readers of that element.
//!
//! Reading a cell first re-verifies its recorded dependencies in read order.
//! The cell is recomputed only if one of them changed after the cell was
//! last verified, and a recomputed value equal to the previous one keeps its
//! old `changed_at`, which stops the change from propagating further.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::{
    ast::LambdaId,
    graph::{Binding, CellId, CellKey, Env, Graph, Handle},
    library::FunctionLibrary,
    ops::{self, EvalError},
    program::{Node, NodeId, Program},
    runtime::{Engine, RefreshStats},
    value::{Map, Value},
};

type Bindings = [(LambdaId, Binding)];

fn binding(env: &Bindings, lambda: LambdaId) -> Result<&Binding, EvalError> {
    env.iter()
        .find(|(l, _)| *l == lambda)
        .map(|(_, b)| b)
        .ok_or_else(|| {
            EvalError::InvalidArgument(format!("lambda #{} is not bound here", lambda.index()))
        })
}

/// `env` plus `lambda` bound to `binding`, kept sorted by lambda id.
fn extend(env: &Bindings, lambda: LambdaId, binding: Binding) -> Vec<(LambdaId, Binding)> {
    let mut out = Vec::with_capacity(env.len() + 1);
    out.extend(env.iter().filter(|(l, _)| *l != lambda).cloned());
    let at = out.partition_point(|(l, _)| *l < lambda);
    out.insert(at, (lambda, binding));
    out
}

/// The optimizing backend.
pub(crate) struct Incremental {
    program: Program,
    library: FunctionLibrary,
    graph: Graph,
    /// Dependencies recorded by the cells being computed, innermost last
    frames: Vec<Vec<CellId>>,
    stats: RefreshStats,
}

impl Incremental {
    pub(crate) fn new(program: Program, library: FunctionLibrary) -> Self {
        Incremental {
            program,
            library,
            graph: Graph::new(),
            frames: Vec::new(),
            stats: RefreshStats::default(),
        }
    }

    /// `env` restricted to the lambdas `node` reads.
    fn restrict(&self, node: NodeId, env: &Bindings) -> Env {
        let free = &self.program.node(node).free;
        env.iter()
            .filter(|(l, _)| free.contains(l))
            .cloned()
            .collect()
    }

    fn handle(&mut self, id: NodeId, env: &Bindings) -> Result<Handle, EvalError> {
        let program = self.program.clone();
        match &program.node(id).node {
            Node::Literal(v) => Ok(Handle::Const(v.clone())),
            Node::Root => Ok(Handle::Cell(CellId::MODEL)),
            Node::Val(l) => Ok(binding(env, *l)?.val.clone()),
            Node::Key(l) => Ok(Handle::Const(binding(env, *l)?.key.clone())),
            Node::Context(l) => binding(env, *l)?.context.clone().ok_or_else(|| {
                EvalError::InvalidArgument(format!("lambda #{} has no context", l.index()))
            }),
            Node::Get { object, key } => {
                let object = self.handle(*object, env)?;
                let key = self.read_node(*key, env)?;
                match object {
                    Handle::Cell(source) => Ok(Handle::Cell(
                        self.graph.intern(CellKey::Slot { source, key }),
                    )),
                    Handle::Const(value) => Ok(Handle::Const(ops::get(&value, &key)?)),
                }
            }
            _ => {
                let env = self.restrict(id, env);
                Ok(Handle::Cell(self.graph.intern(CellKey::Node { node: id, env })))
            }
        }
    }

    fn read(&mut self, handle: &Handle) -> Result<Value, EvalError> {
        match handle {
            Handle::Const(v) => Ok(v.clone()),
            Handle::Cell(id) => self.pull(*id),
        }
    }

    fn read_node(&mut self, id: NodeId, env: &Bindings) -> Result<Value, EvalError> {
        let handle = self.handle(id, env)?;
        self.read(&handle)
    }

    /// Brings a cell up to date and records it as a dependency of the cell
    /// being computed.
    fn pull(&mut self, id: CellId) -> Result<Value, EvalError> {
        self.verify(id)?;
        if let Some(frame) = self.frames.last_mut() {
            frame.push(id);
        }
        Ok(self.graph.cell(id).value.clone().unwrap_or_default())
    }

    fn verify(&mut self, id: CellId) -> Result<(), EvalError> {
        let revision = self.graph.revision();
        let cell = self.graph.cell(id);
        if cell.key == CellKey::Model {
            return Ok(());
        }
        if cell.value.is_some() {
            if cell.verified_at == revision {
                return Ok(());
            }
            let verified_at = cell.verified_at;
            let deps = cell.deps.clone();
            let mut stale = false;
            for dep in deps {
                self.verify(dep)?;
                if self.graph.cell(dep).changed_at > verified_at {
                    stale = true;
                    break;
                }
            }
            if !stale {
                self.graph.cell_mut(id).verified_at = revision;
                return Ok(());
            }
        }
        self.recompute(id)
    }

    /// A failed computation leaves the cell as it was, so it is retried on
    /// the next read.
    fn recompute(&mut self, id: CellId) -> Result<(), EvalError> {
        let key = self.graph.cell(id).key.clone();
        self.frames.push(Vec::new());
        let result = self.compute(&key);
        let deps = self.frames.pop().unwrap_or_default();
        let value = result?;

        let revision = self.graph.revision();
        let cell = self.graph.cell_mut(id);
        let changed = cell.value.as_ref() != Some(&value);
        if changed {
            cell.value = Some(value);
            cell.changed_at = revision;
        }
        cell.verified_at = revision;
        cell.deps = deps;
        self.stats.evaluated += 1;
        trace!(cell = ?id, changed, "recomputed");
        Ok(())
    }

    fn compute(&mut self, key: &CellKey) -> Result<Value, EvalError> {
        match key {
            CellKey::Slot { source, key } => {
                let source = self.pull(*source)?;
                ops::get(&source, key)
            }
            CellKey::Node { node, env } => self.eval(*node, env),
            CellKey::Model | CellKey::Vacant => Ok(self
                .graph
                .cell(CellId::MODEL)
                .value
                .clone()
                .unwrap_or_default()),
        }
    }

    fn eval(&mut self, id: NodeId, env: &Bindings) -> Result<Value, EvalError> {
        let program = self.program.clone();
        match &program.node(id).node {
            Node::Root
            | Node::Literal(_)
            | Node::Val(_)
            | Node::Key(_)
            | Node::Context(_)
            | Node::Get { .. } => self.read_node(id, env),
            Node::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.read_node(*item, env)?);
                }
                Ok(Value::array(out))
            }
            Node::Object(fields) => {
                let mut map = Map::new();
                for (name, field) in fields {
                    map.insert(name.clone(), self.read_node(*field, env)?);
                }
                Ok(Value::object(map))
            }
            Node::Iterate {
                verb,
                source,
                lambda,
                body,
                context,
            } => {
                let source = self.handle(*source, env)?;
                let items = self.read(&source)?;
                let context = match context {
                    Some(c) => {
                        let handle = self.handle(*c, env)?;
                        self.read(&handle)?;
                        Some(handle)
                    }
                    None => None,
                };
                ops::iterate(*verb, &items, |key, element| {
                    let val = match &source {
                        Handle::Cell(source) => Handle::Cell(self.graph.intern(CellKey::Slot {
                            source: *source,
                            key: key.clone(),
                        })),
                        Handle::Const(_) => Handle::Const(element.clone()),
                    };
                    let inner = extend(
                        env,
                        *lambda,
                        Binding {
                            val,
                            key: key.clone(),
                            context: context.clone(),
                        },
                    );
                    self.read_node(*body, &inner)
                })
            }
            Node::Unary { op, operand } => {
                let operand = self.read_node(*operand, env)?;
                ops::unary(*op, &operand)
            }
            Node::Range { end, start, step } => {
                let end = self.read_node(*end, env)?;
                let start = self.read_node(*start, env)?;
                let step = self.read_node(*step, env)?;
                ops::range(&end, &start, &step)
            }
            Node::Ternary {
                condition,
                then,
                otherwise,
            } => {
                if self.read_node(*condition, env)?.is_truthy() {
                    self.read_node(*then, env)
                } else {
                    self.read_node(*otherwise, env)
                }
            }
            Node::And(items) => {
                let mut last = Value::Boolean(true);
                for item in items {
                    last = self.read_node(*item, env)?;
                    if !last.is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            Node::Or(items) => {
                let mut last = Value::Boolean(false);
                for item in items {
                    last = self.read_node(*item, env)?;
                    if last.is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            Node::Binary { op, left, right } => {
                let left = self.read_node(*left, env)?;
                let right = self.read_node(*right, env)?;
                ops::binary(*op, &left, &right)
            }
            Node::Call { function, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.read_node(*arg, env)?);
                }
                let f = self
                    .library
                    .get(function)
                    .ok_or_else(|| EvalError::UnknownFunction(function.to_string()))?;
                self.stats.calls += 1;
                Ok(f(&values))
            }
        }
    }
}

impl Engine for Incremental {
    fn refresh(&mut self, model: &Value) -> Result<Vec<Value>, EvalError> {
        self.stats = RefreshStats::default();
        let revision = self.graph.advance();
        let changed = self.graph.set_model(model.clone());

        let program = self.program.clone();
        let mut roots = Vec::with_capacity(program.outputs().len());
        let mut outputs = Vec::with_capacity(program.outputs().len());
        for (_, node) in program.outputs() {
            let id = self.graph.intern(CellKey::Node {
                node: *node,
                env: Rc::from([]),
            });
            roots.push(id);
            outputs.push(self.pull(id)?);
        }

        if self.graph.wants_sweep() {
            self.graph.sweep(&roots);
        }
        debug!(
            revision = revision.get(),
            model_changed = changed,
            evaluated = self.stats.evaluated,
            calls = self.stats.calls,
            cells = self.graph.len(),
            "incremental refresh"
        );
        Ok(outputs)
    }

    fn stats(&self) -> RefreshStats {
        self.stats
    }
}
