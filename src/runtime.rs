//! Live instances: model, outputs, mutators and batching.

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    compiler::Backend,
    evaluator::Evaluator,
    incremental::Incremental,
    library::FunctionLibrary,
    ops::EvalError,
    path::{self, PathError},
    program::{Mutator, MutatorKind, Program},
    value::{Map, Value},
};

/// Errors raised by an [`Instance`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("unknown mutator `{0}`")]
    UnknownMutator(String),

    #[error("`{name}` takes {expected} arguments, got {found}")]
    ArgumentCount {
        name: String,
        expected: String,
        found: usize,
    },

    #[error("invalid argument for `{name}`: {message}")]
    InvalidArgument { name: String, message: String },

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("a batch is already in progress")]
    BatchInProgress,

    #[error("no batch is in progress")]
    NoBatchInProgress,

    #[error("the function library does not define `{0}`")]
    UnknownFunction(String),
}

/// Work done by the last recompute pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    /// Nodes or cells evaluated
    pub evaluated: usize,
    /// Library functions invoked
    pub calls: usize,
}

/// A recompute strategy.
pub(crate) trait Engine {
    /// Recomputes every output against `model`, in program output order.
    fn refresh(&mut self, model: &Value) -> Result<Vec<Value>, EvalError>;

    fn stats(&self) -> RefreshStats;
}

#[derive(Debug, Clone)]
enum BatchState {
    Idle,
    /// Holds the model as it was before the batch started
    Batching { snapshot: Value },
}

/// A live, mutable evaluation of a [`Program`].
///
/// Outputs are recomputed after every mutation, or once at the end of a
/// batch. A failed mutation or recompute leaves the instance as it was.
///
/// # Examples
///
/// ```
/// use derivo::{CompileOptions, FunctionLibrary, Model, Value, arg0, compile, root, setter};
///
/// let model = Model::new()
///     .with("total", root().get("a").plus(root().get("b")))
///     .with("set", setter(&[arg0()]));
/// let program = compile(&model, CompileOptions::default()).unwrap();
/// let initial = serde_json::json!({"a": 1, "b": 2});
/// let mut instance = program.instantiate(initial.into(), FunctionLibrary::new()).unwrap();
///
/// instance.start_batch().unwrap();
/// instance.set("set", &[Value::from("a"), Value::Integer(10)]).unwrap();
/// instance.set("set", &[Value::from("b"), Value::Integer(20)]).unwrap();
/// assert_eq!(instance.get("total"), Some(&Value::Integer(3)));
/// instance.end_batch().unwrap();
/// assert_eq!(instance.get("total"), Some(&Value::Integer(30)));
/// ```
pub struct Instance {
    program: Program,
    engine: Box<dyn Engine>,
    model: Value,
    outputs: Vec<Value>,
    batch: BatchState,
}

impl Instance {
    pub(crate) fn new(
        program: Program,
        initial: Value,
        library: FunctionLibrary,
    ) -> Result<Self, RuntimeError> {
        if let Some(missing) = program.functions().iter().find(|f| !library.contains(f)) {
            return Err(RuntimeError::UnknownFunction(missing.clone()));
        }
        let mut engine: Box<dyn Engine> = match program.backend() {
            Backend::Simple => Box::new(Evaluator::new(program.clone(), library)),
            Backend::Optimizing => Box::new(Incremental::new(program.clone(), library)),
        };
        let outputs = engine.refresh(&initial)?;
        debug!(
            backend = %program.backend(),
            outputs = outputs.len(),
            evaluated = engine.stats().evaluated,
            calls = engine.stats().calls,
            "instantiated"
        );
        Ok(Instance {
            program,
            engine,
            model: initial,
            outputs,
            batch: BatchState::Idle,
        })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    // ========================================
    // Outputs
    // ========================================

    /// Last committed value of an output.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.program
            .outputs()
            .iter()
            .position(|(n, _)| n == name)
            .map(|i| &self.outputs[i])
    }

    /// All outputs as one object.
    pub fn values(&self) -> Value {
        let map: Map = self
            .program
            .output_names()
            .zip(&self.outputs)
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        Value::object(map)
    }

    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.program.output_names()
    }

    pub fn mutator_names(&self) -> impl Iterator<Item = &str> {
        self.program.mutator_names()
    }

    /// The live model, including mutations of a batch in progress.
    pub fn model(&self) -> &Value {
        &self.model
    }

    pub fn last_refresh(&self) -> RefreshStats {
        self.engine.stats()
    }

    // ========================================
    // Mutators
    // ========================================

    fn mutator(&self, name: &str, kind: MutatorKind) -> Result<Mutator, RuntimeError> {
        match self.program.mutator(name) {
            Some(m) if m.kind == kind => Ok(m.clone()),
            Some(_) => Err(RuntimeError::InvalidArgument {
                name: name.to_string(),
                message: match kind {
                    MutatorKind::Set => "is a splice, not a setter".to_string(),
                    MutatorKind::Splice => "is a setter, not a splice".to_string(),
                },
            }),
            None => Err(RuntimeError::UnknownMutator(name.to_string())),
        }
    }

    /// Calls setter `name` with its path arguments followed by the value.
    pub fn set(&mut self, name: &str, args: &[Value]) -> Result<(), RuntimeError> {
        let mutator = self.mutator(name, MutatorKind::Set)?;
        let (value, path_args) = match args.split_last() {
            Some(split) if args.len() == mutator.arity + 1 => split,
            _ => {
                return Err(RuntimeError::ArgumentCount {
                    name: name.to_string(),
                    expected: format!("exactly {}", mutator.arity + 1),
                    found: args.len(),
                });
            }
        };
        let keys = path::resolve(&mutator.path, path_args)?;

        let mut next = self.model.clone();
        path::set(&mut next, &keys, value.clone())?;
        debug!(mutator = name, path = ?keys, "set");
        self.apply(next)
    }

    /// Calls splice `name`: removes `delete_count` elements at `start` of the
    /// array its path resolves to and inserts `items` there.
    pub fn splice(
        &mut self,
        name: &str,
        path_args: &[Value],
        start: i64,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Result<(), RuntimeError> {
        let mutator = self.mutator(name, MutatorKind::Splice)?;
        if path_args.len() != mutator.arity {
            return Err(RuntimeError::ArgumentCount {
                name: name.to_string(),
                expected: format!("{} path", mutator.arity),
                found: path_args.len(),
            });
        }
        let keys = path::resolve(&mutator.path, path_args)?;

        let mut next = self.model.clone();
        path::splice(&mut next, &keys, start, delete_count, items)?;
        debug!(mutator = name, path = ?keys, start, delete_count, "splice");
        self.apply(next)
    }

    /// Calls any mutator with flat arguments.
    ///
    /// Splices take their path arguments, then `start`, then an optional
    /// delete count (everything after `start` when omitted), then the items.
    pub fn invoke(&mut self, name: &str, args: &[Value]) -> Result<(), RuntimeError> {
        let mutator = self
            .program
            .mutator(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownMutator(name.to_string()))?;
        match mutator.kind {
            MutatorKind::Set => self.set(name, args),
            MutatorKind::Splice => {
                if args.len() <= mutator.arity {
                    return Err(RuntimeError::ArgumentCount {
                        name: name.to_string(),
                        expected: format!("at least {}", mutator.arity + 1),
                        found: args.len(),
                    });
                }
                let (path_args, rest) = args.split_at(mutator.arity);
                let invalid = |message: &str| RuntimeError::InvalidArgument {
                    name: name.to_string(),
                    message: message.to_string(),
                };
                let start = rest[0]
                    .as_int()
                    .ok_or_else(|| invalid("splice start must be an integer"))?;
                let delete_count = match rest.get(1) {
                    None => usize::MAX,
                    Some(count) => count
                        .as_int()
                        .map(|n| usize::try_from(n).unwrap_or(0))
                        .ok_or_else(|| invalid("splice delete count must be an integer"))?,
                };
                let items = rest.iter().skip(2).cloned().collect();
                self.splice(name, path_args, start, delete_count, items)
            }
        }
    }

    // ========================================
    // Batching
    // ========================================

    pub fn is_batching(&self) -> bool {
        matches!(self.batch, BatchState::Batching { .. })
    }

    /// Defers recomputation until [`end_batch`](Self::end_batch).
    pub fn start_batch(&mut self) -> Result<(), RuntimeError> {
        if self.is_batching() {
            return Err(RuntimeError::BatchInProgress);
        }
        debug!("batch started");
        self.batch = BatchState::Batching {
            snapshot: self.model.clone(),
        };
        Ok(())
    }

    /// Recomputes once for every mutation since [`start_batch`](Self::start_batch).
    ///
    /// On an evaluation error the model rolls back to its state before the
    /// batch.
    pub fn end_batch(&mut self) -> Result<(), RuntimeError> {
        let snapshot = match std::mem::replace(&mut self.batch, BatchState::Idle) {
            BatchState::Batching { snapshot } => snapshot,
            BatchState::Idle => return Err(RuntimeError::NoBatchInProgress),
        };
        debug!("batch ended");
        self.commit(snapshot)
    }

    /// Runs `f` inside a batch.
    ///
    /// If `f` fails, its mutations are discarded and the error is returned.
    pub fn batch<T, F>(&mut self, f: F) -> Result<T, RuntimeError>
    where
        F: FnOnce(&mut Self) -> Result<T, RuntimeError>,
    {
        self.start_batch()?;
        match f(self) {
            Ok(result) => {
                self.end_batch()?;
                Ok(result)
            }
            Err(e) => {
                if let BatchState::Batching { snapshot } =
                    std::mem::replace(&mut self.batch, BatchState::Idle)
                {
                    warn!(error = %e, "batch aborted");
                    self.model = snapshot;
                }
                Err(e)
            }
        }
    }

    // ========================================
    // Recompute
    // ========================================

    fn apply(&mut self, next: Value) -> Result<(), RuntimeError> {
        let previous = std::mem::replace(&mut self.model, next);
        if self.is_batching() {
            return Ok(());
        }
        self.commit(previous)
    }

    /// Recomputes outputs, restoring `rollback` if evaluation fails.
    fn commit(&mut self, rollback: Value) -> Result<(), RuntimeError> {
        match self.engine.refresh(&self.model) {
            Ok(outputs) => {
                self.outputs = outputs;
                let stats = self.engine.stats();
                debug!(evaluated = stats.evaluated, calls = stats.calls, "refreshed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "refresh failed, rolling back");
                self.model = rollback;
                match self.engine.refresh(&self.model) {
                    Ok(outputs) => self.outputs = outputs,
                    Err(again) => warn!(error = %again, "refresh after rollback failed"),
                }
                Err(RuntimeError::Eval(e))
            }
        }
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("backend", &self.program.backend())
            .field("model", &self.model)
            .field("outputs", &self.values())
            .field("batching", &self.is_batching())
            .finish()
    }
}
