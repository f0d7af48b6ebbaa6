//! Lowering of a [`Model`] into a [`Program`].

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    rc::Rc,
    str::FromStr,
};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::{
    ast::{Definition, DefinitionError, Expr, LambdaId, Model},
    program::{Mutator, MutatorKind, Node, NodeId, Program, ProgramInner, ProgramNode},
    value::Value,
};

/// Evaluation strategy of a compiled program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Recompute every output from scratch on each refresh
    Simple,
    /// Dependency-tracked incremental recomputation
    #[default]
    Optimizing,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Simple => "simple",
            Backend::Optimizing => "optimizing",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Backend::Simple),
            "optimizing" => Ok(Backend::Optimizing),
            other => Err(format!(
                "unknown compiler `{}` (expected `simple` or `optimizing`)",
                other
            )),
        }
    }
}

/// Options accepted by [`compile`].
///
/// # Examples
///
/// ```
/// use derivo::{Backend, CompileOptions};
///
/// let options = CompileOptions::from_json(r#"{"compiler": "simple"}"#).unwrap();
/// assert_eq!(options.compiler, Backend::Simple);
/// assert_eq!(CompileOptions::default().compiler, Backend::Optimizing);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileOptions {
    pub compiler: Backend,
}

impl CompileOptions {
    pub fn new(compiler: Backend) -> Self {
        CompileOptions { compiler }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Errors raised while compiling a model.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("output `{output}` reads a lambda variable outside of its function")]
    UnboundVariable { output: String },

    #[error("output `{output}` reads `context` of a function declared without one")]
    MissingContext { output: String },

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("invalid model JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Default)]
struct Lowering {
    nodes: Vec<ProgramNode>,
    /// Lambdas whose `context` each node reads
    contexts: Vec<Rc<[LambdaId]>>,
    interned: HashMap<Node, NodeId>,
    lowered: HashMap<*const Expr, NodeId>,
    functions: BTreeSet<String>,
    output: String,
}

fn union(
    sets: impl IntoIterator<Item = Rc<[LambdaId]>>,
    without: Option<LambdaId>,
) -> Rc<[LambdaId]> {
    let mut all = BTreeSet::new();
    for set in sets {
        all.extend(set.iter().copied());
    }
    if let Some(id) = without {
        all.remove(&id);
    }
    all.into_iter().collect()
}

impl Lowering {
    fn free(&self, id: NodeId) -> Rc<[LambdaId]> {
        self.nodes[id.index()].free.clone()
    }

    fn intern(&mut self, node: Node) -> NodeId {
        if let Some(id) = self.interned.get(&node) {
            return *id;
        }

        let (free, contexts): (Rc<[LambdaId]>, Rc<[LambdaId]>) = match &node {
            Node::Val(l) | Node::Key(l) => (Rc::from([*l]), Rc::from([])),
            Node::Context(l) => (Rc::from([*l]), Rc::from([*l])),
            Node::Iterate {
                source,
                lambda,
                body,
                context,
                ..
            } => {
                let outer: Vec<NodeId> = std::iter::once(*source).chain(*context).collect();
                let free = union(
                    outer
                        .iter()
                        .map(|c| self.free(*c))
                        .chain([union([self.free(*body)], Some(*lambda))]),
                    None,
                );
                let contexts = union(
                    outer
                        .iter()
                        .map(|c| self.contexts[c.index()].clone())
                        .chain([union([self.contexts[body.index()].clone()], Some(*lambda))]),
                    None,
                );
                (free, contexts)
            }
            other => {
                let children = other.children();
                (
                    union(children.iter().map(|c| self.free(*c)), None),
                    union(children.iter().map(|c| self.contexts[c.index()].clone()), None),
                )
            }
        };
        let hoist = match &node {
            Node::Iterate { verb, .. } => verb.token().info().try_to_hoist,
            Node::Unary { op, .. } => op.token().info().try_to_hoist,
            _ => false,
        };

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(ProgramNode {
            node: node.clone(),
            free,
            hoist,
        });
        self.contexts.push(contexts);
        self.interned.insert(node, id);
        id
    }

    fn literal(&self, id: NodeId) -> Option<&Value> {
        match &self.nodes[id.index()].node {
            Node::Literal(v) => Some(v),
            _ => None,
        }
    }

    fn lower_all(&mut self, exprs: &[Expr]) -> Result<Vec<NodeId>, CompileError> {
        exprs.iter().map(|e| self.lower(e)).collect()
    }

    fn lower(&mut self, expr: &Expr) -> Result<NodeId, CompileError> {
        let ptr = expr as *const Expr;
        if let Some(id) = self.lowered.get(&ptr) {
            return Ok(*id);
        }

        let node = match expr {
            Expr::Root => Node::Root,
            Expr::Val(l) => Node::Val(*l),
            Expr::Key(l) => Node::Key(*l),
            Expr::Context(l) => Node::Context(*l),
            Expr::Literal(v) => Node::Literal(v.clone()),
            Expr::Array(items) => {
                let items = self.lower_all(items)?;
                let constant: Option<Vec<Value>> =
                    items.iter().map(|id| self.literal(*id).cloned()).collect();
                match constant {
                    Some(values) => Node::Literal(Value::array(values)),
                    None => Node::Array(items),
                }
            }
            Expr::Object(fields) => {
                let mut lowered = Vec::with_capacity(fields.len());
                for (name, e) in fields.iter() {
                    lowered.push((name.clone(), self.lower(e)?));
                }
                let constant: Option<crate::value::Map> = lowered
                    .iter()
                    .map(|(k, id)| self.literal(*id).map(|v| (k.clone(), v.clone())))
                    .collect();
                match constant {
                    Some(map) => Node::Literal(Value::object(map)),
                    None => Node::Object(lowered),
                }
            }
            Expr::Get { object, key } => Node::Get {
                object: self.lower(object)?,
                key: self.lower(key)?,
            },
            Expr::Iterate {
                verb,
                source,
                lambda,
            } => {
                let source = self.lower(source)?;
                let context = match &lambda.context {
                    Some(c) => Some(self.lower(c)?),
                    None => None,
                };
                let body = self.lower(&lambda.body)?;
                if context.is_none() && self.contexts[body.index()].contains(&lambda.id) {
                    return Err(CompileError::MissingContext {
                        output: self.output.clone(),
                    });
                }
                Node::Iterate {
                    verb: *verb,
                    source,
                    lambda: lambda.id,
                    body,
                    context,
                }
            }
            Expr::Unary { op, operand } => Node::Unary {
                op: *op,
                operand: self.lower(operand)?,
            },
            Expr::Range { end, start, step } => Node::Range {
                end: self.lower(end)?,
                start: self.lower(start)?,
                step: self.lower(step)?,
            },
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => Node::Ternary {
                condition: self.lower(condition)?,
                then: self.lower(then)?,
                otherwise: self.lower(otherwise)?,
            },
            Expr::And(items) => Node::And(self.lower_all(items)?),
            Expr::Or(items) => Node::Or(self.lower_all(items)?),
            Expr::Binary { op, left, right } => Node::Binary {
                op: *op,
                left: self.lower(left)?,
                right: self.lower(right)?,
            },
            Expr::Call {
                function,
                receiver,
                args,
            } => {
                self.functions.insert(function.to_string());
                let mut lowered = vec![self.lower(receiver)?];
                lowered.extend(self.lower_all(args)?);
                Node::Call {
                    function: function.clone(),
                    args: lowered,
                }
            }
        };

        let id = self.intern(node);
        self.lowered.insert(ptr, id);
        Ok(id)
    }
}

/// Compiles a model for the backend selected in `options`.
///
/// Structurally identical subtrees become a single node. Every `val`, `key`
/// and `context` must be bound by an enclosing function of the same output.
///
/// # Examples
///
/// ```
/// use derivo::{CompileOptions, FunctionLibrary, Model, Value, arg0, compile, root, setter};
///
/// let model = Model::new()
///     .with("doubled", root().map(|v, _| v.mult(2)))
///     .with("set", setter(&[arg0()]));
/// let program = compile(&model, CompileOptions::default()).unwrap();
///
/// let data = Value::array(vec![Value::Integer(1), Value::Integer(2)]);
/// let mut instance = program.instantiate(data, FunctionLibrary::new()).unwrap();
/// instance.set("set", &[Value::Integer(1), Value::Integer(5)]).unwrap();
/// assert_eq!(
///     instance.get("doubled"),
///     Some(&Value::array(vec![Value::Integer(2), Value::Integer(10)]))
/// );
/// ```
pub fn compile(model: &Model, options: CompileOptions) -> Result<Program, CompileError> {
    let mut lowering = Lowering::default();
    let mut outputs = Vec::new();
    let mut mutators = Vec::new();

    for (name, definition) in model.iter() {
        match definition {
            Definition::Expression(expr) => {
                lowering.output = name.to_string();
                let id = lowering.lower(expr)?;
                if !lowering.free(id).is_empty() {
                    return Err(CompileError::UnboundVariable {
                        output: name.to_string(),
                    });
                }
                outputs.push((name.to_string(), id));
            }
            Definition::Setter(setter) => mutators.push((
                name.to_string(),
                Mutator {
                    kind: MutatorKind::Set,
                    path: setter.path.clone(),
                    arity: setter.arity(),
                },
            )),
            Definition::Splice(splice) => mutators.push((
                name.to_string(),
                Mutator {
                    kind: MutatorKind::Splice,
                    path: splice.path.clone(),
                    arity: splice.arity(),
                },
            )),
        }
    }

    debug!(
        backend = %options.compiler,
        nodes = lowering.nodes.len(),
        outputs = outputs.len(),
        mutators = mutators.len(),
        "compiled model"
    );

    Ok(Program::new(ProgramInner {
        backend: options.compiler,
        nodes: lowering.nodes,
        outputs,
        mutators,
        functions: lowering.functions,
    }))
}

/// Reads a JSON model definition and compiles it.
pub fn compile_json(json: &str, options: CompileOptions) -> Result<Program, CompileError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let model = Model::from_json(&value)?;
    compile(&model, options)
}
