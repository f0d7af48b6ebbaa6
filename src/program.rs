//! Compiled form of a model.

use std::{collections::BTreeSet, fmt, rc::Rc};

use crate::{
    ast::{BinOp, Collection, LambdaId, PathSegment, UnaryOp},
    compiler::Backend,
    library::FunctionLibrary,
    runtime::{Instance, RuntimeError},
    value::Value,
};

/// Index of a node in a [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One lowered, hash-consed expression node. Children are node ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Root,
    Literal(Value),
    Array(Vec<NodeId>),
    Object(Vec<(String, NodeId)>),
    Val(LambdaId),
    Key(LambdaId),
    Context(LambdaId),
    Get {
        object: NodeId,
        key: NodeId,
    },
    Iterate {
        verb: Collection,
        source: NodeId,
        lambda: LambdaId,
        body: NodeId,
        context: Option<NodeId>,
    },
    Unary {
        op: UnaryOp,
        operand: NodeId,
    },
    Range {
        end: NodeId,
        start: NodeId,
        step: NodeId,
    },
    Ternary {
        condition: NodeId,
        then: NodeId,
        otherwise: NodeId,
    },
    And(Vec<NodeId>),
    Or(Vec<NodeId>),
    Binary {
        op: BinOp,
        left: NodeId,
        right: NodeId,
    },
    /// Library call; `args[0]` is the receiver
    Call {
        function: Rc<str>,
        args: Vec<NodeId>,
    },
}

impl Node {
    /// Child nodes in evaluation order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Node::Root | Node::Literal(_) | Node::Val(_) | Node::Key(_) | Node::Context(_) => {
                Vec::new()
            }
            Node::Array(items) | Node::And(items) | Node::Or(items) => items.clone(),
            Node::Object(fields) => fields.iter().map(|(_, id)| *id).collect(),
            Node::Get { object, key } => vec![*object, *key],
            Node::Iterate {
                source,
                body,
                context,
                ..
            } => {
                let mut out = vec![*source];
                out.extend(*context);
                out.push(*body);
                out
            }
            Node::Unary { operand, .. } => vec![*operand],
            Node::Range { end, start, step } => vec![*end, *start, *step],
            Node::Ternary {
                condition,
                then,
                otherwise,
            } => vec![*condition, *then, *otherwise],
            Node::Binary { left, right, .. } => vec![*left, *right],
            Node::Call { args, .. } => args.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgramNode {
    pub node: Node,
    /// Lambdas whose `val`, `key` or `context` this subtree reads, sorted
    pub free: Rc<[LambdaId]>,
    /// Memoised per binding of `free` within a pass
    pub hoist: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutatorKind {
    Set,
    Splice,
}

/// A compiled setter or splice.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutator {
    pub kind: MutatorKind,
    pub path: Vec<PathSegment>,
    /// Positional arguments the path consumes
    pub arity: usize,
}

#[derive(Debug)]
pub(crate) struct ProgramInner {
    pub(crate) backend: Backend,
    pub(crate) nodes: Vec<ProgramNode>,
    pub(crate) outputs: Vec<(String, NodeId)>,
    pub(crate) mutators: Vec<(String, Mutator)>,
    pub(crate) functions: BTreeSet<String>,
}

/// A compiled model, instantiable any number of times.
///
/// Cloning shares the compiled graph.
#[derive(Debug, Clone)]
pub struct Program {
    inner: Rc<ProgramInner>,
}

impl Program {
    pub(crate) fn new(inner: ProgramInner) -> Self {
        Program {
            inner: Rc::new(inner),
        }
    }

    pub fn backend(&self) -> Backend {
        self.inner.backend
    }

    pub fn node(&self, id: NodeId) -> &ProgramNode {
        &self.inner.nodes[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.inner.nodes.len()
    }

    /// Outputs in name order.
    pub fn outputs(&self) -> &[(String, NodeId)] {
        &self.inner.outputs
    }

    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.inner.outputs.iter().map(|(name, _)| name.as_str())
    }

    pub fn mutator(&self, name: &str) -> Option<&Mutator> {
        self.inner
            .mutators
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m)
    }

    pub fn mutator_names(&self) -> impl Iterator<Item = &str> {
        self.inner.mutators.iter().map(|(name, _)| name.as_str())
    }

    /// Names of every library function the program calls.
    pub fn functions(&self) -> &BTreeSet<String> {
        &self.inner.functions
    }

    /// Creates a live instance over `initial`.
    ///
    /// Fails with [`RuntimeError::UnknownFunction`] when the program calls a
    /// function `library` lacks, or with [`RuntimeError::Eval`] when the
    /// first refresh fails.
    pub fn instantiate(
        &self,
        initial: Value,
        library: FunctionLibrary,
    ) -> Result<Instance, RuntimeError> {
        Instance::new(self.clone(), initial, library)
    }
}
