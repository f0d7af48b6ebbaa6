//! Simple backend: every refresh walks every output from scratch.
//!
//! Within one pass, collection verbs and calls are memoised per node and per
//! identity of the lambda bindings they read. An element binding is
//! identified by the iteration that produced it and its key, so two equal
//! elements at different positions stay distinct. Nothing survives between
//! passes.

use std::{collections::HashMap, rc::Rc};

use tracing::trace;

use crate::{
    ast::LambdaId,
    library::FunctionLibrary,
    ops::{self, EvalError},
    program::{Node, NodeId, Program},
    runtime::{Engine, RefreshStats},
    value::Value,
};

/// Binding of one lambda during iteration.
struct Scope {
    lambda: LambdaId,
    val: Value,
    key: Value,
    context: Option<Value>,
    /// Identity of this binding within the pass
    id: u32,
}

type Env = [Rc<Scope>];

fn unbound(lambda: LambdaId) -> EvalError {
    EvalError::InvalidArgument(format!("lambda #{} is not bound here", lambda.index()))
}

fn lookup(env: &Env, lambda: LambdaId) -> Result<&Scope, EvalError> {
    env.iter()
        .rev()
        .find(|s| s.lambda == lambda)
        .map(|s| s.as_ref())
        .ok_or_else(|| unbound(lambda))
}

struct Pass<'a> {
    program: &'a Program,
    library: &'a FunctionLibrary,
    model: &'a Value,
    memo: HashMap<(NodeId, Vec<u32>), Value>,
    scopes: HashMap<(NodeId, Vec<u32>, Value), u32>,
    stats: RefreshStats,
}

impl<'a> Pass<'a> {
    fn new(program: &'a Program, library: &'a FunctionLibrary, model: &'a Value) -> Self {
        Pass {
            program,
            library,
            model,
            memo: HashMap::new(),
            scopes: HashMap::new(),
            stats: RefreshStats::default(),
        }
    }

    /// Binding identities of the lambdas `id` reads.
    fn identity(&self, id: NodeId, env: &Env) -> Vec<u32> {
        self.program
            .node(id)
            .free
            .iter()
            .filter_map(|l| lookup(env, *l).ok().map(|s| s.id))
            .collect()
    }

    fn scope_id(&mut self, iteration: NodeId, outer: &[u32], key: &Value) -> u32 {
        let next = self.scopes.len() as u32;
        *self
            .scopes
            .entry((iteration, outer.to_vec(), key.clone()))
            .or_insert(next)
    }

    fn eval(&mut self, id: NodeId, env: &Env) -> Result<Value, EvalError> {
        let program = self.program;
        let node = program.node(id);
        let memoised = node.hoist || matches!(node.node, Node::Call { .. });
        if !memoised {
            return self.compute(id, &node.node, env);
        }

        let key = (id, self.identity(id, env));
        if let Some(value) = self.memo.get(&key) {
            return Ok(value.clone());
        }
        let value = self.compute(id, &node.node, env)?;
        self.memo.insert(key, value.clone());
        Ok(value)
    }

    fn eval_all(&mut self, ids: &[NodeId], env: &Env) -> Result<Vec<Value>, EvalError> {
        ids.iter().map(|id| self.eval(*id, env)).collect()
    }

    fn compute(&mut self, id: NodeId, node: &'a Node, env: &Env) -> Result<Value, EvalError> {
        self.stats.evaluated += 1;
        match node {
            Node::Root => Ok(self.model.clone()),
            Node::Literal(v) => Ok(v.clone()),
            Node::Array(items) => Ok(Value::array(self.eval_all(items, env)?)),
            Node::Object(fields) => {
                let mut map = crate::value::Map::new();
                for (name, field) in fields {
                    map.insert(name.clone(), self.eval(*field, env)?);
                }
                Ok(Value::object(map))
            }
            Node::Val(l) => Ok(lookup(env, *l)?.val.clone()),
            Node::Key(l) => Ok(lookup(env, *l)?.key.clone()),
            Node::Context(l) => lookup(env, *l)?.context.clone().ok_or_else(|| unbound(*l)),
            Node::Get { object, key } => {
                let object = self.eval(*object, env)?;
                let key = self.eval(*key, env)?;
                ops::get(&object, &key)
            }
            Node::Iterate {
                verb,
                source,
                lambda,
                body,
                context,
            } => {
                let source = self.eval(*source, env)?;
                let context = match context {
                    Some(c) => Some(self.eval(*c, env)?),
                    None => None,
                };
                let outer = self.identity(id, env);
                ops::iterate(*verb, &source, |key, element| {
                    let scope = Scope {
                        lambda: *lambda,
                        val: element.clone(),
                        key: key.clone(),
                        context: context.clone(),
                        id: self.scope_id(id, &outer, key),
                    };
                    let mut inner = env.to_vec();
                    inner.push(Rc::new(scope));
                    self.eval(*body, &inner)
                })
            }
            Node::Unary { op, operand } => {
                let operand = self.eval(*operand, env)?;
                ops::unary(*op, &operand)
            }
            Node::Range { end, start, step } => {
                let end = self.eval(*end, env)?;
                let start = self.eval(*start, env)?;
                let step = self.eval(*step, env)?;
                ops::range(&end, &start, &step)
            }
            Node::Ternary {
                condition,
                then,
                otherwise,
            } => {
                if self.eval(*condition, env)?.is_truthy() {
                    self.eval(*then, env)
                } else {
                    self.eval(*otherwise, env)
                }
            }
            Node::And(items) => {
                let mut last = Value::Boolean(true);
                for item in items {
                    last = self.eval(*item, env)?;
                    if !last.is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            Node::Or(items) => {
                let mut last = Value::Boolean(false);
                for item in items {
                    last = self.eval(*item, env)?;
                    if last.is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            Node::Binary { op, left, right } => {
                let left = self.eval(*left, env)?;
                let right = self.eval(*right, env)?;
                ops::binary(*op, &left, &right)
            }
            Node::Call { function, args } => {
                let args = self.eval_all(args, env)?;
                let f = self
                    .library
                    .get(function)
                    .ok_or_else(|| EvalError::UnknownFunction(function.to_string()))?;
                self.stats.calls += 1;
                Ok(f(&args))
            }
        }
    }
}

/// The simple backend.
pub(crate) struct Evaluator {
    program: Program,
    library: FunctionLibrary,
    stats: RefreshStats,
}

impl Evaluator {
    pub(crate) fn new(program: Program, library: FunctionLibrary) -> Self {
        Evaluator {
            program,
            library,
            stats: RefreshStats::default(),
        }
    }
}

impl Engine for Evaluator {
    fn refresh(&mut self, model: &Value) -> Result<Vec<Value>, EvalError> {
        let mut pass = Pass::new(&self.program, &self.library, model);
        let outputs = self
            .program
            .outputs()
            .iter()
            .map(|(_, id)| pass.eval(*id, &[]))
            .collect();
        self.stats = pass.stats;
        trace!(
            evaluated = self.stats.evaluated,
            calls = self.stats.calls,
            "full pass"
        );
        outputs
    }

    fn stats(&self) -> RefreshStats {
        self.stats
    }
}
