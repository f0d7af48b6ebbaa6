use std::{
    fmt,
    rc::Rc,
    sync::atomic::{AtomicU32, Ordering},
};

use thiserror::Error;

use crate::{
    ast::{BinOp, Collection, Token, UnaryOp, verbs::VARIADIC},
    value::Value,
};

/// Identity of one lambda.
///
/// `val`, `key` and `context` references carry the id of the lambda they
/// belong to, so a callback that captures an outer lambda's element handle
/// keeps referring to that outer element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LambdaId(u32);

static NEXT_LAMBDA: AtomicU32 = AtomicU32::new(0);

impl LambdaId {
    /// Allocates an id never handed out before in this process.
    pub fn fresh() -> Self {
        LambdaId(NEXT_LAMBDA.fetch_add(1, Ordering::Relaxed))
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// Callback of a collection verb.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub id: LambdaId,
    pub body: Expr,
    /// Evaluated once per iteration in the enclosing scope, read via `context`.
    pub context: Option<Expr>,
}

impl Lambda {
    /// Builds a lambda from a callback receiving the element and key handles.
    pub fn new<F, E>(f: F) -> Self
    where
        F: FnOnce(Expr, Expr) -> E,
        E: Into<Expr>,
    {
        let id = LambdaId::fresh();
        let body = f(Expr::Val(id), Expr::Key(id)).into();
        Lambda { id, body, context: None }
    }

    /// Builds a lambda that also receives a context handle.
    pub fn with_context<F, E>(context: Expr, f: F) -> Self
    where
        F: FnOnce(Expr, Expr, Expr) -> E,
        E: Into<Expr>,
    {
        let id = LambdaId::fresh();
        let body = f(Expr::Val(id), Expr::Key(id), Expr::Context(id)).into();
        Lambda {
            id,
            body,
            context: Some(context),
        }
    }
}

/// Immutable expression tree.
///
/// Children sit behind `Rc`, so cloning an expression or embedding it in a
/// larger one is O(1) and shares structure. Expressions are never mutated
/// after construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // References
    /// The data model root
    Root,

    /// Current element of the lambda
    Val(LambdaId),

    /// Current key (array index or object field) of the lambda
    Key(LambdaId),

    /// Context value of the lambda
    Context(LambdaId),

    // Literals
    /// Constant value
    Literal(Value),

    /// Array literal whose members are expressions
    Array(Rc<[Expr]>),

    /// Object literal whose values are expressions
    Object(Rc<[(String, Expr)]>),

    // Verbs
    /// Field or index access
    Get { object: Rc<Expr>, key: Rc<Expr> },

    /// Collection verb applied to a source through a lambda
    Iterate {
        verb: Collection,
        source: Rc<Expr>,
        lambda: Rc<Lambda>,
    },

    Unary { op: UnaryOp, operand: Rc<Expr> },

    /// `[start, start + step, ...)` up to the exclusive `end`
    Range {
        end: Rc<Expr>,
        start: Rc<Expr>,
        step: Rc<Expr>,
    },

    Ternary {
        condition: Rc<Expr>,
        then: Rc<Expr>,
        otherwise: Rc<Expr>,
    },

    And(Rc<[Expr]>),

    Or(Rc<[Expr]>),

    Binary {
        op: BinOp,
        left: Rc<Expr>,
        right: Rc<Expr>,
    },

    /// Library function call on the receiver, followed by extra arguments
    Call {
        function: Rc<str>,
        receiver: Rc<Expr>,
        args: Rc<[Expr]>,
    },
}

/// One operand of the flat token form.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Expr(Expr),
    Func(Rc<Lambda>),
}

impl From<Expr> for Operand {
    fn from(e: Expr) -> Self {
        Operand::Expr(e)
    }
}

impl From<Lambda> for Operand {
    fn from(l: Lambda) -> Self {
        Operand::Func(Rc::new(l))
    }
}

/// Errors raised while building an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DefinitionError {
    #[error("`{token}` takes {expected} tokens, got {found}")]
    Arity {
        token: Token,
        expected: String,
        found: usize,
    },

    #[error("`{0}` is a terminal reference and cannot be chained onto")]
    NotAVerb(Token),

    #[error("`{0}` is not a chain method")]
    NotChainable(Token),

    #[error("`{0}` is internal and cannot be used in definitions")]
    PrivateToken(Token),

    #[error("`{0}` expects a function as its callback operand")]
    ExpectedFunction(Token),

    #[error("a function is only valid as the callback of a collection verb, found in `{0}`")]
    UnexpectedFunction(Token),

    #[error("unknown verb `{0}`")]
    UnknownVerb(String),

    #[error("invalid operand for `{token}`: {message}")]
    InvalidOperand { token: Token, message: String },

    #[error("`{0}` is not bound by an enclosing function")]
    UnboundReference(Token),

    #[error("invalid setter path segment: {0}")]
    InvalidSegment(String),
}

fn arity_error(token: Token, found: usize) -> DefinitionError {
    let (min, max) = token.info().arity;
    let expected = if max == VARIADIC {
        format!("at least {}", min)
    } else if min == max {
        format!("exactly {}", min)
    } else {
        format!("{} to {}", min, max)
    };
    DefinitionError::Arity {
        token,
        expected,
        found,
    }
}

fn take_expr(
    token: Token,
    operands: &mut impl Iterator<Item = Operand>,
) -> Result<Expr, DefinitionError> {
    match operands.next() {
        Some(Operand::Expr(e)) => Ok(e),
        Some(Operand::Func(_)) => Err(DefinitionError::UnexpectedFunction(token)),
        None => Err(arity_error(token, 0)),
    }
}

fn take_optional(
    token: Token,
    operands: &mut impl Iterator<Item = Operand>,
    default: i64,
) -> Result<Expr, DefinitionError> {
    match operands.next() {
        Some(Operand::Expr(e)) => Ok(e),
        Some(Operand::Func(_)) => Err(DefinitionError::UnexpectedFunction(token)),
        None => Ok(Expr::Literal(Value::Integer(default))),
    }
}

fn take_rest(
    token: Token,
    operands: impl Iterator<Item = Operand>,
) -> Result<Rc<[Expr]>, DefinitionError> {
    operands
        .map(|op| match op {
            Operand::Expr(e) => Ok(e),
            Operand::Func(_) => Err(DefinitionError::UnexpectedFunction(token)),
        })
        .collect()
}

impl Expr {
    /// The token heading this expression's flat form, if it has one.
    pub fn token(&self) -> Option<Token> {
        Some(match self {
            Expr::Root => Token::Root,
            Expr::Val(_) => Token::Val,
            Expr::Key(_) => Token::Key,
            Expr::Context(_) => Token::Context,
            Expr::Literal(_) | Expr::Array(_) | Expr::Object(_) => return None,
            Expr::Get { .. } => Token::Get,
            Expr::Iterate { verb, .. } => verb.token(),
            Expr::Unary { op, .. } => op.token(),
            Expr::Range { .. } => Token::Range,
            Expr::Ternary { .. } => Token::Ternary,
            Expr::And(_) => Token::And,
            Expr::Or(_) => Token::Or,
            Expr::Binary { op, .. } => op.token(),
            Expr::Call { .. } => Token::Call,
        })
    }

    /// Flat token form of a verb expression: operands in token order, with
    /// the receiver at the descriptor's `chain_index`.
    ///
    /// Returns `None` for references and literals.
    pub fn flatten(&self) -> Option<(Token, Vec<Operand>)> {
        let e = |x: &Rc<Expr>| Operand::Expr(Expr::clone(x));
        let token = self.token()?;
        let operands = match self {
            Expr::Root | Expr::Val(_) | Expr::Key(_) | Expr::Context(_) => Vec::new(),
            Expr::Literal(_) | Expr::Array(_) | Expr::Object(_) => return None,
            Expr::Get { object, key } => vec![e(key), e(object)],
            Expr::Iterate { source, lambda, .. } => {
                let mut ops = vec![Operand::Func(lambda.clone()), e(source)];
                if let Some(ctx) = &lambda.context {
                    ops.push(Operand::Expr(ctx.clone()));
                }
                ops
            }
            Expr::Unary { operand, .. } => vec![e(operand)],
            Expr::Range { end, start, step } => vec![e(end), e(start), e(step)],
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => vec![e(condition), e(then), e(otherwise)],
            Expr::And(items) | Expr::Or(items) => {
                items.iter().cloned().map(Operand::Expr).collect()
            }
            Expr::Binary { left, right, .. } => vec![e(left), e(right)],
            Expr::Call {
                function,
                receiver,
                args,
            } => {
                let mut ops = vec![
                    Operand::Expr(Expr::Literal(Value::String(function.clone()))),
                    e(receiver),
                ];
                ops.extend(args.iter().cloned().map(Operand::Expr));
                ops
            }
        };
        Some((token, operands))
    }

    /// Builds a verb expression from its flat token form (head excluded).
    ///
    /// Validates the token against the descriptor table: private tokens,
    /// arity bounds, and the position of function operands.
    ///
    /// # Examples
    ///
    /// ```
    /// use derivo::{Expr, Operand, Token};
    ///
    /// let not_root = Expr::assemble(Token::Not, vec![Operand::Expr(Expr::Root)]).unwrap();
    /// assert_eq!(not_root.token(), Some(Token::Not));
    ///
    /// assert!(Expr::assemble(Token::Not, vec![]).is_err());
    /// ```
    pub fn assemble(token: Token, operands: Vec<Operand>) -> Result<Expr, DefinitionError> {
        let info = token.info();
        if info.private {
            return Err(DefinitionError::PrivateToken(token));
        }
        if !info.accepts_len(operands.len() + 1) {
            return Err(arity_error(token, operands.len() + 1));
        }
        let mut ops = operands.into_iter();

        if let Some(verb) = Collection::from_token(token) {
            let mut lambda = match ops.next() {
                Some(Operand::Func(l)) => l,
                _ => return Err(DefinitionError::ExpectedFunction(token)),
            };
            let source = take_expr(token, &mut ops)?;
            if let Some(context) = ops.next() {
                let context = match context {
                    Operand::Expr(c) => c,
                    Operand::Func(_) => return Err(DefinitionError::UnexpectedFunction(token)),
                };
                Rc::make_mut(&mut lambda).context = Some(context);
            }
            return Ok(Expr::Iterate {
                verb,
                source: Rc::new(source),
                lambda,
            });
        }
        if let Some(op) = UnaryOp::from_token(token) {
            let operand = take_expr(token, &mut ops)?;
            return Ok(Expr::Unary {
                op,
                operand: Rc::new(operand),
            });
        }
        if let Some(op) = BinOp::from_token(token) {
            let left = take_expr(token, &mut ops)?;
            let right = take_expr(token, &mut ops)?;
            return Ok(Expr::Binary {
                op,
                left: Rc::new(left),
                right: Rc::new(right),
            });
        }

        match token {
            Token::Root => Ok(Expr::Root),
            Token::Val | Token::Key | Token::Context => {
                Err(DefinitionError::UnboundReference(token))
            }
            Token::Arg0 | Token::Arg1 => Err(DefinitionError::InvalidOperand {
                token,
                message: "setter arguments are only valid in setter paths".to_string(),
            }),
            Token::And => Ok(Expr::And(take_rest(token, ops)?)),
            Token::Or => Ok(Expr::Or(take_rest(token, ops)?)),
            Token::Ternary => {
                let condition = take_expr(token, &mut ops)?;
                let then = take_expr(token, &mut ops)?;
                let otherwise = take_expr(token, &mut ops)?;
                Ok(Expr::Ternary {
                    condition: Rc::new(condition),
                    then: Rc::new(then),
                    otherwise: Rc::new(otherwise),
                })
            }
            Token::Get => {
                let key = take_expr(token, &mut ops)?;
                let object = take_expr(token, &mut ops)?;
                Ok(Expr::Get {
                    object: Rc::new(object),
                    key: Rc::new(key),
                })
            }
            Token::Range => {
                let end = take_expr(token, &mut ops)?;
                let start = take_optional(token, &mut ops, 0)?;
                let step = take_optional(token, &mut ops, 1)?;
                Ok(Expr::Range {
                    end: Rc::new(end),
                    start: Rc::new(start),
                    step: Rc::new(step),
                })
            }
            Token::Call => {
                let function = match take_expr(token, &mut ops)? {
                    Expr::Literal(Value::String(name)) => name,
                    other => {
                        return Err(DefinitionError::InvalidOperand {
                            token,
                            message: format!("function name must be a string literal, got {}", other),
                        });
                    }
                };
                let receiver = take_expr(token, &mut ops)?;
                Ok(Expr::Call {
                    function,
                    receiver: Rc::new(receiver),
                    args: take_rest(token, ops)?,
                })
            }
            _ => Err(DefinitionError::PrivateToken(token)),
        }
    }

    /// Chains `token` onto this expression.
    ///
    /// `args` are the operands other than the receiver, in token order; the
    /// receiver is inserted at the descriptor's `chain_index`.
    pub fn chain(self, token: Token, mut args: Vec<Operand>) -> Result<Expr, DefinitionError> {
        let info = token.info();
        if info.non_verb {
            return Err(DefinitionError::NotAVerb(token));
        }
        let Some(index) = info.chain_index else {
            return Err(DefinitionError::NotChainable(token));
        };
        let at = (index - 1).min(args.len());
        args.insert(at, Operand::Expr(self));
        Expr::assemble(token, args)
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, op: &Operand) -> fmt::Result {
    match op {
        Operand::Expr(e) => write!(f, "{}", e),
        Operand::Func(l) => write!(f, "(func#{} {})", l.id.index(), l.body),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Root => f.write_str("root"),
            Expr::Val(id) => write!(f, "val#{}", id.index()),
            Expr::Key(id) => write!(f, "key#{}", id.index()),
            Expr::Context(id) => write!(f, "context#{}", id.index()),
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Expr::Object(fields) => {
                f.write_str("{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{:?}: {}", k, v)?;
                }
                f.write_str("}")
            }
            _ => match self.flatten() {
                Some((token, operands)) => {
                    write!(f, "({}", token)?;
                    for op in &operands {
                        f.write_str(" ")?;
                        write_operand(f, op)?;
                    }
                    f.write_str(")")
                }
                None => Ok(()),
            },
        }
    }
}
