//! Expression builder: the fluent front end for writing models.
//!
//! ```
//! use derivo::{Expr, arg0, or, root, setter};
//!
//! let labels = root().map(|item, _| or([item.get("label"), Expr::from("untitled")]));
//! let set = setter(&[arg0()]);
//! # let _ = (labels, set);
//! ```

use std::rc::Rc;

use crate::{
    ast::{
        BinOp, Collection, Expr, Lambda, PathSegment, SetterExpression, SpliceSetterExpression,
        UnaryOp,
    },
    value::{Map, Value},
};

/// The data model root.
pub fn root() -> Expr {
    Expr::Root
}

/// First positional setter argument.
pub fn arg0() -> PathSegment {
    PathSegment::Arg(0)
}

/// Second positional setter argument.
pub fn arg1() -> PathSegment {
    PathSegment::Arg(1)
}

/// Setter writing its last argument at `path`.
pub fn setter(path: &[PathSegment]) -> SetterExpression {
    SetterExpression::new(path.to_vec())
}

/// Splice of the array at `path`.
pub fn splice(path: &[PathSegment]) -> SpliceSetterExpression {
    SpliceSetterExpression::new(path.to_vec())
}

/// First falsy operand, else the last one.
pub fn and<I, E>(operands: I) -> Expr
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    Expr::And(operands.into_iter().map(Into::into).collect())
}

/// First truthy operand, else the last one.
pub fn or<I, E>(operands: I) -> Expr
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    Expr::Or(operands.into_iter().map(Into::into).collect())
}

impl Expr {
    /// Array literal whose members are expressions.
    pub fn array<I, E>(items: I) -> Expr
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::Array(items.into_iter().map(Into::into).collect())
    }

    /// Object literal whose values are expressions.
    pub fn object<I, K, E>(fields: I) -> Expr
    where
        I: IntoIterator<Item = (K, E)>,
        K: Into<String>,
        E: Into<Expr>,
    {
        Expr::Object(
            fields
                .into_iter()
                .map(|(k, e)| (k.into(), e.into()))
                .collect(),
        )
    }

    /// Applies a collection verb through a lambda that also sees `context`.
    pub fn iterate_with<C, F, E>(self, verb: Collection, context: C, f: F) -> Expr
    where
        C: Into<Expr>,
        F: FnOnce(Expr, Expr, Expr) -> E,
        E: Into<Expr>,
    {
        Expr::Iterate {
            verb,
            source: Rc::new(self),
            lambda: Rc::new(Lambda::with_context(context.into(), f)),
        }
    }

    fn iterate<F, E>(self, verb: Collection, f: F) -> Expr
    where
        F: FnOnce(Expr, Expr) -> E,
        E: Into<Expr>,
    {
        Expr::Iterate {
            verb,
            source: Rc::new(self),
            lambda: Rc::new(Lambda::new(f)),
        }
    }

    fn unary(self, op: UnaryOp) -> Expr {
        Expr::Unary {
            op,
            operand: Rc::new(self),
        }
    }

    fn binary(self, op: BinOp, other: impl Into<Expr>) -> Expr {
        Expr::Binary {
            op,
            left: Rc::new(self),
            right: Rc::new(other.into()),
        }
    }

    // ========================================
    // Collection verbs
    // ========================================

    pub fn map<F: FnOnce(Expr, Expr) -> E, E: Into<Expr>>(self, f: F) -> Expr {
        self.iterate(Collection::Map, f)
    }

    pub fn filter<F: FnOnce(Expr, Expr) -> E, E: Into<Expr>>(self, f: F) -> Expr {
        self.iterate(Collection::Filter, f)
    }

    pub fn any<F: FnOnce(Expr, Expr) -> E, E: Into<Expr>>(self, f: F) -> Expr {
        self.iterate(Collection::Any, f)
    }

    pub fn key_by<F: FnOnce(Expr, Expr) -> E, E: Into<Expr>>(self, f: F) -> Expr {
        self.iterate(Collection::KeyBy, f)
    }

    pub fn map_values<F: FnOnce(Expr, Expr) -> E, E: Into<Expr>>(self, f: F) -> Expr {
        self.iterate(Collection::MapValues, f)
    }

    pub fn map_keys<F: FnOnce(Expr, Expr) -> E, E: Into<Expr>>(self, f: F) -> Expr {
        self.iterate(Collection::MapKeys, f)
    }

    pub fn group_by<F: FnOnce(Expr, Expr) -> E, E: Into<Expr>>(self, f: F) -> Expr {
        self.iterate(Collection::GroupBy, f)
    }

    pub fn filter_by<F: FnOnce(Expr, Expr) -> E, E: Into<Expr>>(self, f: F) -> Expr {
        self.iterate(Collection::FilterBy, f)
    }

    pub fn any_values<F: FnOnce(Expr, Expr) -> E, E: Into<Expr>>(self, f: F) -> Expr {
        self.iterate(Collection::AnyValues, f)
    }

    // ========================================
    // Container verbs
    // ========================================

    pub fn values(self) -> Expr {
        self.unary(UnaryOp::Values)
    }

    pub fn keys(self) -> Expr {
        self.unary(UnaryOp::Keys)
    }

    pub fn assign(self) -> Expr {
        self.unary(UnaryOp::Assign)
    }

    pub fn defaults(self) -> Expr {
        self.unary(UnaryOp::Defaults)
    }

    pub fn size(self) -> Expr {
        self.unary(UnaryOp::Size)
    }

    /// `[start, start + 1, ...)` up to this expression (exclusive).
    pub fn range(self, start: impl Into<Expr>) -> Expr {
        self.range_by(start, 1)
    }

    pub fn range_by(self, start: impl Into<Expr>, step: impl Into<Expr>) -> Expr {
        Expr::Range {
            end: Rc::new(self),
            start: Rc::new(start.into()),
            step: Rc::new(step.into()),
        }
    }

    pub fn get(self, key: impl Into<Expr>) -> Expr {
        Expr::Get {
            object: Rc::new(self),
            key: Rc::new(key.into()),
        }
    }

    // ========================================
    // Scalars
    // ========================================

    pub fn not(self) -> Expr {
        self.unary(UnaryOp::Not)
    }

    pub fn ternary(self, then: impl Into<Expr>, otherwise: impl Into<Expr>) -> Expr {
        Expr::Ternary {
            condition: Rc::new(self),
            then: Rc::new(then.into()),
            otherwise: Rc::new(otherwise.into()),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn eq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinOp::Equal, other)
    }

    pub fn gt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinOp::GreaterThan, other)
    }

    pub fn lt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinOp::LessThan, other)
    }

    pub fn gte(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinOp::GreaterEqual, other)
    }

    pub fn lte(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinOp::LessEqual, other)
    }

    pub fn plus(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinOp::Add, other)
    }

    pub fn minus(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinOp::Subtract, other)
    }

    pub fn mult(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinOp::Multiply, other)
    }

    pub fn div(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinOp::Divide, other)
    }

    /// The `mod` verb.
    pub fn modulo(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinOp::Modulo, other)
    }

    /// Calls library function `name` with this value.
    pub fn call(self, name: &str) -> Expr {
        self.call_with(name, Vec::<Expr>::new())
    }

    /// Calls library function `name` with this value followed by `args`.
    pub fn call_with<I, E>(self, name: &str, args: I) -> Expr
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::Call {
            function: name.into(),
            receiver: Rc::new(self),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Literal(Value::Boolean(b))
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::Literal(Value::Integer(n))
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Expr::Literal(Value::from(n))
    }
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Expr::Literal(Value::Float(n))
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Literal(Value::from(s))
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Literal(Value::from(s))
    }
}

impl From<Vec<Expr>> for Expr {
    fn from(items: Vec<Expr>) -> Self {
        Expr::Array(items.into())
    }
}

impl From<Map> for Expr {
    fn from(map: Map) -> Self {
        Expr::Literal(Value::object(map))
    }
}
