use std::fmt;

/// A segment of a declared setter path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Literal object field
    ///
    /// # Examples
    /// - `setter(&["arr".into(), arg0()])` → `[Field("arr"), Arg(0)]`
    Field(String),

    /// Literal array index
    Index(usize),

    /// Positional argument of the setter call (`arg0`, `arg1`, ...)
    ///
    /// Integer arguments address array indices, string arguments address
    /// object fields.
    Arg(usize),
}

/// Mutation intent: write a value at a path.
///
/// The setter is called with one argument per [`PathSegment::Arg`] followed
/// by the value to write.
#[derive(Debug, Clone, PartialEq)]
pub struct SetterExpression {
    pub path: Vec<PathSegment>,
}

/// Mutation intent: array splice at a path.
///
/// The path names the array; the trailing positional key is implicit and
/// resolves to the `(start, deleteCount, ...items)` splice arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct SpliceSetterExpression {
    pub path: Vec<PathSegment>,
}

/// Number of positional arguments a path consumes.
pub fn path_arity(path: &[PathSegment]) -> usize {
    path.iter()
        .filter_map(|s| match s {
            PathSegment::Arg(n) => Some(n + 1),
            _ => None,
        })
        .max()
        .unwrap_or(0)
}

impl SetterExpression {
    pub fn new(path: Vec<PathSegment>) -> Self {
        SetterExpression { path }
    }

    pub fn arity(&self) -> usize {
        path_arity(&self.path)
    }
}

impl SpliceSetterExpression {
    pub fn new(path: Vec<PathSegment>) -> Self {
        SpliceSetterExpression { path }
    }

    pub fn arity(&self) -> usize {
        path_arity(&self.path)
    }
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        PathSegment::Field(s.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(s: String) -> Self {
        PathSegment::Field(s)
    }
}

impl From<usize> for PathSegment {
    fn from(n: usize) -> Self {
        PathSegment::Index(n)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => write!(f, "[{:?}]", name),
            PathSegment::Index(n) => write!(f, "[{}]", n),
            PathSegment::Arg(n) => write!(f, "[arg{}]", n),
        }
    }
}
