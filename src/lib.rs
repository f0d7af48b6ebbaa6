//! Declarative models over JSON documents, compiled to incrementally
//! recomputed outputs.
//!
//! A [`Model`] names derived outputs (expressions over the data model root)
//! and mutators (setters and splices). [`compile`] lowers it into a
//! [`Program`], and [`Program::instantiate`] binds the program to initial
//! data as a live [`Instance`].

pub mod ast;
pub mod builder;
pub mod compiler;
pub mod convert;
mod evaluator;
mod graph;
mod incremental;
pub mod library;
pub mod ops;
pub mod parser;
pub mod path;
pub mod program;
pub mod runtime;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{
    Definition, DefinitionError, Expr, Lambda, LambdaId, Model, Operand, PathSegment,
    SetterExpression, SpliceSetterExpression, Token,
};
pub use builder::{and, arg0, arg1, or, root, setter, splice};
pub use compiler::{Backend, CompileError, CompileOptions, compile, compile_json};
pub use convert::{from_json, to_json};
pub use library::FunctionLibrary;
pub use ops::EvalError;
pub use path::PathError;
pub use program::Program;
pub use runtime::{Instance, RefreshStats, RuntimeError};
pub use value::{Map, Value};
