//! # Model definitions - Abstract Syntax Tree
//!
//! This module defines the expression tree a model is written in, and the
//! token metadata the compiler reads to lower it.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Tags for every verb and terminal reference
//! - **[verbs]** - Static descriptor table indexed by token
//! - **[operators]** - Operator families (binary, unary, collection verbs)
//! - **[expressions]** - The immutable expression tree and its token form
//! - **[setters]** - Setter and splice path descriptors
//! - **[model]** - The name to definition mapping handed to the compiler
//!
//! ## Core Concepts
//!
//! ### Chains
//!
//! An expression is a chain rooted at a terminal reference:
//!
//! ```text
//! root.get("items").filter(v => v.gt(2)).size()
//! ```
//!
//! Every verb has a flat token form, head first, with the receiver at the
//! descriptor's `chain_index`:
//!
//! ```text
//! (size (filter (func#0 (gt val#0 2)) (get "items" root)))
//! ```
//!
//! ### Lambdas
//!
//! Collection verbs take a callback. Its `val`, `key` and `context`
//! references carry the callback's [`LambdaId`], so nesting and capturing
//! outer handles stay unambiguous.
//!
//! ### Mutators
//!
//! Setters and splices describe model locations. Positional arguments
//! (`arg0`, `arg1`) are filled in when the mutator is invoked.

pub mod expressions;
pub mod model;
pub mod operators;
pub mod setters;
pub mod tokens;
pub mod verbs;

pub use expressions::{DefinitionError, Expr, Lambda, LambdaId, Operand};
pub use model::{Definition, Model};
pub use operators::{BinOp, Collection, UnaryOp};
pub use setters::{PathSegment, SetterExpression, SpliceSetterExpression};
pub use tokens::Token;
pub use verbs::TokenInfo;
