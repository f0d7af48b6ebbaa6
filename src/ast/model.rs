use std::collections::BTreeMap;

use crate::ast::{Expr, SetterExpression, SpliceSetterExpression};

/// One entry of a model mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    /// Computed output
    Expression(Expr),
    /// Mutator writing a value at a path
    Setter(SetterExpression),
    /// Mutator splicing an array at a path
    Splice(SpliceSetterExpression),
}

/// A declarative model: output and mutator names to their definitions.
///
/// Names are unique; defining a name twice keeps the later definition.
///
/// # Example
///
/// ```
/// use derivo::{Model, arg0, root, setter};
///
/// let model = Model::new()
///     .with("negated", root().map(|v, _| v.not()))
///     .with("set", setter(&[arg0()]));
/// assert_eq!(model.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    definitions: BTreeMap<String, Definition>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition, builder style.
    pub fn with(mut self, name: impl Into<String>, definition: impl Into<Definition>) -> Self {
        self.insert(name, definition);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, definition: impl Into<Definition>) {
        self.definitions.insert(name.into(), definition.into());
    }

    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Definition)> {
        self.definitions.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, D: Into<Definition>> FromIterator<(K, D)> for Model {
    fn from_iter<I: IntoIterator<Item = (K, D)>>(iter: I) -> Self {
        let mut model = Model::new();
        for (name, definition) in iter {
            model.insert(name, definition);
        }
        model
    }
}

impl From<Expr> for Definition {
    fn from(e: Expr) -> Self {
        Definition::Expression(e)
    }
}

impl From<SetterExpression> for Definition {
    fn from(s: SetterExpression) -> Self {
        Definition::Setter(s)
    }
}

impl From<SpliceSetterExpression> for Definition {
    fn from(s: SpliceSetterExpression) -> Self {
        Definition::Splice(s)
    }
}
