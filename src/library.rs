use std::{collections::HashMap, fmt, rc::Rc};

use crate::value::Value;

/// A library function: receives the `call` receiver followed by the extra
/// arguments.
pub type Function = Rc<dyn Fn(&[Value]) -> Value>;

/// Externally supplied functions reachable through the `call` verb.
///
/// # Examples
///
/// ```
/// use derivo::{FunctionLibrary, Value};
///
/// let library = FunctionLibrary::new().with("first", |args| args[0].clone());
/// assert!(library.contains("first"));
/// assert_eq!(library.call("first", &[Value::Integer(3)]), Some(Value::Integer(3)));
/// ```
#[derive(Clone, Default)]
pub struct FunctionLibrary {
    functions: HashMap<String, Function>,
}

impl FunctionLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a function, builder style.
    pub fn with<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        self.insert(name, function);
        self
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        self.functions.insert(name.into(), Rc::new(function));
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Invokes `name`, or returns `None` when it is not defined.
    pub fn call(&self, name: &str, args: &[Value]) -> Option<Value> {
        self.functions.get(name).map(|f| f(args))
    }
}

impl fmt::Debug for FunctionLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FunctionLibrary")
            .field("functions", &names)
            .finish()
    }
}
