#![allow(dead_code)]

use std::{cell::Cell, rc::Rc};

use derivo::{Backend, CompileOptions, FunctionLibrary, Instance, Model, Value, compile};

pub const BACKENDS: [Backend; 2] = [Backend::Simple, Backend::Optimizing];

/// Counts calls to the `tap` library function, which returns its receiver.
#[derive(Clone, Default)]
pub struct Taps {
    count: Rc<Cell<usize>>,
}

impl Taps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn library(&self) -> FunctionLibrary {
        let count = self.count.clone();
        FunctionLibrary::new().with("tap", move |args| {
            count.set(count.get() + 1);
            args.first().cloned().unwrap_or_default()
        })
    }

    /// Calls since the last `take`.
    pub fn take(&self) -> usize {
        self.count.replace(0)
    }

    /// Checks the call count on the optimizing backend. The simple backend
    /// recomputes everything, so its count is only reset.
    #[track_caller]
    pub fn expect(&self, expected: usize, backend: Backend) {
        let found = self.take();
        if backend == Backend::Optimizing {
            assert_eq!(found, expected, "tap calls");
        }
    }
}

pub fn v(json: serde_json::Value) -> Value {
    Value::from(json)
}

pub fn start(model: &Model, data: serde_json::Value, backend: Backend) -> (Instance, Taps) {
    let taps = Taps::new();
    let program = compile(model, CompileOptions::new(backend)).unwrap();
    let instance = program.instantiate(v(data), taps.library()).unwrap();
    (instance, taps)
}

#[track_caller]
pub fn expect_output(instance: &Instance, name: &str, expected: serde_json::Value) {
    assert_eq!(
        instance.get(name),
        Some(&v(expected)),
        "output `{}`",
        name
    );
}

#[track_caller]
pub fn expect_values(instance: &Instance, expected: serde_json::Value) {
    assert_eq!(instance.values(), v(expected));
}
