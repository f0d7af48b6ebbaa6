//! Run a model against JSON input and report its outputs

use tracing::{debug, trace};

use super::CliError;
use crate::{Backend, CompileOptions, FunctionLibrary, Value, compile_json};

/// Options for the eval command
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    /// The model definition as JSON text
    pub model: String,
    /// Initial data as JSON text
    pub input: Option<String>,
    pub compiler: Backend,
    /// JSON array of `[name, args...]` mutations applied in order
    pub mutations: Option<String>,
}

/// Parses `--apply` into mutator names and their arguments.
fn read_mutations(json: &str) -> Result<Vec<(String, Vec<Value>)>, CliError> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(json)?;
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let invalid = |message: &str| CliError::InvalidMutation {
                index,
                message: message.to_string(),
            };
            let serde_json::Value::Array(items) = entry else {
                return Err(invalid("expected an array"));
            };
            let mut items = items.into_iter();
            let name = match items.next() {
                Some(serde_json::Value::String(name)) => name,
                _ => return Err(invalid("expected a mutator name first")),
            };
            Ok((name, items.map(Value::from).collect()))
        })
        .collect()
}

/// Functions available to `call` from the command line. `tap` returns its
/// receiver and traces each invocation.
pub fn builtin_library() -> FunctionLibrary {
    FunctionLibrary::new().with("tap", |args| {
        let value = args.first().cloned().unwrap_or_default();
        trace!(value = %value, "tap");
        value
    })
}

/// Execute a derivo eval operation, returning every output as one object.
pub fn execute_eval(options: &EvalOptions) -> Result<serde_json::Value, CliError> {
    let program = compile_json(&options.model, CompileOptions::new(options.compiler))?;
    let mutations = match &options.mutations {
        Some(json) => read_mutations(json)?,
        None => Vec::new(),
    };

    let input = options.input.as_ref().ok_or(CliError::NoInput)?;
    let initial: serde_json::Value = serde_json::from_str(input)?;

    let mut instance = program.instantiate(initial.into(), builtin_library())?;
    for (name, args) in &mutations {
        instance.invoke(name, args)?;
        debug!(
            mutator = name.as_str(),
            evaluated = instance.last_refresh().evaluated,
            "applied"
        );
    }
    Ok(instance.values().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MODEL: &str = r#"{
        "total": ["plus", ["get", "a", ["root"]], ["get", "b", ["root"]]],
        "set": ["$setter", ["arg0"]]
    }"#;

    fn options(input: &str, mutations: Option<&str>) -> EvalOptions {
        EvalOptions {
            model: MODEL.to_string(),
            input: Some(input.to_string()),
            mutations: mutations.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_eval_outputs() {
        let output = execute_eval(&options(r#"{"a": 1, "b": 2}"#, None)).unwrap();
        assert_eq!(output, json!({"total": 3}));
    }

    #[test]
    fn test_eval_applies_mutations_in_order() {
        let output = execute_eval(&options(
            r#"{"a": 1, "b": 2}"#,
            Some(r#"[["set", "a", 10], ["set", "b", 0.5]]"#),
        ))
        .unwrap();
        assert_eq!(output, json!({"total": 10.5}));
    }

    #[test]
    fn test_eval_rejects_malformed_mutations() {
        let err = execute_eval(&options("{}", Some(r#"[["set", "a", 1], 7]"#))).unwrap_err();
        assert!(matches!(err, CliError::InvalidMutation { index: 1, .. }));
    }

    #[test]
    fn test_eval_provides_tap() {
        let opts = EvalOptions {
            model: r#"{"tapped": ["map", ["func", ["call", "tap", ["val"]]], ["root"]]}"#
                .to_string(),
            input: Some("[1, 2]".to_string()),
            ..Default::default()
        };
        assert_eq!(execute_eval(&opts).unwrap(), json!({"tapped": [1, 2]}));

        let opts = EvalOptions {
            model: r#"{"x": ["call", "missing", ["root"]]}"#.to_string(),
            input: Some("1".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            execute_eval(&opts),
            Err(CliError::Runtime(crate::RuntimeError::UnknownFunction(name))) if name == "missing"
        ));
    }

    #[test]
    fn test_eval_requires_input() {
        let mut opts = options("{}", None);
        opts.input = None;
        assert!(matches!(execute_eval(&opts), Err(CliError::NoInput)));
    }
}
