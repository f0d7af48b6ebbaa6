//! Validate and compile a model without running it

use super::CliError;
use crate::{Backend, CompileOptions, compile_json};

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The model definition as JSON text
    pub model: String,
    pub compiler: Backend,
}

/// Summary of a compiled model
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub outputs: Vec<String>,
    pub mutators: Vec<String>,
    /// Distinct nodes after lowering
    pub nodes: usize,
    /// Library functions the model calls
    pub functions: Vec<String>,
}

/// Execute a derivo check operation
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    let program = compile_json(&options.model, CompileOptions::new(options.compiler))?;
    Ok(CheckResult {
        outputs: program.output_names().map(str::to_string).collect(),
        mutators: program.mutator_names().map(str::to_string).collect(),
        nodes: program.node_count(),
        functions: program.functions().iter().cloned().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_lists_definitions() {
        let options = CheckOptions {
            model: r#"{
                "doubled": ["map", ["func", ["mult", ["val"], 2]], ["root"]],
                "set": ["$setter", ["arg0"]]
            }"#
            .to_string(),
            ..Default::default()
        };
        let result = execute_check(&options).unwrap();
        assert_eq!(result.outputs, vec!["doubled"]);
        assert_eq!(result.mutators, vec!["set"]);
        assert!(result.functions.is_empty());
    }

    #[test]
    fn test_check_reports_unknown_verbs() {
        let options = CheckOptions {
            model: r#"{"bad": ["flatMap", ["root"]]}"#.to_string(),
            ..Default::default()
        };
        let err = execute_check(&options).unwrap_err();
        assert!(err.to_string().contains("unknown verb `flatMap`"));
    }
}
