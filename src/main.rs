use clap::{Parser as ClapParser, Subcommand};
use derivo::Backend;
use derivo::cli::{self, CheckOptions, CliError, EvalOptions};
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "derivo")]
#[command(about = "Derivo - Compile declarative JSON models and recompute their outputs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a model against JSON input and print its outputs
    ///
    /// Only the built-in `tap` function (which returns its receiver) is
    /// available to `call`.
    Eval {
        /// Path to the model definition (JSON)
        model: PathBuf,

        /// JSON input (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Backend used to evaluate the model
        #[arg(short, long, default_value_t = Backend::Optimizing)]
        compiler: Backend,

        /// JSON array of `[name, args...]` mutations to apply before printing
        #[arg(short, long)]
        apply: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Validate and compile a model
    Check {
        /// Path to the model definition (JSON)
        model: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Eval {
            model,
            input,
            compiler,
            apply,
            pretty,
        } => run_eval(model, input, compiler, apply, pretty),
        Commands::Check { model } => run_check(model),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_eval(
    model: PathBuf,
    input: Option<String>,
    compiler: Backend,
    apply: Option<String>,
    pretty: bool,
) -> Result<(), CliError> {
    let model = std::fs::read_to_string(model)?;
    let input = match input {
        Some(s) => Some(s),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Some(buffer)
        }
        None => None,
    };

    let options = EvalOptions {
        model,
        input,
        compiler,
        mutations: apply,
    };
    let output = cli::execute_eval(&options)?;
    let json = if pretty {
        serde_json::to_string_pretty(&output)
    } else {
        serde_json::to_string(&output)
    }?;
    println!("{}", json);
    Ok(())
}

fn run_check(model: PathBuf) -> Result<(), CliError> {
    let options = CheckOptions {
        model: std::fs::read_to_string(model)?,
        ..Default::default()
    };
    let result = cli::execute_check(&options)?;
    println!(
        "Model is valid: {} outputs, {} mutators, {} nodes",
        result.outputs.len(),
        result.mutators.len(),
        result.nodes
    );
    if !result.functions.is_empty() {
        println!("Library functions required: {}", result.functions.join(", "));
    }
    Ok(())
}
