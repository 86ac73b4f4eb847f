use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use nodescript::{RunOptions, RunOutcome, Script, ScriptError, disassemble};

/// Run a NodeScript file over lines of input.
///
/// The script becomes a single regular node between an input node fed with
/// the input text and an output node printed on completion. Its PRINT
/// channel 0 is the output.
#[derive(Parser, Debug)]
#[command(name = "nodescript", version)]
struct Args {
    /// NodeScript source file
    script: PathBuf,

    /// Input text, one message per line (defaults to stdin)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Print the bytecode listing instead of running
    #[arg(long)]
    disassemble: bool,

    /// Stop after this many scheduler ticks
    #[arg(long = "max-ticks")]
    max_ticks: Option<u64>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).with_writer(io::stderr).init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let source = match fs::read_to_string(&args.script) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to read {}: {}", args.script.display(), e);
            process::exit(1);
        }
    };

    if args.disassemble {
        match nodescript::compile(&source) {
            Ok(chunk) => print!("{}", disassemble(&chunk)),
            Err(e) => {
                for diagnostic in &e.diagnostics {
                    eprintln!("{}: {}", args.script.display(), diagnostic);
                }
                process::exit(1);
            }
        }
        return;
    }

    let data = match read_input(args.input.as_ref()) {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to read input: {}", e);
            process::exit(1);
        }
    };

    let mut script = Script::new();
    if let Err(e) = build(&mut script, &source, &data) {
        if let ScriptError::Compile { source, .. } = &e {
            for diagnostic in &source.diagnostics {
                eprintln!("{}: {}", args.script.display(), diagnostic);
            }
        } else {
            error!("{}", e);
        }
        process::exit(1);
    }

    info!("Running {}", args.script.display());
    let outcome = match script.run_with(RunOptions { max_ticks: args.max_ticks }) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    print!("{}", script.output());

    if outcome == RunOutcome::TickLimit {
        warn!("Stopped after {} ticks", args.max_ticks.unwrap_or_default());
    }
    for (_, e) in script.runtime_errors() {
        eprintln!("{}: runtime error at {}", args.script.display(), e);
    }
    if !script.runtime_errors().is_empty() {
        process::exit(2);
    }
}

fn read_input(path: Option<&PathBuf>) -> io::Result<String> {
    match path {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut data = String::new();
            io::stdin().read_to_string(&mut data)?;
            Ok(data)
        }
    }
}

/// input -> script -> output
fn build(script: &mut Script, source: &str, data: &str) -> Result<(), ScriptError> {
    let input = script.add_input_node(data)?;
    let node = script.add_regular_node(source);
    let output = script.add_output_node()?;
    script.connect_nodes(input, node)?;
    script.connect_nodes(node, output)?;
    script.compile_nodes()
}
