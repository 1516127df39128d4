use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{CompileCmd, RunCmd};

/// Ribose byte-stream transduction engine.
#[derive(Parser)]
#[command(name = "ribose", version, about)]
enum Cli {
    /// Compile a directory of INR automata into a model file.
    Compile(CompileCmd),
    /// Run a transducer from a model over an input stream.
    Run(RunCmd),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let result = match Cli::parse() {
        Cli::Compile(cmd) => cmd.execute(),
        Cli::Run(cmd) => cmd.execute(),
    };
    if let Err(message) = result {
        eprintln!("error: {message}");
        std::process::exit(1);
    }
}
