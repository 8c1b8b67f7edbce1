//! Command-line front end for the IPC-Hermes-9852 conformance scenario
//! runtime: loads `hermes-runtime`'s configuration, installs a process-wide
//! `Environment`, registers every scenario `hermes-scenarios` ships, and
//! exposes `list`/`run` subcommands over that registry.
//!
//! This stands in for "an external collaborator" driving the runtime's
//! exported API -- the real GUI/CLI an operator would use in the field is
//! out of scope; this binary exists to give the workspace a runnable
//! demonstration, the way the teacher crate family ships its own
//! demonstration binary alongside its libraries.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use hermes_runtime::{Environment, HarnessConfig, TestRegistry, TestResult};

#[derive(Parser)]
#[command(name = "hermes-harness", about = "IPC-Hermes-9852 conformance test harness")]
struct Cli {
    /// Path to a TOML configuration file. Created with defaults on first
    /// run if absent, per the configuration layout the runtime documents.
    #[arg(long, default_value = "hermes-harness.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every registered scenario, its originating module, and its
    /// short display tag.
    List,
    /// Run one registered scenario by name.
    Run {
        /// Exact scenario name, as shown by `list`.
        name: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = HarnessConfig::load_or_default(&cli.config);
    init_logging(&config.logging);

    let mut registry = TestRegistry::new();
    hermes_scenarios::register_all(&mut registry);

    match cli.command {
        Command::List => {
            for (name, info) in registry.available_tests() {
                println!("{:<10} {:<55} {}", info.tag, name, info.description);
            }
            ExitCode::SUCCESS
        }
        Command::Run { name } => {
            let env = Environment::from_config(&config).install();
            tracing::info!(test = %name, "running scenario");
            match registry.run(&name, env) {
                Ok(TestResult::Pass) => {
                    println!("PASS {name}");
                    ExitCode::SUCCESS
                }
                Ok(TestResult::Fail) => {
                    println!("FAIL {name}");
                    ExitCode::FAILURE
                }
                Ok(TestResult::Skip) => {
                    println!("SKIP {name}");
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    eprintln!("{err}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

/// JSON-per-line logging, per the configured level -- satisfies the "one
/// JSON-line per event" log layout the runtime's own doc comments describe
/// for an embedder that wants it.
fn init_logging(config: &hermes_runtime::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().json().with_env_filter(filter).init();
}
