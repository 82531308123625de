//! mcdc-gate CLI - Command-line interface
//!
//! Commands:
//!   analyze   - MCDC requirements for decisions
//!   table     - Print truth tables
//!   simulate  - Replay a run file through the stop engine
//!   config    - Validate a run config
//!   schema    - Print JSON schemas

mod cli;

use cli::{cmd_analyze, cmd_config, cmd_schema, cmd_simulate, cmd_table};
use mcdc_gate::VERSION;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let result = match args[1].as_str() {
        "analyze" => cmd_analyze(&args[2..]),
        "table" => cmd_table(&args[2..]),
        "simulate" => cmd_simulate(&args[2..]),
        "config" => cmd_config(&args[2..]),
        "schema" => cmd_schema(&args[2..]),
        "version" | "--version" | "-v" => {
            println!("mcdc-gate {}", VERSION);
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            Err("Unknown command".into())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

/// Logs go to stderr so JSON on stdout stays machine-readable
fn init_logging() {
    let filter = EnvFilter::try_from_env("MCDC_GATE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_usage() {
    println!(
        r#"
mcdc-gate - MCDC analysis and stop conditions for test generation

USAGE:
    mcdc-gate <COMMAND> [OPTIONS]

COMMANDS:
    analyze <decisions.yaml>          Required MCDC test cases per decision
    analyze --expr <cel>              Analyze a single CEL expression
    table <decisions.yaml>            Print truth tables
    table --expr <cel>                Truth table of a single CEL expression
    simulate <run.yaml> [--no-halt]   Replay recorded tests through the stop engine
    config <config.yaml>              Validate a run config and print it with defaults
    schema [name]                     Print JSON schema (config, decision, delta,
                                      report, stop, gaps, run)
    version                           Print version

OPTIONS:
    --config <file>                   Run config (analyze, table)
    --max-conditions <n>              Override max_conditions_per_decision
    --output <file>                   Output file (default: stdout)
    --json                            JSON output (analyze, simulate, config)
    --no-halt                         Keep replaying after the first stop verdict

ENVIRONMENT:
    MCDC_GATE_LOG                     Log filter, e.g. debug or mcdc_gate=info (default: warn)

EXAMPLES:
    mcdc-gate analyze --expr "paid && (in_stock || backorder)"
    mcdc-gate analyze decisions.yaml --json --output mcdc.json
    mcdc-gate simulate run.yaml
"#
    );
}
