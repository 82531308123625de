//! Config and schema CLI commands

use super::util::{has_flag, positional};
use mcdc_gate::*;
use std::path::Path;

pub fn cmd_config(args: &[String]) -> Result<()> {
    let path = positional(args, &[]).ok_or("Usage: mcdc-gate config <config.yaml> [--json]")?;
    let config = RunConfig::load(Path::new(path))?;

    if has_flag(args, "--json") {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!("✓ Configuration is valid");
        print!("{}", serde_norway::to_string(&config)?);
    }
    Ok(())
}

pub fn cmd_schema(args: &[String]) -> Result<()> {
    let schema_name = args.first().map(|s| s.as_str()).unwrap_or("list");

    match schema_name {
        "list" => {
            println!("Available schemas: config, decision, delta, report, stop, gaps, run");
            Ok(())
        }
        "config" => print_schema::<RunConfig>(),
        "decision" => print_schema::<DecisionInput>(),
        "delta" => print_schema::<CoverageDelta>(),
        "report" => print_schema::<DecisionOutcome>(),
        "stop" => print_schema::<StopDecision>(),
        "gaps" => print_schema::<GapReport>(),
        "run" => print_schema::<RunFile>(),
        _ => Err(format!("Unknown schema: {}", schema_name).into()),
    }
}

fn print_schema<T: schemars::JsonSchema>() -> Result<()> {
    let schema = schemars::schema_for!(T);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
