//! Run file replay command

use super::util::{has_flag, parse_output_arg, positional, write_output};
use mcdc_gate::*;
use std::path::Path;

pub fn cmd_simulate(args: &[String]) -> Result<()> {
    let path = positional(args, &["--output", "-o"])
        .ok_or("Usage: mcdc-gate simulate <run.yaml> [--no-halt] [--json]")?;
    let output = parse_output_arg(args);

    let file = RunFile::load(Path::new(path))?;
    let outcome = replay(&file, !has_flag(args, "--no-halt"))?;

    let content = if has_flag(args, "--json") {
        serde_json::to_string_pretty(&outcome)?
    } else {
        outcome.to_report()
    };
    write_output(&output, &content)
}
