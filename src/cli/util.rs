//! CLI utility helpers

use mcdc_gate::{DecisionInput, Error, Result, RunConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Value following `flag`, if present
pub fn parse_flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// First argument that is neither a flag nor a flag's value
pub fn positional<'a>(args: &'a [String], value_flags: &[&str]) -> Option<&'a str> {
    let mut skip = false;
    for arg in args {
        if skip {
            skip = false;
            continue;
        }
        if value_flags.contains(&arg.as_str()) {
            skip = true;
            continue;
        }
        if !arg.starts_with("--") {
            return Some(arg.as_str());
        }
    }
    None
}

/// Parse --output argument to determine output file path
pub fn parse_output_arg(args: &[String]) -> Option<PathBuf> {
    parse_flag_value(args, "--output")
        .or_else(|| parse_flag_value(args, "-o"))
        .map(PathBuf::from)
}

/// Write content to file or stdout
pub fn write_output(path: &Option<PathBuf>, content: &str) -> Result<()> {
    match path {
        Some(p) => {
            fs::write(p, content).map_err(Error::Io)?;
            eprintln!("Written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

/// Config from --config (or defaults), with --max-conditions applied
pub fn load_config(args: &[String]) -> Result<RunConfig> {
    let mut config = match parse_flag_value(args, "--config") {
        Some(path) => RunConfig::load(Path::new(path))?,
        None => RunConfig::default(),
    };
    if let Some(max) = parse_flag_value(args, "--max-conditions") {
        let max: usize = max
            .parse()
            .map_err(|_| Error::InvalidConfiguration(format!("--max-conditions: not a number: {}", max)))?;
        config = config.with_max_conditions(max);
        config.validate()?;
    }
    Ok(config)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DecisionFile {
    Many(Vec<DecisionInput>),
    One(DecisionInput),
}

/// Decisions from `--expr` or a YAML/JSON file holding one decision or a list
pub fn load_decisions(args: &[String]) -> Result<Vec<DecisionInput>> {
    if let Some(expr) = parse_flag_value(args, "--expr") {
        return Ok(vec![DecisionInput::cel("expr", expr)]);
    }

    let path = positional(args, &["--expr", "--config", "--max-conditions", "--output", "-o"])
        .ok_or("Missing decisions file (or --expr <cel>)")?;
    let content = fs::read_to_string(path).map_err(Error::Io)?;
    let file: DecisionFile = if path.ends_with(".json") {
        serde_json::from_str(&content)?
    } else {
        serde_norway::from_str(&content)?
    };
    Ok(match file {
        DecisionFile::Many(list) => list,
        DecisionFile::One(one) => vec![one],
    })
}
