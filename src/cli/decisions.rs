//! Decision commands: analyze, table

use super::util::{has_flag, load_config, load_decisions, parse_output_arg, write_output};
use mcdc_gate::*;

pub fn cmd_analyze(args: &[String]) -> Result<()> {
    let inputs = load_decisions(args)?;
    let config = load_config(args)?;
    let output = parse_output_arg(args);

    let outcomes = analyze_decisions(&inputs, &config);
    let rejected = outcomes
        .iter()
        .filter(|o| matches!(o, DecisionOutcome::Rejected { .. }))
        .count();

    let content = if has_flag(args, "--json") {
        serde_json::to_string_pretty(&outcomes)?
    } else {
        let mut out = String::new();
        for outcome in &outcomes {
            match outcome {
                DecisionOutcome::Analyzed { report } => out.push_str(&report.to_report()),
                DecisionOutcome::Rejected { decision_id, error } => {
                    out.push_str(&format!("Decision: {}\nStatus: ✗ Rejected: {}\n", decision_id, error))
                }
            }
            out.push('\n');
        }
        out
    };
    write_output(&output, &content)?;

    if rejected > 0 {
        return Err(format!("{} decision(s) rejected", rejected).into());
    }
    Ok(())
}

pub fn cmd_table(args: &[String]) -> Result<()> {
    let inputs = load_decisions(args)?;
    let config = load_config(args)?;
    let output = parse_output_arg(args);

    let mut content = String::new();
    for input in &inputs {
        let decision = input.build(config.max_conditions_per_decision)?;
        content.push_str(&decision.truth_table().to_report(&decision));
        content.push('\n');
    }
    write_output(&output, &content)
}
