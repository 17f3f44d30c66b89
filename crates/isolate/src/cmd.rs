use clap::ValueEnum;
use isolate_check::ast::Program;
use isolate_check::config::CheckConfig;
use isolate_check::error::FindingRecord;
use isolate_check::hash::Fingerprint;
use isolate_check::isolation::classify::inferred;
use isolate_check::{load_program, DispatchOracle, DispatchTarget, Report, RuleCode, Verdict};
use miette::{miette, IntoDiagnostic, NamedSource, Result};
use serde::Serialize;
use std::fmt::Write;
use std::path::Path;
use std::str::FromStr;
use strum::IntoEnumIterator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

/// Rendered output of `isolate check` and whether it should fail the run.
#[derive(Debug)]
pub struct CheckOutcome {
    pub output: String,
    pub failed: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    program: &'a str,
    fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_fingerprint: Option<String>,
    rounds: usize,
    verdicts: &'a [Verdict],
    findings: Vec<FindingRecord>,
    errors: usize,
    hints: usize,
}

pub fn load_config(path: Option<&Path>) -> Result<CheckConfig> {
    match path {
        Some(path) => Ok(CheckConfig::from_file(path)?),
        None => Ok(CheckConfig::default()),
    }
}

pub fn check(
    path: &Path,
    config: Option<&Path>,
    format: Format,
    no_hints: bool,
) -> Result<CheckOutcome> {
    let mut config = load_config(config)?;
    if no_hints {
        config.report_hints = false;
    }
    let program = load_program(path)?;
    let report = isolate_check::check_with(&program, &config);
    log::debug!(
        "checked `{}`: {} finding(s) in {} round(s)",
        report.program,
        report.findings.len(),
        report.rounds
    );
    let output = match format {
        Format::Text => render_text(&program, &report),
        Format::Json => render_json(&program, &report)?,
    };
    Ok(CheckOutcome {
        output,
        failed: report.has_errors(),
    })
}

pub fn render_text(program: &Program, report: &Report) -> String {
    let mut out = String::new();
    for finding in &report.findings {
        match &program.source {
            Some(src) => {
                let diag = miette::Report::new(finding.clone())
                    .with_source_code(NamedSource::new(&src.name, src.text.clone()));
                let _ = writeln!(out, "{:?}", diag);
            }
            None => {
                let _ = writeln!(
                    out,
                    "{}[{}] {} (line {}): {}",
                    finding.severity,
                    finding.rule(),
                    finding.decl,
                    finding.line,
                    finding
                );
            }
        }
    }

    for verdict in &report.verdicts {
        let _ = writeln!(out, "{}", verdict);
    }

    let names = inferred(report);
    if !names.is_empty() {
        let names: Vec<&str> = names.iter().map(|n| n.as_str()).collect();
        let _ = writeln!(out, "inferred isolated: {}", names.join(", "));
    }
    let _ = writeln!(
        out,
        "{}: {} error(s), {} hint(s)",
        report.program,
        report.error_count,
        report.hint_count
    );
    if report.findings.len() < report.error_count + report.hint_count {
        let _ = writeln!(out, "showing the first {} finding(s)", report.findings.len());
    }
    out
}

pub fn render_json(program: &Program, report: &Report) -> Result<String> {
    let json = JsonReport {
        program: report.program.as_str(),
        fingerprint: Fingerprint::of_program(program)?.to_string(),
        source_fingerprint: Fingerprint::of_source(program).map(|f| f.to_string()),
        rounds: report.rounds,
        verdicts: &report.verdicts,
        findings: report.records(),
        errors: report.error_count,
        hints: report.hint_count,
    };
    serde_json::to_string_pretty(&json).into_diagnostic()
}

pub fn dispatch(
    path: &Path,
    object: Option<&str>,
    method: &str,
    config: Option<&Path>,
) -> Result<String> {
    let oracle = DispatchOracle::new(load_config(config)?);
    let program = load_program(path)?;
    let target = match object {
        Some(object) => DispatchTarget::method(object, method),
        None => DispatchTarget::function(method),
    };
    let verdict = oracle.query(&program, &target)?;
    Ok(format!("{}: {}", target, verdict))
}

/// Explain one rule code, or list every code when none is given.
pub fn explain(code: Option<&str>) -> Result<String> {
    let Some(code) = code else {
        let codes: Vec<String> = RuleCode::iter().map(|rule| rule.to_string()).collect();
        return Ok(codes.join("\n"));
    };
    let rule = RuleCode::from_str(code).map_err(|_| miette!("unknown rule code `{}`", code))?;
    Ok(format!("{}\n\n{}", rule, rule.explanation()))
}
