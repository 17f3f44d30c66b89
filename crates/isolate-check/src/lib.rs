pub mod ast;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod hash;
pub mod isolation;
pub mod pos;


use crate::ast::Program;
use crate::config::CheckConfig;
use crate::error::IsoResult;
use std::path::Path;

pub use crate::dispatch::{DispatchOracle, DispatchTarget, DispatchVerdict};
pub use crate::error::{Finding, IsoError, RuleCode, Severity, Violation};
pub use crate::isolation::{DeclKind, Report, Verdict};

/// Check a program with the default configuration.
pub fn check(program: &Program) -> Report {
    check_with(program, &CheckConfig::default())
}

pub fn check_with(program: &Program, config: &CheckConfig) -> Report {
    isolation::check_program(program, config)
}

/// Parse a program model from its JSON form.
pub fn parse_program(json: &str) -> IsoResult<Program> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_program(path: &Path) -> IsoResult<Program> {
    let content = std::fs::read_to_string(path)?;
    parse_program(&content)
}

/// Load a program model from disk and check it.
pub fn check_file(path: &Path, config: &CheckConfig) -> IsoResult<Report> {
    let program = load_program(path)?;
    Ok(check_with(&program, config))
}
