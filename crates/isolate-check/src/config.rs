use crate::error::{IsoError, IsoResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Checker configuration, loadable from a JSON file. Every field is optional.
///
/// ```rust
/// use isolate_check::config::CheckConfig;
///
/// let config = CheckConfig::from_json(r#"{ "report_hints": false }"#, "inline").unwrap();
/// assert!(!config.report_hints);
/// assert!(config.infer);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Include hint-severity findings in the report.
    pub report_hints: bool,
    /// Infer isolation for constructs that do not declare it.
    pub infer: bool,
    /// Cap on the number of findings kept in the report.
    pub max_findings: Option<usize>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            report_hints: true,
            infer: true,
            max_findings: None,
        }
    }
}

impl CheckConfig {
    pub fn from_file(path: &Path) -> IsoResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content, &path.display().to_string())
    }

    pub fn from_json(content: &str, origin: &str) -> IsoResult<Self> {
        serde_json::from_str(content).map_err(|e| IsoError::Config {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }
}
