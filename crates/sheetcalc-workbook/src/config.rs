use serde::{Deserialize, Serialize};
use sheetcalc_eval::EvalConfig;

#[cfg(feature = "json")]
use crate::error::WorkbookError;

/// Settings for a new workbook. Missing fields take their defaults, so an
/// empty JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbookConfig {
    /// Sheets created when the workbook opens, in order.
    pub initial_sheets: Vec<String>,
    pub eval: EvalConfig,
}

impl Default for WorkbookConfig {
    fn default() -> Self {
        Self {
            initial_sheets: vec!["Sheet1".to_string()],
            eval: EvalConfig::default(),
        }
    }
}

impl WorkbookConfig {
    pub fn with_sheets<I, S>(sheets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            initial_sheets: sheets.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[cfg(feature = "json")]
    pub fn from_json(text: &str) -> Result<Self, WorkbookError> {
        serde_json::from_str(text).map_err(|e| WorkbookError::Config(e.to_string()))
    }
}
