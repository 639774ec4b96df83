use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

use crate::report::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputSettings {
    #[serde(rename = "chapterName")]
    pub chapter_name: Option<String>,
    /// A file path, or "stdout".
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ReportSource {
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "trainingFilePath")]
    pub training_file_path: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScorecardConfig {
    #[serde(rename = "outputSettings", default)]
    pub output_settings: OutputSettings,
    #[serde(rename = "storePath")]
    pub store_path: Option<String>,
    #[serde(rename = "ignoredMemberNames")]
    pub ignored_member_names: Option<Vec<String>>,
    #[serde(rename = "headerScanRows")]
    pub header_scan_rows: Option<usize>,
    #[serde(rename = "trainingScanRows")]
    pub training_scan_rows: Option<usize>,
    #[serde(rename = "reportSources", default)]
    pub report_sources: Vec<ReportSource>,
}

pub fn read_config(path: &str) -> ReportResult<ScorecardConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: ScorecardConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

/// Resolves a path of the configuration against the directory of the
/// configuration file. Absolute paths are kept.
pub fn resolve_path(root: &Path, path: &str) -> String {
    let p = Path::new(path);
    if p.is_absolute() {
        return path.to_string();
    }
    let full: PathBuf = root.join(p);
    full.display().to_string()
}

pub fn read_summary(path: &str) -> ReportResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}
