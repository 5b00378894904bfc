use anyhow::Result;
use std::path::{Path, PathBuf};

use super::types::RunReport;

/// Write the run results as pretty JSON next to the screenshots.
pub fn write_report(report: &RunReport, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("results_{}.json", report.session_id));
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)?;
    println!("JSON report saved to: {}", path.display());
    Ok(path)
}
