use chrono::Local;
use serde::{Deserialize, Serialize};

/// Flow outcome
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum FlowStatus {
    Passed,
    Failed,
}

impl FlowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowStatus::Passed => "PASSED",
            FlowStatus::Failed => "FAILED",
        }
    }
}

/// Result of one flow run, consumed by the email builder and the JSON dump.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowResult {
    pub title: String,
    pub status: FlowStatus,
    pub observed_error: String,
    pub failure_reason: Option<String>,
    pub screenshot_path: String,
    pub duration_ms: u64,
}

impl FlowResult {
    pub fn passed(&self) -> bool {
        self.status == FlowStatus::Passed
    }
}

/// Results of a whole run, for CI archiving.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub session_id: String,
    pub generated_at: String,
    pub results: Vec<FlowResult>,
}

impl RunReport {
    pub fn new(session_id: &str, results: Vec<FlowResult>) -> Self {
        Self {
            session_id: session_id.to_string(),
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            results,
        }
    }
}
