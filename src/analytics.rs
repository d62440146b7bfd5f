use crate::backend::{FileDescriptor, LogAnalysis, SupportBackend};
use serde::Serialize;
use tracing::{info, warn};

/// Result of submitting a support log for analysis. A backend rejection is
/// reported the same way a failed upload is, never as an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Completed(LogAnalysis),
    Failed { file_name: String, reason: String },
}

impl AnalysisOutcome {
    pub fn analysis(&self) -> Option<&LogAnalysis> {
        match self {
            AnalysisOutcome::Completed(analysis) => Some(analysis),
            AnalysisOutcome::Failed { .. } => None,
        }
    }
}

pub async fn analyze_log<B: SupportBackend + ?Sized>(
    backend: &B,
    file: &FileDescriptor,
) -> AnalysisOutcome {
    info!(file = %file.name, size = file.size_bytes, "Submitting log for analysis");
    match backend.analyze_log(file).await {
        Ok(analysis) => {
            info!(
                file = %file.name,
                metrics = analysis.metrics.len(),
                suggestions = analysis.suggestions.len(),
                "Log analysis complete"
            );
            AnalysisOutcome::Completed(analysis)
        }
        Err(e) => {
            warn!(file = %file.name, error = %e, "Log analysis failed");
            AnalysisOutcome::Failed {
                file_name: file.name.clone(),
                reason: e.to_string(),
            }
        }
    }
}
