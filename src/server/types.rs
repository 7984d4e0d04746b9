use serde::Serialize;
use std::sync::Arc;

use crate::core::gemini::ReportProvider;
use crate::core::rate_limiter::SessionLimiters;
use crate::core::report::Report;

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn ReportProvider>,
    pub limiters: Arc<SessionLimiters>,
    pub max_image_bytes: usize,
}

#[derive(Serialize, Debug, Clone)]
pub struct DownloadArtifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub content: String,
}

// Response structure
#[derive(Serialize, Debug, Clone)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub message: String,
    pub report: Report,
    pub download: DownloadArtifact,
}

impl AnalyzeResponse {
    pub fn new(report: Report) -> Self {
        let download = DownloadArtifact {
            file_name: report.download_file_name(),
            mime_type: "text/plain",
            content: report.render_text(),
        };

        Self {
            success: true,
            message: "Analysis completed successfully!".to_string(),
            report,
            download,
        }
    }
}
