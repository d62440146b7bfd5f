pub mod analytics;
pub mod backend;
pub mod chat;
pub mod config;
pub mod error;
pub mod settings;
pub mod telemetry;
pub mod upload;

use std::sync::Arc;

pub use analytics::AnalysisOutcome;
pub use backend::{DataSourceScope, FileDescriptor, HttpBackend, SupportBackend};
pub use chat::ConversationController;
pub use config::DeskConfig;
pub use error::{DeskError, Result};
pub use upload::UploadTracker;

/// The upload tracker and chat controller wired to one backend.
pub struct SupportDesk<B> {
    backend: Arc<B>,
    pub uploads: UploadTracker,
    pub chat: ConversationController<B>,
}

impl<B: SupportBackend> SupportDesk<B> {
    pub fn new(backend: Arc<B>, config: &DeskConfig) -> Self {
        Self {
            uploads: UploadTracker::with_backend(Arc::clone(&backend), config.progress()),
            chat: ConversationController::new(Arc::clone(&backend), config.chat()),
            backend,
        }
    }

    pub async fn analyze_log(&self, file: &FileDescriptor) -> AnalysisOutcome {
        analytics::analyze_log(self.backend.as_ref(), file).await
    }
}

impl SupportDesk<HttpBackend> {
    /// Connect to the HTTP service described by `config`.
    pub fn connect(config: &DeskConfig) -> Result<Self> {
        let backend = HttpBackend::new(config.backend())?;
        tracing::info!(api_url = %config.api_url, "Support desk connected");
        Ok(Self::new(Arc::new(backend), config))
    }
}
