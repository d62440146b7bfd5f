pub mod http;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use http::{HttpBackend, HttpBackendConfig};

/// Which knowledge source the assistant should draw on when answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataSourceScope {
    #[serde(rename = "documents")]
    Documents,
    #[serde(rename = "chats")]
    ChatHistory,
    #[default]
    #[serde(rename = "both")]
    Both,
}

impl DataSourceScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceScope::Documents => "documents",
            DataSourceScope::ChatHistory => "chats",
            DataSourceScope::Both => "both",
        }
    }
}

/// A file handed to the backend, with the metadata captured at submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub name: String,
    pub media_type: String,
    pub size_bytes: u64,
    pub content: Bytes,
}

impl FileDescriptor {
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size_bytes: content.len() as u64,
            content,
        }
    }

    /// Descriptor with a media type guessed from the file extension.
    pub fn from_name(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let name = name.into();
        let media_type = crate::upload::formats::guess_media_type(&name).to_string();
        Self::new(name, media_type, content)
    }

    /// Metadata-only descriptor, for callers that hold the payload elsewhere.
    pub fn metadata(
        name: impl Into<String>,
        media_type: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size_bytes,
            content: Bytes::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(alias = "response", alias = "reply")]
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadAck {
    #[serde(default, alias = "id")]
    pub document_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub metric: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Improvement {
    pub category: String,
    pub current: f64,
    pub target: f64,
    pub suggestion: String,
    pub priority: Priority,
}

/// Analytics summary returned for an uploaded support log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogAnalysis {
    #[serde(default)]
    pub metrics: Vec<MetricScore>,
    #[serde(default)]
    pub suggestions: Vec<Improvement>,
}

impl LogAnalysis {
    pub fn high_priority(&self) -> impl Iterator<Item = &Improvement> {
        self.suggestions
            .iter()
            .filter(|s| s.priority == Priority::High)
    }

    pub fn score_for(&self, metric: &str) -> Option<f64> {
        self.metrics
            .iter()
            .find(|m| m.metric.eq_ignore_ascii_case(metric))
            .map(|m| m.score)
    }
}

/// The external service behind the chat, upload and analytics screens.
#[async_trait]
pub trait SupportBackend: Send + Sync + 'static {
    async fn generate_reply(
        &self,
        question: &str,
        scope: DataSourceScope,
    ) -> Result<Reply, BackendError>;

    async fn upload_document(&self, file: &FileDescriptor) -> Result<UploadAck, BackendError>;

    async fn analyze_log(&self, file: &FileDescriptor) -> Result<LogAnalysis, BackendError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl Serialize for BackendError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
