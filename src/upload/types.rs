use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UploadId(Uuid);

impl UploadId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UploadStatus {
    Queued,
    InProgress,
    Succeeded,
    Failed { reason: String },
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Succeeded | UploadStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadItem {
    pub id: UploadId,
    pub name: String,
    pub size_bytes: u64,
    pub media_type: String,
    pub status: UploadStatus,
    pub progress: f64,
}

/// Point-in-time copy of the tracked uploads, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadSnapshot {
    pub items: Vec<UploadItem>,
}

impl UploadSnapshot {
    pub fn get(&self, id: UploadId) -> Option<&UploadItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn completed(&self) -> usize {
        self.count(|s| matches!(s, UploadStatus::Succeeded))
    }

    pub fn processing(&self) -> usize {
        self.count(|s| matches!(s, UploadStatus::Queued | UploadStatus::InProgress))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, UploadStatus::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&UploadStatus) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.status)).count()
    }
}
