use super::progress::{BackendProgress, ProgressEvent, ProgressSource, SimulatedProgress};
use super::types::{UploadId, UploadItem, UploadSnapshot, UploadStatus};
use crate::backend::{FileDescriptor, SupportBackend};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct Entry {
    item: UploadItem,
    file: FileDescriptor,
    driver: Option<JoinHandle<()>>,
}

struct Shared {
    entries: Mutex<Vec<Entry>>,
    updates: watch::Sender<UploadSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Must be called with the entry lock held so snapshots go out in
    /// transition order.
    fn publish(&self, entries: &[Entry]) {
        let items = entries.iter().map(|e| e.item.clone()).collect();
        self.updates.send_replace(UploadSnapshot { items });
    }

    /// Apply one driver event. Returns true once the driver should stop.
    fn apply(&self, id: UploadId, event: ProgressEvent) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.iter_mut().find(|e| e.item.id == id) else {
            debug!(%id, "Dropping progress event for removed upload");
            return true;
        };
        if entry.item.status != UploadStatus::InProgress {
            return true;
        }

        let item = &mut entry.item;
        match event {
            ProgressEvent::Advanced(step) => {
                let next = item.progress + step.max(0.0);
                if next >= 100.0 {
                    item.progress = 100.0;
                    item.status = UploadStatus::Succeeded;
                } else {
                    item.progress = next;
                    debug!(%id, progress = item.progress, "Upload progress");
                }
            }
            ProgressEvent::Finished => {
                item.progress = 100.0;
                item.status = UploadStatus::Succeeded;
            }
            ProgressEvent::Rejected(reason) => {
                warn!(%id, file = %item.name, %reason, "Upload failed");
                item.status = UploadStatus::Failed { reason };
            }
        }

        let terminal = item.status.is_terminal();
        if item.status == UploadStatus::Succeeded {
            info!(%id, file = %item.name, "Upload complete");
        }
        if terminal {
            entry.driver = None;
        }
        self.publish(&entries);
        terminal
    }
}

/// Owns the list of uploads shown on the upload screen and drives each one
/// to a terminal state independently of the others.
pub struct UploadTracker {
    shared: Arc<Shared>,
    source: Arc<dyn ProgressSource>,
}

impl UploadTracker {
    pub fn new(source: impl ProgressSource) -> Self {
        let (updates, _) = watch::channel(UploadSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(Vec::new()),
                updates,
            }),
            source: Arc::new(source),
        }
    }

    pub fn simulated(simulated: SimulatedProgress) -> Self {
        Self::new(simulated)
    }

    /// Tracker whose uploads go to the backend's document endpoint.
    pub fn with_backend<B: SupportBackend>(backend: Arc<B>, simulated: SimulatedProgress) -> Self {
        Self::new(BackendProgress::new(backend, simulated))
    }

    /// Queue every file, in order. Returns the assigned ids in the same order.
    pub fn submit(&self, files: Vec<FileDescriptor>) -> Vec<UploadId> {
        let mut entries = self.shared.lock();
        let mut ids = Vec::with_capacity(files.len());

        for file in files {
            let id = UploadId::new();
            info!(%id, file = %file.name, size = file.size_bytes, "Upload queued");
            entries.push(Entry {
                item: UploadItem {
                    id,
                    name: file.name.clone(),
                    size_bytes: file.size_bytes,
                    media_type: file.media_type.clone(),
                    status: UploadStatus::Queued,
                    progress: 0.0,
                },
                file,
                driver: None,
            });
            ids.push(id);
        }

        self.shared.publish(&entries);
        ids
    }

    /// Start driving a queued item. Anything other than a queued item is left alone.
    ///
    /// Must be called from within a tokio runtime.
    pub fn begin_upload(&self, id: UploadId) {
        let mut entries = self.shared.lock();
        let Some(entry) = entries.iter_mut().find(|e| e.item.id == id) else {
            debug!(%id, "begin_upload on unknown id ignored");
            return;
        };
        if entry.item.status != UploadStatus::Queued {
            debug!(%id, status = ?entry.item.status, "begin_upload on non-queued item ignored");
            return;
        }

        entry.item.status = UploadStatus::InProgress;
        let mut events = self.source.start(entry.file.clone());
        let shared = Arc::clone(&self.shared);

        // The driver blocks on this lock, so the handle is stored before the
        // first event is applied.
        entry.driver = Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if shared.apply(id, event) {
                    return;
                }
            }
            shared.apply(
                id,
                ProgressEvent::Rejected("upload ended without acknowledgement".to_string()),
            );
        }));

        info!(%id, "Upload started");
        self.shared.publish(&entries);
    }

    /// Submit and immediately start every file.
    pub fn upload(&self, files: Vec<FileDescriptor>) -> Vec<UploadId> {
        let ids = self.submit(files);
        for id in &ids {
            self.begin_upload(*id);
        }
        ids
    }

    /// Drop an item whatever its status. Unknown ids are treated as already removed.
    pub fn remove(&self, id: UploadId) {
        let mut entries = self.shared.lock();
        let Some(pos) = entries.iter().position(|e| e.item.id == id) else {
            return;
        };

        let entry = entries.remove(pos);
        if let Some(driver) = entry.driver {
            driver.abort();
        }
        info!(%id, file = %entry.item.name, "Upload removed");
        self.shared.publish(&entries);
    }

    pub fn snapshot(&self) -> UploadSnapshot {
        self.shared.updates.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadSnapshot> {
        self.shared.updates.subscribe()
    }
}

impl Drop for UploadTracker {
    fn drop(&mut self) {
        for entry in self.shared.lock().iter_mut() {
            if let Some(driver) = entry.driver.take() {
                driver.abort();
            }
        }
    }
}
