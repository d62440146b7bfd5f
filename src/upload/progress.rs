use crate::backend::{FileDescriptor, SupportBackend};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Progress simulated against a real upload never passes this until the
/// backend acknowledges the file.
const ACK_CEILING: f64 = 95.0;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Percentage points gained since the previous event.
    Advanced(f64),
    /// Transport reports the file fully delivered.
    Finished,
    Rejected(String),
}

/// Yields progress events for one upload until a terminal event.
///
/// Implementations spawn onto the current tokio runtime. Dropping the returned
/// receiver must stop the source.
pub trait ProgressSource: Send + Sync + 'static {
    fn start(&self, file: FileDescriptor) -> mpsc::Receiver<ProgressEvent>;
}

fn random_step(max_step: f64) -> f64 {
    if max_step <= 0.0 {
        return 0.0;
    }
    rand::thread_rng().gen_range(0.0..max_step)
}

/// Timer-driven progress with bounded random increments; never contacts a backend.
#[derive(Debug, Clone)]
pub struct SimulatedProgress {
    pub tick: Duration,
    pub max_step: f64,
}

impl Default for SimulatedProgress {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(200),
            max_step: 30.0,
        }
    }
}

impl ProgressSource for SimulatedProgress {
    fn start(&self, file: FileDescriptor) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(16);
        let tick = self.tick;
        let max_step = self.max_step;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.tick().await;
            let mut total = 0.0;

            while total < 100.0 {
                interval.tick().await;
                let step = random_step(max_step);
                total += step;
                if tx.send(ProgressEvent::Advanced(step)).await.is_err() {
                    debug!(file = %file.name, "Simulated progress stopped: tracker went away");
                    return;
                }
            }
        });

        rx
    }
}

/// Uploads through the backend, ticking simulated progress while the request
/// is in flight. Completion is decided by the backend's answer alone.
pub struct BackendProgress<B> {
    backend: Arc<B>,
    simulated: SimulatedProgress,
}

impl<B: SupportBackend> BackendProgress<B> {
    pub fn new(backend: Arc<B>, simulated: SimulatedProgress) -> Self {
        Self { backend, simulated }
    }
}

impl<B: SupportBackend> ProgressSource for BackendProgress<B> {
    fn start(&self, file: FileDescriptor) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(16);
        let backend = Arc::clone(&self.backend);
        let tick = self.simulated.tick;
        let max_step = self.simulated.max_step;

        tokio::spawn(async move {
            let upload = backend.upload_document(&file);
            tokio::pin!(upload);

            let mut interval = tokio::time::interval(tick);
            interval.tick().await;
            let mut total = 0.0;

            loop {
                tokio::select! {
                    result = &mut upload => {
                        let event = match result {
                            Ok(ack) => {
                                debug!(
                                    file = %file.name,
                                    document_id = ?ack.document_id,
                                    "Backend acknowledged upload"
                                );
                                ProgressEvent::Finished
                            }
                            Err(e) => ProgressEvent::Rejected(e.to_string()),
                        };
                        let _ = tx.send(event).await;
                        return;
                    }
                    _ = interval.tick() => {
                        let step = random_step(max_step).min(ACK_CEILING - total);
                        if step <= 0.0 {
                            continue;
                        }
                        total += step;
                        if tx.send(ProgressEvent::Advanced(step)).await.is_err() {
                            // receiver dropped: item removed, abandon the request
                            return;
                        }
                    }
                }
            }
        });

        rx
    }
}
