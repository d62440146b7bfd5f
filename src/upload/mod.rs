pub mod formats;
mod progress;
mod tracker;
mod types;

pub use formats::{
    format_file_size, partition_accepted, Rejection, ACCEPTED_FORMATS, MAX_UPLOAD_BYTES,
};
pub use progress::{BackendProgress, ProgressEvent, ProgressSource, SimulatedProgress};
pub use tracker::UploadTracker;
pub use types::{UploadId, UploadItem, UploadSnapshot, UploadStatus};
