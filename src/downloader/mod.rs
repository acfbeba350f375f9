// Downloader module - resolver abstraction, stream selection and the download task

pub mod backends;
pub mod errors;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod task;
pub mod traits;
pub mod utils;

pub use backends::YtDlpResolver;
pub use errors::DownloadError;
pub use format_selector::{Selection, StreamSelector};
pub use models::{
    ChunkProgress, DownloadRequest, NetworkConfig, QualityHint, ResolverConfig, StreamDescriptor,
    StreamList, TaskEvent,
};
pub use orchestrator::DownloadSession;
pub use task::{CancelHandle, DownloadTask, TaskHandle};
pub use traits::{ChunkCallback, ProgressEmitter, StreamResolver};
