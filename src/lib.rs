//! Single-video YouTube downloader.
//!
//! A [`DownloadTask`] resolves the streams for one URL through a
//! [`StreamResolver`], picks one, downloads it and reports progress over a
//! channel. [`DownloadSession`] keeps a shell to one task at a time.

pub mod downloader;
pub mod logging;

pub use downloader::{
    DownloadError, DownloadRequest, DownloadSession, DownloadTask, QualityHint, ResolverConfig,
    StreamResolver, TaskEvent, TaskHandle, YtDlpResolver,
};
