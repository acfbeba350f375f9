// Stream resolver trait and the event emitter used by tasks

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;

use super::errors::DownloadError;
use super::models::{ChunkProgress, StreamDescriptor, StreamList, TaskEvent};

/// Callback invoked by a resolver for every received chunk
pub type ChunkCallback<'a> = dyn FnMut(ChunkProgress) + Send + 'a;

/// Trait for stream resolver implementations
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Name of the resolver (for logging)
    fn name(&self) -> &'static str;

    /// Look up the title and available streams for a URL
    async fn list_streams(&self, url: &str) -> Result<StreamList, DownloadError>;

    /// Download one stream to disk and return the written path.
    ///
    /// `filename` overrides the resolver's default naming, which is derived
    /// from `title` and the stream's container.
    async fn download(
        &self,
        stream: &StreamDescriptor,
        filename: Option<&str>,
        title: &str,
        on_chunk: &mut ChunkCallback<'_>,
    ) -> Result<PathBuf, DownloadError>;
}

/// Sends task events to whoever holds the receiving end
#[derive(Clone)]
pub struct ProgressEmitter {
    tx: UnboundedSender<TaskEvent>,
}

impl ProgressEmitter {
    pub fn new(tx: UnboundedSender<TaskEvent>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: TaskEvent) {
        // Receiver gone means the shell stopped listening
        let _ = self.tx.send(event);
    }

    pub fn progress(&self, percent: u8) {
        self.emit(TaskEvent::Progress(percent));
    }

    pub fn downloaded(&self, filename: String) {
        self.emit(TaskEvent::Downloaded(filename));
    }

    pub fn failed(&self, message: String) {
        self.emit(TaskEvent::Failed(message));
    }
}
