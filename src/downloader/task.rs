// DownloadTask - one cancellable, single-shot download
//
// Lifecycle: list streams -> select -> download -> Downloaded | Failed.
// Cancellation is advisory: the transfer always runs to its end, a set flag
// only suppresses the Downloaded event.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::errors::DownloadError;
use super::format_selector::StreamSelector;
use super::models::{ChunkProgress, DownloadRequest, TaskEvent};
use super::traits::{ProgressEmitter, StreamResolver};
use super::utils::progress_percent;

/// Shared cancel flag for one task
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A download that has not been started yet. Owns the receiving end of its
/// event channel until `start` hands it to the caller.
pub struct DownloadTask {
    worker: TaskWorker,
    events: UnboundedReceiver<TaskEvent>,
}

impl DownloadTask {
    pub fn new(request: DownloadRequest, resolver: Arc<dyn StreamResolver>) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let worker = TaskWorker {
            request,
            resolver,
            cancelled: CancelHandle::default(),
            output_filename: None,
            emitter: ProgressEmitter::new(tx),
        };
        Self { worker, events }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.worker.cancelled.clone()
    }

    /// Name of the file being written, once a stream has been selected
    pub fn output_filename(&self) -> Option<&str> {
        self.worker.output_filename.as_deref()
    }

    /// Run on a background tokio task
    pub fn start(self) -> TaskHandle {
        self.spawn_with(())
    }

    /// Like `start`, holding `guard` until the worker exits
    pub(crate) fn spawn_with<G: Send + 'static>(self, guard: G) -> TaskHandle {
        let DownloadTask { worker, events } = self;
        let cancel = worker.cancelled.clone();
        let join = tokio::spawn(async move {
            let _guard = guard;
            worker.run().await;
        });
        TaskHandle::new(events, cancel, join)
    }
}

struct TaskWorker {
    request: DownloadRequest,
    resolver: Arc<dyn StreamResolver>,
    cancelled: CancelHandle,
    output_filename: Option<String>,
    emitter: ProgressEmitter,
}

impl TaskWorker {
    /// Run to completion, emitting events
    async fn run(mut self) {
        let result = self.execute().await;
        match result {
            Ok(filename) if self.cancelled.is_cancelled() => {
                info!(
                    "[task] '{}' finished after cancel, completion suppressed",
                    filename
                );
            }
            Ok(filename) => {
                info!("[task] downloaded {}", filename);
                self.emitter.downloaded(filename);
            }
            Err(e) => {
                error!("[task] {} failed: {}", self.request.url, e);
                self.emitter.failed(e.user_message());
            }
        }
    }

    async fn execute(&mut self) -> Result<String, DownloadError> {
        info!(
            "[task] {} via {} (audio_only={}, quality={})",
            self.request.url,
            self.resolver.name(),
            self.request.audio_only,
            self.request.quality
        );

        let resolver = Arc::clone(&self.resolver);
        let list = resolver.list_streams(&self.request.url).await?;

        let selection = StreamSelector::select(&self.request, &list.title, &list.streams)
            .ok_or(DownloadError::NoSuitableStream)?;
        debug!(
            "[task] selected format {} ({}, {:?}, {} bytes)",
            selection.stream.format_id,
            selection.stream.container_format,
            selection.stream.resolution,
            selection.stream.total_bytes
        );
        self.output_filename = selection.filename.clone();

        let emitter = self.emitter.clone();
        let mut on_chunk = move |p: ChunkProgress| {
            if let Some(percent) = progress_percent(p.total_bytes, p.bytes_remaining) {
                emitter.progress(percent);
            }
        };

        let path = resolver
            .download(
                selection.stream,
                selection.filename.as_deref(),
                &list.title,
                &mut on_chunk,
            )
            .await?;

        let filename = file_name_of(&path);
        self.output_filename = Some(filename.clone());
        Ok(filename)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Shell-side view of a running task
pub struct TaskHandle {
    events: UnboundedReceiver<TaskEvent>,
    cancel: CancelHandle,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub(crate) fn new(
        events: UnboundedReceiver<TaskEvent>,
        cancel: CancelHandle,
        join: JoinHandle<()>,
    ) -> Self {
        Self {
            events,
            cancel,
            join,
        }
    }

    /// Next event; `None` once the worker is done and everything was delivered
    pub async fn next_event(&mut self) -> Option<TaskEvent> {
        self.events.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the worker to exit
    pub async fn wait(self) {
        if let Err(e) = self.join.await {
            warn!("[task] worker ended abnormally: {}", e);
        }
    }
}
