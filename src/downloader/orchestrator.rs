// Session controller: one resolver, at most one running task

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use super::errors::DownloadError;
use super::models::DownloadRequest;
use super::task::{CancelHandle, DownloadTask, TaskHandle};
use super::traits::StreamResolver;

/// Clears the session's running flag when the worker exits
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct DownloadSession {
    resolver: Arc<dyn StreamResolver>,
    running: Arc<AtomicBool>,
    current: Option<CancelHandle>,
}

impl DownloadSession {
    pub fn new(resolver: Arc<dyn StreamResolver>) -> Self {
        Self {
            resolver,
            running: Arc::new(AtomicBool::new(false)),
            current: None,
        }
    }

    /// A worker is still alive. Cancelled tasks count until their transfer ends.
    pub fn is_busy(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start a task on the tokio runtime. Must be called from inside one.
    pub fn start(&mut self, request: DownloadRequest) -> Result<TaskHandle, DownloadError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("[Session] refusing {}: a download is running", request.url);
            return Err(DownloadError::TaskAlreadyRunning);
        }

        info!("[Session] starting {} with {}", request.url, self.resolver.name());

        let task = DownloadTask::new(request, Arc::clone(&self.resolver));
        self.current = Some(task.cancel_handle());
        Ok(task.spawn_with(RunningGuard(Arc::clone(&self.running))))
    }

    /// Cancel the running task. Returns false when nothing was running.
    pub fn cancel(&mut self) -> bool {
        match &self.current {
            Some(cancel) if self.is_busy() => {
                info!("[Session] cancel requested");
                cancel.cancel();
                true
            }
            _ => false,
        }
    }
}
