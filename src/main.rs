mod cli;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{error, info, warn};

use cli::Args;
use tubegrab::downloader::{DownloadSession, TaskEvent, TaskHandle, YtDlpResolver};
use tubegrab::logging::{self, Verbosity};

/// How the shell's one download ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Downloaded,
    Failed,
    Cancelled,
    /// Interrupted twice, the transfer was left running
    Abandoned,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init_tracing(args.verbosity());

    match run(args).await {
        Ok(Outcome::Downloaded) => ExitCode::SUCCESS,
        Ok(Outcome::Failed) => ExitCode::FAILURE,
        Ok(Outcome::Cancelled | Outcome::Abandoned) => ExitCode::from(130),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn progress_bar(verbosity: Verbosity) -> ProgressBar {
    if verbosity == Verbosity::Quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style.progress_chars("=> "));
    bar.set_message("resolving streams...");
    bar
}

/// Forward every Ctrl-C into a channel so none is lost while an event is
/// being handled
fn forward_interrupts() -> UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

async fn run(args: Args) -> anyhow::Result<Outcome> {
    let resolver =
        YtDlpResolver::new(args.resolver_config()).context("failed to set up the yt-dlp resolver")?;
    let output_dir = resolver.output_dir().to_path_buf();
    info!("yt-dlp: {}", resolver.binary_path());

    let mut interrupts = forward_interrupts();
    let mut session = DownloadSession::new(Arc::new(resolver));
    let mut handle = session.start(args.request())?;

    let bar = progress_bar(args.verbosity());
    let outcome = drive(&mut session, &mut handle, &mut interrupts, &bar, &output_dir).await;
    if outcome == Outcome::Abandoned {
        // The runtime drops the transfer on exit
        return Ok(outcome);
    }

    handle.wait().await;
    if outcome == Outcome::Cancelled {
        bar.abandon_with_message("cancelled");
    }
    Ok(outcome)
}

/// Render task events until the stream ends. The first interrupt cancels the
/// task and keeps draining; a second one gives up on the transfer.
async fn drive(
    session: &mut DownloadSession,
    handle: &mut TaskHandle,
    interrupts: &mut UnboundedReceiver<()>,
    bar: &ProgressBar,
    output_dir: &Path,
) -> Outcome {
    let mut outcome = Outcome::Cancelled;
    let mut cancel_requested = false;

    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(TaskEvent::Progress(percent)) => {
                    bar.set_message("downloading");
                    bar.set_position(percent as u64);
                }
                Some(TaskEvent::Downloaded(filename)) => {
                    bar.finish_with_message("done");
                    println!("Video downloaded: {}", output_dir.join(filename).display());
                    outcome = Outcome::Downloaded;
                }
                Some(TaskEvent::Failed(message)) => {
                    bar.abandon_with_message("failed");
                    eprintln!("Error: {}", message);
                    outcome = Outcome::Failed;
                }
                None => return outcome,
            },
            Some(()) = interrupts.recv() => {
                if cancel_requested {
                    warn!("interrupted again, leaving the transfer behind");
                    bar.abandon_with_message("aborted");
                    return Outcome::Abandoned;
                }
                cancel_requested = true;
                session.cancel();
                bar.set_message("cancelled, waiting for the transfer to end (Ctrl-C again to quit)");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use tokio::sync::Notify;
    use tubegrab::downloader::{
        ChunkCallback, ChunkProgress, DownloadError, DownloadRequest, StreamDescriptor,
        StreamList, StreamResolver,
    };

    /// One progressive stream whose transfer waits for `gate`
    struct GatedResolver {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl StreamResolver for GatedResolver {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn list_streams(&self, _url: &str) -> Result<StreamList, DownloadError> {
            Ok(StreamList {
                title: "Clip".to_string(),
                streams: vec![StreamDescriptor {
                    format_id: "18".to_string(),
                    url: "https://example.com/18".to_string(),
                    is_progressive: true,
                    container_format: "mp4".to_string(),
                    resolution: Some("360p".to_string()),
                    total_bytes: 100,
                    ..Default::default()
                }],
            })
        }

        async fn download(
            &self,
            _stream: &StreamDescriptor,
            filename: Option<&str>,
            _title: &str,
            on_chunk: &mut ChunkCallback<'_>,
        ) -> Result<PathBuf, DownloadError> {
            self.gate.notified().await;
            on_chunk(ChunkProgress {
                chunk_len: 100,
                total_bytes: 100,
                bytes_remaining: 0,
            });
            Ok(PathBuf::from(filename.unwrap_or("clip.mp4")))
        }
    }

    fn session_with_gate() -> (DownloadSession, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let resolver = GatedResolver { gate: gate.clone() };
        (DownloadSession::new(Arc::new(resolver)), gate)
    }

    #[tokio::test]
    async fn test_drive_reports_download() {
        let (mut session, gate) = session_with_gate();
        let mut handle = session.start(DownloadRequest::new("https://youtu.be/abc")).unwrap();
        let (_tx, mut interrupts) = mpsc::unbounded_channel();
        gate.notify_one();

        let outcome = drive(
            &mut session,
            &mut handle,
            &mut interrupts,
            &ProgressBar::hidden(),
            Path::new("."),
        )
        .await;

        assert_eq!(outcome, Outcome::Downloaded);
    }

    #[tokio::test]
    async fn test_interrupt_queued_during_event_cancels() {
        let (mut session, gate) = session_with_gate();
        let mut handle = session.start(DownloadRequest::new("https://youtu.be/abc")).unwrap();
        let (tx, mut interrupts) = mpsc::unbounded_channel();

        // Arrives before the shell looks at the channel
        tx.send(()).unwrap();
        gate.notify_one();

        let outcome = drive(
            &mut session,
            &mut handle,
            &mut interrupts,
            &ProgressBar::hidden(),
            Path::new("."),
        )
        .await;

        assert_eq!(outcome, Outcome::Cancelled);
        handle.wait().await;
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_second_interrupt_leaves_transfer_behind() {
        let (mut session, _gate) = session_with_gate();
        let mut handle = session.start(DownloadRequest::new("https://youtu.be/abc")).unwrap();
        let (tx, mut interrupts) = mpsc::unbounded_channel();
        tx.send(()).unwrap();
        tx.send(()).unwrap();

        let outcome = drive(
            &mut session,
            &mut handle,
            &mut interrupts,
            &ProgressBar::hidden(),
            Path::new("."),
        )
        .await;

        assert_eq!(outcome, Outcome::Abandoned);
        assert!(session.is_busy());
    }
}
