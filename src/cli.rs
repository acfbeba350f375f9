use clap::Parser;
use std::path::PathBuf;

use tubegrab::downloader::{DownloadRequest, QualityHint, ResolverConfig};
use tubegrab::logging::Verbosity;

/// Download a YouTube video or its audio track
#[derive(Parser, Debug)]
#[command(name = "tubegrab", version, about)]
pub struct Args {
    /// Video URL
    pub url: String,

    /// Quality tier (low, medium, high)
    #[arg(short, long, default_value = "high")]
    pub quality: QualityHint,

    /// Download the audio track only
    #[arg(short, long)]
    pub audio_only: bool,

    /// Directory the file is written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// yt-dlp binary to use instead of auto-detection
    #[arg(long = "yt-dlp", env = "YTDLP_PATH")]
    pub ytdlp: Option<PathBuf>,

    /// Proxy URL for stream resolution and transfer
    #[arg(long, env = "TUBEGRAB_PROXY")]
    pub proxy: Option<String>,

    /// Network timeout in seconds (default: wait forever)
    #[arg(long)]
    pub timeout: Option<u32>,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Warnings and errors only, no progress bar
    #[arg(long)]
    pub quiet: bool,
}

impl Args {
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    pub fn request(&self) -> DownloadRequest {
        DownloadRequest::new(self.url.trim())
            .with_audio_only(self.audio_only)
            .with_quality(self.quality)
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig::default()
            .with_ytdlp_path(self.ytdlp.clone())
            .with_output_dir(self.output_dir.clone())
            .with_proxy(self.proxy.clone())
            .with_timeout(self.timeout)
    }
}
