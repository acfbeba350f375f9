// Common data models for downloader

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Quality tier picked by the user.
///
/// Carried through the request and logged, but stream selection does not
/// look at it: video downloads always take the best progressive mp4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityHint {
    Low,
    Medium,
    #[default]
    High,
}

impl fmt::Display for QualityHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl FromStr for QualityHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown quality '{}', expected low, medium or high", other)),
        }
    }
}

/// Parameters of one download attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    pub audio_only: bool,
    pub quality: QualityHint,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            audio_only: false,
            quality: QualityHint::default(),
        }
    }

    pub fn with_audio_only(mut self, audio_only: bool) -> Self {
        self.audio_only = audio_only;
        self
    }

    pub fn with_quality(mut self, quality: QualityHint) -> Self {
        self.quality = quality;
        self
    }
}

/// One downloadable variant of a video, as reported by a resolver
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Resolver-specific format ID (e.g., "18", "140")
    pub format_id: String,
    /// Direct media URL
    pub url: String,
    /// Audio and video muxed in one stream
    pub is_progressive: bool,
    /// Container / file extension (mp4, webm, m4a)
    pub container_format: String,
    /// Vertical resolution label (e.g., "720p"), absent for audio
    pub resolution: Option<String>,
    pub is_audio_only: bool,
    /// Size in bytes, 0 when unknown
    pub total_bytes: u64,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    /// Headers the media host expects on the GET
    #[serde(default)]
    pub http_headers: BTreeMap<String, String>,
}

/// Everything a resolver knows about one URL
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamList {
    pub title: String,
    /// Streams in the resolver's own order
    pub streams: Vec<StreamDescriptor>,
}

/// Byte progress for one received chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    pub chunk_len: usize,
    pub total_bytes: u64,
    pub bytes_remaining: u64,
}

/// Notification sent from a running task to the shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Percent done, 0..=100
    Progress(u8),
    /// File name of the finished download
    Downloaded(String),
    /// Human-readable failure message
    Failed(String),
}

/// Network configuration for resolvers
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// HTTP or SOCKS5 proxy URL (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,

    /// Timeout in seconds. `None` waits forever.
    pub timeout: Option<u32>,

    /// Honor HTTP_PROXY / HTTPS_PROXY when no explicit proxy is set
    pub system_proxy: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout: None,
            system_proxy: true,
        }
    }
}

/// Resolver configuration
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Explicit yt-dlp binary, otherwise auto-detected
    pub ytdlp_path: Option<PathBuf>,
    /// Directory downloads are written to
    pub output_dir: PathBuf,
    pub network: NetworkConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            output_dir: PathBuf::from("."),
            network: NetworkConfig::default(),
        }
    }
}

impl ResolverConfig {
    pub fn with_ytdlp_path(mut self, path: Option<PathBuf>) -> Self {
        self.ytdlp_path = path;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.network.proxy = proxy;
        self
    }

    pub fn with_timeout(mut self, seconds: Option<u32>) -> Self {
        self.network.timeout = seconds;
        self
    }
}
