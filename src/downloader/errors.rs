// Error types for the download task and stream resolvers

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// URL is not something the resolver can look up
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Video exists but cannot be fetched (private, removed, region locked)
    #[error("Video unavailable: {0}")]
    VideoUnavailable(String),

    /// yt-dlp not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Failed to parse yt-dlp JSON output
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Command execution failed
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Nothing in the stream list matched the selection policy
    #[error("no suitable stream found")]
    NoSuitableStream,

    /// Network timeout while talking to YouTube or the media host
    #[error("Network timeout: the server is not responding")]
    NetworkTimeout,

    /// Connection-level failure during resolution or transfer
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Media host answered with a non-success status
    #[error("HTTP {status} while downloading stream")]
    Http { status: u16 },

    /// Local file could not be created or written
    #[error("I/O error: {0}")]
    Io(String),

    /// A download is already running in this session
    #[error("a download is already in progress")]
    TaskAlreadyRunning,

    /// Unknown error with details
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl DownloadError {
    /// Message shown to the user in a failed event. Never empty.
    pub fn user_message(&self) -> String {
        let msg = self.to_string();
        if msg.trim().is_empty() || msg.trim_end().ends_with(':') {
            "download failed".to_string()
        } else {
            msg
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::NetworkTimeout;
        }
        if let Some(status) = e.status() {
            return Self::Http {
                status: status.as_u16(),
            };
        }
        Self::NetworkError(e.to_string())
    }
}

// Classify yt-dlp stderr text
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();

        if lower.contains("timeout") || lower.contains("timed out") {
            return Self::NetworkTimeout;
        }

        if lower.contains("video unavailable")
            || lower.contains("private video")
            || lower.contains("has been removed")
            || lower.contains("not available in your country")
            || lower.contains("sign in to confirm your age")
        {
            return Self::VideoUnavailable(s);
        }

        if lower.contains("is not a valid url")
            || lower.contains("unsupported url")
            || lower.contains("invalid url")
            || lower.contains("incomplete youtube id")
        {
            return Self::InvalidUrl(s);
        }

        if lower.contains("no such file") || lower.contains("command not found") {
            return Self::ToolNotFound(s);
        }

        if lower.contains("unable to download")
            || lower.contains("connection")
            || lower.contains("name resolution")
            || lower.contains("http error")
        {
            return Self::NetworkError(s);
        }

        if lower.contains("json") || lower.contains("parse") {
            return Self::ParseError(s);
        }

        Self::Unknown(s)
    }
}
