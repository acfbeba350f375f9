// Helper functions shared by the task and resolver implementations

use deunicode::deunicode;
use regex::Regex;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration as TokioDuration};

use super::errors::DownloadError;

lazy_static::lazy_static! {
    static ref NON_ALNUM_RE: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
    static ref UNSAFE_CHARS_RE: Regex = Regex::new(r##"[\x00-\x1f"#$%'*,./:;<>?\\^|~]"##).unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref RESOLUTION_RE: Regex = Regex::new(r"^\s*(\d+)").unwrap();
}

const MAX_FILENAME_CHARS: usize = 255;
const FALLBACK_NAME: &str = "video";

/// Lowercase ASCII, hyphen-separated token built from a title.
///
/// Non-ASCII text is transliterated first ("Café" -> "cafe") and apostrophes
/// split words like any other separator ("Don't" -> "don-t").
pub fn slugify(title: &str) -> String {
    let ascii = deunicode(title).to_lowercase();
    let slug = NON_ALNUM_RE.replace_all(&ascii, "-");
    let slug = slug.trim_matches('-');

    if slug.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        slug.to_string()
    }
}

/// Title with characters that are unsafe in file names stripped out
pub fn safe_filename(title: &str) -> String {
    let stripped = UNSAFE_CHARS_RE.replace_all(title, "");
    let collapsed = WHITESPACE_RE.replace_all(stripped.trim(), " ");
    let truncated: String = collapsed.chars().take(MAX_FILENAME_CHARS).collect();
    let truncated = truncated.trim_end();

    if truncated.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        truncated.to_string()
    }
}

/// Numeric height from a label like "1080p" or "720p60"
pub fn parse_resolution(label: &str) -> Option<u32> {
    RESOLUTION_RE
        .captures(label)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// `floor(done / total * 100)` clamped to 0..=100, `None` when the size is unknown
pub fn progress_percent(total_bytes: u64, bytes_remaining: u64) -> Option<u8> {
    if total_bytes == 0 {
        return None;
    }
    let done = total_bytes.saturating_sub(bytes_remaining) as u128;
    let percent = done * 100 / total_bytes as u128;
    Some(percent.min(100) as u8)
}

/// Only http(s) URLs are handed to resolvers
pub fn is_http_url(url: &str) -> bool {
    let lower = url.trim().to_lowercase();
    (lower.starts_with("https://") || lower.starts_with("http://"))
        && lower.split("://").nth(1).map_or(false, |rest| !rest.is_empty())
}

/// Run command, optionally bounded by a timeout
pub async fn run_output_with_timeout(
    program: &str,
    args: &[String],
    timeout_secs: Option<u64>,
) -> Result<std::process::Output, DownloadError> {
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                DownloadError::ToolNotFound(format!("{}: {}", program, e))
            }
            _ => DownloadError::ExecutionError(format!("Failed to start {}: {}", program, e)),
        })?;

    let mut stdout_pipe = child.stdout.take().ok_or_else(|| {
        DownloadError::ExecutionError(format!("Failed to capture stdout from {}", program))
    })?;
    let mut stderr_pipe = child.stderr.take().ok_or_else(|| {
        DownloadError::ExecutionError(format!("Failed to capture stderr from {}", program))
    })?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    let status = match timeout_secs {
        Some(secs) => match timeout(TokioDuration::from_secs(secs), child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                let _ = child.kill().await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(DownloadError::NetworkTimeout);
            }
        },
        None => child.wait().await?,
    };

    let join_err = |e: tokio::task::JoinError| DownloadError::ExecutionError(e.to_string());
    let stdout = stdout_task.await.map_err(join_err)??;
    let stderr = stderr_task.await.map_err(join_err)??;

    Ok(std::process::Output {
        status,
        stdout,
        stderr,
    })
}
