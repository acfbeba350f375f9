// yt-dlp resolver
//
// Stream discovery shells out to `yt-dlp --dump-json`; the transfer itself is a
// plain chunked GET of the format's direct URL so byte progress is exact.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::downloader::errors::DownloadError;
use crate::downloader::models::{ChunkProgress, ResolverConfig, StreamDescriptor, StreamList};
use crate::downloader::traits::{ChunkCallback, StreamResolver};
use crate::downloader::utils::{self, run_output_with_timeout};

pub struct YtDlpResolver {
    ytdlp_path: String,
    config: ResolverConfig,
    client: reqwest::Client,
}

impl YtDlpResolver {
    pub fn new(config: ResolverConfig) -> Result<Self, DownloadError> {
        let ytdlp_path = match &config.ytdlp_path {
            Some(path) => path.to_string_lossy().to_string(),
            None => Self::find_ytdlp(),
        };
        let client = Self::build_client(&config)?;

        info!("[yt-dlp] using binary {}", ytdlp_path);
        Ok(Self {
            ytdlp_path,
            config,
            client,
        })
    }

    fn build_client(config: &ResolverConfig) -> Result<reqwest::Client, DownloadError> {
        let mut builder = reqwest::Client::builder();

        if let Some(secs) = config.network.timeout {
            builder = builder.timeout(Duration::from_secs(secs as u64));
        }
        if let Some(proxy_url) = config.network.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| DownloadError::InvalidUrl(format!("proxy {}: {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
        } else if !config.network.system_proxy {
            builder = builder.no_proxy();
        }

        builder
            .build()
            .map_err(|e| DownloadError::ExecutionError(format!("HTTP client: {}", e)))
    }

    /// Find yt-dlp binary
    fn find_ytdlp() -> String {
        if let Ok(path) = std::env::var("YTDLP_PATH") {
            if !path.trim().is_empty() {
                return path;
            }
        }

        let mut common_paths: Vec<PathBuf> = vec![
            PathBuf::from("/opt/homebrew/bin/yt-dlp"), // Homebrew on Apple Silicon
            PathBuf::from("/usr/local/bin/yt-dlp"),    // Homebrew on Intel Mac
            PathBuf::from("/usr/bin/yt-dlp"),          // System installation
        ];
        if let Some(home) = dirs::home_dir() {
            common_paths.push(home.join(".local/bin/yt-dlp")); // pip --user
        }

        for path in common_paths {
            if path.exists() {
                return path.to_string_lossy().to_string();
            }
        }

        if let Ok(output) = StdCommand::new("which").arg("yt-dlp").output() {
            if output.status.success() {
                if let Ok(path) = String::from_utf8(output.stdout) {
                    let trimmed = path.trim();
                    if !trimmed.is_empty() {
                        return trimmed.to_string();
                    }
                }
            }
        }

        "yt-dlp".to_string()
    }

    pub fn binary_path(&self) -> &str {
        &self.ytdlp_path
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    fn build_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
        ];

        if let Some(timeout) = self.config.network.timeout {
            args.push("--socket-timeout".to_string());
            args.push(timeout.to_string());
        }
        if let Some(proxy) = &self.config.network.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args.push(url.to_string());
        args
    }

    /// Parse `--dump-json` output
    pub fn parse_json(stdout: &[u8]) -> Result<StreamList, DownloadError> {
        let json_str = String::from_utf8_lossy(stdout);
        let json: serde_json::Value = serde_json::from_str(&json_str)
            .map_err(|e| DownloadError::ParseError(format!("Invalid JSON: {}", e)))?;

        Ok(StreamList {
            title: json["title"].as_str().unwrap_or("Unknown").to_string(),
            streams: Self::parse_formats(&json)?,
        })
    }

    fn parse_formats(json: &serde_json::Value) -> Result<Vec<StreamDescriptor>, DownloadError> {
        let formats_array = json["formats"]
            .as_array()
            .ok_or_else(|| DownloadError::ParseError("No formats array in JSON".to_string()))?;

        let mut streams = Vec::with_capacity(formats_array.len());

        for f in formats_array {
            let url = match f["url"].as_str() {
                Some(u) if utils::is_http_url(u) => u.to_string(),
                _ => continue,
            };
            // Manifests and storyboards need more than one GET
            let direct = f["protocol"]
                .as_str()
                .map_or(true, |p| p == "https" || p == "http");
            if !direct {
                continue;
            }

            let vcodec = f["vcodec"].as_str().map(|s| s.to_string());
            let acodec = f["acodec"].as_str().map(|s| s.to_string());
            let has_video = vcodec.as_deref().map_or(false, |v| v != "none");
            let has_audio = acodec.as_deref().map_or(false, |a| a != "none");

            let http_headers: BTreeMap<String, String> = f["http_headers"]
                .as_object()
                .map(|headers| {
                    headers
                        .iter()
                        .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                        .collect()
                })
                .unwrap_or_default();

            streams.push(StreamDescriptor {
                format_id: f["format_id"].as_str().unwrap_or("").to_string(),
                url,
                is_progressive: has_video && has_audio,
                container_format: f["ext"].as_str().unwrap_or("").to_string(),
                resolution: if has_video {
                    f["height"].as_u64().map(|h| format!("{}p", h))
                } else {
                    None
                },
                is_audio_only: has_audio && !has_video,
                total_bytes: f["filesize"]
                    .as_u64()
                    .or_else(|| f["filesize_approx"].as_u64())
                    .unwrap_or(0),
                video_codec: vcodec.filter(|v| v != "none"),
                audio_codec: acodec.filter(|a| a != "none"),
                http_headers,
            });
        }

        Ok(streams)
    }

    /// Name used when the caller does not pick one
    pub fn default_filename(title: &str, stream: &StreamDescriptor) -> String {
        let ext = if stream.container_format.is_empty() {
            "bin"
        } else {
            stream.container_format.as_str()
        };
        format!("{}.{}", utils::safe_filename(title), ext)
    }
}

#[async_trait]
impl StreamResolver for YtDlpResolver {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn list_streams(&self, url: &str) -> Result<StreamList, DownloadError> {
        if !utils::is_http_url(url) {
            return Err(DownloadError::InvalidUrl(url.to_string()));
        }

        let args = self.build_args(url);
        debug!("[yt-dlp] {} {}", self.ytdlp_path, args.join(" "));

        let timeout = self.config.network.timeout.map(|t| t as u64);
        let output = run_output_with_timeout(&self.ytdlp_path, &args, timeout).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("[yt-dlp] failed for {}: {}", url, stderr);
            let message = if stderr.is_empty() {
                format!("yt-dlp exited with {:?}", output.status.code())
            } else {
                stderr
            };
            return Err(DownloadError::from(message));
        }

        let list = Self::parse_json(&output.stdout)?;
        info!(
            "[yt-dlp] '{}': {} direct streams",
            list.title,
            list.streams.len()
        );
        Ok(list)
    }

    async fn download(
        &self,
        stream: &StreamDescriptor,
        filename: Option<&str>,
        title: &str,
        on_chunk: &mut ChunkCallback<'_>,
    ) -> Result<PathBuf, DownloadError> {
        let filename = filename
            .map(|f| f.to_string())
            .unwrap_or_else(|| Self::default_filename(title, stream));
        let path = self.config.output_dir.join(&filename);

        let mut request = self.client.get(&stream.url);
        for (key, value) in &stream.http_headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let mut response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Http {
                status: status.as_u16(),
            });
        }

        let total_bytes = if stream.total_bytes > 0 {
            stream.total_bytes
        } else {
            response.content_length().unwrap_or(0)
        };

        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        let mut file = tokio::fs::File::create(&path).await?;
        info!(
            "[yt-dlp] downloading format {} ({} bytes) to {}",
            stream.format_id,
            total_bytes,
            path.display()
        );

        let mut received: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            on_chunk(ChunkProgress {
                chunk_len: chunk.len(),
                total_bytes,
                bytes_remaining: total_bytes.saturating_sub(received),
            });
        }
        file.flush().await?;

        debug!("[yt-dlp] wrote {} bytes to {}", received, path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    const DUMP_JSON: &str = r#"{
        "id": "dQw4w9WgXcQ",
        "title": "Never Gonna Give You Up",
        "formats": [
            {"format_id": "sb0", "ext": "mhtml", "protocol": "mhtml", "url": "https://i.ytimg.com/sb/0", "vcodec": "none", "acodec": "none"},
            {"format_id": "249", "ext": "webm", "protocol": "https", "url": "https://rr.googlevideo.com/249", "vcodec": "none", "acodec": "opus", "filesize": 1200},
            {"format_id": "140", "ext": "m4a", "protocol": "https", "url": "https://rr.googlevideo.com/140", "vcodec": "none", "acodec": "mp4a.40.2", "filesize_approx": 3400},
            {"format_id": "18", "ext": "mp4", "protocol": "https", "url": "https://rr.googlevideo.com/18", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "height": 360, "filesize": 9000,
             "http_headers": {"User-Agent": "Mozilla/5.0", "Accept": "*/*"}},
            {"format_id": "137", "ext": "mp4", "protocol": "https", "url": "https://rr.googlevideo.com/137", "vcodec": "avc1.640028", "acodec": "none", "height": 1080},
            {"format_id": "hls-720", "ext": "mp4", "protocol": "m3u8_native", "url": "https://manifest.googlevideo.com/720.m3u8", "vcodec": "avc1", "acodec": "mp4a", "height": 720}
        ]
    }"#;

    fn test_resolver(dir: &Path) -> YtDlpResolver {
        let mut config = ResolverConfig::default()
            .with_ytdlp_path(Some(PathBuf::from("yt-dlp")))
            .with_output_dir(dir);
        // Loopback server must not be routed through an environment proxy
        config.network.system_proxy = false;
        YtDlpResolver::new(config).unwrap()
    }

    /// Serve one HTTP response on a loopback port, return its base URL
    async fn serve_once(status_line: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let mut request = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status_line,
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[test]
    fn test_parse_dump_json() {
        let list = YtDlpResolver::parse_json(DUMP_JSON.as_bytes()).unwrap();
        assert_eq!(list.title, "Never Gonna Give You Up");

        let ids: Vec<&str> = list.streams.iter().map(|s| s.format_id.as_str()).collect();
        assert_eq!(ids, vec!["249", "140", "18", "137"]);

        let opus = &list.streams[0];
        assert!(opus.is_audio_only);
        assert!(!opus.is_progressive);
        assert_eq!(opus.resolution, None);
        assert_eq!(opus.total_bytes, 1200);

        assert_eq!(list.streams[1].total_bytes, 3400);

        let muxed = &list.streams[2];
        assert!(muxed.is_progressive);
        assert_eq!(muxed.resolution.as_deref(), Some("360p"));
        assert_eq!(muxed.container_format, "mp4");
        assert_eq!(muxed.http_headers.get("User-Agent").map(String::as_str), Some("Mozilla/5.0"));

        let video_only = &list.streams[3];
        assert!(!video_only.is_progressive);
        assert!(!video_only.is_audio_only);
        assert_eq!(video_only.total_bytes, 0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            YtDlpResolver::parse_json(b"not json"),
            Err(DownloadError::ParseError(_))
        ));
        assert!(matches!(
            YtDlpResolver::parse_json(br#"{"title": "x"}"#),
            Err(DownloadError::ParseError(_))
        ));
    }

    #[test]
    fn test_default_filename() {
        let stream = StreamDescriptor {
            container_format: "webm".to_string(),
            ..Default::default()
        };
        assert_eq!(
            YtDlpResolver::default_filename("AC/DC: Thunderstruck", &stream),
            "ACDC Thunderstruck.webm"
        );
    }

    #[test]
    fn test_build_args_include_network_options() {
        let dir = tempfile::tempdir().unwrap();
        let config = ResolverConfig::default()
            .with_ytdlp_path(Some(PathBuf::from("yt-dlp")))
            .with_output_dir(dir.path())
            .with_proxy(Some("socks5://127.0.0.1:1080".to_string()))
            .with_timeout(Some(15));
        let resolver = YtDlpResolver::new(config).unwrap();

        let args = resolver.build_args("https://youtu.be/x");
        assert_eq!(args.first().map(String::as_str), Some("--dump-json"));
        assert!(args.windows(2).any(|w| w[0] == "--proxy" && w[1] == "socks5://127.0.0.1:1080"));
        assert!(args.windows(2).any(|w| w[0] == "--socket-timeout" && w[1] == "15"));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/x"));
    }

    #[tokio::test]
    async fn test_list_streams_rejects_non_http_url() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = test_resolver(dir.path());

        let err = resolver.list_streams("not a url").await.unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_download_writes_file_and_reports_chunks() {
        let body: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
        let base = serve_once("200 OK", body.clone()).await;

        let dir = tempfile::tempdir().unwrap();
        let resolver = test_resolver(dir.path());
        let stream = StreamDescriptor {
            format_id: "18".to_string(),
            url: format!("{}/videoplayback", base),
            is_progressive: true,
            container_format: "mp4".to_string(),
            resolution: Some("360p".to_string()),
            total_bytes: body.len() as u64,
            ..Default::default()
        };

        let mut events = Vec::new();
        let path = resolver
            .download(&stream, Some("clip.mp4"), "Clip", &mut |p: ChunkProgress| events.push(p))
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("clip.mp4"));
        assert_eq!(std::fs::read(&path).unwrap(), body);

        assert!(!events.is_empty());
        let received: usize = events.iter().map(|e| e.chunk_len).sum();
        assert_eq!(received, body.len());
        assert_eq!(events.last().unwrap().bytes_remaining, 0);
        assert!(events
            .windows(2)
            .all(|w| w[1].bytes_remaining <= w[0].bytes_remaining));
    }

    #[tokio::test]
    async fn test_download_uses_content_length_when_size_unknown() {
        let body = vec![7u8; 1000];
        let base = serve_once("200 OK", body).await;

        let dir = tempfile::tempdir().unwrap();
        let resolver = test_resolver(dir.path());
        let stream = StreamDescriptor {
            url: base,
            container_format: "m4a".to_string(),
            is_audio_only: true,
            ..Default::default()
        };

        let mut totals = Vec::new();
        let path = resolver
            .download(&stream, None, "Some Song", &mut |p: ChunkProgress| totals.push(p.total_bytes))
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("Some Song.m4a"));
        assert!(totals.iter().all(|t| *t == 1000));
    }

    #[tokio::test]
    async fn test_download_http_error() {
        let base = serve_once("403 Forbidden", b"nope".to_vec()).await;

        let dir = tempfile::tempdir().unwrap();
        let resolver = test_resolver(dir.path());
        let stream = StreamDescriptor {
            url: base,
            container_format: "mp4".to_string(),
            ..Default::default()
        };

        let err = resolver
            .download(&stream, Some("x.mp4"), "x", &mut |_: ChunkProgress| {})
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Http { status: 403 }));
        assert!(!dir.path().join("x.mp4").exists());
    }
}
