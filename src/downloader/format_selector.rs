// StreamSelector - picks the one stream a task downloads
//
// Video: progressive mp4 only, highest resolution wins, earlier streams win ties.
// Audio: first audio-only stream in resolver order.

use super::models::{DownloadRequest, StreamDescriptor};
use super::utils::parse_resolution;

/// What to download and under which name
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    pub stream: &'a StreamDescriptor,
    /// `None` leaves naming to the resolver
    pub filename: Option<String>,
}

pub struct StreamSelector;

impl StreamSelector {
    /// Apply the selection policy for a request
    pub fn select<'a>(
        request: &DownloadRequest,
        title: &str,
        streams: &'a [StreamDescriptor],
    ) -> Option<Selection<'a>> {
        if request.audio_only {
            Self::first_audio(streams).map(|stream| Selection {
                stream,
                filename: None,
            })
        } else {
            Self::best_progressive_mp4(streams).map(|stream| Selection {
                stream,
                filename: Some(format!("{}.mp4", super::utils::slugify(title))),
            })
        }
    }

    /// First audio-only stream, in resolver order
    pub fn first_audio(streams: &[StreamDescriptor]) -> Option<&StreamDescriptor> {
        streams.iter().find(|s| s.is_audio_only)
    }

    /// Highest-resolution progressive mp4
    pub fn best_progressive_mp4(streams: &[StreamDescriptor]) -> Option<&StreamDescriptor> {
        let mut best: Option<(u32, &StreamDescriptor)> = None;

        for stream in streams {
            if !stream.is_progressive || !stream.container_format.eq_ignore_ascii_case("mp4") {
                continue;
            }
            // Streams without a resolution cannot be ordered
            let Some(height) = stream.resolution.as_deref().and_then(parse_resolution) else {
                continue;
            };
            // Strictly greater keeps the earliest of equal resolutions
            if best.map_or(true, |(h, _)| height > h) {
                best = Some((height, stream));
            }
        }

        best.map(|(_, s)| s)
    }
}
