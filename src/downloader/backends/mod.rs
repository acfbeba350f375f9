// Stream resolver backends

pub mod ytdlp;

pub use ytdlp::YtDlpResolver;
