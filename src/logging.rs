use tracing_subscriber::EnvFilter;

/// Console verbosity picked on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    fn default_filter(self) -> &'static str {
        match self {
            Self::Quiet => "tubegrab=warn",
            Self::Normal => "tubegrab=info",
            Self::Verbose => "tubegrab=debug",
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the verbosity flag.
pub fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_filter()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
