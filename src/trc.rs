//! Tracing configuration and initialization.

use tracing_subscriber::{
    EnvFilter,
    fmt::format::FmtSpan,
    layer::SubscriberExt as _,
    util::{SubscriberInitExt as _, TryInitError},
};

enum TrcMode {
    /// Compact output for people watching a terminal.
    Pretty,
    /// Full output with span events, chosen when a filter was set explicitly.
    Verbose,
}

pub struct Trc {
    mode: TrcMode,
    env_filter: EnvFilter,
    color: bool,
}

impl Default for Trc {
    fn default() -> Self {
        let maybe_env_filter =
            EnvFilter::try_from_env("TREE_FS_LOG").or_else(|_| EnvFilter::try_from_default_env());

        match maybe_env_filter {
            // Someone asking for a specific filter is debugging and wants everything.
            Ok(env_filter) => Self {
                mode: TrcMode::Verbose,
                env_filter,
                color: false,
            },
            Err(_) => Self {
                mode: TrcMode::Pretty,
                env_filter: EnvFilter::new("info"),
                color: false,
            },
        }
    }
}

impl Trc {
    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn init(self) -> Result<(), TryInitError> {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(self.color);
        let registry = tracing_subscriber::registry().with(self.env_filter);
        match self.mode {
            TrcMode::Verbose => registry
                .with(layer.with_span_events(FmtSpan::ENTER | FmtSpan::CLOSE))
                .try_init(),
            TrcMode::Pretty => registry
                .with(layer.with_target(false).without_time().compact())
                .try_init(),
        }
    }
}
