//! Diagnostic logging setup
//!
//! Engine diagnostics go through `tracing` to stderr. `RUST_LOG` wins when
//! set; otherwise the level follows the -q / -v flags.

use crate::output::OutputMode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive for an output mode
pub fn default_directive(mode: OutputMode) -> &'static str {
    match mode {
        OutputMode::Quiet => "treeaudit=error",
        OutputMode::Normal => "treeaudit=warn",
        OutputMode::Verbose => "treeaudit=info",
        OutputMode::VeryVerbose => "treeaudit=debug",
    }
}

/// Install the global subscriber; a second call is a no-op
pub fn init(mode: OutputMode) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(mode)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_maps_to_level() {
        assert_eq!(default_directive(OutputMode::Quiet), "treeaudit=error");
        assert_eq!(default_directive(OutputMode::Normal), "treeaudit=warn");
        assert_eq!(default_directive(OutputMode::VeryVerbose), "treeaudit=debug");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(OutputMode::Normal);
        init(OutputMode::Verbose);
    }
}
