//! Structured logging initialisation for hosts embedding the engine.
//!
//! The configured filter is read relative to the engine: a bare level such
//! as `debug` applies to the `splice::*` targets only, while every other
//! crate logs at `warn`. Directives naming a target are passed through
//! unchanged, so `splice::tracker=trace` or `tree_sitter=info` work as
//! usual.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use splice_config::{Config, LogFormat};
use tracing::level_filters::LevelFilter;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, time::UtcTime};

const ENGINE_TARGET: &str = "splice";
const FOREIGN_LEVEL: &str = "warn";

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned once logging is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring logging.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression does not parse.
    #[error("invalid log filter `{filter}`: {message}")]
    Filter {
        /// The expanded filter that was rejected.
        filter: String,
        /// Parser message.
        message: String,
    },
    /// Another global subscriber is already installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global tracing subscriber on first use.
///
/// Later calls return a handle without touching the global state.
///
/// # Errors
///
/// Fails when the filter is malformed or another subscriber already owns
/// the global slot.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|()| TelemetryHandle)
}

/// Expands the configured filter into `EnvFilter` directives.
fn engine_directives(filter: &str) -> String {
    let scoped = filter
        .split(',')
        .map(str::trim)
        .filter(|directive| !directive.is_empty())
        .map(|directive| {
            if !directive.contains('=') && directive.parse::<LevelFilter>().is_ok() {
                format!("{ENGINE_TARGET}={directive}")
            } else {
                directive.to_owned()
            }
        });
    std::iter::once(FOREIGN_LEVEL.to_owned())
        .chain(scoped)
        .collect::<Vec<_>>()
        .join(",")
}

fn engine_filter(config: &Config) -> Result<EnvFilter, TelemetryError> {
    let filter = engine_directives(&config.log_filter);
    EnvFilter::try_new(&filter).map_err(|error| TelemetryError::Filter {
        message: error.to_string(),
        filter,
    })
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(engine_filter(config)?)
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(UtcTime::rfc_3339());

    let installed = match config.log_format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(builder.json().flatten_event(true).finish())
        }
        LogFormat::Compact => tracing::subscriber::set_global_default(builder.compact().finish()),
    };
    installed.map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::bare_level("info", "warn,splice=info")]
    #[case::targeted("splice::tracker=trace", "warn,splice::tracker=trace")]
    #[case::mixed("debug, tree_sitter=info", "warn,splice=debug,tree_sitter=info")]
    #[case::empty("", "warn")]
    fn bare_levels_apply_to_engine_targets(#[case] configured: &str, #[case] expected: &str) {
        assert_eq!(engine_directives(configured), expected);
    }

    #[test]
    fn rejects_malformed_filters() {
        let config = Config {
            log_filter: "splice=[".to_owned(),
            ..Config::default()
        };
        assert!(matches!(
            engine_filter(&config),
            Err(TelemetryError::Filter { filter, .. }) if filter == "warn,splice=["
        ));
    }
}
