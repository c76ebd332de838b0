/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default suffix marking transformer-function sources.
pub const DEFAULT_TRANSFORMER_EXTENSION: &str = "t";

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Owned transformer suffix for serde defaults.
#[must_use]
pub fn default_transformer_extension() -> String {
    DEFAULT_TRANSFORMER_EXTENSION.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Compact
}
