//! Error types for taskvault-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, unreadable file, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error on load, with the offending path.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`; cannot locate `~/.taskvault/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// No tracker profile configured in the settings file or environment.
    #[error("no tracker profiles configured (add one to ~/.taskvault/config.yaml or set ASANA_PROFILE_1_*)")]
    NoProfiles,

    /// A profile selector matched neither a name nor a 1-based index.
    #[error("unknown profile '{selector}'")]
    ProfileNotFound { selector: String },

    /// A setting required by an enabled feature is missing.
    #[error("{key} is not set (required when {required_by} is enabled)")]
    Missing {
        key: &'static str,
        required_by: &'static str,
    },

    /// An environment override could not be interpreted.
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}
