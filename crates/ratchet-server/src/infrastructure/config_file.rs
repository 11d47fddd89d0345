//! Loading [`ServerConfig`] from a TOML file on disk.
//!
//! Parsing rules (defaults for missing keys, type checking) live with the
//! config type in `ratchet-core`; this module only adds the file I/O.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use ratchet_core::{ConfigError, ServerConfig};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file was read but its content is not a valid configuration.
    #[error("invalid config in {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
}

/// Reads and parses the configuration file at `path`.
///
/// # Errors
///
/// Returns [`ConfigFileError::Io`] if the file cannot be read and
/// [`ConfigFileError::Invalid`] if its content does not parse.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigFileError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ServerConfig::from_toml_str(&text).map_err(|source| ConfigFileError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
