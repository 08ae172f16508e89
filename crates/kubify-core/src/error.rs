use std::path::PathBuf;

use crate::manifest::ParseError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    // ── Manifest ──
    #[error("failed to read manifest {path}")]
    ManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid manifest {path}: {source}")]
    ManifestParse { path: PathBuf, source: ParseError },

    // ── Secret state ──
    #[error("failed to read secret state {path}")]
    SecretStateRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("secret state at {path} is corrupt")]
    SecretStateParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write secret state {path}")]
    SecretStateWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode secret state")]
    SecretStateEncode { source: serde_json::Error },
}
