use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the whole tool.
/// Every module returns `Result<T, PackError>`.
#[derive(Debug, Error)]
pub enum PackError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API request {path} failed: HTTP {status}")]
    Api { path: String, status: u16 },

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Lookup ──────────────────────────────────────────
    #[error("Not found: {0}")]
    NotFound(String),

    // ── Resolution ──────────────────────────────────────
    #[error("mod '{name}' ({slug}) does not support Minecraft {version}")]
    Incompatible {
        name: String,
        slug: String,
        version: String,
    },

    #[error("dependency resolution failed for {failed} mod(s)")]
    ResolutionFailed { failed: usize },

    #[error("Minecraft version is not set; run `mcpack version <version>` first")]
    VersionNotSet,

    // ── Integrity ───────────────────────────────────────
    #[error("integrity check failed for {path:?}: no declared hash matched")]
    Integrity { path: PathBuf },

    // ── Serialization ───────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // ── User ────────────────────────────────────────────
    #[error("interrupted")]
    Interrupted,

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type PackResult<T> = Result<T, PackError>;

impl From<std::io::Error> for PackError {
    fn from(source: std::io::Error) -> Self {
        PackError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}
