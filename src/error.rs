use crate::ident::ModKey;
use std::{io, path::PathBuf};
use thiserror::Error;

/// Error type shared by every library module.
#[derive(Debug, Error)]
pub enum ModError {
    #[error("registry request failed{}: {detail}", status_suffix(.status))]
    Registry { status: Option<u16>, detail: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("mod {0} is blacklisted; whitelist it to install")]
    Blacklisted(ModKey),

    #[error("version {version} of {key} not found")]
    VersionNotFound { key: ModKey, version: String },

    #[error("package {0} has no versions")]
    EmptyCatalog(String),

    #[error("download failed for {url}: {detail}")]
    Download { url: String, detail: String },

    #[error("could not extract {path:?}: {detail}")]
    Extraction { path: PathBuf, detail: String },

    #[error("could not persist state to {path:?}: {source}")]
    Persistence { path: PathBuf, source: io::Error },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("io error at {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

pub type ModResult<T> = Result<T, ModError>;

/// Failure classes visible to callers of the request surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    BadRequest,
    Upstream,
    Internal,
}

impl ErrorCategory {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorCategory::Internal => 1,
            ErrorCategory::NotFound => 2,
            ErrorCategory::BadRequest => 3,
            ErrorCategory::Upstream => 4,
        }
    }
}

impl ModError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ModError::NotFound(_) | ModError::VersionNotFound { .. } => ErrorCategory::NotFound,
            ModError::Blacklisted(_)
            | ModError::EmptyCatalog(_)
            | ModError::Configuration(_)
            | ModError::InvalidIdentifier(_)
            | ModError::Extraction { .. } => ErrorCategory::BadRequest,
            ModError::Registry { .. } | ModError::Download { .. } => ErrorCategory::Upstream,
            ModError::Persistence { .. } | ModError::Io { .. } => ErrorCategory::Internal,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ModError::Io {
            path: path.into(),
            source,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}
