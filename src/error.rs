//! Error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result alias for zone database operations.
pub type Result<T> = std::result::Result<T, ZoneError>;

/// Errors returned while reading, updating or writing zone files.
#[derive(Debug, Error)]
pub enum ZoneError {
    /// A zone file could not be opened for reading.
    #[error("cannot open {}: {source}", path.display())]
    Open {
        /// The file that failed to open.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A record or directive is malformed.
    #[error("{}:{line}: {message}", path.display())]
    Parse {
        /// The file being parsed.
        path: PathBuf,
        /// 1-based line number where the offending entry starts.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// A record appeared before any SOA record opened an authority.
    #[error("{}:{line}: missing SOA resource record", path.display())]
    MissingSoa {
        /// The file being parsed.
        path: PathBuf,
        /// Line of the orphaned record.
        line: usize,
    },

    /// A record tagged SOA is not SOA data, or an authority does not
    /// start with its SOA.
    #[error("type mismatch: {context}")]
    TypeMismatch {
        /// Where the mismatch was detected.
        context: String,
    },

    /// Writing a zone file back to disk failed.
    #[error("cannot write {}: {source}", path.display())]
    Write {
        /// The target zone file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZoneError {
    /// Returns `true` for [`ZoneError::MissingSoa`].
    #[must_use]
    pub const fn is_missing_soa(&self) -> bool {
        matches!(self, Self::MissingSoa { .. })
    }

    /// Returns `true` for [`ZoneError::TypeMismatch`].
    #[must_use]
    pub const fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }

    /// The zone file this error refers to, if known.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Open { path, .. }
            | Self::Parse { path, .. }
            | Self::MissingSoa { path, .. }
            | Self::Write { path, .. } => Some(path),
            Self::TypeMismatch { .. } | Self::Io(_) => None,
        }
    }
}
