use std::path::PathBuf;

/// Error taxonomy for the receipt/ledger core.
///
/// Pure components (`canon`, `policy`, `replay`) only ever raise
/// [`Error::Canon`], and only for payloads that are not well-formed JSON
/// values (non-finite floats, cycles) — effectively impossible for
/// receipts this crate constructs itself. `Ledger` and `Keyring` raise the
/// I/O and domain variants. `verify_chain` never raises on inconsistency;
/// it returns `(false, Vec<String>)` instead (see [`crate::ledger::verify_chain`]).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown approver: {0}")]
    UnknownApprover(String),

    #[error("approver already exists: {0}")]
    KeyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("ledger corruption at {path}: {detail}")]
    LedgerCorruption { path: PathBuf, detail: String },

    #[error("canonicalization failed: {0}")]
    Canon(#[from] CanonError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Raised only when a value handed to the canonicalizer cannot be
/// serialized deterministically (non-finite floats, invalid UTF-8).
#[derive(Debug, thiserror::Error)]
pub enum CanonError {
    #[error("value is not serializable as canonical JSON: {0}")]
    Serialize(String),
}

pub type Result<T> = std::result::Result<T, Error>;
