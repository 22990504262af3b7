use std::path::PathBuf;

/// Run-level errors. Configuration problems abort before any I/O starts;
/// data-level defects inside the dump are never surfaced here - malformed
/// records are dropped and counted instead.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("no language table for pair {src_lang}-{target} (known pairs: {known})")]
    UnknownLanguagePair {
        src_lang: String,
        target: String,
        known: String,
    },

    #[error("input file not found or unreadable: {0}")]
    InputNotFound(PathBuf),

    #[error("worker thread panicked")]
    WorkerPanic,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
