use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AotError>;

#[derive(Error, Debug)]
pub enum AotError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown run: {0} (expected none, training, production or both)")]
    InvalidRun(String),

    #[error("unknown element selection: {0} (expected cached, not-cached or both)")]
    InvalidSelection(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("background load panicked: {0}")]
    LoaderPanicked(String),
}
