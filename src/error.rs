// src/error.rs

//! Crate-wide error type for the export engine.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The dense serial space ran out; widening the limit is the only cure.
    #[error("serial number space exhausted (limit {limit})")]
    SerialOverflow { limit: u32 },

    #[error("failed to create blob directory {path:?}: {source}")]
    BlobDir {
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to write blob for serial {serial} at {path:?}: {source}")]
    BlobWrite {
        serial: u32,
        path: PathBuf,
        source: io::Error,
    },

    #[error("no stored blob for serial {0}")]
    BlobMissing(u32),

    #[error("no mark bound for serial {0}")]
    MarkMissing(u32),

    #[error("master path {0:?} cannot be translated to an output path")]
    BadMasterPath(String),
}
