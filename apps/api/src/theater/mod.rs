//! Security theater: paid protection levels, data funerals and certificates.
//! Point effects go through the scoring engine; everything else is decoration.

pub mod bridge;
pub mod handlers;
pub mod levels;

use std::path::PathBuf;

use thiserror::Error;

pub use bridge::{DataProtector, DefuscryptBridge, DisabledProtector};

#[derive(Debug, Error)]
pub enum TheaterError {
    #[error("encryptor not configured")]
    Unavailable,

    #[error("encryptor binary not found at {0}")]
    MissingBinary(PathBuf),

    #[error("encryptor exited with status {status:?}: {stderr}")]
    Failed { status: Option<i32>, stderr: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
