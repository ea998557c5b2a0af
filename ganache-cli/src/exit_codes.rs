//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts and CI systems to handle errors appropriately.

use ganache_core::MediaError;
use ganache_server::StoreError;
use thiserror::Error;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Data format error (not an image, over a limit, schema mismatch).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Service unavailable (database).
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const UNAVAILABLE: i32 = 69;

/// I/O error (cannot write to the media root).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// An argument that parsed but is semantically wrong.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct UsageError(pub String);

/// The input file could not be opened.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct InputError(pub String);

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        Self {
            code: classify(err),
            message: Some(format!("{err:#}")),
        }
    }
}

/// Pick an exit code from the first typed error in the chain.
fn classify(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if cause.is::<UsageError>() {
            return USAGE_ERROR;
        }
        if cause.is::<InputError>() {
            return INPUT_ERROR;
        }
        if let Some(e) = cause.downcast_ref::<MediaError>() {
            return if e.is_client_error() {
                DATA_ERROR
            } else {
                IO_ERROR
            };
        }
        if let Some(e) = cause.downcast_ref::<StoreError>() {
            return match e {
                StoreError::Database(_) => UNAVAILABLE,
                StoreError::Migration(_) => DATA_ERROR,
                StoreError::NotFound | StoreError::Duplicate(_) => GENERAL_ERROR,
            };
        }
    }
    GENERAL_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_classify_typed_errors() {
        let err = anyhow::Error::new(MediaError::InvalidImage("zero width".into()));
        assert_eq!(ExitCode::from_anyhow(&err).code, DATA_ERROR);

        let err = anyhow::Error::new(MediaError::Io(std::io::Error::other("disk full")));
        assert_eq!(ExitCode::from_anyhow(&err).code, IO_ERROR);

        let err = anyhow::Error::new(StoreError::Migration("checksum".into()));
        assert_eq!(ExitCode::from_anyhow(&err).code, DATA_ERROR);

        let err = anyhow::Error::new(UsageError("bad sha".into()));
        assert_eq!(ExitCode::from_anyhow(&err).code, USAGE_ERROR);

        let err = anyhow::Error::new(InputError("Failed to read file x.png".into()));
        let exit = ExitCode::from_anyhow(&err);
        assert_eq!(exit.code, INPUT_ERROR);
        assert_eq!(exit.message.as_deref(), Some("Failed to read file x.png"));
    }

    #[test]
    fn test_classify_looks_through_context() {
        let result: Result<(), MediaError> = Err(MediaError::TooLarge { max: 1 });
        let err = result.context("Failed to ingest photo.jpg").unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, DATA_ERROR);

        let message = ExitCode::from_anyhow(&err).message.unwrap();
        assert!(message.contains("Failed to ingest photo.jpg"));
        assert!(message.contains("maximum size"));
    }

    #[test]
    fn test_classify_unknown_is_general() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(ExitCode::from_anyhow(&err).code, GENERAL_ERROR);
    }
}
