use std::io;

use thiserror::Error;

use crate::media::VariantKind;

/// Errors raised by the media manager.
///
/// `TooLarge`, `InvalidImage` and `Upload` are caused by the client and map to
/// 4xx responses at the boundary. The remaining variants are infrastructure
/// faults.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("upload exceeds maximum size of {max} bytes")]
    TooLarge { max: u64 },

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("upload stream failed: {0}")]
    Upload(#[source] io::Error),

    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to generate {kind} variant: {message}")]
    Variant { kind: VariantKind, message: String },
}

impl MediaError {
    /// Whether the failure was caused by the uploaded content rather than the host.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::TooLarge { .. } | Self::InvalidImage(_) | Self::Upload(_)
        )
    }

    pub(crate) fn variant(kind: VariantKind, message: impl ToString) -> Self {
        Self::Variant {
            kind,
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;
