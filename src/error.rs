use thiserror::Error;

/// Everything that can go wrong while loading, previewing or saving a workbook.
///
/// Per-cell problems (a dead link, a PDF behind an image URL) are not fatal:
/// the processor turns them into cell notes and keeps going. Only the
/// variants that make the whole run impossible reach the caller.
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("failed to read workbook: {0}")]
    Read(String),

    #[error("failed to write workbook: {0}")]
    Write(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("workbook contains no sheets")]
    NoSheets,

    #[error("sheet not found: {0}")]
    UnknownSheet(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("invalid upload: {0}")]
    Upload(String),
}

impl PreviewError {
    /// True when the error was caused by what the user sent rather than by
    /// the server or a remote host.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PreviewError::Read(_)
                | PreviewError::NoSheets
                | PreviewError::UnknownSheet(_)
                | PreviewError::InvalidOption(_)
                | PreviewError::Upload(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PreviewError>;
