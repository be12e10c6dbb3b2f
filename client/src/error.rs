use kernel::{FetchError, ProviderError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Client side checks that run before any provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please select a PDF file.")]
    MissingFile,

    #[error("Only PDF files are allowed (got {content_type})")]
    NotPdf { content_type: String },

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Invalid file name: {0:?}")]
    InvalidName(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("You must be signed in.")]
    NotAuthenticated,

    #[error("Invalid credentials format: {0}")]
    InvalidCredentialsFormat(String),

    #[error("Email is already registered")]
    EmailAlreadyRegistered,

    #[error("{0}")]
    Provider(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Download failed (status {status})")]
    DownloadFailed { status: u16 },

    #[error("Not a PDF: {content_type}")]
    NotAPdf { content_type: String },

    /// The copy exists but the original could not be removed.
    #[error("Rename of {from} to {to} incomplete, both copies remain: {message}")]
    RenameIncomplete {
        from: String,
        to: String,
        message: String,
    },

    #[error("Another operation on {0} is in progress")]
    Busy(String),
}

impl From<ProviderError> for Error {
    fn from(e: ProviderError) -> Self {
        Error::Provider(e.message)
    }
}

impl From<FetchError> for Error {
    fn from(e: FetchError) -> Self {
        Error::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Error::NotAuthenticated, "You must be signed in.")]
    #[case(Error::Validation(ValidationError::MissingFile), "Please select a PDF file.")]
    #[case(
        Error::Validation(ValidationError::TooLarge { size: 5_242_881, max: 5_242_880 }),
        "File too large: 5242881 bytes (max: 5242880 bytes)"
    )]
    #[case(Error::DownloadFailed { status: 404 }, "Download failed (status 404)")]
    #[case(Error::Provider("Invalid login credentials".into()), "Invalid login credentials")]
    #[trace]
    fn messages(#[case] error: Error, #[case] expected: &str) {
        // Act
        let text = error.to_string();

        // Assert
        assert_eq!(text, expected);
    }

    #[test]
    fn provider_error_is_passed_through_verbatim() {
        // Arrange
        let source = ProviderError::new("The resource already exists").with_status(409);

        // Act
        let error = Error::from(source);

        // Assert
        assert_eq!(error, Error::Provider("The resource already exists".to_owned()));
    }
}
