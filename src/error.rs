//! Error taxonomy shared by the retrieval pipeline and the HTTP layer.
//!
//! Every failure that reaches a request handler is one of the [`QaError`]
//! variants. The server maps them onto status codes:
//!
//! | Variant | Status |
//! |---------|--------|
//! | [`QaError::MalformedMultipart`] | 400 |
//! | [`QaError::InvalidRequest`] | 400 |
//! | [`QaError::EmptyDocument`] | 400 |
//! | [`QaError::Unexpected`] | 500 |

/// Message returned when a query arrives and there is nothing to answer from.
pub const NO_DOCUMENT_MESSAGE: &str = "No PDF uploaded or processed";

#[derive(Debug, thiserror::Error)]
pub enum QaError {
    /// The upload body or its `Content-Type` could not be parsed into a file part.
    #[error("{0}")]
    MalformedMultipart(String),

    /// The request body is not what the endpoint expects (e.g. invalid JSON).
    #[error("{0}")]
    InvalidRequest(String),

    /// No document is loaded, or the loaded text contains no sentences.
    #[error("No PDF uploaded or processed")]
    EmptyDocument,

    /// Extraction, embedding, or I/O failed.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl QaError {
    pub fn malformed(message: impl Into<String>) -> Self {
        QaError::MalformedMultipart(message.into())
    }

    /// True for failures the caller caused and can fix by changing the request.
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, QaError::Unexpected(_))
    }
}
