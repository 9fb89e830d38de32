use thiserror::Error;

/// Broad failure classes, used by front ends to decide how to present an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected locally before any request was made
    Validation,
    /// Network failure or non-success HTTP status
    Transport,
    /// Success status but the reply lacked the expected fields
    MalformedResponse,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("unsupported document type `{media_type}`: please select a PDF file")]
    UnsupportedDocument { media_type: String },

    #[error("question is empty")]
    EmptyQuestion,

    #[error("no document has been uploaded yet")]
    NoDocument,

    #[error("another request is still in progress")]
    Busy,

    #[error("nothing to retry")]
    NothingToRetry,

    #[error("request failed: {0}")]
    Transport(String),

    #[error("service returned {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("malformed response from service: {0}")]
    MalformedResponse(String),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::UnsupportedDocument { .. }
            | SessionError::EmptyQuestion
            | SessionError::NoDocument
            | SessionError::Busy
            | SessionError::NothingToRetry => ErrorKind::Validation,
            SessionError::Transport(_) | SessionError::Status { .. } => ErrorKind::Transport,
            SessionError::MalformedResponse(_) => ErrorKind::MalformedResponse,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        SessionError::Transport(err.to_string())
    }
}
