use thiserror::Error;

/// Failures that end a search. The display text is shown to the user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("Enter something to search.")]
    EmptyQuery,

    /// Connection, timeout or body decoding failure
    #[error("{0}")]
    Transport(String),

    #[error("HTTP {0}")]
    HttpStatus(u16),

    /// The extraction task panicked or was cancelled
    #[error("{0}")]
    Internal(String),
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => SearchError::HttpStatus(status.as_u16()),
            None => SearchError::Transport(e.to_string()),
        }
    }
}
