use thiserror::Error;

#[derive(Debug, Error)]
pub enum NavigatorError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl NavigatorError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        NavigatorError::Internal(err.to_string())
    }

    pub fn upstream<E: std::fmt::Display>(err: E) -> Self {
        NavigatorError::Upstream(err.to_string())
    }
}

/// Validation outcome returned to callers of the public surface.
///
/// A rejection means no engine was invoked for the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("query must not be empty")]
    EmptyQuery,
    #[error("query exceeds the maximum length of {max} characters")]
    QueryTooLong { max: usize },
    #[error("document id must not be empty")]
    MissingDocumentId,
    #[error("document content must not be empty")]
    EmptyContent,
    #[error("limit must be a positive integer")]
    InvalidLimit,
    #[error("window must be a positive number of days")]
    InvalidWindow,
}

impl Rejection {
    pub fn reason(&self) -> String {
        self.to_string()
    }
}
