use crate::model::BuildId;

/// Failures while fetching the build resource.
///
/// `Transient` and `Malformed` are retried by the poller; `NotFound` and
/// `RetriesExhausted` end polling and are shown to the user as a persistent notice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("{0}")]
    Transient(String),

    #[error("malformed build resource: {0}")]
    Malformed(String),

    #[error("build {0} not found")]
    NotFound(BuildId),

    #[error("gave up after {attempts} consecutive failed fetches (last error: {last})")]
    RetriesExhausted { attempts: u32, last: String },
}

impl FetchError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FetchError::NotFound(_) | FetchError::RetriesExhausted { .. }
        )
    }

    pub fn is_retryable(&self) -> bool {
        !self.is_fatal()
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Malformed(e.to_string())
    }
}
