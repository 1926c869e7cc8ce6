use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainClientError {
    /// Could not reach the endpoint or set up the subscription.
    #[error("could not connect: {0}")]
    Connect(String),

    /// Request failed in transit, retry might help.
    #[error("network: {0}")]
    Network(String),

    /// The service doesn't have a transaction at an index below its reported
    /// count.
    #[error("missing transaction at index {0}")]
    MissingTransaction(u64),

    /// The service answered the request with an error. The session is still
    /// usable.
    #[error("rejected by service: {0}")]
    Rejected(String),

    /// The service sent something we couldn't make sense of.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ChainClientError {
    /// If the error means the session itself is unusable and must be
    /// recreated.
    pub fn is_session_lost(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Network(_))
    }
}
