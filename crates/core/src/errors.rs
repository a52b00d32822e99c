use thiserror::Error;

/// Failure taxonomy for the playback provider. The reconciliation loop's
/// retry decisions hang off these variants: `RateLimited` is never a
/// credential problem, `Unauthorized` starts the refresh protocol, and
/// `InvalidGrant` from the token endpoint is terminal for the record.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider rate limited the request")]
    RateLimited,
    #[error("provider rejected the access token")]
    Unauthorized,
    #[error("refresh token is no longer valid")]
    InvalidGrant,
    #[error("provider returned {status}: {message}")]
    Response { status: u16, message: String },
    #[error("provider transport failure: {0}")]
    Transport(String),
}

impl ProviderError {
    /// True for failures that should be retried with a refreshed
    /// credential when one is available.
    pub fn is_refreshable(&self) -> bool {
        !matches!(self, Self::RateLimited)
    }
}

/// Failure publishing a presence status to the chat service.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("chat service returned {status}: {message}")]
    Response { status: u16, message: String },
    #[error("chat transport failure: {0}")]
    Transport(String),
}

/// Failure in the credential or genre-mapping store. Backends map their
/// native errors into this at the port boundary.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store backend failure: {0}")]
    Backend(String),
    #[error("stored row could not be decoded: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::ProviderError;

    #[test]
    fn rate_limit_is_not_refreshable() {
        assert!(!ProviderError::RateLimited.is_refreshable());
        assert!(ProviderError::Unauthorized.is_refreshable());
        assert!(ProviderError::Response { status: 500, message: "oops".to_owned() }
            .is_refreshable());
        assert!(ProviderError::Transport("timeout".to_owned()).is_refreshable());
    }
}
