use crate::transport::TransportError;

/// Why a single send attempt did not reach the transport.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("connection is not open")]
    Disconnected,
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("payload could not be serialized: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SendError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::RateLimited => "rate_limited",
            Self::Payload(_) => "payload",
            Self::Transport(TransportError::Closed) => "transport_closed",
            Self::Transport(TransportError::Backpressure) => "backpressure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_error() -> SendError {
        let err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        SendError::Payload(err)
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(SendError::RateLimited.error_kind(), "rate_limited");
        assert_eq!(payload_error().error_kind(), "payload");
        assert_eq!(
            SendError::from(TransportError::Backpressure).error_kind(),
            "backpressure"
        );
        assert_eq!(SendError::Disconnected.error_kind(), "disconnected");
        assert_eq!(
            SendError::from(TransportError::Closed).error_kind(),
            "transport_closed"
        );
    }
}
