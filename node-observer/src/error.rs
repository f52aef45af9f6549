use thiserror::Error;

/// Errors produced while talking to a node or one of its replicas.
///
/// An absent entity is never an error: queries return `Ok(None)` for it, so
/// callers always see the found / not-found / failed three-way. A poll budget
/// running out is not an error either, waiters report it as `false`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport or subprocess failure (non-zero exit, unreadable output).
    #[error("Backend failure during '{operation}': {message}")]
    Backend { operation: String, message: String },

    /// The backend answered, but not with the shape we expect.
    #[error("Unexpected response to '{operation}': {message}")]
    Protocol {
        operation: String,
        message: String,
        payload: String,
    },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Raised instead of a soft failure when the caller asked for
    /// exit-on-error. Carries the operation and its key parameters.
    #[error("Failed to {operation}: {context}")]
    Fatal { operation: String, context: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Builds a protocol error and logs the raw payload, which is the only
    /// useful artifact when a node starts answering in an unexpected shape.
    pub fn protocol(
        operation: impl Into<String>,
        message: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        let operation = operation.into();
        let message = message.into();
        let payload = payload.into();
        log::error!(
            "Protocol error during '{}': {}. Raw payload: {}",
            operation,
            message,
            payload
        );
        Self::Protocol {
            operation,
            message,
            payload,
        }
    }

    pub fn fatal(operation: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Fatal {
            operation: operation.into(),
            context: context.into(),
        }
    }

    /// Whether a poll loop may treat this error like a transient miss.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Backend { .. } | Self::Protocol { .. } | Self::Io(_) | Self::Http(_) => true,
            Self::MalformedInput(_) | Self::InvalidArgument(_) | Self::Fatal { .. } => false,
        }
    }
}
