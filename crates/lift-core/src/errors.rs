/// Error kinds surfaced by the lift dispatch core.
///
/// None of these are fatal to the process. The transport decides how to
/// present them and whether to retry.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LiftError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("busy: {0}")]
    Busy(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

pub type LiftResult<T> = Result<T, LiftError>;

impl LiftError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Short classification string for logging and wire error codes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::ResourceExhausted(_) => "RESOURCE_EXHAUSTED",
            Self::Busy(_) => "BUSY",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }

    /// The message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidArgument(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::ResourceExhausted(m)
            | Self::Busy(m)
            | Self::StoreUnavailable(m) => m,
        }
    }
}
