use crate::database::manager::DatabaseError;

/// Outcome taxonomy shared by every core operation.
///
/// Messages are client-safe. `TokenInvalid` and `Unauthorized` never say
/// which underlying condition applied.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("This survey is not accepting respondents")]
    SurveyNotEligible,

    #[error("This link is no longer valid")]
    TokenInvalid,

    #[error("You do not have permission to perform this action")]
    Unauthorized,

    /// Only surfaced to service-level principals
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("This survey is no longer accepting responses")]
    ResponseLimitReached,

    #[error("Too many requests, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("{0}")]
    InvalidInput(String),

    #[error("Storage temporarily unavailable")]
    StorageUnavailable,

    #[error("Unexpected failure: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable machine-readable code, shared by the HTTP and CLI surfaces
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::SurveyNotEligible => "SURVEY_NOT_ELIGIBLE",
            ServiceError::TokenInvalid => "TOKEN_INVALID",
            ServiceError::Unauthorized => "FORBIDDEN",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::ResponseLimitReached => "RESPONSE_LIMIT_REACHED",
            ServiceError::RateLimited { .. } => "RATE_LIMITED",
            ServiceError::InvalidInput(_) => "BAD_REQUEST",
            ServiceError::StorageUnavailable => "STORAGE_UNAVAILABLE",
            ServiceError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// The caller's request was refused, as opposed to the system failing it
    pub fn is_rejection(&self) -> bool {
        !matches!(self, ServiceError::StorageUnavailable | ServiceError::Internal(_))
    }
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        // Driver text stays in the logs
        tracing::error!("Storage failure: {}", err);
        ServiceError::StorageUnavailable
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
