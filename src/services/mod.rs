pub mod error;
pub mod profile_service;
pub mod rate_limit;
pub mod response_service;
pub mod survey_service;
pub mod token;
pub mod token_consumer;
pub mod token_issuer;
pub mod token_validator;

pub use error::{ServiceError, ServiceResult};
pub use profile_service::ProfileService;
pub use rate_limit::{IssuanceRateLimiter, RateDecision};
pub use response_service::{ResponseService, Submission};
pub use survey_service::SurveyService;
pub use token_consumer::{ConsumedToken, TokenConsumer};
pub use token_issuer::{Issuance, IssuedToken, TokenIssuer};
pub use token_validator::{TokenPreview, TokenValidator};

use crate::policy::{authorize, Operation, Principal, Resource};

/// Deny unless the policy allows `operation` on `resource`
fn require(principal: &Principal, resource: &Resource, operation: Operation) -> ServiceResult<()> {
    if authorize(principal, resource, operation).is_allowed() {
        Ok(())
    } else {
        tracing::warn!(?operation, ?resource, "access denied");
        Err(ServiceError::Unauthorized)
    }
}

/// A missing row reads as a denial unless the caller could have seen it anyway
fn missing(principal: &Principal, what: &'static str) -> ServiceError {
    if principal.is_service() {
        ServiceError::NotFound(what)
    } else {
        ServiceError::Unauthorized
    }
}
