use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::{SecurityConfig, MAX_SESSION_EXPIRY_HOURS};
use crate::policy::Principal;

pub const ROLE_ACCOUNT: &str = "authenticated";
pub const ROLE_RESPONDENT: &str = "magic_link";
pub const ROLE_SERVICE: &str = "service_role";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_id: Option<Uuid>,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    fn into_principal(self) -> Result<Principal, JwtError> {
        match self.role.as_str() {
            ROLE_ACCOUNT => {
                let account_id = self.sub.parse::<Uuid>().map_err(|_| JwtError::MalformedClaims)?;
                Ok(Principal::Account { account_id })
            }
            ROLE_RESPONDENT => match (self.email, self.survey_id) {
                (Some(email), Some(survey_id)) => Ok(Principal::Respondent { email, survey_id }),
                _ => Err(JwtError::MalformedClaims),
            },
            ROLE_SERVICE => Ok(Principal::Service),
            _ => Err(JwtError::MalformedClaims),
        }
    }
}

/// Bearer credential handed out after a successful magic link consume
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub email: String,
    pub survey_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,

    #[error("Invalid JWT token: {0}")]
    Invalid(String),

    #[error("JWT claims do not describe a known principal")]
    MalformedClaims,
}

/// HS256 session minting and verification
#[derive(Clone)]
pub struct JwtSessions {
    secret: String,
    issuer: String,
    expiry: Duration,
    clock: Arc<dyn Clock>,
}

impl JwtSessions {
    pub fn new(security: &SecurityConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: security.jwt_secret.clone(),
            issuer: security.jwt_issuer.clone(),
            expiry: Duration::hours(security.session_expiry_hours.min(MAX_SESSION_EXPIRY_HOURS) as i64),
            clock,
        }
    }

    pub fn issue_respondent_session(&self, email: &str, survey_id: Uuid) -> Result<Session, JwtError> {
        let (access_token, exp) = self.sign(
            email.to_string(),
            ROLE_RESPONDENT,
            Some(email.to_string()),
            Some(survey_id),
        )?;
        Ok(Session {
            access_token,
            token_type: "bearer",
            expires_at: exp,
            email: email.to_string(),
            survey_id,
        })
    }

    pub fn issue_account_token(&self, account_id: Uuid) -> Result<String, JwtError> {
        self.sign(account_id.to_string(), ROLE_ACCOUNT, None, None)
            .map(|(token, _)| token)
    }

    pub fn issue_service_token(&self) -> Result<String, JwtError> {
        self.sign("service".to_string(), ROLE_SERVICE, None, None)
            .map(|(token, _)| token)
    }

    /// Verify signature, issuer and expiry, then map the role to a principal
    pub fn decode(&self, token: &str) -> Result<Principal, JwtError> {
        if self.secret.is_empty() {
            return Err(JwtError::InvalidSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        // exp is checked against the injected clock below
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let data = decode::<Claims>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &validation)
            .map_err(|e| JwtError::Invalid(e.to_string()))?;

        if data.claims.exp <= self.clock.now().timestamp() {
            return Err(JwtError::Invalid("token expired".into()));
        }

        data.claims.into_principal()
    }

    fn sign(
        &self,
        sub: String,
        role: &str,
        email: Option<String>,
        survey_id: Option<Uuid>,
    ) -> Result<(String, DateTime<Utc>), JwtError> {
        if self.secret.is_empty() {
            return Err(JwtError::InvalidSecret);
        }

        let now = self.clock.now();
        let expires_at = now + self.expiry;
        let claims = Claims {
            sub,
            role: role.to_string(),
            email,
            survey_id,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))?;

        // Report the expiry at the same second granularity the token carries
        let expires_at = Utc.timestamp_opt(claims.exp, 0).single().unwrap_or(expires_at);
        Ok((token, expires_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::AppConfig;

    fn sessions(clock: &ManualClock) -> JwtSessions {
        JwtSessions::new(&AppConfig::development().security, Arc::new(clock.clone()))
    }

    #[test]
    fn respondent_session_round_trips_to_scoped_principal() {
        let clock = ManualClock::new(Utc::now());
        let jwt = sessions(&clock);
        let survey_id = Uuid::new_v4();

        let session = jwt.issue_respondent_session("alice@example.com", survey_id).unwrap();
        assert_eq!(session.token_type, "bearer");
        assert!(session.expires_at > clock.now());

        let principal = jwt.decode(&session.access_token).unwrap();
        assert_eq!(
            principal,
            Principal::Respondent {
                email: "alice@example.com".into(),
                survey_id
            }
        );
    }

    #[test]
    fn account_and_service_tokens_decode() {
        let clock = ManualClock::new(Utc::now());
        let jwt = sessions(&clock);
        let account_id = Uuid::new_v4();

        let token = jwt.issue_account_token(account_id).unwrap();
        assert_eq!(jwt.decode(&token).unwrap(), Principal::account(account_id));

        let token = jwt.issue_service_token().unwrap();
        assert_eq!(jwt.decode(&token).unwrap(), Principal::Service);
    }

    #[test]
    fn rejects_token_signed_with_another_secret() {
        let clock = ManualClock::new(Utc::now());
        let jwt = sessions(&clock);

        let mut other_security = AppConfig::development().security;
        other_security.jwt_secret = "a-completely-different-secret".into();
        let forger = JwtSessions::new(&other_security, Arc::new(clock.clone()));

        let forged = forger.issue_service_token().unwrap();
        assert!(matches!(jwt.decode(&forged), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn rejects_expired_session() {
        let clock = ManualClock::new(Utc::now());
        let jwt = sessions(&clock);
        let token = jwt.issue_account_token(Uuid::new_v4()).unwrap();

        clock.advance(Duration::hours(AppConfig::development().security.session_expiry_hours as i64 + 1));
        assert!(jwt.decode(&token).is_err());
    }

    #[test]
    fn rejects_garbage() {
        let clock = ManualClock::new(Utc::now());
        assert!(sessions(&clock).decode("not-a-jwt").is_err());
    }
}
