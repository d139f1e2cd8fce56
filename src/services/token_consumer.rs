use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use super::token::{fingerprint, looks_like_token};
use crate::auth::{JwtSessions, Session};
use crate::clock::Clock;
use crate::database::{MagicLinkStore, Store};

#[derive(Debug, Clone, Serialize)]
pub struct ConsumedToken {
    pub session: Session,
    pub survey_id: Uuid,
}

pub struct TokenConsumer {
    store: Arc<dyn Store>,
    sessions: JwtSessions,
    clock: Arc<dyn Clock>,
}

impl TokenConsumer {
    pub fn new(store: Arc<dyn Store>, sessions: JwtSessions, clock: Arc<dyn Clock>) -> Self {
        Self { store, sessions, clock }
    }

    /// Spend the token and open a session scoped to its survey.
    ///
    /// Under any number of concurrent callers with the same token at most
    /// one gets `Ok`; the rest get `TokenInvalid`.
    pub async fn consume(&self, token: &str) -> ServiceResult<ConsumedToken> {
        if !looks_like_token(token) {
            return Err(ServiceError::TokenInvalid);
        }

        let now = self.clock.now();
        let Some(row) = self.store.consume_magic_link(token, now).await? else {
            tracing::info!(fingerprint = %fingerprint(token), "magic link consume refused");
            return Err(ServiceError::TokenInvalid);
        };

        tracing::info!(
            fingerprint = %fingerprint(token),
            survey_id = %row.survey_id,
            "magic link consumed"
        );

        // The token is already spent here; a minting failure cannot be retried with it
        let session = self
            .sessions
            .issue_respondent_session(&row.email, row.survey_id)
            .map_err(|e| {
                tracing::error!(survey_id = %row.survey_id, "session minting failed after consume: {}", e);
                ServiceError::Internal("could not open a session".into())
            })?;

        Ok(ConsumedToken {
            session,
            survey_id: row.survey_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::AppConfig;
    use crate::database::models::SurveyStatus;
    use crate::database::MemoryStore;
    use crate::email::LogEmailSender;
    use crate::policy::Principal;
    use crate::services::{TokenIssuer, TokenValidator};
    use crate::testing::seed_survey;
    use chrono::Duration;

    struct Harness {
        store: Arc<MemoryStore>,
        clock: ManualClock,
        issuer: TokenIssuer,
        validator: TokenValidator,
        consumer: Arc<TokenConsumer>,
        sessions: JwtSessions,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::default();
        let config = AppConfig::development();
        let sessions = JwtSessions::new(&config.security, Arc::new(clock.clone()));
        Harness {
            issuer: TokenIssuer::new(store.clone(), Arc::new(LogEmailSender), Arc::new(clock.clone()), &config.magic_link),
            validator: TokenValidator::new(store.clone(), Arc::new(clock.clone())),
            consumer: Arc::new(TokenConsumer::new(store.clone(), sessions.clone(), Arc::new(clock.clone()))),
            sessions,
            store,
            clock,
        }
    }

    #[tokio::test]
    async fn consume_opens_survey_scoped_session_once() {
        let h = harness();
        let survey = seed_survey(&h.store, Uuid::new_v4(), SurveyStatus::Active).await;
        let token = h.issuer.issue("alice@example.com", survey.id).await.unwrap().token.token;

        let consumed = h.consumer.consume(&token).await.unwrap();
        assert_eq!(consumed.survey_id, survey.id);
        assert_eq!(consumed.session.email, "alice@example.com");
        assert_eq!(
            h.sessions.decode(&consumed.session.access_token).unwrap(),
            Principal::Respondent {
                email: "alice@example.com".into(),
                survey_id: survey.id
            }
        );

        let row = h.store.find_magic_link(&token).await.unwrap().unwrap();
        assert_eq!(row.used_at, Some(h.clock.now()));

        assert!(matches!(h.consumer.consume(&token).await, Err(ServiceError::TokenInvalid)));
        assert!(matches!(h.validator.validate(&token).await, Err(ServiceError::TokenInvalid)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumes_have_exactly_one_winner() {
        let h = harness();
        let survey = seed_survey(&h.store, Uuid::new_v4(), SurveyStatus::Active).await;
        let token = h.issuer.issue("alice@example.com", survey.id).await.unwrap().token.token;

        let attempts: Vec<_> = (0..32)
            .map(|_| {
                let consumer = h.consumer.clone();
                let token = token.clone();
                tokio::spawn(async move { consumer.consume(&token).await })
            })
            .collect();

        let mut wins = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => wins += 1,
                Err(ServiceError::TokenInvalid) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn expired_token_is_refused_and_left_unused() {
        let h = harness();
        let survey = seed_survey(&h.store, Uuid::new_v4(), SurveyStatus::Active).await;
        let token = h.issuer.issue("alice@example.com", survey.id).await.unwrap().token.token;

        h.clock.advance(Duration::seconds(86_400));
        assert!(matches!(h.consumer.consume(&token).await, Err(ServiceError::TokenInvalid)));
        assert!(h.store.find_magic_link(&token).await.unwrap().unwrap().used_at.is_none());
    }

    #[tokio::test]
    async fn unknown_token_is_refused() {
        let h = harness();
        assert!(matches!(h.consumer.consume("never-issued").await, Err(ServiceError::TokenInvalid)));
        assert!(matches!(h.consumer.consume("").await, Err(ServiceError::TokenInvalid)));
    }
}
