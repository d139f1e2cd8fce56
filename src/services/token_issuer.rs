use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use super::rate_limit::{IssuanceRateLimiter, RateDecision};
use super::token::{fingerprint, generate_token};
use crate::clock::Clock;
use crate::config::{MagicLinkConfig, MAX_TOKEN_TTL_SECS};
use crate::database::models::MagicLinkToken;
use crate::database::{MagicLinkStore, Store, SurveyStore};
use crate::email::{EmailSender, MagicLinkEmail};

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub email: String,
    pub survey_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub link_url: String,
}

/// A persisted token plus the background delivery of its email
pub struct Issuance {
    pub token: IssuedToken,
    pub delivery: JoinHandle<()>,
}

pub struct TokenIssuer {
    store: Arc<dyn Store>,
    mailer: Arc<dyn EmailSender>,
    clock: Arc<dyn Clock>,
    limiter: IssuanceRateLimiter,
    ttl: Duration,
    base_url: String,
}

impl TokenIssuer {
    pub fn new(
        store: Arc<dyn Store>,
        mailer: Arc<dyn EmailSender>,
        clock: Arc<dyn Clock>,
        config: &MagicLinkConfig,
    ) -> Self {
        Self {
            limiter: IssuanceRateLimiter::new(config, clock.clone()),
            store,
            mailer,
            clock,
            ttl: Duration::seconds(config.ttl_secs.min(MAX_TOKEN_TTL_SECS) as i64),
            base_url: config.base_url.clone(),
        }
    }

    /// Mint a single-use token for `email` on an accepting survey and queue its email.
    ///
    /// Delivery runs detached; its failure is logged and never reaches the caller.
    pub async fn issue(&self, email: &str, survey_id: Uuid) -> ServiceResult<Issuance> {
        let survey = match self.store.find_survey(survey_id).await? {
            Some(survey) if survey.accepts_respondents() => survey,
            _ => {
                tracing::warn!(%survey_id, "magic link refused: survey not eligible");
                return Err(ServiceError::SurveyNotEligible);
            }
        };
        let Some(slug) = survey.unique_link.as_deref() else {
            return Err(ServiceError::SurveyNotEligible);
        };

        let email = normalize_email(email)?;

        if let RateDecision::Limited { retry_after_secs } = self.limiter.check(&email, survey_id).await {
            tracing::warn!(%survey_id, retry_after_secs, "magic link refused: rate limited");
            return Err(ServiceError::RateLimited { retry_after_secs });
        }

        let now = self.clock.now();
        let row = MagicLinkToken {
            token: generate_token(),
            email: email.clone(),
            survey_id,
            expires_at: now + self.ttl,
            used_at: None,
            created_at: now,
        };
        self.store.insert_magic_link(&row).await?;

        let link_url = self.link_url(slug, &row.token)?;
        tracing::info!(
            %survey_id,
            fingerprint = %fingerprint(&row.token),
            expires_at = %row.expires_at,
            "magic link issued"
        );

        let message = MagicLinkEmail {
            to: email.clone(),
            url: link_url.clone(),
            survey_title: survey.title.clone(),
        };
        let mailer = self.mailer.clone();
        let delivery = tokio::spawn(async move {
            if let Err(e) = mailer.send(&message).await {
                tracing::warn!(survey_id = %survey_id, "EmailDeliveryFailed: {}", e);
            }
        });

        Ok(Issuance {
            token: IssuedToken {
                token: row.token,
                email,
                survey_id,
                expires_at: row.expires_at,
                link_url,
            },
            delivery,
        })
    }

    fn link_url(&self, slug: &str, token: &str) -> ServiceResult<String> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ServiceError::Internal(format!("magic_link.base_url is invalid: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::Internal("magic_link.base_url cannot carry a path".into()))?
            .pop_if_empty()
            .extend(["s", slug]);
        url.query_pairs_mut().append_pair("token", token);
        Ok(url.into())
    }
}

/// Trim and apply a plausibility check: one `@`, non-empty local part, dotted domain
pub fn normalize_email(raw: &str) -> ServiceResult<String> {
    let email = raw.trim();
    let plausible = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !plausible || email.len() > 254 {
        return Err(ServiceError::InvalidInput("A valid email address is required".into()));
    }
    Ok(email.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::AppConfig;
    use crate::database::models::SurveyStatus;
    use crate::database::MemoryStore;
    use crate::testing::{seed_survey, FailingEmailSender, RecordingEmailSender};

    fn issuer(store: Arc<MemoryStore>, mailer: Arc<dyn EmailSender>, clock: &ManualClock) -> TokenIssuer {
        TokenIssuer::new(store, mailer, Arc::new(clock.clone()), &AppConfig::development().magic_link)
    }

    #[tokio::test]
    async fn issues_token_with_configured_ttl_and_sends_link() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::default();
        let (mailer, mut outbox) = RecordingEmailSender::new();
        let survey = seed_survey(&store, Uuid::new_v4(), SurveyStatus::Active).await;

        let issuance = issuer(store.clone(), Arc::new(mailer), &clock)
            .issue("  alice@example.com ", survey.id)
            .await
            .unwrap();
        issuance.delivery.await.unwrap();

        let token = issuance.token;
        assert_eq!(token.email, "alice@example.com");
        assert_eq!(token.expires_at, clock.now() + Duration::seconds(86_400));

        let row = store.find_magic_link(&token.token).await.unwrap().unwrap();
        assert!(row.used_at.is_none());
        assert_eq!(row.survey_id, survey.id);

        let sent = outbox.recv().await.unwrap();
        assert_eq!(sent.to, "alice@example.com");
        assert!(sent.url.contains(&format!("/s/{}", survey.unique_link.unwrap())));
        assert!(sent.url.ends_with(&format!("token={}", token.token)));
    }

    #[tokio::test]
    async fn ineligible_surveys_are_refused_for_any_email() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::default();
        let owner = Uuid::new_v4();
        let draft = seed_survey(&store, owner, SurveyStatus::Draft).await;
        let closed = seed_survey(&store, owner, SurveyStatus::Closed).await;
        let issuer = issuer(store.clone(), Arc::new(crate::email::LogEmailSender), &clock);

        for survey_id in [draft.id, closed.id, Uuid::new_v4()] {
            for email in ["alice@example.com", "bob@test.org"] {
                assert!(matches!(
                    issuer.issue(email, survey_id).await,
                    Err(ServiceError::SurveyNotEligible)
                ));
            }
        }
    }

    #[tokio::test]
    async fn eligibility_is_decided_before_email_validity() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::default();
        let owner = Uuid::new_v4();
        let draft = seed_survey(&store, owner, SurveyStatus::Draft).await;
        let closed = seed_survey(&store, owner, SurveyStatus::Closed).await;
        let unlinked = crate::testing::seed_survey_with(&store, owner, SurveyStatus::Active, None, None).await;
        let open = seed_survey(&store, owner, SurveyStatus::Active).await;
        let issuer = issuer(store.clone(), Arc::new(crate::email::LogEmailSender), &clock);

        for survey_id in [draft.id, closed.id, unlinked.id, Uuid::new_v4()] {
            for email in ["not-an-email", "", "a@b"] {
                assert!(matches!(
                    issuer.issue(email, survey_id).await,
                    Err(ServiceError::SurveyNotEligible)
                ));
            }
        }
        assert!(matches!(
            issuer.issue("not-an-email", open.id).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn active_survey_without_link_is_refused() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::default();
        let survey = crate::testing::seed_survey_with(&store, Uuid::new_v4(), SurveyStatus::Active, None, None).await;
        let issuer = issuer(store, Arc::new(crate::email::LogEmailSender), &clock);

        assert!(matches!(
            issuer.issue("alice@example.com", survey.id).await,
            Err(ServiceError::SurveyNotEligible)
        ));
    }

    #[tokio::test]
    async fn failing_mailer_does_not_fail_issuance() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::default();
        let survey = seed_survey(&store, Uuid::new_v4(), SurveyStatus::Active).await;

        let issuance = issuer(store.clone(), Arc::new(FailingEmailSender), &clock)
            .issue("alice@example.com", survey.id)
            .await
            .unwrap();
        issuance.delivery.await.unwrap();

        assert!(store.find_magic_link(&issuance.token.token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rate_limit_applies_per_email_and_survey() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::default();
        let survey = seed_survey(&store, Uuid::new_v4(), SurveyStatus::Active).await;

        let mut config = AppConfig::development().magic_link;
        config.enable_rate_limiting = true;
        config.rate_limit_max_requests = 2;
        config.rate_limit_window_secs = 300;
        let issuer = TokenIssuer::new(
            store,
            Arc::new(crate::email::LogEmailSender),
            Arc::new(clock.clone()),
            &config,
        );

        issuer.issue("alice@example.com", survey.id).await.unwrap();
        issuer.issue("alice@example.com", survey.id).await.unwrap();
        assert!(matches!(
            issuer.issue("alice@example.com", survey.id).await,
            Err(ServiceError::RateLimited { retry_after_secs: 300 })
        ));
        issuer.issue("bob@example.com", survey.id).await.unwrap();

        clock.advance(Duration::seconds(300));
        issuer.issue("alice@example.com", survey.id).await.unwrap();
    }

    #[tokio::test]
    async fn oversized_ttl_is_capped() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::default();
        let survey = seed_survey(&store, Uuid::new_v4(), SurveyStatus::Active).await;

        let mut config = AppConfig::development().magic_link;
        config.ttl_secs = u64::MAX;
        let issuer = TokenIssuer::new(store, Arc::new(crate::email::LogEmailSender), Arc::new(clock.clone()), &config);

        let issuance = issuer.issue("alice@example.com", survey.id).await.unwrap();
        assert_eq!(
            issuance.token.expires_at,
            clock.now() + Duration::seconds(MAX_TOKEN_TTL_SECS as i64)
        );
    }

    #[test]
    fn email_plausibility() {
        assert_eq!(normalize_email(" a@b.co ").unwrap(), "a@b.co");
        for bad in ["", "plain", "@b.co", "a@b", "a@.co", "a@b.", "a b@c.co", "a@b@c.co"] {
            assert!(normalize_email(bad).is_err(), "{bad} should be rejected");
        }
    }
}
