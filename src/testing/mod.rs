//! Fixtures shared by unit and integration tests.

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::database::models::{NewSurvey, Profile, Survey, SurveyStatus};
use crate::database::{MemoryStore, ProfileStore, SurveyStore};
use crate::email::{EmailError, EmailSender, MagicLinkEmail};
use crate::services::token::generate_link_slug;

/// Survey with a fresh public link and no response cap
pub async fn seed_survey(store: &MemoryStore, owner: Uuid, status: SurveyStatus) -> Survey {
    seed_survey_with(store, owner, status, Some(generate_link_slug()), None).await
}

pub async fn seed_survey_with(
    store: &MemoryStore,
    owner: Uuid,
    status: SurveyStatus,
    unique_link: Option<String>,
    max_responses: Option<i32>,
) -> Survey {
    store
        .insert_survey(NewSurvey {
            owner_account_id: owner,
            title: format!("Survey {}", &Uuid::new_v4().simple().to_string()[..8]),
            status,
            unique_link,
            max_responses,
        })
        .await
        .expect("seed survey")
}

pub async fn seed_profile(store: &MemoryStore, account_id: Uuid, plan: &str) -> Profile {
    let profile = Profile {
        id: account_id,
        plan_name: plan.to_string(),
        subscription_status: "active".to_string(),
    };
    store.upsert_profile(&profile).await.expect("seed profile");
    profile
}

/// Mailer that hands every message to a channel instead of sending it
pub struct RecordingEmailSender {
    outbox: mpsc::UnboundedSender<MagicLinkEmail>,
}

impl RecordingEmailSender {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MagicLinkEmail>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { outbox: tx }, rx)
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, email: &MagicLinkEmail) -> Result<(), EmailError> {
        self.outbox
            .send(email.clone())
            .map_err(|_| EmailError::DeliveryFailed("outbox closed".into()))
    }
}

/// Mailer whose provider is always down
#[derive(Debug, Default)]
pub struct FailingEmailSender;

#[async_trait]
impl EmailSender for FailingEmailSender {
    async fn send(&self, _email: &MagicLinkEmail) -> Result<(), EmailError> {
        Err(EmailError::DeliveryFailed("provider unavailable".into()))
    }
}
