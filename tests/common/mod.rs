#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use survey_auth_api::app::{router, AppState};
use survey_auth_api::auth::JwtSessions;
use survey_auth_api::clock::SystemClock;
use survey_auth_api::config::AppConfig;
use survey_auth_api::database::MemoryStore;
use survey_auth_api::email::MagicLinkEmail;
use survey_auth_api::testing::RecordingEmailSender;

/// One in-process server per test, backed by a fresh memory store
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub sessions: JwtSessions,
    pub outbox: mpsc::UnboundedReceiver<MagicLinkEmail>,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(AppConfig::development()).await
    }

    pub async fn start_with(mut config: AppConfig) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        config.api.port = port;
        config.api.enable_request_logging = false;

        let store = Arc::new(MemoryStore::new());
        let (mailer, outbox) = RecordingEmailSender::new();
        let clock = Arc::new(SystemClock);
        let sessions = JwtSessions::new(&config.security, clock.clone());
        let state = AppState::new(config, store.clone(), Arc::new(mailer), clock);

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router(state)).await;
        });

        let server = Self {
            port,
            base_url: format!("http://127.0.0.1:{}", port),
            store,
            sessions,
            outbox,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn account_token(&self, account_id: Uuid) -> String {
        self.sessions.issue_account_token(account_id).expect("mint account token")
    }

    pub fn service_token(&self) -> String {
        self.sessions.issue_service_token().expect("mint service token")
    }

    pub async fn post_json(&self, path: &str, body: Value, bearer: Option<&str>) -> Result<(StatusCode, Value)> {
        let mut req = self.client.post(self.url(path)).json(&body);
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }
        let res = req.send().await?;
        let status = res.status();
        Ok((status, res.json().await?))
    }

    pub async fn get_json(&self, path: &str, bearer: Option<&str>) -> Result<(StatusCode, Value)> {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }
        let res = req.send().await?;
        let status = res.status();
        Ok((status, res.json().await?))
    }

    /// Next magic link email the server sent, with its token pulled out of the URL
    pub async fn next_email(&mut self) -> Result<(MagicLinkEmail, String)> {
        let email = tokio::time::timeout(Duration::from_secs(5), self.outbox.recv())
            .await
            .context("no email within 5s")?
            .context("outbox closed")?;
        let token = email
            .url
            .split("token=")
            .nth(1)
            .context("link without token")?
            .to_string();
        Ok((email, token))
    }
}
