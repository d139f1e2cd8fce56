use axum::{
    extract::State,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::auth::JwtSessions;
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::database::{Store, StoreHealth};
use crate::email::EmailSender;
use crate::handlers::{protected, public};
use crate::middleware::{principal_middleware, ApiResponse, ApiResult};
use crate::services::{ProfileService, ResponseService, SurveyService, TokenConsumer, TokenIssuer, TokenValidator};

/// Everything a handler can reach. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub sessions: JwtSessions,
    pub issuer: Arc<TokenIssuer>,
    pub validator: Arc<TokenValidator>,
    pub consumer: Arc<TokenConsumer>,
    pub surveys: Arc<SurveyService>,
    pub responses: Arc<ResponseService>,
    pub profiles: Arc<ProfileService>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>, mailer: Arc<dyn EmailSender>, clock: Arc<dyn Clock>) -> Self {
        let sessions = JwtSessions::new(&config.security, clock.clone());
        Self {
            issuer: Arc::new(TokenIssuer::new(store.clone(), mailer, clock.clone(), &config.magic_link)),
            validator: Arc::new(TokenValidator::new(store.clone(), clock.clone())),
            consumer: Arc::new(TokenConsumer::new(store.clone(), sessions.clone(), clock)),
            surveys: Arc::new(SurveyService::new(store.clone())),
            responses: Arc::new(ResponseService::new(store.clone())),
            profiles: Arc::new(ProfileService::new(store.clone())),
            sessions,
            store,
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(magic_link_routes())
        // Principal-aware API
        .merge(api_routes().route_layer(from_fn_with_state(state.clone(), principal_middleware)))
        .layer(RequestBodyLimitLayer::new(state.config.api.max_request_size_bytes));

    if state.config.security.enable_cors {
        app = app.layer(cors_layer(&state.config.security.cors_origins));
    }
    if state.config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    app.with_state(state)
}

fn magic_link_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/magic-link/generate", post(public::generate_post))
        .route("/auth/magic-link/validate", post(public::validate_post))
        .route("/auth/magic-link/use", post(public::use_post))
}

fn api_routes() -> Router<AppState> {
    use protected::{auth, profiles, responses, surveys};

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami_get))
        .route("/api/surveys", get(surveys::surveys_get))
        .route(
            "/api/surveys/:id",
            get(surveys::survey_get)
                .patch(surveys::survey_patch)
                .delete(surveys::survey_delete),
        )
        .route(
            "/api/surveys/:id/responses",
            get(responses::responses_get).post(responses::responses_post),
        )
        .route("/api/responses/:id", delete(responses::response_delete))
        .route("/api/profiles/:id", get(profiles::profile_get))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") || origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn root() -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Magic-link respondent access and tenant-isolated survey data",
        "endpoints": {
            "magic_link": [
                "POST /auth/magic-link/generate",
                "POST /auth/magic-link/validate",
                "POST /auth/magic-link/use"
            ],
            "api": [
                "GET /api/auth/whoami",
                "GET /api/surveys",
                "GET|PATCH|DELETE /api/surveys/:id",
                "GET|POST /api/surveys/:id/responses",
                "DELETE /api/responses/:id",
                "GET /api/profiles/:id"
            ]
        }
    })))
}

async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    state.store.ping().await.map_err(crate::services::ServiceError::from)?;
    Ok(ApiResponse::success(json!({
        "status": "ok",
        "environment": state.config.environment,
        "timestamp": chrono::Utc::now(),
    })))
}

/// Bind and serve until the process is stopped
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let bind_addr = format!("0.0.0.0:{}", state.config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    tracing::info!("survey-auth-api listening on http://{}", bind_addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
