//! Server startup and wiring.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use axum::Router;
use axum::body::Body;
use axum::response::IntoResponse;
use cats_core::{Fault, JwtValidator};
use cats_db::{
    CatRepository, Database, DbConfig, MemoryCatRepository, MemoryUserRepository, UserRepository,
    create_pool,
};
use cats_email::{EmailConfig, EmailService};
use cats_telemetry::PrometheusHandle;
use http::{HeaderName, Request, Response, StatusCode};
use secrecy::ExposeSecret;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{Level, info, warn};

use crate::config::Config;
use crate::middleware::{
    AuthLayer, ErrorTranslatorLayer, FaultSink, MetricsLayer, ResponseTransformLayer,
    TRACE_ID_HEADER, TraceId, TraceIdLayer, TracingSink,
};
use crate::routes::{app_routes, not_found};
use crate::services::ai::{ChatClient, ChatConfig, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::services::{AiService, AuthService, CatService};

/// CORS preflight cache lifetime.
const CORS_MAX_AGE: Duration = Duration::from_secs(3600);

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub cats: CatService,
    pub auth: AuthService,
    pub ai: AiService,
    pub metrics: PrometheusHandle,
}

/// Settings of the layer stack around the routes.
#[derive(Clone)]
pub struct PipelineSettings {
    pub sink: Arc<dyn FaultSink>,
    /// Put the real message of internal failures into `details`.
    pub expose_details: bool,
    pub request_timeout: Duration,
    pub cors_allow_origins: Option<String>,
    pub production: bool,
}

impl PipelineSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let production = config.environment.is_production();
        Self {
            sink: Arc::new(TracingSink),
            expose_details: !production,
            request_timeout: config.request_timeout(),
            cors_allow_origins: config.cors_allow_origins.clone(),
            production,
        }
    }
}

/// Build and configure the complete application.
pub async fn build_app(
    config: &Config,
    metrics: PrometheusHandle,
) -> anyhow::Result<(Router, SocketAddr)> {
    let jwt_validator = JwtValidator::new(&config.jwt_secret);

    let (cats, users) = init_store(config).await?;
    let email = init_email(config)?;
    let chat = init_chat(config)?;

    let addr: SocketAddr = config
        .server_address
        .parse()
        .context("Invalid server address")?;

    let state = AppState {
        cats: CatService::new(cats),
        auth: AuthService::new(
            users,
            jwt_validator.clone(),
            config.access_token_ttl_minutes,
            email,
        ),
        ai: AiService::new(chat),
        metrics,
    };

    let app = build_router(state, jwt_validator, PipelineSettings::from_config(config));
    Ok((app, addr))
}

/// Routes plus the full layer stack. See [`crate::middleware`] for the order.
pub fn build_router(state: AppState, validator: JwtValidator, settings: PipelineSettings) -> Router {
    let cors = build_cors(settings.cors_allow_origins.as_deref(), settings.production);

    let middleware = ServiceBuilder::new()
        .layer(TraceIdLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<_>| {
                    let trace_id = req
                        .extensions()
                        .get::<TraceId>()
                        .map_or("", TraceId::as_str);
                    tracing::info_span!(
                        "request",
                        method = %req.method(),
                        uri = %req.uri(),
                        trace_id,
                        user_id = tracing::field::Empty,
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(MetricsLayer::new())
        .layer(cors)
        .layer(ErrorTranslatorLayer::new(settings.sink, settings.expose_details))
        .layer(ResponseTransformLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            settings.request_timeout,
        ))
        .layer(CatchPanicLayer::custom(panic_response));

    app_routes(state)
        .route_layer(AuthLayer::new(validator))
        .fallback(not_found)
        .layer(middleware)
}

/// Panics become internal faults so the translator renders and logs them.
fn panic_response(err: Box<dyn std::any::Any + Send + 'static>) -> Response<Body> {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    Fault::unknown(anyhow::anyhow!("Handler panicked: {message}")).into_response()
}

async fn init_store(
    config: &Config,
) -> anyhow::Result<(Arc<dyn CatRepository>, Arc<dyn UserRepository>)> {
    let Some(url) = config.database_url() else {
        warn!("DB_URL not set, using in-memory store");
        return Ok((
            Arc::new(MemoryCatRepository::seeded()),
            Arc::new(MemoryUserRepository::new()),
        ));
    };

    let db_config = DbConfig::new(
        url,
        config.db_pool_min,
        config.db_pool_max,
        config.db_connect_timeout(),
    );
    let pool = create_pool(&db_config).await?;
    info!("Connected to database");

    let database = Database::new(pool);
    database.migrate().await?;
    info!("Database migrations applied");

    Ok((Arc::new(database.cats), Arc::new(database.users)))
}

fn init_email(config: &Config) -> anyhow::Result<Option<EmailService>> {
    let (Some(url), Some(sender)) = (&config.smtp_url, &config.email_sender) else {
        info!("Email not configured");
        return Ok(None);
    };
    let email_config = EmailConfig::from_url(url.expose_secret(), sender)?;
    Ok(Some(EmailService::new(email_config)?))
}

fn init_chat(config: &Config) -> anyhow::Result<Option<ChatClient>> {
    let Some(api_key) = &config.openrouter_api_key else {
        info!("OPENROUTER_API_KEY not set, AI endpoints disabled");
        return Ok(None);
    };
    let client = ChatClient::new(ChatConfig {
        base_url: config.ai_base_url.clone(),
        api_key: api_key.clone(),
        model: config.openrouter_model.clone(),
        referer: config.openrouter_referer.clone(),
        app_name: config.openrouter_app_name.clone(),
        temperature: DEFAULT_TEMPERATURE,
        max_tokens: DEFAULT_MAX_TOKENS,
    })?;
    Ok(Some(client))
}

fn build_cors(origins: Option<&str>, production: bool) -> CorsLayer {
    let cors = match origins.map(str::trim) {
        Some("*") => CorsLayer::permissive(),
        Some(o) => {
            let origins: Vec<_> = o.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            CorsLayer::new().allow_origin(origins)
        }
        None if production => CorsLayer::new(),
        None => CorsLayer::permissive(),
    };

    cors.allow_headers(Any)
        .expose_headers([HeaderName::from_static(TRACE_ID_HEADER)])
        .allow_methods(Any)
        .max_age(CORS_MAX_AGE)
}
