use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use domain::repositories::{EventRepository, InMemoryStore, OrganizationRepository, UserRepository};
use domain::services::{AttendanceService, Mailer};
use persistence::repositories::{PgEventRepository, PgOrganizationRepository, PgUserRepository};
use shared::jwt::{JwtError, JwtVerifier};
use shared::signing::{TokenError, TokenSigner};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, require_user_auth, security_headers_middleware, trace_id,
};
use crate::routes::{attendance, events, health, organizations, resolver::AppRouteResolver};
use crate::services::email::EmailService;

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("Invalid signing configuration: {0}")]
    Signing(#[from] TokenError),

    #[error("Invalid JWT configuration: {0}")]
    Jwt(#[from] JwtError),
}

/// Storage backends behind the repository traits.
#[derive(Clone)]
pub struct Stores {
    pub events: Arc<dyn EventRepository>,
    pub users: Arc<dyn UserRepository>,
    pub organizations: Arc<dyn OrganizationRepository>,
    pub pool: Option<PgPool>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            events: Arc::new(PgEventRepository::new(pool.clone())),
            users: Arc::new(PgUserRepository::new(pool.clone())),
            organizations: Arc::new(PgOrganizationRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            events: store.clone(),
            users: store.clone(),
            organizations: store,
            pool: None,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub events: Arc<dyn EventRepository>,
    pub users: Arc<dyn UserRepository>,
    pub organizations: Arc<dyn OrganizationRepository>,
    pub attendance: AttendanceService,
    pub jwt: Arc<JwtVerifier>,
    /// Absent when running on in-memory stores.
    pub pool: Option<PgPool>,
}

impl AppState {
    /// Wires the attendance engine and auth from configuration, sending
    /// mail through the configured email provider.
    pub fn new(config: Config, stores: Stores) -> Result<Self, AppInitError> {
        let mailer = Arc::new(EmailService::new(config.email.clone()));
        Self::with_mailer(config, stores, mailer)
    }

    pub fn with_mailer(
        config: Config,
        stores: Stores,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, AppInitError> {
        let signer = TokenSigner::new(&config.signing.secret_key)?;
        let jwt = JwtVerifier::from_parts(
            &config.jwt.algorithm,
            config.jwt.verification_key(),
            config.jwt.leeway_secs,
        )?;

        let attendance = AttendanceService::new(
            stores.events.clone(),
            stores.users.clone(),
            mailer,
            Arc::new(AppRouteResolver::new()),
            signer,
            config.server.base_url.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            events: stores.events,
            users: stores.users,
            organizations: stores.organizations,
            attendance,
            jwt: Arc::new(jwt),
            pool: stores.pool,
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Emailed links: always answer with a redirect and a flash cookie.
    let attendance_routes = Router::new()
        .route("/attendance/book/:token", get(attendance::book))
        .route("/attendance/cancel/:token", get(attendance::cancel))
        .route("/attendance/present/:token", get(attendance::present))
        .route("/attendance/absent/:token", get(attendance::absent));

    let page_routes = Router::new()
        .route("/events", get(events::list_events))
        .route("/events/:event_id", get(events::get_event))
        .route("/events/:event_id/book", post(events::book_by_email));

    let protected_routes = Router::new()
        .route(
            "/api/v1/events/:event_id/attendance",
            get(events::get_roster),
        )
        .route("/api/v1/events/:event_id", delete(events::delete_event))
        .route(
            "/api/v1/organizations/:org_id/events",
            post(events::create_event),
        )
        .route(
            "/api/v1/organizations/:org_id/members",
            put(organizations::set_member_role),
        )
        .route(
            "/api/v1/organizations/:org_id/members/:user_id",
            delete(organizations::remove_member),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_auth,
        ));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(attendance_routes)
        .merge(page_routes)
        .merge(protected_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
