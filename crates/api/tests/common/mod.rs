//! Common test utilities for integration tests.
//!
//! The app runs on the in-memory store with a recording mailer, so these
//! tests need no database.

#![allow(dead_code)]

use std::sync::Arc;

use atelier_api::app::{create_app, AppState, Stores};
use atelier_api::config::{
    Config, DatabaseConfig, EmailConfig, JobsConfig, JwtAuthConfig, LoggingConfig, SecurityConfig,
    ServerConfig, SigningConfig,
};
use atelier_api::services::flash::read_flash;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, Request};
use axum::response::Response;
use axum::Router;
use chrono::{Duration, Utc};
use domain::models::{Event, NewUser, OrgRole, Organization, User, UserId};
use domain::repositories::{InMemoryStore, OrganizationRepository, UserRepository};
use domain::services::{AttendanceAction, FlashMessage, MockMailer};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use jsonwebtoken::{encode, EncodingKey, Header};
use shared::jwt::Claims;

pub const BASE_URL: &str = "https://atelier.test";
pub const JWT_SECRET: &str = "integration-test-jwt-secret";
pub const SIGNING_SECRET: &str = "integration-test-signing-secret-0123456789";

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            base_url: BASE_URL.to_string(),
        },
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 5,
            idle_timeout_secs: 60,
        },
        logging: LoggingConfig {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig::default(),
        signing: SigningConfig {
            secret_key: SIGNING_SECRET.to_string(),
        },
        jwt: JwtAuthConfig {
            algorithm: "HS256".to_string(),
            public_key: String::new(),
            secret: JWT_SECRET.to_string(),
            leeway_secs: 0,
        },
        email: EmailConfig::default(),
        jobs: JobsConfig::default(),
    }
}

/// An app over a fresh in-memory store.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub mailer: MockMailer,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let mailer = MockMailer::new();
        let state = AppState::with_mailer(
            test_config(),
            Stores::in_memory(store.clone()),
            Arc::new(mailer.clone()),
        )
        .expect("Failed to build app state");

        Self {
            router: create_app(state.clone()),
            state,
            store,
            mailer,
        }
    }

    pub async fn organization(&self) -> Organization {
        self.store.insert_organization("Atelier du Vélo").await
    }

    pub async fn user(&self) -> User {
        UserRepository::create(
            self.store.as_ref(),
            NewUser {
                email: unique_email(),
                first_name: FirstName().fake(),
                last_name: LastName().fake(),
            },
        )
        .await
        .expect("Failed to create user")
    }

    /// A guest created by booking with only an email address.
    pub async fn temporary_user(&self) -> User {
        UserRepository::create(self.store.as_ref(), NewUser::temporary(&unique_email()))
            .await
            .expect("Failed to create user")
    }

    pub async fn member(&self, organization: &Organization, role: OrgRole) -> User {
        let user = self.user().await;
        OrganizationRepository::set_member_role(self.store.as_ref(), organization.id, user.id, role)
            .await
            .expect("Failed to set role");
        user
    }

    /// A published event starting tomorrow.
    pub async fn event(&self, organization: &Organization, capacity: i32) -> Event {
        self.insert_event(organization, capacity, true).await
    }

    pub async fn insert_event(
        &self,
        organization: &Organization,
        capacity: i32,
        published: bool,
    ) -> Event {
        let now = Utc::now();
        let id = next_id();
        self.store
            .insert_event(Event {
                id,
                organization_id: organization.id,
                activity_id: 1,
                location_id: None,
                title: format!("Repair café #{id}"),
                starts_at: now + Duration::days(1),
                ends_at: now + Duration::days(1) + Duration::hours(3),
                publish_at: now - Duration::hours(1),
                published,
                capacity,
                created_at: now,
                updated_at: now,
            })
            .await
    }

    /// Relative link path, as found in emails.
    pub fn link(&self, action: AttendanceAction, user_id: UserId, event_id: i64) -> String {
        self.state
            .attendance
            .action_path(action, user_id, event_id)
            .expect("Failed to mint link")
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        use tower::ServiceExt;
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed")
    }
}

fn next_id() -> i64 {
    use std::sync::atomic::{AtomicI64, Ordering};
    static NEXT: AtomicI64 = AtomicI64::new(1000);
    NEXT.fetch_add(1, Ordering::SeqCst)
}

/// Fake address, prefixed so two users never collide.
fn unique_email() -> String {
    format!("u{}.{}", next_id(), SafeEmail().fake::<String>())
}

/// Bearer token for `user_id`, signed like the identity provider would.
pub fn bearer_token(user_id: UserId) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign token")
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

pub fn json_request_with_auth(
    method: Method,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Request<Body> {
    let mut request = json_request(method, uri, body);
    request.headers_mut().insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    request
}

pub fn request_with_auth(method: Method, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub async fn parse_response_body(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
}

pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// The flash message set by `response`, read back as the browser would send it.
pub fn flash(response: &Response) -> Option<FlashMessage> {
    let cookie = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("flash=") && !v.contains("Max-Age=0"))?;
    let pair = cookie.split(';').next()?;

    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, HeaderValue::from_str(pair).ok()?);
    read_flash(&headers)
}
