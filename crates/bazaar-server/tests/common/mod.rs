// Shared helpers for the HTTP integration tests
#![allow(dead_code)]

use std::sync::Arc;

use actix_http::Request;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    test,
};
use serde_json::{Value, json};

use bazaar_persistence::{PersistenceService, SqlPersistService, init_schema, sea_orm::Database};
use bazaar_server::{
    model::{AppState, Configuration},
    service::InMemoryPaymentGateway,
};

pub const TEST_SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "correct-horse-battery";

/// App state over a fresh in-memory database
pub async fn test_state_with(auth_enabled: bool) -> Arc<AppState> {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    init_schema(&db).await.unwrap();
    let persistence: Arc<dyn PersistenceService> = Arc::new(SqlPersistService::new(db));

    let config = config::Config::builder()
        .set_override("auth.enabled", auth_enabled)
        .unwrap()
        .set_override("auth.token.secret_key", TEST_SECRET)
        .unwrap()
        .build()
        .unwrap();

    Arc::new(AppState::new(
        Configuration::from_config(config),
        persistence,
        Arc::new(InMemoryPaymentGateway::new()),
    ))
}

pub async fn test_state() -> Arc<AppState> {
    test_state_with(true).await
}

/// Build the full application under `/api` for the given state
#[macro_export]
macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(bazaar_server::middleware::Authentication)
                .app_data(actix_web::web::Data::from($state.clone()))
                .configure(|cfg| bazaar_server::startup::configure_routes(cfg, "/api")),
        )
        .await
    };
}

/// A registered user and its bearer token
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub token: String,
}

impl TestUser {
    pub fn bearer(&self) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", self.token))
    }
}

pub async fn register<S, B>(app: &S, email: &str, user_type: &str) -> TestUser
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "email": email,
            "name": email.split('@').next().unwrap_or(email),
            "password": PASSWORD,
            "userType": user_type,
        }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), 201, "register {}", email);

    let body: Value = test::read_body_json(resp).await;
    TestUser {
        id: body["data"]["user"]["id"].as_str().unwrap().to_string(),
        token: body["data"]["accessToken"].as_str().unwrap().to_string(),
    }
}

/// Call the service and decode the JSON envelope
pub async fn call_json<S, B>(app: &S, req: Request) -> (u16, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status().as_u16();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

pub fn project_body(title: &str) -> Value {
    json!({
        "title": title,
        "description": "Needs doing",
        "budgetMin": 10_000,
        "budgetMax": 50_000,
        "timelineDays": 14,
        "skills": ["rust", "actix"],
    })
}
