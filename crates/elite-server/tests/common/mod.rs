//! Shared fixtures for the HTTP integration tests
//!
//! Each test gets its own embedded store and upload root in a temp directory.
//! OTP deliveries go to a [`MemoryNotifier`] so flows can read the codes back.

#![allow(dead_code)]

use std::sync::Arc;

use config::Config;
use elite_auth::{MemoryNotifier, TOKEN_SECRET_KEY};
use elite_persistence::{
    EmbeddedPersistService, KycStatus, PersistenceService, UserInfo, UserPatch,
};
use elite_server::model::{AppState, Configuration, constants::UPLOAD_ROOT_PROPERTY};
use tempfile::TempDir;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const TEST_PASSWORD: &str = "Str0ngPass";

pub struct TestContext {
    pub state: AppState,
    pub notifier: Arc<MemoryNotifier>,
    pub persistence: Arc<dyn PersistenceService>,
    _dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_overrides(&[])
    }

    pub fn with_overrides(overrides: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        let upload_root = dir.path().join("static");

        let mut builder = Config::builder()
            .set_override(TOKEN_SECRET_KEY, TEST_SECRET)
            .unwrap()
            .set_override(UPLOAD_ROOT_PROPERTY, upload_root.to_string_lossy().to_string())
            .unwrap();
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value).unwrap();
        }
        let configuration = Configuration::from_config(builder.build().unwrap());

        let persistence: Arc<dyn PersistenceService> =
            Arc::new(EmbeddedPersistService::open(dir.path().join("data")).unwrap());
        let notifier = Arc::new(MemoryNotifier::new());
        let state = AppState::new(configuration, persistence.clone(), notifier.clone());
        state.uploads.ensure_dirs().unwrap();

        Self {
            state,
            notifier,
            persistence,
            _dir: dir,
        }
    }

    pub async fn user(&self, email: &str) -> UserInfo {
        self.persistence
            .user_find_by_email(email)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn update_user(&self, email: &str, patch: UserPatch) -> UserInfo {
        let user = self.user(email).await;
        self.persistence.user_update(user.id, &patch).await.unwrap()
    }

    /// Marks a user's KYC verified so they can move money
    pub async fn verify_kyc(&self, email: &str) -> UserInfo {
        self.update_user(
            email,
            UserPatch {
                kyc_status: Some(KycStatus::Verified),
                ..Default::default()
            },
        )
        .await
    }
}

/// Builds the full API service around a [`TestContext`]'s state
#[macro_export]
macro_rules! init_app {
    ($ctx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(elite_server::middleware::auth::Authentication)
                .app_data(actix_web::web::Data::new($ctx.state.clone()))
                .configure(elite_server::startup::configure_routes),
        )
        .await
    };
}

/// Sends a request and returns the status with the JSON body (`Null` when empty)
#[macro_export]
macro_rules! call {
    ($app:expr, $req:expr) => {{
        let resp = actix_web::test::call_service(&$app, $req.to_request()).await;
        let status = resp.status();
        let body = actix_web::test::read_body(resp).await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }};
}

/// Registers, verifies and signs in a customer; evaluates to the access token
#[macro_export]
macro_rules! sign_up {
    ($app:expr, $ctx:expr, $email:expr) => {{
        use actix_web::test::TestRequest;
        use elite_persistence::OtpPurpose;
        use serde_json::json;

        let (status, _) = call!(
            $app,
            TestRequest::post().uri("/api/v1/auth/register").set_json(json!({
                "email": $email,
                "first_name": "Ada",
                "last_name": "Obi",
                "password": common::TEST_PASSWORD,
            }))
        );
        assert_eq!(status, actix_web::http::StatusCode::CREATED);

        let code = $ctx.notifier.last_code($email, OtpPurpose::Registration).unwrap();
        let (status, body) = call!(
            $app,
            TestRequest::post()
                .uri("/api/v1/auth/verify-registration")
                .set_json(json!({ "email": $email, "code": code }))
        );
        assert_eq!(status, actix_web::http::StatusCode::OK);
        body["data"]["access_token"].as_str().unwrap().to_string()
    }};
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}
