//! Customer self-service API tests
//!
//! Tests for /api/v1/profile, the KYC endpoints, /static, /api/v1/pin and
//! /api/v1/withdrawal-accounts

#[macro_use]
mod common;

use actix_web::{http::StatusCode, test::TestRequest};
use common::{TestContext, bearer};
use elite_persistence::UserPatch;
use serde_json::json;

const BOUNDARY: &str = "----elite-test-boundary";

/// Builds a multipart body with optional text fields and one `file` part
fn multipart(fields: &[(&str, &str)], filename: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(uri: &str, token: &str, body: Vec<u8>) -> TestRequest {
    TestRequest::post()
        .uri(uri)
        .insert_header(bearer(token))
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(body)
}

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image";

#[actix_web::test]
async fn test_profile_update_and_validation() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let token = sign_up!(app, ctx, "profile@example.com");

    let (status, body) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/profile")
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["first_name"], "Ada");

    let (status, body) = call!(
        app,
        TestRequest::put()
            .uri("/api/v1/profile")
            .insert_header(bearer(&token))
            .set_json(json!({
                "first_name": "Adaeze",
                "phone": "+2348012345678",
                "language_preference": "fr",
            }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["first_name"], "Adaeze");
    assert_eq!(body["data"]["last_name"], "Obi");
    assert_eq!(body["data"]["language_preference"], "fr");

    let (status, _) = call!(
        app,
        TestRequest::put()
            .uri("/api/v1/profile")
            .insert_header(bearer(&token))
            .set_json(json!({ "language_preference": "xx" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_profile_picture_upload() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let token = sign_up!(app, ctx, "picture@example.com");

    let (status, body) = call!(
        app,
        multipart_request(
            "/api/v1/profile/picture",
            &token,
            multipart(&[], "me.png", "image/png", PNG_BYTES),
        )
    );
    assert_eq!(status, StatusCode::OK);
    let url = body["data"]["profile_image"].as_str().unwrap().to_string();
    assert!(url.starts_with("/static/profile_pictures/"));

    // Profile pictures are public
    let (status, _) = call!(app, TestRequest::get().uri(&url));
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call!(
        app,
        multipart_request(
            "/api/v1/profile/picture",
            &token,
            multipart(&[], "notes.txt", "text/plain", b"hello"),
        )
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_kyc_documents_and_submission() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let token = sign_up!(app, ctx, "kyc@example.com");
    let other_token = sign_up!(app, ctx, "snoop@example.com");

    let personal_info = json!({
        "date_of_birth": "1990-05-17",
        "address": "12 Marina Road, Lagos Island",
        "city": "Lagos",
        "state": "Lagos",
        "country": "Nigeria",
        "postal_code": "101001",
    });

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/auth/submit-kyc")
            .insert_header(bearer(&token))
            .set_json(personal_info.clone())
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["missing_documents"].as_array().unwrap().len(), 3);

    let mut id_front_url = String::new();
    for document_type in ["id_front", "proof_of_address", "selfie"] {
        let (status, body) = call!(
            app,
            multipart_request(
                "/api/v1/auth/upload-kyc-document",
                &token,
                multipart(
                    &[("document_type", document_type)],
                    "scan.png",
                    "image/png",
                    PNG_BYTES,
                ),
            )
        );
        assert_eq!(status, StatusCode::OK);
        if document_type == "id_front" {
            id_front_url = body["data"]["document_url"].as_str().unwrap().to_string();
        }
    }
    assert!(id_front_url.starts_with("/static/kyc_documents/"));

    let (status, _) = call!(
        app,
        TestRequest::get()
            .uri(&id_front_url)
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call!(
        app,
        TestRequest::get()
            .uri(&id_front_url)
            .insert_header(bearer(&other_token))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call!(app, TestRequest::get().uri(&id_front_url));
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/auth/kyc-documents-status")
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id_front"], true);
    assert_eq!(body["data"]["id_back"], false);

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/auth/submit-kyc")
            .insert_header(bearer(&token))
            .set_json(personal_info.clone())
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["kyc_status"], "submitted");
    assert_eq!(body["data"]["can_transact"], false);

    // Applications under review are closed to changes
    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/auth/submit-kyc")
            .insert_header(bearer(&token))
            .set_json(personal_info)
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/auth/kyc-status")
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["kyc_status"], "submitted");
}

#[actix_web::test]
async fn test_kyc_document_access_rules() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let token = sign_up!(app, ctx, "owner@example.com");
    let other_token = sign_up!(app, ctx, "other@example.com");
    sign_up!(app, ctx, "reviewer@example.com");

    let reviewer = ctx
        .update_user(
            "reviewer@example.com",
            UserPatch {
                is_admin: Some(true),
                ..Default::default()
            },
        )
        .await;
    let admin_token = ctx
        .state
        .issue_token(reviewer.id, &reviewer.email, true)
        .unwrap();

    let (status, body) = call!(
        app,
        multipart_request(
            "/api/v1/auth/upload-kyc-document",
            &token,
            multipart(&[("document_type", "id_front")], "id.png", "image/png", PNG_BYTES),
        )
    );
    assert_eq!(status, StatusCode::OK);
    let url = body["data"]["document_url"].as_str().unwrap().to_string();

    for (auth, expected) in [
        (Some(&token), StatusCode::OK),
        (Some(&other_token), StatusCode::FORBIDDEN),
        (Some(&admin_token), StatusCode::OK),
        (None, StatusCode::UNAUTHORIZED),
    ] {
        let mut req = TestRequest::get().uri(&url);
        if let Some(auth) = auth {
            req = req.insert_header(bearer(auth));
        }
        let resp = actix_web::test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), expected, "GET {} as {:?}", url, auth.is_some());
        if expected == StatusCode::OK {
            let bytes = actix_web::test::read_body(resp).await;
            assert_eq!(&bytes[..], PNG_BYTES);
        }
    }

    let (status, _) = call!(
        app,
        TestRequest::get()
            .uri("/static/kyc_documents/user_1_..hidden.png")
            .insert_header(bearer(&admin_token))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_suspension_survives_stale_upload() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let token = sign_up!(app, ctx, "stale@example.com");

    // The upload handler has already loaded the user when the suspension lands
    let snapshot = ctx.user("stale@example.com").await;
    ctx.update_user(
        "stale@example.com",
        UserPatch {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .await;
    let (updated, _) = ctx
        .state
        .kyc
        .upload_document(
            &snapshot,
            elite_server::service::kyc::DocumentType::Selfie,
            "selfie.png",
            Some("image/png"),
            PNG_BYTES,
        )
        .await
        .unwrap();
    assert!(!updated.is_active);
    assert!(!ctx.user("stale@example.com").await.is_active);

    let (status, _) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/auth/me")
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_kyc_rejects_underage_applicants() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let token = sign_up!(app, ctx, "young@example.com");

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/auth/submit-kyc")
            .insert_header(bearer(&token))
            .set_json(json!({
                "date_of_birth": "2020-01-01",
                "address": "12 Marina Road, Lagos Island",
                "city": "Lagos",
                "country": "Nigeria",
                "postal_code": "101001",
            }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");
    assert_eq!(body["data"][0], "You must be at least 18 years old to register");
}

#[actix_web::test]
async fn test_pin_setup_verify_and_lockout() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let token = sign_up!(app, ctx, "pin@example.com");

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/pin/setup")
            .insert_header(bearer(&token))
            .set_json(json!({ "pin": "12ab" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/pin/setup")
            .insert_header(bearer(&token))
            .set_json(json!({ "pin": "482915" }))
    );
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/pin/verify")
            .set_json(json!({ "email": "pin@example.com", "pin": "482915" }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["token_type"], "bearer");
    assert_eq!(body["data"]["message"], "PIN verification successful");

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/pin/verify")
            .set_json(json!({ "email": "pin@example.com", "pin": "000000" }))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid PIN. 2 attempts remaining");

    call!(
        app,
        TestRequest::post()
            .uri("/api/v1/pin/verify")
            .set_json(json!({ "email": "pin@example.com", "pin": "000000" }))
    );
    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/pin/verify")
            .set_json(json!({ "email": "pin@example.com", "pin": "000000" }))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].as_str().unwrap().starts_with("PIN locked"));

    // Locked even with the right PIN
    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/pin/verify")
            .set_json(json!({ "email": "pin@example.com", "pin": "482915" }))
    );
    assert_eq!(status, StatusCode::LOCKED);

    let (status, body) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/pin/status")
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pin_set"], true);
    assert_eq!(body["data"]["is_locked"], true);
}

#[actix_web::test]
async fn test_concurrent_pin_failures_lock_once() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let token = sign_up!(app, ctx, "race@example.com");

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/pin/setup")
            .insert_header(bearer(&token))
            .set_json(json!({ "pin": "482915" }))
    );
    assert_eq!(status, StatusCode::CREATED);

    let attempts = (0..6).map(|_| {
        actix_web::test::call_service(
            &app,
            TestRequest::post()
                .uri("/api/v1/pin/verify")
                .set_json(json!({ "email": "race@example.com", "pin": "000000" }))
                .to_request(),
        )
    });
    let responses = futures::future::join_all(attempts).await;

    let mut warnings = 0;
    for resp in responses {
        assert_ne!(resp.status(), StatusCode::OK);
        let body: serde_json::Value =
            serde_json::from_slice(&actix_web::test::read_body(resp).await).unwrap();
        if body["message"]
            .as_str()
            .is_some_and(|m| m.contains("attempts remaining"))
        {
            warnings += 1;
        }
    }
    assert_eq!(warnings, 2);

    let (status, body) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/pin/status")
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_locked"], true);
    assert_eq!(body["data"]["failed_attempts"], 3);
}

#[actix_web::test]
async fn test_pin_disable_and_enable() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let token = sign_up!(app, ctx, "toggle@example.com");

    call!(
        app,
        TestRequest::post()
            .uri("/api/v1/pin/setup")
            .insert_header(bearer(&token))
            .set_json(json!({ "pin": "135790" }))
    );

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/pin/disable")
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/pin/verify")
            .set_json(json!({ "email": "toggle@example.com", "pin": "135790" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "PIN not setup for this user");

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/pin/enable")
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/pin/verify")
            .set_json(json!({ "email": "toggle@example.com", "pin": "135790" }))
    );
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn test_withdrawal_accounts_default_handling() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let token = sign_up!(app, ctx, "payout@example.com");

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/withdrawal-accounts")
            .insert_header(bearer(&token))
            .set_json(json!({
                "account_type": "bank",
                "provider": "paystack",
                "account_name": "Ada Obi",
                "account_number": "0123456789",
                "bank_code": "058",
                "bank_name": "GTBank",
            }))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["is_default"], true);
    let bank_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/withdrawal-accounts")
            .insert_header(bearer(&token))
            .set_json(json!({
                "account_type": "crypto",
                "provider": "binance",
                "wallet_address": "0x52908400098527886E0F7030069857D2E4169EE7",
                "wallet_network": "ERC20",
                "cryptocurrency": "USDT",
                "is_default": true,
            }))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["is_default"], true);
    let wallet_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = call!(
        app,
        TestRequest::get()
            .uri(&format!("/api/v1/withdrawal-accounts/{}", bank_id))
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_default"], false);

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/withdrawal-accounts")
            .insert_header(bearer(&token))
            .set_json(json!({
                "account_type": "crypto",
                "provider": "binance",
                "wallet_address": "not-an-address",
                "wallet_network": "ERC20",
                "cryptocurrency": "USDT",
            }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/api/v1/withdrawal-accounts/{}/set-default", bank_id))
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call!(
        app,
        TestRequest::delete()
            .uri(&format!("/api/v1/withdrawal-accounts/{}", wallet_id))
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message"], "Withdrawal account deleted successfully");

    let (status, body) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/withdrawal-accounts")
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["accounts"][0]["id"], bank_id);
    assert_eq!(body["data"]["accounts"][0]["is_default"], true);

    let (status, body) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/withdrawal-accounts/supported/providers")
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_object());
}

#[actix_web::test]
async fn test_withdrawal_account_ownership() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let token = sign_up!(app, ctx, "mine@example.com");
    let other_token = sign_up!(app, ctx, "theirs@example.com");

    let (_, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/withdrawal-accounts")
            .insert_header(bearer(&token))
            .set_json(json!({
                "account_type": "mobile_money",
                "provider": "flutterwave",
                "phone_number": "+256700000000",
                "mobile_network": "MTN",
            }))
    );
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = call!(
        app,
        TestRequest::delete()
            .uri(&format!("/api/v1/withdrawal-accounts/{}", id))
            .insert_header(bearer(&other_token))
    );
    assert_eq!(status, StatusCode::NOT_FOUND);
}
