//! Back-office API tests
//!
//! Tests for /api/v1/admin

#[macro_use]
mod common;

use actix_web::{http::StatusCode, test::TestRequest};
use common::{TEST_PASSWORD, TestContext, bearer};
use elite_persistence::{KycStatus, OtpPurpose, UserPatch};
use serde_json::json;

/// Bootstraps an admin and returns its access token
macro_rules! admin_sign_in {
    ($app:expr, $ctx:expr, $email:expr) => {{
        let (status, _) = call!(
            $app,
            TestRequest::post().uri("/api/v1/admin/register").set_json(json!({
                "email": $email,
                "password": TEST_PASSWORD,
            }))
        );
        assert_eq!(status, StatusCode::CREATED);
        let code = $ctx
            .notifier
            .last_code($email, OtpPurpose::AdminRegistration)
            .unwrap();
        let (status, _) = call!(
            $app,
            TestRequest::post()
                .uri("/api/v1/admin/verify-registration")
                .set_json(json!({ "email": $email, "code": code }))
        );
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call!(
            $app,
            TestRequest::post().uri("/api/v1/admin/login").set_json(json!({
                "email": $email,
                "password": TEST_PASSWORD,
            }))
        );
        assert_eq!(status, StatusCode::OK);
        let code = $ctx.notifier.last_code($email, OtpPurpose::AdminLogin).unwrap();
        let (status, body) = call!(
            $app,
            TestRequest::post()
                .uri("/api/v1/admin/verify-login")
                .set_json(json!({ "email": $email, "code": code }))
        );
        assert_eq!(status, StatusCode::OK);
        body["data"]["access_token"].as_str().unwrap().to_string()
    }};
}

#[actix_web::test]
async fn test_admin_registration_is_bootstrap_only() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    admin_sign_in!(app, ctx, "root@example.com");

    let (status, _) = call!(
        app,
        TestRequest::post().uri("/api/v1/admin/register").set_json(json!({
            "email": "second@example.com",
            "password": TEST_PASSWORD,
        }))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_unverified_admin_signup_keeps_registration_open() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);

    let (status, _) = call!(
        app,
        TestRequest::post().uri("/api/v1/admin/register").set_json(json!({
            "email": "abandoned@example.com",
            "password": TEST_PASSWORD,
        }))
    );
    assert_eq!(status, StatusCode::CREATED);

    admin_sign_in!(app, ctx, "root@example.com");

    let (status, _) = call!(
        app,
        TestRequest::post().uri("/api/v1/admin/register").set_json(json!({
            "email": "late@example.com",
            "password": TEST_PASSWORD,
        }))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_admin_registration_can_stay_open() {
    let ctx = TestContext::with_overrides(&[("elite.admin.registration_enabled", "true")]);
    let app = init_app!(ctx);
    admin_sign_in!(app, ctx, "first@example.com");
    admin_sign_in!(app, ctx, "second@example.com");
}

#[actix_web::test]
async fn test_customers_are_kept_out() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let token = sign_up!(app, ctx, "customer@example.com");

    let (status, _) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/admin/users")
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call!(
        app,
        TestRequest::post().uri("/api/v1/admin/login").set_json(json!({
            "email": "customer@example.com",
            "password": TEST_PASSWORD,
        }))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_deposit_approval_and_rejection() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let admin = admin_sign_in!(app, ctx, "ops@example.com");
    let token = sign_up!(app, ctx, "payer@example.com");
    let user = ctx.verify_kyc("payer@example.com").await;
    let account = &ctx.persistence.account_find_by_user(user.id).await.unwrap()[0];

    let deposit = |amount: i64| {
        TestRequest::post()
            .uri("/api/v1/transactions/deposit")
            .insert_header(bearer(&token))
            .set_json(json!({ "account_id": account.id, "amount_cents": amount, "provider": "card" }))
    };
    let (_, first) = call!(app, deposit(7_500));
    let (_, second) = call!(app, deposit(1_000));
    let first_id = first["data"]["id"].as_i64().unwrap();
    let second_id = second["data"]["id"].as_i64().unwrap();

    let (status, body) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/admin/transactions?status=pending&start_date=2000-01-01")
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalCount"], 2);

    let (status, _) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/admin/transactions?start_date=01/01/2000")
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/api/v1/admin/transactions/{}/approve", first_id))
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["transaction"]["status"], "completed");

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/api/v1/admin/transactions/{}/approve", first_id))
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/api/v1/admin/transactions/{}/reject", second_id))
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["transaction"]["status"], "rejected");

    let balance = ctx
        .persistence
        .account_find_by_id(account.id)
        .await
        .unwrap()
        .unwrap()
        .balance_cents;
    assert_eq!(balance, 7_500);
}

#[actix_web::test]
async fn test_user_management_is_audited() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let admin = admin_sign_in!(app, ctx, "boss@example.com");
    let admin_id = ctx.user("boss@example.com").await.id;
    sign_up!(app, ctx, "member@example.com");
    let member = ctx.user("member@example.com").await;

    let (status, body) = call!(
        app,
        TestRequest::put()
            .uri(&format!("/api/v1/admin/users/{}/suspend", member.id))
            .insert_header(bearer(&admin))
            .set_json(json!({ "reason": "chargebacks" }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["reason"], "chargebacks");

    let (status, _) = call!(
        app,
        TestRequest::put()
            .uri(&format!("/api/v1/admin/users/{}/suspend", member.id))
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call!(
        app,
        TestRequest::put()
            .uri(&format!("/api/v1/admin/users/{}/suspend", admin_id))
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/admin/users?is_active=false")
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalCount"], 1);
    assert_eq!(body["data"]["pageItems"][0]["email"], "member@example.com");

    let (status, _) = call!(
        app,
        TestRequest::put()
            .uri(&format!("/api/v1/admin/users/{}/activate", member.id))
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call!(
        app,
        TestRequest::put()
            .uri(&format!("/api/v1/admin/users/{}/update", member.id))
            .insert_header(bearer(&admin))
            .set_json(json!({ "phone": "+2348012345678" }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["phone"], "+2348012345678");

    let (status, body) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/admin/audit-logs?action=user_suspended")
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalCount"], 1);
    assert_eq!(body["data"]["pageItems"][0]["actor_id"], admin_id);
}

#[actix_web::test]
async fn test_bulk_actions_and_export() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let admin = admin_sign_in!(app, ctx, "chief@example.com");
    sign_up!(app, ctx, "one@example.com");
    sign_up!(app, ctx, "two@example.com");
    let one = ctx.user("one@example.com").await.id;
    let two = ctx.user("two@example.com").await.id;

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/admin/users/bulk-actions")
            .insert_header(bearer(&admin))
            .set_json(json!({ "user_ids": [one, two, 9_999], "action": "suspend" }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["processed"], 2);
    assert_eq!(body["data"]["failed"], 1);
    assert_eq!(body["data"]["details"]["9999"], "User not found");

    let (status, body) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/admin/users/export?export_type=suspended&format=csv")
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["format"], "csv");
    assert_eq!(body["data"]["record_count"], 2);
    assert!(
        body["data"]["data"]
            .as_str()
            .unwrap()
            .starts_with("id,email,first_name")
    );

    let (status, _) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/admin/users/export?export_type=everyone")
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_kyc_review_queue() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let admin = admin_sign_in!(app, ctx, "kyc@example.com");
    sign_up!(app, ctx, "applicant@example.com");

    let applicant = ctx
        .update_user(
            "applicant@example.com",
            UserPatch {
                kyc_status: Some(KycStatus::Submitted),
                ..Default::default()
            },
        )
        .await;

    let (status, body) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/admin/kyc/pending")
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalCount"], 1);

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/admin/kyc/review")
            .insert_header(bearer(&admin))
            .set_json(json!({ "user_id": applicant.id, "status": "rejected" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/admin/kyc/review")
            .insert_header(bearer(&admin))
            .set_json(json!({ "user_id": applicant.id, "status": "verified" }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["kyc_status"], "verified");

    let (status, body) = call!(
        app,
        TestRequest::get()
            .uri(&format!("/api/v1/admin/kyc/users/{}/kyc-status", applicant.id))
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["can_transact"], true);

    // Only submitted applications can be reviewed
    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/admin/kyc/request-additional-docs")
            .insert_header(bearer(&admin))
            .set_json(json!({
                "user_id": applicant.id,
                "required_documents": ["selfie"],
                "reason": "Blurry photo",
            }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/admin/audit-logs?action=kyc_reviewed")
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalCount"], 1);
}

#[actix_web::test]
async fn test_dashboard_and_system_health() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let admin = admin_sign_in!(app, ctx, "analyst@example.com");
    sign_up!(app, ctx, "someone@example.com");

    let (status, body) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/admin/analytics/dashboard")
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_users"], 2);
    assert_eq!(body["data"]["new_users_today"], 2);
    assert_eq!(body["data"]["user_growth"].as_array().unwrap().len(), 31);

    let (status, body) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/admin/system/health")
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["database"], true);

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/admin/logout")
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::OK);
}
