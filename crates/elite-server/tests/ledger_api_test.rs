//! Money movement API tests
//!
//! Tests for /api/v1/accounts and /api/v1/transactions

#[macro_use]
mod common;

use actix_web::{http::StatusCode, test::TestRequest};
use common::{TestContext, bearer};
use elite_persistence::{
    NewTransaction, OtpPurpose, Posting, TransactionKind, TransactionStatus, UserInfo,
};
use serde_json::json;

async fn first_account(ctx: &TestContext, user: &UserInfo) -> (i64, String) {
    let accounts = ctx.persistence.account_find_by_user(user.id).await.unwrap();
    (accounts[0].id, accounts[0].account_number.clone())
}

async fn fund(ctx: &TestContext, user: &UserInfo, account_id: i64, amount_cents: i64) {
    ctx.persistence
        .ledger_post(
            NewTransaction {
                user_id: user.id,
                from_account_id: None,
                to_account_id: Some(account_id),
                amount_cents,
                kind: TransactionKind::Deposit,
                status: TransactionStatus::Completed,
                reference: format!("seed_{}", account_id),
                method: "seed".to_string(),
                extra_data: json!({}),
            },
            &[Posting::credit(account_id, amount_cents)],
        )
        .await
        .unwrap();
}

async fn balance(ctx: &TestContext, account_id: i64) -> i64 {
    ctx.persistence
        .account_find_by_id(account_id)
        .await
        .unwrap()
        .unwrap()
        .balance_cents
}

#[actix_web::test]
async fn test_kyc_gate_blocks_unverified_users() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let token = sign_up!(app, ctx, "gate@example.com");
    let user = ctx.user("gate@example.com").await;
    let (account_id, _) = first_account(&ctx, &user).await;

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/transactions/deposit")
            .insert_header(bearer(&token))
            .set_json(json!({ "account_id": account_id, "amount_cents": 1000, "provider": "card" }))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].as_str().unwrap().starts_with("KYC verification required"));
}

#[actix_web::test]
async fn test_deposit_stays_pending_until_settled() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let token = sign_up!(app, ctx, "saver@example.com");
    let user = ctx.verify_kyc("saver@example.com").await;
    let (account_id, _) = first_account(&ctx, &user).await;

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/transactions/deposit")
            .insert_header(bearer(&token))
            .set_json(json!({ "account_id": account_id, "amount_cents": 25_000, "provider": "card" }))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(balance(&ctx, account_id).await, 0);

    let reference = body["data"]["reference"].as_str().unwrap().to_string();
    let (status, body) = call!(
        app,
        TestRequest::get()
            .uri(&format!("/api/v1/transactions/{}", reference))
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["amount_cents"], 25_000);

    let (status, body) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/transactions?status=pending")
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalCount"], 1);

    let (status, _) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/transactions?status=unknown")
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_internal_transfer_with_otp() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let sender_token = sign_up!(app, ctx, "sender@example.com");
    sign_up!(app, ctx, "receiver@example.com");

    let sender = ctx.verify_kyc("sender@example.com").await;
    let receiver = ctx.user("receiver@example.com").await;
    let (from_id, _) = first_account(&ctx, &sender).await;
    let (to_id, to_number) = first_account(&ctx, &receiver).await;
    fund(&ctx, &sender, from_id, 10_000).await;

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/transactions/transfer/initiate")
            .insert_header(bearer(&sender_token))
            .set_json(json!({
                "from_account_id": from_id,
                "to_account_number": to_number,
                "amount_cents": 4_000,
            }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["internal"], true);
    assert_eq!(body["data"]["recipient_name"], "Ada Obi");

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/transactions/transfer/confirm")
            .insert_header(bearer(&sender_token))
            .set_json(json!({
                "from_account_id": from_id,
                "to_account_number": to_number,
                "amount_cents": 4_000,
                "code": "000000",
            }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let code = ctx
        .notifier
        .last_code("sender@example.com", OtpPurpose::Transfer)
        .unwrap();
    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/transactions/transfer/confirm")
            .insert_header(bearer(&sender_token))
            .set_json(json!({
                "from_account_id": from_id,
                "to_account_number": to_number,
                "amount_cents": 4_000,
                "code": code,
            }))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(body["data"]["method"], "internal");

    assert_eq!(balance(&ctx, from_id).await, 6_000);
    assert_eq!(balance(&ctx, to_id).await, 4_000);
}

#[actix_web::test]
async fn test_transfer_code_only_confirms_initiated_plan() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let sender_token = sign_up!(app, ctx, "bound@example.com");
    sign_up!(app, ctx, "payee@example.com");

    let sender = ctx.verify_kyc("bound@example.com").await;
    let receiver = ctx.user("payee@example.com").await;
    let (from_id, _) = first_account(&ctx, &sender).await;
    let (to_id, to_number) = first_account(&ctx, &receiver).await;
    fund(&ctx, &sender, from_id, 10_000).await;

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/transactions/transfer/initiate")
            .insert_header(bearer(&sender_token))
            .set_json(json!({
                "from_account_id": from_id,
                "to_account_number": to_number,
                "amount_cents": 1_000,
            }))
    );
    assert_eq!(status, StatusCode::OK);
    let code = ctx
        .notifier
        .last_code("bound@example.com", OtpPurpose::Transfer)
        .unwrap();

    // Same code, larger amount than the one initiated
    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/transactions/transfer/confirm")
            .insert_header(bearer(&sender_token))
            .set_json(json!({
                "from_account_id": from_id,
                "to_account_number": to_number,
                "amount_cents": 9_000,
                "code": code,
            }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(balance(&ctx, from_id).await, 10_000);
    assert_eq!(balance(&ctx, to_id).await, 0);

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/transactions/transfer/confirm")
            .insert_header(bearer(&sender_token))
            .set_json(json!({
                "from_account_id": from_id,
                "to_account_number": to_number,
                "amount_cents": 1_000,
                "code": code,
            }))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(balance(&ctx, from_id).await, 9_000);
    assert_eq!(balance(&ctx, to_id).await, 1_000);
}

#[actix_web::test]
async fn test_withdrawal_with_otp() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let token = sign_up!(app, ctx, "cashout@example.com");
    let user = ctx.verify_kyc("cashout@example.com").await;
    let (account_id, _) = first_account(&ctx, &user).await;
    fund(&ctx, &user, account_id, 10_000).await;

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
    let destination_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/transactions/withdraw/initiate")
            .insert_header(bearer(&token))
            .set_json(json!({
                "account_id": account_id,
                "amount_cents": 3_000,
                "withdrawal_account_id": destination_id,
            }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["amount"], "30.00");
    assert_eq!(balance(&ctx, account_id).await, 10_000);

    let code = ctx
        .notifier
        .last_code("cashout@example.com", OtpPurpose::Withdrawal)
        .unwrap();

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/transactions/withdraw/confirm")
            .insert_header(bearer(&token))
            .set_json(json!({
                "account_id": account_id,
                "amount_cents": 5_000,
                "withdrawal_account_id": destination_id,
                "code": code,
            }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(balance(&ctx, account_id).await, 10_000);

    let confirm = json!({
        "account_id": account_id,
        "amount_cents": 3_000,
        "withdrawal_account_id": destination_id,
        "code": code,
    });
    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/transactions/withdraw/confirm")
            .insert_header(bearer(&token))
            .set_json(&confirm)
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["method"], "paystack");
    assert_eq!(body["data"]["amount_cents"], 3_000);
    assert_eq!(balance(&ctx, account_id).await, 7_000);

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/transactions/withdraw/confirm")
            .insert_header(bearer(&token))
            .set_json(&confirm)
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(balance(&ctx, account_id).await, 7_000);
}

#[actix_web::test]
async fn test_transfer_rejects_overdraft_and_self_transfer() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let token = sign_up!(app, ctx, "broke@example.com");
    let user = ctx.verify_kyc("broke@example.com").await;
    let (account_id, number) = first_account(&ctx, &user).await;
    fund(&ctx, &user, account_id, 500).await;

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/transactions/transfer/initiate")
            .insert_header(bearer(&token))
            .set_json(json!({
                "from_account_id": account_id,
                "to_account_number": "9999999999",
                "to_bank_code": "058",
                "amount_cents": 1_000,
            }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Insufficient funds");

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/transactions/transfer/initiate")
            .insert_header(bearer(&token))
            .set_json(json!({
                "from_account_id": account_id,
                "to_account_number": number,
                "amount_cents": 100,
            }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(balance(&ctx, account_id).await, 500);
}

#[actix_web::test]
async fn test_resolve_account_is_public() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    sign_up!(app, ctx, "named@example.com");
    let user = ctx.user("named@example.com").await;
    let (_, number) = first_account(&ctx, &user).await;

    let (status, body) = call!(
        app,
        TestRequest::get().uri(&format!("/api/v1/accounts/{}/resolve", number))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["found"], true);
    assert_eq!(body["data"]["name"], "Ada Obi");

    let (status, body) = call!(
        app,
        TestRequest::get().uri("/api/v1/accounts/0000000000/resolve")
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["found"], false);
}

#[actix_web::test]
async fn test_open_second_account_and_ownership() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let token = sign_up!(app, ctx, "owner@example.com");
    let other_token = sign_up!(app, ctx, "other@example.com");

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/accounts")
            .insert_header(bearer(&token))
            .set_json(json!({ "currency": "USD" }))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["currency"], "USD");
    assert_eq!(body["data"]["account_number"].as_str().unwrap().len(), 10);
    let account_id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = call!(
        app,
        TestRequest::get()
            .uri(&format!("/api/v1/accounts/{}", account_id))
            .insert_header(bearer(&other_token))
    );
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/accounts")
            .insert_header(bearer(&token))
            .set_json(json!({ "currency": "US1" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
