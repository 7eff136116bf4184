// Transaction endpoints
//
// Transfers and withdrawals are confirmed with a one-time code: the initiate
// step validates the request and sends a code bound to that exact request, the
// confirm step checks the code against the same request and posts it.

use actix_web::{HttpRequest, HttpResponse, Scope, get, post, web};
use elite_common::{
    API_V1_PREFIX,
    utils::{format_cents, normalize_page},
};
use elite_persistence::{OtpPurpose, Page, TransactionInfo, TransactionKind, TransactionStatus};
use serde::Deserialize;
use serde_json::json;

use crate::{
    api::{auth::guard_attempt, model::parse_filter},
    error::AppError,
    middleware::rate_limit::AuthRateLimiter,
    model::{AppState, response},
    secured::{CurrentUser, client_ip},
    service::ledger::{DepositRequest, TransferRequest, WithdrawRequest},
};

#[derive(Debug, Deserialize)]
pub struct ConfirmTransfer {
    #[serde(flatten)]
    pub transfer: TransferRequest,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmWithdrawal {
    #[serde(flatten)]
    pub withdrawal: WithdrawRequest,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub kind: Option<String>,
    pub status: Option<String>,
}

#[post("/deposit")]
async fn deposit(
    user: CurrentUser,
    data: web::Data<AppState>,
    body: web::Json<DepositRequest>,
) -> Result<HttpResponse, AppError> {
    let txn = data.ledger.deposit(&user, &body).await?;
    Ok(response::Result::<TransactionInfo>::http_created(txn))
}

#[post("/transfer/initiate")]
async fn initiate_transfer(
    user: CurrentUser,
    data: web::Data<AppState>,
    body: web::Json<TransferRequest>,
) -> Result<HttpResponse, AppError> {
    let plan = data.ledger.plan_transfer(&user, &body).await?;
    data.otp_service
        .issue_bound(&user, OtpPurpose::Transfer, Some(&body.otp_context()))
        .await?;

    let recipient_name = match &plan.recipient {
        Some(recipient) => data
            .persistence
            .user_find_by_id(recipient.user_id)
            .await?
            .map(|u| u.full_name()),
        None => None,
    };

    Ok(response::Result::<serde_json::Value>::http_success(json!({
        "message": "OTP sent to your email. Please verify to complete transfer.",
        "amount": format_cents(body.amount_cents),
        "internal": plan.recipient.is_some(),
        "recipient_name": recipient_name,
    })))
}

#[post("/transfer/confirm")]
async fn confirm_transfer(
    req: HttpRequest,
    user: CurrentUser,
    data: web::Data<AppState>,
    body: web::Json<ConfirmTransfer>,
) -> Result<HttpResponse, AppError> {
    let key = AuthRateLimiter::key("transfer-confirm", &user.email, &client_ip(&req));
    guard_attempt(&data, &key)?;

    data.ledger.plan_transfer(&user, &body.transfer).await?;
    data.otp_service
        .verify_bound(
            user.id,
            OtpPurpose::Transfer,
            &body.code,
            Some(&body.transfer.otp_context()),
        )
        .await?;
    data.auth_rate_limiter.record_success(&key);
    let txn = data.ledger.transfer(&user, &body.transfer).await?;
    Ok(response::Result::<TransactionInfo>::http_created(txn))
}

#[post("/withdraw/initiate")]
async fn initiate_withdrawal(
    user: CurrentUser,
    data: web::Data<AppState>,
    body: web::Json<WithdrawRequest>,
) -> Result<HttpResponse, AppError> {
    data.ledger.plan_withdrawal(&user, &body).await?;
    data.otp_service
        .issue_bound(&user, OtpPurpose::Withdrawal, Some(&body.otp_context()))
        .await?;
    Ok(response::Result::<serde_json::Value>::http_success(json!({
        "message": "OTP sent to your email. Please verify to complete withdrawal.",
        "amount": format_cents(body.amount_cents),
    })))
}

#[post("/withdraw/confirm")]
async fn confirm_withdrawal(
    req: HttpRequest,
    user: CurrentUser,
    data: web::Data<AppState>,
    body: web::Json<ConfirmWithdrawal>,
) -> Result<HttpResponse, AppError> {
    let key = AuthRateLimiter::key("withdraw-confirm", &user.email, &client_ip(&req));
    guard_attempt(&data, &key)?;

    data.ledger.plan_withdrawal(&user, &body.withdrawal).await?;
    data.otp_service
        .verify_bound(
            user.id,
            OtpPurpose::Withdrawal,
            &body.code,
            Some(&body.withdrawal.otp_context()),
        )
        .await?;
    data.auth_rate_limiter.record_success(&key);
    let txn = data.ledger.withdraw(&user, &body.withdrawal).await?;
    Ok(response::Result::<TransactionInfo>::http_created(txn))
}

#[get("")]
async fn history(
    user: CurrentUser,
    data: web::Data<AppState>,
    params: web::Query<HistoryParams>,
) -> Result<HttpResponse, AppError> {
    let kind: Option<TransactionKind> = parse_filter("kind", params.kind.as_deref())?;
    let status: Option<TransactionStatus> = parse_filter("status", params.status.as_deref())?;
    let (page_no, page_size) = normalize_page(params.page, params.page_size);

    let page = data
        .ledger
        .history(user.id, kind, status, page_no, page_size)
        .await?;
    Ok(response::Result::<Page<TransactionInfo>>::http_success(page))
}

#[get("/{reference}")]
async fn get_transaction(
    user: CurrentUser,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let txn = data.ledger.find_for_user(user.id, &path).await?;
    Ok(response::Result::<TransactionInfo>::http_success(txn))
}

pub fn routes() -> Scope {
    web::scope(&format!("{}/transactions", API_V1_PREFIX))
        .service(deposit)
        .service(initiate_transfer)
        .service(confirm_transfer)
        .service(initiate_withdrawal)
        .service(confirm_withdrawal)
        .service(history)
        .service(get_transaction)
}
