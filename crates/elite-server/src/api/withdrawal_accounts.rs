// Withdrawal destination endpoints

use actix_web::{HttpResponse, Scope, delete, get, post, put, web};
use elite_common::API_V1_PREFIX;
use elite_persistence::WithdrawalAccountInfo;
use serde::Serialize;
use serde_json::json;

use crate::{
    error::AppError,
    model::{AppState, response},
    secured::CurrentUser,
    service::withdrawal::{CreateWithdrawalAccount, UpdateWithdrawalAccount, supported_providers},
};

#[derive(Debug, Serialize)]
struct AccountList {
    total: usize,
    accounts: Vec<WithdrawalAccountInfo>,
}

#[post("")]
async fn create_account(
    user: CurrentUser,
    data: web::Data<AppState>,
    body: web::Json<CreateWithdrawalAccount>,
) -> Result<HttpResponse, AppError> {
    let account = data.withdrawal_accounts.create(user.id, &body).await?;
    Ok(response::Result::<WithdrawalAccountInfo>::http_created(account))
}

#[get("")]
async fn list_accounts(user: CurrentUser, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let accounts = data.withdrawal_accounts.list(user.id).await?;
    Ok(response::Result::<AccountList>::http_success(AccountList {
        total: accounts.len(),
        accounts,
    }))
}

#[get("/supported/providers")]
async fn providers(_user: CurrentUser) -> HttpResponse {
    response::Result::<serde_json::Value>::http_success(supported_providers())
}

#[get("/{id}")]
async fn get_account(
    user: CurrentUser,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let account = data
        .withdrawal_accounts
        .find(user.id, path.into_inner())
        .await?;
    Ok(response::Result::<WithdrawalAccountInfo>::http_success(account))
}

#[put("/{id}")]
async fn update_account(
    user: CurrentUser,
    data: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<UpdateWithdrawalAccount>,
) -> Result<HttpResponse, AppError> {
    let account = data
        .withdrawal_accounts
        .update(user.id, path.into_inner(), &body)
        .await?;
    Ok(response::Result::<WithdrawalAccountInfo>::http_success(account))
}

#[delete("/{id}")]
async fn delete_account(
    user: CurrentUser,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    data.withdrawal_accounts
        .delete(user.id, path.into_inner())
        .await?;
    Ok(response::Result::<serde_json::Value>::http_success(json!({
        "message": "Withdrawal account deleted successfully",
    })))
}

#[post("/{id}/set-default")]
async fn set_default(
    user: CurrentUser,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let account = data
        .withdrawal_accounts
        .set_default(user.id, path.into_inner())
        .await?;
    Ok(response::Result::<WithdrawalAccountInfo>::http_success(account))
}

pub fn routes() -> Scope {
    web::scope(&format!("{}/withdrawal-accounts", API_V1_PREFIX))
        .service(create_account)
        .service(list_accounts)
        .service(providers)
        .service(get_account)
        .service(update_account)
        .service(delete_account)
        .service(set_default)
}
