// Money account endpoints

use actix_web::{HttpResponse, Scope, get, post, web};
use elite_common::API_V1_PREFIX;
use elite_persistence::AccountInfo;
use serde::Deserialize;

use crate::{
    error::AppError,
    model::{AppState, response},
    secured::CurrentUser,
    service::accounts::ResolvedAccount,
};

#[derive(Debug, Default, Deserialize)]
pub struct CreateAccountRequest {
    pub currency: Option<String>,
    pub account_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveParams {
    pub bank_code: Option<String>,
}

#[post("")]
async fn create_account(
    user: CurrentUser,
    data: web::Data<AppState>,
    body: Option<web::Json<CreateAccountRequest>>,
) -> Result<HttpResponse, AppError> {
    let body = body.map(web::Json::into_inner).unwrap_or_default();
    let account = data
        .accounts
        .open(user.id, body.currency.as_deref(), body.account_type.as_deref())
        .await?;
    tracing::info!(user_id = user.id, account_number = %account.account_number, "Account opened");
    Ok(response::Result::<AccountInfo>::http_created(account))
}

#[get("")]
async fn list_accounts(user: CurrentUser, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let accounts = data.accounts.list(user.id).await?;
    Ok(response::Result::<Vec<AccountInfo>>::http_success(accounts))
}

#[get("/{id}")]
async fn get_account(
    user: CurrentUser,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let account = data.accounts.find_owned(user.id, path.into_inner()).await?;
    Ok(response::Result::<AccountInfo>::http_success(account))
}

/// Recipient name lookup. Public, so transfer forms can show the name before
/// the sender signs in.
#[get("/{account_number}/resolve")]
async fn resolve_account(
    data: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<ResolveParams>,
) -> Result<HttpResponse, AppError> {
    let resolved = data
        .accounts
        .resolve(path.trim(), params.bank_code.as_deref())
        .await?;
    Ok(response::Result::<ResolvedAccount>::http_success(resolved))
}

pub fn routes() -> Scope {
    web::scope(&format!("{}/accounts", API_V1_PREFIX))
        .service(create_account)
        .service(list_accounts)
        .service(resolve_account)
        .service(get_account)
}
