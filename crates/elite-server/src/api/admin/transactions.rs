// Ledger oversight
//
// Deposits and external debits stay pending until an admin settles them here.

use actix_web::{HttpResponse, get, post, web};
use elite_common::utils::normalize_page;
use elite_persistence::{Page, TransactionInfo, TransactionKind, TransactionQuery, TransactionStatus};
use serde::Deserialize;
use serde_json::json;

use crate::{
    api::model::{parse_date_bound, parse_filter},
    error::AppError,
    model::{AppState, response},
    secured::AdminUser,
    service::audit,
};

#[derive(Debug, Deserialize)]
pub struct TransactionListParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub status: Option<String>,
    pub kind: Option<String>,
    pub user_id: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl TransactionListParams {
    fn query(&self) -> Result<TransactionQuery, AppError> {
        Ok(TransactionQuery {
            user_id: self.user_id,
            kind: parse_filter::<TransactionKind>("kind", self.kind.as_deref())?,
            status: parse_filter::<TransactionStatus>("status", self.status.as_deref())?,
            start: parse_date_bound("start_date", self.start_date.as_deref(), false)?,
            end: parse_date_bound("end_date", self.end_date.as_deref(), true)?,
        })
    }
}

#[get("/transactions")]
pub async fn list_transactions(
    _admin: AdminUser,
    data: web::Data<AppState>,
    params: web::Query<TransactionListParams>,
) -> Result<HttpResponse, AppError> {
    let query = params.query()?;
    let (page_no, page_size) = normalize_page(params.page, params.page_size);
    let page = data
        .persistence
        .transaction_find_page(&query, page_no, page_size)
        .await?;
    Ok(response::Result::<Page<TransactionInfo>>::http_success(page))
}

#[post("/transactions/{id}/approve")]
pub async fn approve_transaction(
    admin: AdminUser,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let txn = data.ledger.approve(path.into_inner()).await?;
    data.audit
        .record(
            Some(admin.id),
            audit::ACTION_TRANSACTION_APPROVED,
            json!({
                "transaction_id": txn.id,
                "reference": txn.reference,
                "amount_cents": txn.amount_cents,
            }),
        )
        .await;
    Ok(response::Result::<serde_json::Value>::http_success(json!({
        "message": format!("Transaction {} approved", txn.id),
        "transaction": txn,
    })))
}

#[post("/transactions/{id}/reject")]
pub async fn reject_transaction(
    admin: AdminUser,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let txn = data.ledger.reject(path.into_inner()).await?;
    data.audit
        .record(
            Some(admin.id),
            audit::ACTION_TRANSACTION_REJECTED,
            json!({
                "transaction_id": txn.id,
                "reference": txn.reference,
                "amount_cents": txn.amount_cents,
            }),
        )
        .await;
    Ok(response::Result::<serde_json::Value>::http_success(json!({
        "message": format!("Transaction {} rejected", txn.id),
        "transaction": txn,
    })))
}
