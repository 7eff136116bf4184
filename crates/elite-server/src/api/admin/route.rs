//! Admin API routing configuration
//!
//! Every admin endpoint lives in one `/api/v1/admin` scope; actix does not
//! fall through between scopes that share a prefix.

use actix_web::{Scope, web};
use elite_common::API_V1_PREFIX;

use super::{auth, kyc, system, transactions, users};

/// Create the admin routes
///
/// Routes:
/// - POST /api/v1/admin/register, /verify-registration, /login, /verify-login, /logout
/// - GET /api/v1/admin/users, GET /users/export, POST /users/bulk-actions
/// - PUT /api/v1/admin/users/{id}/suspend|activate|reset-password|update
/// - DELETE /api/v1/admin/user/{id}
/// - GET /api/v1/admin/kyc/pending, POST /kyc/review, GET /kyc/users/{id}/kyc-status,
///   POST /kyc/request-additional-docs
/// - GET /api/v1/admin/transactions, POST /transactions/{id}/approve|reject
/// - GET /api/v1/admin/audit-logs, /analytics/dashboard, /system/health
pub fn routes() -> Scope {
    web::scope(&format!("{}/admin", API_V1_PREFIX))
        .service(auth::register)
        .service(auth::verify_registration)
        .service(auth::login)
        .service(auth::verify_login)
        .service(auth::logout)
        .service(
            web::scope("/kyc")
                .service(kyc::pending)
                .service(kyc::review)
                .service(kyc::user_status)
                .service(kyc::request_additional_docs),
        )
        .service(users::export_users)
        .service(users::list_users)
        .service(users::bulk_actions)
        .service(users::suspend_user)
        .service(users::activate_user)
        .service(users::reset_password)
        .service(users::update_user)
        .service(users::delete_user)
        .service(transactions::list_transactions)
        .service(transactions::approve_transaction)
        .service(transactions::reject_transaction)
        .service(system::audit_logs)
        .service(system::dashboard)
        .service(system::system_health)
}
