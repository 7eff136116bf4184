//! Back-office API under `/api/v1/admin`
//!
//! - `auth` - admin registration, two-step login, logout
//! - `users` - user management, bulk actions, export
//! - `kyc` - application review queue
//! - `transactions` - ledger oversight and settlement
//! - `system` - audit log, analytics dashboard, system health

pub mod auth;
pub mod kyc;
pub mod route;
pub mod system;
pub mod transactions;
pub mod users;
