//! SeaORM entity definitions

pub mod prelude;

pub mod accounts;
pub mod audit_logs;
pub mod otps;
pub mod transactions;
pub mod user_pins;
pub mod users;
pub mod withdrawal_accounts;
