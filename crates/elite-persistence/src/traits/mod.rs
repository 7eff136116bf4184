//! Persistence traits for the unified storage abstraction layer
//!
//! These traits abstract over the storage backends: an external database
//! (PostgreSQL/MySQL/SQLite through SeaORM) and embedded RocksDB.
//!
//! Domain failures (missing rows, conflicts, insufficient funds) are returned as
//! `elite_common::EliteError` wrapped in `anyhow::Error` so callers can downcast.

pub mod account;
pub mod audit;
pub mod ledger;
pub mod otp;
pub mod pin;
pub mod user;
pub mod withdrawal;

pub use account::AccountPersistence;
pub use audit::AuditPersistence;
pub use ledger::LedgerPersistence;
pub use otp::OtpPersistence;
pub use pin::PinPersistence;
pub use user::UserPersistence;
pub use withdrawal::WithdrawalAccountPersistence;

use async_trait::async_trait;

use crate::model::StorageMode;

/// Unified persistence service trait
///
/// This is the main interface for all storage operations.
#[async_trait]
pub trait PersistenceService:
    UserPersistence
    + AccountPersistence
    + LedgerPersistence
    + OtpPersistence
    + PinPersistence
    + WithdrawalAccountPersistence
    + AuditPersistence
    + Send
    + Sync
{
    /// Get the current storage mode
    fn storage_mode(&self) -> StorageMode;

    /// Health check for the storage backend
    async fn health_check(&self) -> anyhow::Result<()>;
}
