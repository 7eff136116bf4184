//! Elite Persistence - Database entities and persistence layer
//!
//! This crate provides:
//! - SeaORM entity definitions
//! - Persistence trait abstractions for unified storage
//! - Domain model types for persistence operations
//! - Two backends: external SQL database and embedded RocksDB

pub mod embedded;
pub mod entity;
pub mod model;
pub mod sql;
pub mod traits;

// Re-export sea-orm for convenience
pub use sea_orm;

// Re-export entity prelude
pub use entity::prelude::*;

// Re-export persistence traits
pub use traits::{
    AccountPersistence, AuditPersistence, LedgerPersistence, OtpPersistence, PersistenceService,
    PinPersistence, UserPersistence, WithdrawalAccountPersistence,
};

// Re-export SQL backend
pub use sql::ExternalDbPersistService;

// Re-export embedded backend
pub use embedded::EmbeddedPersistService;

// Re-export model types
pub use model::{
    AccountInfo, AuditLogInfo, AuditLogQuery, KycStatus, NewAccount, NewAuditLog,
    NewTransaction, NewUser, NewWithdrawalAccount, OtpInfo, OtpPurpose, Page, PinInfo, Posting,
    StorageMode, TransactionInfo, TransactionKind, TransactionQuery, TransactionStatus,
    TransactionSummary, UserInfo, UserPatch, UserQuery, WithdrawalAccountInfo, WithdrawalAccountType,
};
