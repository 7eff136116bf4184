//! Ledger entries. Balance changes are applied in the same database
//! transaction that writes or settles the row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(indexed)]
    pub user_id: i64,
    #[sea_orm(nullable)]
    pub from_account_id: Option<i64>,
    #[sea_orm(nullable)]
    pub to_account_id: Option<i64>,
    pub amount_cents: i64,
    /// deposit, withdrawal, transfer
    pub kind: String,
    /// pending, completed, rejected
    pub status: String,
    #[sea_orm(unique)]
    pub reference: String,
    pub method: String,
    /// JSON object
    #[sea_orm(column_type = "Text", nullable)]
    pub extra_data: Option<String>,
    pub created_at: DateTime,
    #[sea_orm(nullable)]
    pub processed_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
