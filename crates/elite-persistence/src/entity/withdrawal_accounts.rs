//! Payout destinations: bank accounts, crypto wallets and mobile money numbers

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "withdrawal_accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// bank, crypto, mobile_money
    pub account_type: String,
    pub provider: String,
    #[sea_orm(nullable)]
    pub account_name: Option<String>,
    #[sea_orm(nullable)]
    pub account_number: Option<String>,
    #[sea_orm(nullable)]
    pub bank_code: Option<String>,
    #[sea_orm(nullable)]
    pub bank_name: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub wallet_address: Option<String>,
    #[sea_orm(nullable)]
    pub wallet_network: Option<String>,
    #[sea_orm(nullable)]
    pub cryptocurrency: Option<String>,
    #[sea_orm(nullable)]
    pub phone_number: Option<String>,
    #[sea_orm(nullable)]
    pub mobile_network: Option<String>,
    pub is_verified: bool,
    pub is_default: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub account_metadata: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
