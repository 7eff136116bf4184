//! Registered users, including KYC details and document locations

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[sea_orm(nullable)]
    pub phone: Option<String>,
    pub hashed_password: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_admin: bool,
    /// pending, submitted, verified, rejected
    pub kyc_status: String,
    #[sea_orm(nullable)]
    pub kyc_submitted_at: Option<DateTime>,
    #[sea_orm(nullable)]
    pub kyc_verified_at: Option<DateTime>,
    #[sea_orm(column_type = "Text", nullable)]
    pub kyc_rejection_reason: Option<String>,
    #[sea_orm(nullable)]
    pub date_of_birth: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub address: Option<String>,
    #[sea_orm(nullable)]
    pub city: Option<String>,
    #[sea_orm(nullable)]
    pub state: Option<String>,
    #[sea_orm(nullable)]
    pub country: Option<String>,
    #[sea_orm(nullable)]
    pub postal_code: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub id_document_front: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub id_document_back: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub proof_of_address: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub selfie_photo: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub profile_image: Option<String>,
    pub language_preference: String,
    #[sea_orm(nullable)]
    pub last_password_change: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
