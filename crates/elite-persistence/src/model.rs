//! Domain model types for the persistence abstraction layer
//!
//! These types are used as arguments and return values of the persistence
//! traits, decoupled from specific storage backends.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Declares a string-backed enum with `as_str`, `Display` and `FromStr`.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }
    };
}

string_enum! {
    /// Identity verification state of a user
    pub enum KycStatus {
        Pending => "pending",
        Submitted => "submitted",
        Verified => "verified",
        Rejected => "rejected",
    }
}

impl Default for KycStatus {
    fn default() -> Self {
        KycStatus::Pending
    }
}

string_enum! {
    /// What a one-time password authorizes
    pub enum OtpPurpose {
        Registration => "REGISTRATION",
        Login => "LOGIN",
        Transfer => "TRANSFER",
        Withdrawal => "WITHDRAWAL",
        PasswordReset => "PASSWORD_RESET",
        KycVerification => "KYC_VERIFICATION",
        PinReset => "PIN_RESET",
        AdminRegistration => "ADMIN_REGISTRATION",
        AdminLogin => "ADMIN_LOGIN",
    }
}

string_enum! {
    pub enum TransactionKind {
        Deposit => "deposit",
        Withdrawal => "withdrawal",
        Transfer => "transfer",
    }
}

string_enum! {
    pub enum TransactionStatus {
        Pending => "pending",
        Completed => "completed",
        Rejected => "rejected",
    }
}

string_enum! {
    pub enum WithdrawalAccountType {
        Bank => "bank",
        Crypto => "crypto",
        MobileMoney => "mobile_money",
    }
}

/// Registered user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_admin: bool,
    pub kyc_status: KycStatus,
    pub kyc_submitted_at: Option<NaiveDateTime>,
    pub kyc_verified_at: Option<NaiveDateTime>,
    pub kyc_rejection_reason: Option<String>,
    pub date_of_birth: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub id_document_front: Option<String>,
    pub id_document_back: Option<String>,
    pub proof_of_address: Option<String>,
    pub selfie_photo: Option<String>,
    pub profile_image: Option<String>,
    pub language_preference: String,
    pub last_password_change: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl UserInfo {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Fields required to create a user
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub is_admin: bool,
}

/// Field-scoped user update. Only the fields that are `Some` are written, so
/// concurrent updates of different fields never overwrite each other.
/// Nullable columns take `Some(None)` to clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<Option<String>>,
    pub password_hash: Option<String>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
    pub is_admin: Option<bool>,
    pub kyc_status: Option<KycStatus>,
    pub kyc_submitted_at: Option<Option<NaiveDateTime>>,
    pub kyc_verified_at: Option<Option<NaiveDateTime>>,
    pub kyc_rejection_reason: Option<Option<String>>,
    pub date_of_birth: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub city: Option<Option<String>>,
    pub state: Option<Option<String>>,
    pub country: Option<Option<String>>,
    pub postal_code: Option<Option<String>>,
    pub id_document_front: Option<Option<String>>,
    pub id_document_back: Option<Option<String>>,
    pub proof_of_address: Option<Option<String>>,
    pub selfie_photo: Option<Option<String>>,
    pub profile_image: Option<Option<String>>,
    pub language_preference: Option<String>,
    pub last_password_change: Option<Option<NaiveDateTime>>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Copy the set fields onto `user`
    pub fn apply(&self, user: &mut UserInfo) {
        macro_rules! merge {
            ($($field:ident),+ $(,)?) => {
                $(
                    if let Some(value) = &self.$field {
                        user.$field = value.clone();
                    }
                )+
            };
        }

        merge!(
            email,
            first_name,
            last_name,
            phone,
            password_hash,
            is_active,
            is_verified,
            is_admin,
            kyc_status,
            kyc_submitted_at,
            kyc_verified_at,
            kyc_rejection_reason,
            date_of_birth,
            address,
            city,
            state,
            country,
            postal_code,
            id_document_front,
            id_document_back,
            proof_of_address,
            selfie_photo,
            profile_image,
            language_preference,
            last_password_change,
        );
    }
}

/// Filters for user listings
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub kyc_status: Option<KycStatus>,
    pub is_active: Option<bool>,
    pub is_admin: Option<bool>,
    pub is_verified: Option<bool>,
    /// Case-insensitive match on email, first name, or last name
    pub search: Option<String>,
}

impl UserQuery {
    pub fn matches(&self, user: &UserInfo) -> bool {
        if let Some(status) = self.kyc_status
            && user.kyc_status != status
        {
            return false;
        }
        if let Some(active) = self.is_active
            && user.is_active != active
        {
            return false;
        }
        if let Some(admin) = self.is_admin
            && user.is_admin != admin
        {
            return false;
        }
        if let Some(verified) = self.is_verified
            && user.is_verified != verified
        {
            return false;
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            return user.email.to_lowercase().contains(&needle)
                || user.first_name.to_lowercase().contains(&needle)
                || user.last_name.to_lowercase().contains(&needle);
        }
        true
    }
}

/// Money account owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub id: i64,
    pub user_id: i64,
    pub account_number: String,
    pub currency: String,
    pub balance_cents: i64,
    pub account_type: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: i64,
    pub account_number: String,
    pub currency: String,
    pub account_type: String,
}

/// Ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub id: i64,
    pub user_id: i64,
    pub from_account_id: Option<i64>,
    pub to_account_id: Option<i64>,
    pub amount_cents: i64,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub reference: String,
    pub method: String,
    pub extra_data: serde_json::Value,
    pub created_at: NaiveDateTime,
    pub processed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub from_account_id: Option<i64>,
    pub to_account_id: Option<i64>,
    pub amount_cents: i64,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub reference: String,
    pub method: String,
    pub extra_data: serde_json::Value,
}

/// Signed balance change applied to one account as part of a ledger write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub account_id: i64,
    pub delta_cents: i64,
}

impl Posting {
    pub fn debit(account_id: i64, amount_cents: i64) -> Self {
        Self {
            account_id,
            delta_cents: -amount_cents,
        }
    }

    pub fn credit(account_id: i64, amount_cents: i64) -> Self {
        Self {
            account_id,
            delta_cents: amount_cents,
        }
    }
}

/// Filters for transaction listings
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    pub user_id: Option<i64>,
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl TransactionQuery {
    pub fn matches(&self, txn: &TransactionInfo) -> bool {
        self.user_id.is_none_or(|id| txn.user_id == id)
            && self.kind.is_none_or(|k| txn.kind == k)
            && self.status.is_none_or(|s| txn.status == s)
            && self.start.is_none_or(|s| txn.created_at >= s)
            && self.end.is_none_or(|e| txn.created_at <= e)
    }
}

/// Aggregate over a set of transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub count: u64,
    pub total_amount_cents: i64,
}

/// One-time password record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtpInfo {
    pub id: i64,
    pub user_id: i64,
    pub code: String,
    pub purpose: OtpPurpose,
    pub is_used: bool,
    /// Wrong guesses against this code
    #[serde(default)]
    pub failed_attempts: i32,
    /// Canonical description of the operation the code was issued for, if bound to one
    #[serde(default)]
    pub context: Option<String>,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

/// Transaction PIN state of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinInfo {
    pub user_id: i64,
    pub pin_hash: String,
    pub is_active: bool,
    pub failed_attempts: i32,
    pub locked_until: Option<NaiveDateTime>,
    pub last_used: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// External payout destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalAccountInfo {
    pub id: i64,
    pub user_id: i64,
    pub account_type: WithdrawalAccountType,
    pub provider: String,
    pub account_name: Option<String>,
    pub account_number: Option<String>,
    pub bank_code: Option<String>,
    pub bank_name: Option<String>,
    pub wallet_address: Option<String>,
    pub wallet_network: Option<String>,
    pub cryptocurrency: Option<String>,
    pub phone_number: Option<String>,
    pub mobile_network: Option<String>,
    pub is_verified: bool,
    pub is_default: bool,
    pub account_metadata: serde_json::Value,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct NewWithdrawalAccount {
    pub user_id: i64,
    pub account_type: Option<WithdrawalAccountType>,
    pub provider: String,
    pub account_name: Option<String>,
    pub account_number: Option<String>,
    pub bank_code: Option<String>,
    pub bank_name: Option<String>,
    pub wallet_address: Option<String>,
    pub wallet_network: Option<String>,
    pub cryptocurrency: Option<String>,
    pub phone_number: Option<String>,
    pub mobile_network: Option<String>,
    pub account_metadata: serde_json::Value,
}

/// Audit trail entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogInfo {
    pub id: i64,
    pub actor_id: Option<i64>,
    pub action: String,
    pub details: serde_json::Value,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub actor_id: Option<i64>,
    pub action: String,
    pub details: serde_json::Value,
}

/// Filters for audit log listings
#[derive(Debug, Clone, Default)]
pub struct AuditLogQuery {
    pub action: Option<String>,
    pub actor_id: Option<i64>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl AuditLogQuery {
    pub fn matches(&self, log: &AuditLogInfo) -> bool {
        self.action.as_deref().is_none_or(|a| log.action == a)
            && self.actor_id.is_none_or(|id| log.actor_id == Some(id))
            && self.start.is_none_or(|s| log.created_at >= s)
            && self.end.is_none_or(|e| log.created_at <= e)
    }
}

/// Generic paginated result
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub total_count: u64,
    pub page_number: u64,
    pub pages_available: u64,
    pub page_items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(total_count: u64, page_number: u64, page_size: u64, page_items: Vec<T>) -> Self {
        Self {
            total_count,
            page_number,
            pages_available: elite_common::utils::pages_available(total_count, page_size),
            page_items,
        }
    }

    pub fn empty() -> Self {
        Self {
            total_count: 0,
            page_number: 0,
            pages_available: 0,
            page_items: Vec::new(),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            total_count: self.total_count,
            page_number: self.page_number,
            pages_available: self.pages_available,
            page_items: self.page_items.into_iter().map(f).collect(),
        }
    }

    /// Slices an already filtered and ordered list into one page.
    pub fn from_vec(items: Vec<T>, page_number: u64, page_size: u64) -> Self {
        let total_count = items.len() as u64;
        let offset = page_number.saturating_sub(1).saturating_mul(page_size) as usize;
        let page_items = items
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .collect();
        Self::new(total_count, page_number, page_size, page_items)
    }
}

/// Storage mode for the persistence layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageMode {
    /// External database (PostgreSQL/MySQL/SQLite via SeaORM)
    ExternalDb,
    /// Embedded RocksDB (single node, no external DB)
    Embedded,
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageMode::ExternalDb => write!(f, "external_db"),
            StorageMode::Embedded => write!(f, "embedded"),
        }
    }
}

impl std::str::FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "external_db" => Ok(StorageMode::ExternalDb),
            "embedded" => Ok(StorageMode::Embedded),
            _ => Err(format!("Invalid storage mode: {}", s)),
        }
    }
}
