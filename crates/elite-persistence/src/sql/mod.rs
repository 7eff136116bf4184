//! SQL-based persistence backend (PostgreSQL/MySQL/SQLite via SeaORM)
//!
//! Balance changes use a conditional `UPDATE ... WHERE balance_cents >= -delta`
//! inside a database transaction, so two concurrent debits can never overdraw
//! an account.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::{prelude::Expr, sea_query::Asterisk, sea_query::Func, *};

use elite_common::EliteError;
use elite_common::utils::utc_now;

use crate::entity::{
    accounts, audit_logs, otps, transactions, user_pins, users, withdrawal_accounts,
};
use crate::model::*;
use crate::traits::*;

/// External database persistence service
pub struct ExternalDbPersistService {
    db: DatabaseConnection,
}

impl ExternalDbPersistService {
    /// Create a new ExternalDbPersistService with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Get a reference to the underlying database connection
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Create missing tables and indexes
    pub async fn init_schema(&self) -> anyhow::Result<()> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);

        macro_rules! create {
            ($entity:expr) => {{
                let mut table = schema.create_table_from_entity($entity);
                self.db.execute(backend.build(table.if_not_exists())).await?;
                for mut index in schema.create_index_from_entity($entity) {
                    self.db.execute(backend.build(index.if_not_exists())).await?;
                }
            }};
        }

        create!(users::Entity);
        create!(accounts::Entity);
        create!(transactions::Entity);
        create!(otps::Entity);
        create!(user_pins::Entity);
        create!(withdrawal_accounts::Entity);
        create!(audit_logs::Entity);

        tracing::info!(backend = ?backend, "Database schema ready");
        Ok(())
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn parse_enum<T: FromStr<Err = String>>(value: &str) -> anyhow::Result<T> {
    value.parse::<T>().map_err(anyhow::Error::msg)
}

fn json_or_empty(text: Option<&str>) -> serde_json::Value {
    text.and_then(|t| serde_json::from_str(t).ok())
        .unwrap_or_else(|| serde_json::Value::Object(Default::default()))
}

fn json_text(value: &serde_json::Value) -> Option<String> {
    if value.is_null() {
        None
    } else {
        Some(value.to_string())
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn user_from_model(model: users::Model) -> UserInfo {
    UserInfo {
        id: model.id,
        email: model.email,
        first_name: model.first_name,
        last_name: model.last_name,
        phone: model.phone,
        password_hash: model.hashed_password,
        is_active: model.is_active,
        is_verified: model.is_verified,
        is_admin: model.is_admin,
        kyc_status: model.kyc_status.parse().unwrap_or_default(),
        kyc_submitted_at: model.kyc_submitted_at,
        kyc_verified_at: model.kyc_verified_at,
        kyc_rejection_reason: model.kyc_rejection_reason,
        date_of_birth: model.date_of_birth,
        address: model.address,
        city: model.city,
        state: model.state,
        country: model.country,
        postal_code: model.postal_code,
        id_document_front: model.id_document_front,
        id_document_back: model.id_document_back,
        proof_of_address: model.proof_of_address,
        selfie_photo: model.selfie_photo,
        profile_image: model.profile_image,
        language_preference: model.language_preference,
        last_password_change: model.last_password_change,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

fn account_from_model(model: accounts::Model) -> AccountInfo {
    AccountInfo {
        id: model.id,
        user_id: model.user_id,
        account_number: model.account_number,
        currency: model.currency,
        balance_cents: model.balance_cents,
        account_type: model.account_type,
        is_active: model.is_active,
        created_at: model.created_at,
    }
}

fn transaction_from_model(model: transactions::Model) -> anyhow::Result<TransactionInfo> {
    Ok(TransactionInfo {
        id: model.id,
        user_id: model.user_id,
        from_account_id: model.from_account_id,
        to_account_id: model.to_account_id,
        amount_cents: model.amount_cents,
        kind: parse_enum(&model.kind)?,
        status: parse_enum(&model.status)?,
        reference: model.reference,
        method: model.method,
        extra_data: json_or_empty(model.extra_data.as_deref()),
        created_at: model.created_at,
        processed_at: model.processed_at,
    })
}

fn otp_from_model(model: otps::Model) -> anyhow::Result<OtpInfo> {
    Ok(OtpInfo {
        id: model.id,
        user_id: model.user_id,
        code: model.code,
        purpose: parse_enum(&model.purpose)?,
        is_used: model.is_used,
        failed_attempts: model.failed_attempts,
        context: model.context,
        created_at: model.created_at,
        expires_at: model.expires_at,
    })
}

fn pin_from_model(model: user_pins::Model) -> PinInfo {
    PinInfo {
        user_id: model.user_id,
        pin_hash: model.pin_hash,
        is_active: model.is_active,
        failed_attempts: model.failed_attempts,
        locked_until: model.locked_until,
        last_used: model.last_used,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

fn withdrawal_account_from_model(
    model: withdrawal_accounts::Model,
) -> anyhow::Result<WithdrawalAccountInfo> {
    Ok(WithdrawalAccountInfo {
        id: model.id,
        user_id: model.user_id,
        account_type: parse_enum(&model.account_type)?,
        provider: model.provider,
        account_name: model.account_name,
        account_number: model.account_number,
        bank_code: model.bank_code,
        bank_name: model.bank_name,
        wallet_address: model.wallet_address,
        wallet_network: model.wallet_network,
        cryptocurrency: model.cryptocurrency,
        phone_number: model.phone_number,
        mobile_network: model.mobile_network,
        is_verified: model.is_verified,
        is_default: model.is_default,
        account_metadata: json_or_empty(model.account_metadata.as_deref()),
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn audit_log_from_model(model: audit_logs::Model) -> AuditLogInfo {
    AuditLogInfo {
        id: model.id,
        actor_id: model.actor_id,
        action: model.action,
        details: json_or_empty(model.details.as_deref()),
        created_at: model.created_at,
    }
}

// ============================================================================
// Query builders
// ============================================================================

fn user_select(query: &UserQuery) -> Select<users::Entity> {
    let mut select = users::Entity::find();
    if let Some(status) = query.kyc_status {
        select = select.filter(users::Column::KycStatus.eq(status.as_str()));
    }
    if let Some(active) = query.is_active {
        select = select.filter(users::Column::IsActive.eq(active));
    }
    if let Some(admin) = query.is_admin {
        select = select.filter(users::Column::IsAdmin.eq(admin));
    }
    if let Some(verified) = query.is_verified {
        select = select.filter(users::Column::IsVerified.eq(verified));
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        select = select.filter(
            Condition::any()
                .add(Expr::expr(Func::lower(Expr::col(users::Column::Email))).like(pattern.clone()))
                .add(
                    Expr::expr(Func::lower(Expr::col(users::Column::FirstName)))
                        .like(pattern.clone()),
                )
                .add(Expr::expr(Func::lower(Expr::col(users::Column::LastName))).like(pattern)),
        );
    }
    select
}

fn transaction_select(query: &TransactionQuery) -> Select<transactions::Entity> {
    let mut select = transactions::Entity::find();
    if let Some(user_id) = query.user_id {
        select = select.filter(transactions::Column::UserId.eq(user_id));
    }
    if let Some(kind) = query.kind {
        select = select.filter(transactions::Column::Kind.eq(kind.as_str()));
    }
    if let Some(status) = query.status {
        select = select.filter(transactions::Column::Status.eq(status.as_str()));
    }
    if let Some(start) = query.start {
        select = select.filter(transactions::Column::CreatedAt.gte(start));
    }
    if let Some(end) = query.end {
        select = select.filter(transactions::Column::CreatedAt.lte(end));
    }
    select
}

fn audit_log_select(query: &AuditLogQuery) -> Select<audit_logs::Entity> {
    let mut select = audit_logs::Entity::find();
    if let Some(action) = query.action.as_deref() {
        select = select.filter(audit_logs::Column::Action.eq(action));
    }
    if let Some(actor_id) = query.actor_id {
        select = select.filter(audit_logs::Column::ActorId.eq(actor_id));
    }
    if let Some(start) = query.start {
        select = select.filter(audit_logs::Column::CreatedAt.gte(start));
    }
    if let Some(end) = query.end {
        select = select.filter(audit_logs::Column::CreatedAt.lte(end));
    }
    select
}

async fn count_rows<E, C>(select: Select<E>, conn: &C) -> anyhow::Result<u64>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let count = select
        .select_only()
        .column_as(Expr::col(Asterisk).count(), "count")
        .into_tuple::<i64>()
        .one(conn)
        .await?
        .unwrap_or_default();
    Ok(count as u64)
}

/// Apply one balance change; the row is only updated when the result stays
/// non-negative.
async fn apply_posting<C: ConnectionTrait>(conn: &C, posting: &Posting) -> anyhow::Result<()> {
    let result = accounts::Entity::update_many()
        .col_expr(
            accounts::Column::BalanceCents,
            Expr::col(accounts::Column::BalanceCents).add(posting.delta_cents),
        )
        .filter(accounts::Column::Id.eq(posting.account_id))
        .filter(accounts::Column::BalanceCents.gte(-posting.delta_cents))
        .exec(conn)
        .await?;

    if result.rows_affected == 1 {
        return Ok(());
    }

    match accounts::Entity::find_by_id(posting.account_id).one(conn).await? {
        None => Err(EliteError::NotFound(format!("account {}", posting.account_id)).into()),
        Some(account) => Err(EliteError::InsufficientFunds {
            available: account.balance_cents,
            requested: -posting.delta_cents,
        }
        .into()),
    }
}

// ============================================================================
// PersistenceService implementation
// ============================================================================

#[async_trait]
impl PersistenceService for ExternalDbPersistService {
    fn storage_mode(&self) -> StorageMode {
        StorageMode::ExternalDb
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        users::Entity::find()
            .select_only()
            .column_as(Expr::cust("1"), "health")
            .into_tuple::<i32>()
            .one(&self.db)
            .await?;
        Ok(())
    }
}

// ============================================================================
// UserPersistence implementation
// ============================================================================

#[async_trait]
impl UserPersistence for ExternalDbPersistService {
    async fn user_find_by_id(&self, id: i64) -> anyhow::Result<Option<UserInfo>> {
        let model = users::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(user_from_model))
    }

    async fn user_find_by_email(&self, email: &str) -> anyhow::Result<Option<UserInfo>> {
        let model = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await?;
        Ok(model.map(user_from_model))
    }

    async fn user_create(&self, user: NewUser) -> anyhow::Result<UserInfo> {
        let now = utc_now();
        let active = users::ActiveModel {
            email: Set(user.email),
            first_name: Set(user.first_name),
            last_name: Set(user.last_name),
            phone: Set(user.phone),
            hashed_password: Set(user.password_hash),
            is_active: Set(true),
            is_verified: Set(false),
            is_admin: Set(user.is_admin),
            kyc_status: Set(KycStatus::Pending.as_str().to_string()),
            language_preference: Set("en".to_string()),
            last_password_change: Set(Some(now)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        match active.insert(&self.db).await {
            Ok(model) => Ok(user_from_model(model)),
            Err(e) if is_unique_violation(&e) => {
                Err(EliteError::Conflict("email already registered".to_string()).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn user_update(&self, id: i64, patch: &UserPatch) -> anyhow::Result<UserInfo> {
        let mut active = users::ActiveModel {
            id: Unchanged(id),
            updated_at: Set(utc_now()),
            ..Default::default()
        };

        macro_rules! set_present {
            ($($field:ident),+ $(,)?) => {
                $(
                    if let Some(value) = &patch.$field {
                        active.$field = Set(value.clone());
                    }
                )+
            };
        }

        set_present!(
            email,
            first_name,
            last_name,
            phone,
            is_active,
            is_verified,
            is_admin,
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
        if let Some(hash) = &patch.password_hash {
            active.hashed_password = Set(hash.clone());
        }
        if let Some(status) = patch.kyc_status {
            active.kyc_status = Set(status.as_str().to_string());
        }

        match active.update(&self.db).await {
            Ok(model) => Ok(user_from_model(model)),
            Err(DbErr::RecordNotUpdated) => Err(EliteError::NotFound("user".to_string()).into()),
            Err(e) if is_unique_violation(&e) => {
                Err(EliteError::Conflict("email already registered".to_string()).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn user_delete(&self, id: i64) -> anyhow::Result<bool> {
        let tx = self.db.begin().await?;

        if users::Entity::find_by_id(id).one(&tx).await?.is_none() {
            return Ok(false);
        }

        let funded = count_rows(
            accounts::Entity::find()
                .filter(accounts::Column::UserId.eq(id))
                .filter(accounts::Column::BalanceCents.ne(0)),
            &tx,
        )
        .await?;
        if funded > 0 {
            return Err(EliteError::Conflict(
                "user still holds funds in one or more accounts".to_string(),
            )
            .into());
        }

        accounts::Entity::delete_many()
            .filter(accounts::Column::UserId.eq(id))
            .exec(&tx)
            .await?;
        otps::Entity::delete_many()
            .filter(otps::Column::UserId.eq(id))
            .exec(&tx)
            .await?;
        user_pins::Entity::delete_by_id(id).exec(&tx).await?;
        withdrawal_accounts::Entity::delete_many()
            .filter(withdrawal_accounts::Column::UserId.eq(id))
            .exec(&tx)
            .await?;
        let result = users::Entity::delete_by_id(id).exec(&tx).await?;

        tx.commit().await?;
        Ok(result.rows_affected > 0)
    }

    async fn user_find_page(
        &self,
        query: &UserQuery,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<UserInfo>> {
        let select = user_select(query);
        let count = count_rows(select.clone(), &self.db).await?;

        if count == 0 {
            return Ok(Page::new(0, page_no, page_size, Vec::new()));
        }

        let offset = (page_no - 1) * page_size;
        let items = select
            .order_by_desc(users::Column::CreatedAt)
            .order_by_desc(users::Column::Id)
            .offset(offset)
            .limit(page_size)
            .all(&self.db)
            .await?
            .into_iter()
            .map(user_from_model)
            .collect();

        Ok(Page::new(count, page_no, page_size, items))
    }

    async fn user_count(&self, query: &UserQuery) -> anyhow::Result<u64> {
        count_rows(user_select(query), &self.db).await
    }

    async fn user_created_since(&self, since: NaiveDateTime) -> anyhow::Result<Vec<NaiveDateTime>> {
        let times = users::Entity::find()
            .select_only()
            .column(users::Column::CreatedAt)
            .filter(users::Column::CreatedAt.gte(since))
            .order_by_asc(users::Column::CreatedAt)
            .into_tuple::<NaiveDateTime>()
            .all(&self.db)
            .await?;
        Ok(times)
    }
}

// ============================================================================
// AccountPersistence implementation
// ============================================================================

#[async_trait]
impl AccountPersistence for ExternalDbPersistService {
    async fn account_create(&self, account: NewAccount) -> anyhow::Result<AccountInfo> {
        let active = accounts::ActiveModel {
            user_id: Set(account.user_id),
            account_number: Set(account.account_number),
            currency: Set(account.currency),
            balance_cents: Set(0),
            account_type: Set(account.account_type),
            is_active: Set(true),
            created_at: Set(utc_now()),
            ..Default::default()
        };

        match active.insert(&self.db).await {
            Ok(model) => Ok(account_from_model(model)),
            Err(e) if is_unique_violation(&e) => {
                Err(EliteError::Conflict("account number already in use".to_string()).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn account_find_by_id(&self, id: i64) -> anyhow::Result<Option<AccountInfo>> {
        let model = accounts::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(account_from_model))
    }

    async fn account_find_by_number(
        &self,
        account_number: &str,
    ) -> anyhow::Result<Option<AccountInfo>> {
        let model = accounts::Entity::find()
            .filter(accounts::Column::AccountNumber.eq(account_number))
            .one(&self.db)
            .await?;
        Ok(model.map(account_from_model))
    }

    async fn account_find_by_user(&self, user_id: i64) -> anyhow::Result<Vec<AccountInfo>> {
        let models = accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id))
            .order_by_asc(accounts::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(account_from_model).collect())
    }
}

// ============================================================================
// LedgerPersistence implementation
// ============================================================================

#[async_trait]
impl LedgerPersistence for ExternalDbPersistService {
    async fn ledger_post(
        &self,
        transaction: NewTransaction,
        postings: &[Posting],
    ) -> anyhow::Result<TransactionInfo> {
        let tx = self.db.begin().await?;

        for posting in postings {
            apply_posting(&tx, posting).await?;
        }

        let now = utc_now();
        let processed_at = if transaction.status == TransactionStatus::Pending {
            None
        } else {
            Some(now)
        };

        let model = transactions::ActiveModel {
            user_id: Set(transaction.user_id),
            from_account_id: Set(transaction.from_account_id),
            to_account_id: Set(transaction.to_account_id),
            amount_cents: Set(transaction.amount_cents),
            kind: Set(transaction.kind.as_str().to_string()),
            status: Set(transaction.status.as_str().to_string()),
            reference: Set(transaction.reference),
            method: Set(transaction.method),
            extra_data: Set(json_text(&transaction.extra_data)),
            created_at: Set(now),
            processed_at: Set(processed_at),
            ..Default::default()
        }
        .insert(&tx)
        .await?;

        tx.commit().await?;
        transaction_from_model(model)
    }

    async fn ledger_settle(
        &self,
        id: i64,
        status: TransactionStatus,
        postings: &[Posting],
    ) -> anyhow::Result<TransactionInfo> {
        let tx = self.db.begin().await?;

        let result = transactions::Entity::update_many()
            .col_expr(transactions::Column::Status, Expr::value(status.as_str()))
            .col_expr(transactions::Column::ProcessedAt, Expr::value(utc_now()))
            .filter(transactions::Column::Id.eq(id))
            .filter(transactions::Column::Status.eq(TransactionStatus::Pending.as_str()))
            .exec(&tx)
            .await?;

        if result.rows_affected == 0 {
            return match transactions::Entity::find_by_id(id).one(&tx).await? {
                None => Err(EliteError::NotFound("transaction".to_string()).into()),
                Some(existing) => Err(EliteError::Conflict(format!(
                    "transaction is already {}",
                    existing.status
                ))
                .into()),
            };
        }

        for posting in postings {
            apply_posting(&tx, posting).await?;
        }

        let model = transactions::Entity::find_by_id(id)
            .one(&tx)
            .await?
            .ok_or_else(|| EliteError::NotFound("transaction".to_string()))?;

        tx.commit().await?;
        transaction_from_model(model)
    }

    async fn transaction_find_by_id(&self, id: i64) -> anyhow::Result<Option<TransactionInfo>> {
        transactions::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(transaction_from_model)
            .transpose()
    }

    async fn transaction_find_by_reference(
        &self,
        reference: &str,
    ) -> anyhow::Result<Option<TransactionInfo>> {
        transactions::Entity::find()
            .filter(transactions::Column::Reference.eq(reference))
            .one(&self.db)
            .await?
            .map(transaction_from_model)
            .transpose()
    }

    async fn transaction_find_page(
        &self,
        query: &TransactionQuery,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<TransactionInfo>> {
        let select = transaction_select(query);
        let count = count_rows(select.clone(), &self.db).await?;

        if count == 0 {
            return Ok(Page::new(0, page_no, page_size, Vec::new()));
        }

        let offset = (page_no - 1) * page_size;
        let items = select
            .order_by_desc(transactions::Column::CreatedAt)
            .order_by_desc(transactions::Column::Id)
            .offset(offset)
            .limit(page_size)
            .all(&self.db)
            .await?
            .into_iter()
            .map(transaction_from_model)
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Page::new(count, page_no, page_size, items))
    }

    async fn transaction_summary(
        &self,
        query: &TransactionQuery,
    ) -> anyhow::Result<TransactionSummary> {
        let amounts = transaction_select(query)
            .select_only()
            .column(transactions::Column::AmountCents)
            .into_tuple::<i64>()
            .all(&self.db)
            .await?;

        Ok(TransactionSummary {
            count: amounts.len() as u64,
            total_amount_cents: amounts.iter().sum(),
        })
    }

    async fn transaction_find_since(
        &self,
        since: NaiveDateTime,
    ) -> anyhow::Result<Vec<TransactionInfo>> {
        transactions::Entity::find()
            .filter(transactions::Column::CreatedAt.gte(since))
            .order_by_asc(transactions::Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(transaction_from_model)
            .collect()
    }
}

// ============================================================================
// OtpPersistence implementation
// ============================================================================

#[async_trait]
impl OtpPersistence for ExternalDbPersistService {
    async fn otp_create(
        &self,
        user_id: i64,
        purpose: OtpPurpose,
        code: &str,
        context: Option<&str>,
        expires_at: NaiveDateTime,
    ) -> anyhow::Result<OtpInfo> {
        let tx = self.db.begin().await?;

        otps::Entity::update_many()
            .col_expr(otps::Column::IsUsed, Expr::value(true))
            .filter(otps::Column::UserId.eq(user_id))
            .filter(otps::Column::Purpose.eq(purpose.as_str()))
            .filter(otps::Column::IsUsed.eq(false))
            .exec(&tx)
            .await?;

        let model = otps::ActiveModel {
            user_id: Set(user_id),
            code: Set(code.to_string()),
            purpose: Set(purpose.as_str().to_string()),
            is_used: Set(false),
            failed_attempts: Set(0),
            context: Set(context.map(str::to_string)),
            created_at: Set(utc_now()),
            expires_at: Set(expires_at),
            ..Default::default()
        }
        .insert(&tx)
        .await?;

        tx.commit().await?;
        otp_from_model(model)
    }

    async fn otp_find_active(
        &self,
        user_id: i64,
        purpose: OtpPurpose,
    ) -> anyhow::Result<Option<OtpInfo>> {
        otps::Entity::find()
            .filter(otps::Column::UserId.eq(user_id))
            .filter(otps::Column::Purpose.eq(purpose.as_str()))
            .filter(otps::Column::IsUsed.eq(false))
            .order_by_desc(otps::Column::Id)
            .one(&self.db)
            .await?
            .map(otp_from_model)
            .transpose()
    }

    async fn otp_mark_used(&self, id: i64) -> anyhow::Result<bool> {
        let result = otps::Entity::update_many()
            .col_expr(otps::Column::IsUsed, Expr::value(true))
            .filter(otps::Column::Id.eq(id))
            .filter(otps::Column::IsUsed.eq(false))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn otp_record_failure(&self, id: i64, max_failures: i32) -> anyhow::Result<bool> {
        let tx = self.db.begin().await?;

        let counted = otps::Entity::update_many()
            .col_expr(
                otps::Column::FailedAttempts,
                Expr::col(otps::Column::FailedAttempts).add(1),
            )
            .filter(otps::Column::Id.eq(id))
            .filter(otps::Column::IsUsed.eq(false))
            .exec(&tx)
            .await?;
        if counted.rows_affected == 0 {
            tx.commit().await?;
            return Ok(true);
        }

        let burned = otps::Entity::update_many()
            .col_expr(otps::Column::IsUsed, Expr::value(true))
            .filter(otps::Column::Id.eq(id))
            .filter(otps::Column::IsUsed.eq(false))
            .filter(otps::Column::FailedAttempts.gte(max_failures))
            .exec(&tx)
            .await?;

        tx.commit().await?;
        Ok(burned.rows_affected == 1)
    }

    async fn otp_count_since(&self, user_id: i64, since: NaiveDateTime) -> anyhow::Result<u64> {
        count_rows(
            otps::Entity::find()
                .filter(otps::Column::UserId.eq(user_id))
                .filter(otps::Column::CreatedAt.gte(since)),
            &self.db,
        )
        .await
    }
}

// ============================================================================
// PinPersistence implementation
// ============================================================================

#[async_trait]
impl PinPersistence for ExternalDbPersistService {
    async fn pin_find_by_user(&self, user_id: i64) -> anyhow::Result<Option<PinInfo>> {
        let model = user_pins::Entity::find_by_id(user_id).one(&self.db).await?;
        Ok(model.map(pin_from_model))
    }

    async fn pin_save(&self, pin: &PinInfo) -> anyhow::Result<()> {
        let active = user_pins::ActiveModel {
            user_id: Set(pin.user_id),
            pin_hash: Set(pin.pin_hash.clone()),
            is_active: Set(pin.is_active),
            failed_attempts: Set(pin.failed_attempts),
            locked_until: Set(pin.locked_until),
            last_used: Set(pin.last_used),
            created_at: Set(pin.created_at),
            updated_at: Set(utc_now()),
        };

        user_pins::Entity::insert(active)
            .on_conflict(
                sea_query::OnConflict::column(user_pins::Column::UserId)
                    .update_columns([
                        user_pins::Column::PinHash,
                        user_pins::Column::IsActive,
                        user_pins::Column::FailedAttempts,
                        user_pins::Column::LockedUntil,
                        user_pins::Column::LastUsed,
                        user_pins::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn pin_delete(&self, user_id: i64) -> anyhow::Result<bool> {
        let result = user_pins::Entity::delete_by_id(user_id)
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn pin_record_failure(
        &self,
        user_id: i64,
        max_attempts: i32,
        lock_until: NaiveDateTime,
        now: NaiveDateTime,
    ) -> anyhow::Result<Option<PinInfo>> {
        let tx = self.db.begin().await?;

        // The first write takes the row lock, serializing concurrent failures
        user_pins::Entity::update_many()
            .col_expr(user_pins::Column::FailedAttempts, Expr::value(0))
            .col_expr(
                user_pins::Column::LockedUntil,
                Expr::value(Option::<NaiveDateTime>::None),
            )
            .filter(user_pins::Column::UserId.eq(user_id))
            .filter(user_pins::Column::LockedUntil.lte(now))
            .exec(&tx)
            .await?;

        let counted = user_pins::Entity::update_many()
            .col_expr(
                user_pins::Column::FailedAttempts,
                Expr::col(user_pins::Column::FailedAttempts).add(1),
            )
            .col_expr(user_pins::Column::UpdatedAt, Expr::value(now))
            .filter(user_pins::Column::UserId.eq(user_id))
            .filter(user_pins::Column::LockedUntil.is_null())
            .exec(&tx)
            .await?;

        if counted.rows_affected > 0 {
            user_pins::Entity::update_many()
                .col_expr(user_pins::Column::LockedUntil, Expr::value(Some(lock_until)))
                .filter(user_pins::Column::UserId.eq(user_id))
                .filter(user_pins::Column::LockedUntil.is_null())
                .filter(user_pins::Column::FailedAttempts.gte(max_attempts))
                .exec(&tx)
                .await?;
        }

        let model = user_pins::Entity::find_by_id(user_id).one(&tx).await?;
        tx.commit().await?;
        Ok(model.map(pin_from_model))
    }

    async fn pin_record_success(&self, user_id: i64, now: NaiveDateTime) -> anyhow::Result<bool> {
        let result = user_pins::Entity::update_many()
            .col_expr(user_pins::Column::FailedAttempts, Expr::value(0))
            .col_expr(
                user_pins::Column::LockedUntil,
                Expr::value(Option::<NaiveDateTime>::None),
            )
            .col_expr(user_pins::Column::LastUsed, Expr::value(Some(now)))
            .col_expr(user_pins::Column::UpdatedAt, Expr::value(now))
            .filter(user_pins::Column::UserId.eq(user_id))
            .filter(
                Condition::any()
                    .add(user_pins::Column::LockedUntil.is_null())
                    .add(user_pins::Column::LockedUntil.lte(now)),
            )
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn pin_clear_expired_lock(
        &self,
        user_id: i64,
        now: NaiveDateTime,
    ) -> anyhow::Result<bool> {
        let result = user_pins::Entity::update_many()
            .col_expr(user_pins::Column::FailedAttempts, Expr::value(0))
            .col_expr(
                user_pins::Column::LockedUntil,
                Expr::value(Option::<NaiveDateTime>::None),
            )
            .col_expr(user_pins::Column::UpdatedAt, Expr::value(now))
            .filter(user_pins::Column::UserId.eq(user_id))
            .filter(user_pins::Column::LockedUntil.lte(now))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn pin_set_active(&self, user_id: i64, active: bool) -> anyhow::Result<bool> {
        let result = user_pins::Entity::update_many()
            .col_expr(user_pins::Column::IsActive, Expr::value(active))
            .col_expr(user_pins::Column::UpdatedAt, Expr::value(utc_now()))
            .filter(user_pins::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}

// ============================================================================
// WithdrawalAccountPersistence implementation
// ============================================================================

async fn clear_default_withdrawal_account<C: ConnectionTrait>(
    conn: &C,
    user_id: i64,
) -> anyhow::Result<()> {
    withdrawal_accounts::Entity::update_many()
        .col_expr(withdrawal_accounts::Column::IsDefault, Expr::value(false))
        .filter(withdrawal_accounts::Column::UserId.eq(user_id))
        .filter(withdrawal_accounts::Column::IsDefault.eq(true))
        .exec(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl WithdrawalAccountPersistence for ExternalDbPersistService {
    async fn withdrawal_account_create(
        &self,
        account: NewWithdrawalAccount,
        make_default: bool,
    ) -> anyhow::Result<WithdrawalAccountInfo> {
        let account_type = account
            .account_type
            .ok_or_else(|| EliteError::IllegalArgument("account_type is required".to_string()))?;

        let tx = self.db.begin().await?;

        let existing = count_rows(
            withdrawal_accounts::Entity::find()
                .filter(withdrawal_accounts::Column::UserId.eq(account.user_id)),
            &tx,
        )
        .await?;
        let is_default = make_default || existing == 0;
        if is_default {
            clear_default_withdrawal_account(&tx, account.user_id).await?;
        }

        let now = utc_now();
        let model = withdrawal_accounts::ActiveModel {
            user_id: Set(account.user_id),
            account_type: Set(account_type.as_str().to_string()),
            provider: Set(account.provider),
            account_name: Set(account.account_name),
            account_number: Set(account.account_number),
            bank_code: Set(account.bank_code),
            bank_name: Set(account.bank_name),
            wallet_address: Set(account.wallet_address),
            wallet_network: Set(account.wallet_network),
            cryptocurrency: Set(account.cryptocurrency),
            phone_number: Set(account.phone_number),
            mobile_network: Set(account.mobile_network),
            is_verified: Set(false),
            is_default: Set(is_default),
            account_metadata: Set(json_text(&account.account_metadata)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&tx)
        .await?;

        tx.commit().await?;
        withdrawal_account_from_model(model)
    }

    async fn withdrawal_account_find_by_id(
        &self,
        id: i64,
    ) -> anyhow::Result<Option<WithdrawalAccountInfo>> {
        withdrawal_accounts::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(withdrawal_account_from_model)
            .transpose()
    }

    async fn withdrawal_account_find_by_user(
        &self,
        user_id: i64,
    ) -> anyhow::Result<Vec<WithdrawalAccountInfo>> {
        withdrawal_accounts::Entity::find()
            .filter(withdrawal_accounts::Column::UserId.eq(user_id))
            .order_by_desc(withdrawal_accounts::Column::IsDefault)
            .order_by_desc(withdrawal_accounts::Column::CreatedAt)
            .order_by_desc(withdrawal_accounts::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(withdrawal_account_from_model)
            .collect()
    }

    async fn withdrawal_account_save(
        &self,
        account: &WithdrawalAccountInfo,
    ) -> anyhow::Result<WithdrawalAccountInfo> {
        let active = withdrawal_accounts::ActiveModel {
            id: Unchanged(account.id),
            provider: Set(account.provider.clone()),
            account_name: Set(account.account_name.clone()),
            account_number: Set(account.account_number.clone()),
            bank_code: Set(account.bank_code.clone()),
            bank_name: Set(account.bank_name.clone()),
            wallet_address: Set(account.wallet_address.clone()),
            wallet_network: Set(account.wallet_network.clone()),
            cryptocurrency: Set(account.cryptocurrency.clone()),
            phone_number: Set(account.phone_number.clone()),
            mobile_network: Set(account.mobile_network.clone()),
            is_verified: Set(account.is_verified),
            account_metadata: Set(json_text(&account.account_metadata)),
            updated_at: Set(utc_now()),
            ..Default::default()
        };

        match active.update(&self.db).await {
            Ok(model) => withdrawal_account_from_model(model),
            Err(DbErr::RecordNotUpdated) => {
                Err(EliteError::NotFound("withdrawal account".to_string()).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn withdrawal_account_delete(&self, id: i64) -> anyhow::Result<bool> {
        let tx = self.db.begin().await?;

        let Some(existing) = withdrawal_accounts::Entity::find_by_id(id).one(&tx).await? else {
            return Ok(false);
        };

        withdrawal_accounts::Entity::delete_by_id(id).exec(&tx).await?;

        if existing.is_default {
            let next = withdrawal_accounts::Entity::find()
                .filter(withdrawal_accounts::Column::UserId.eq(existing.user_id))
                .order_by_desc(withdrawal_accounts::Column::CreatedAt)
                .order_by_desc(withdrawal_accounts::Column::Id)
                .one(&tx)
                .await?;
            if let Some(next) = next {
                withdrawal_accounts::Entity::update_many()
                    .col_expr(withdrawal_accounts::Column::IsDefault, Expr::value(true))
                    .filter(withdrawal_accounts::Column::Id.eq(next.id))
                    .exec(&tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn withdrawal_account_set_default(
        &self,
        user_id: i64,
        id: i64,
    ) -> anyhow::Result<WithdrawalAccountInfo> {
        let tx = self.db.begin().await?;

        let existing = withdrawal_accounts::Entity::find_by_id(id)
            .filter(withdrawal_accounts::Column::UserId.eq(user_id))
            .one(&tx)
            .await?
            .ok_or_else(|| EliteError::NotFound("withdrawal account".to_string()))?;

        clear_default_withdrawal_account(&tx, user_id).await?;

        let mut active: withdrawal_accounts::ActiveModel = existing.into();
        active.is_default = Set(true);
        active.updated_at = Set(utc_now());
        let model = active.update(&tx).await?;

        tx.commit().await?;
        withdrawal_account_from_model(model)
    }
}

// ============================================================================
// AuditPersistence implementation
// ============================================================================

#[async_trait]
impl AuditPersistence for ExternalDbPersistService {
    async fn audit_log_create(&self, log: NewAuditLog) -> anyhow::Result<AuditLogInfo> {
        let model = audit_logs::ActiveModel {
            actor_id: Set(log.actor_id),
            action: Set(log.action),
            details: Set(json_text(&log.details)),
            created_at: Set(utc_now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(audit_log_from_model(model))
    }

    async fn audit_log_find_page(
        &self,
        query: &AuditLogQuery,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<AuditLogInfo>> {
        let select = audit_log_select(query);
        let count = count_rows(select.clone(), &self.db).await?;

        if count == 0 {
            return Ok(Page::new(0, page_no, page_size, Vec::new()));
        }

        let offset = (page_no - 1) * page_size;
        let items = select
            .order_by_desc(audit_logs::Column::CreatedAt)
            .order_by_desc(audit_logs::Column::Id)
            .offset(offset)
            .limit(page_size)
            .all(&self.db)
            .await?
            .into_iter()
            .map(audit_log_from_model)
            .collect();

        Ok(Page::new(count, page_no, page_size, items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_service() -> ExternalDbPersistService {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let service = ExternalDbPersistService::new(db);
        service.init_schema().await.unwrap();
        service
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: None,
            password_hash: "hash".to_string(),
            is_admin: false,
        }
    }

    async fn funded_account(svc: &ExternalDbPersistService, user_id: i64, number: &str, cents: i64) -> AccountInfo {
        let account = svc
            .account_create(NewAccount {
                user_id,
                account_number: number.to_string(),
                currency: "NGN".to_string(),
                account_type: "savings".to_string(),
            })
            .await
            .unwrap();
        if cents > 0 {
            svc.ledger_post(
                NewTransaction {
                    user_id,
                    from_account_id: None,
                    to_account_id: Some(account.id),
                    amount_cents: cents,
                    kind: TransactionKind::Deposit,
                    status: TransactionStatus::Completed,
                    reference: format!("seed-{}", number),
                    method: "internal".to_string(),
                    extra_data: serde_json::json!({}),
                },
                &[Posting::credit(account.id, cents)],
            )
            .await
            .unwrap();
        }
        svc.account_find_by_id(account.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_user_create_and_duplicate_email() {
        let svc = create_test_service().await;

        let user = svc.user_create(new_user("ada@example.com")).await.unwrap();
        assert_eq!(user.kyc_status, KycStatus::Pending);
        assert!(user.is_active);
        assert!(!user.is_verified);

        let err = svc.user_create(new_user("ada@example.com")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EliteError>(),
            Some(EliteError::Conflict(_))
        ));

        let found = svc.user_find_by_email("ada@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_user_update_and_page() {
        let svc = create_test_service().await;
        let user = svc.user_create(new_user("a@example.com")).await.unwrap();
        svc.user_create(new_user("b@example.com")).await.unwrap();

        let saved = svc
            .user_update(
                user.id,
                &UserPatch {
                    kyc_status: Some(KycStatus::Submitted),
                    city: Some(Some("Lagos".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(saved.city.as_deref(), Some("Lagos"));
        assert_eq!(saved.email, "a@example.com");

        let page = svc
            .user_find_page(
                &UserQuery {
                    kyc_status: Some(KycStatus::Submitted),
                    ..Default::default()
                },
                1,
                10,
            )
            .await
            .unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.page_items[0].email, "a@example.com");

        let search = svc
            .user_count(&UserQuery {
                search: Some("LOVE".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(search, 2);
    }

    #[tokio::test]
    async fn test_ledger_post_rejects_overdraft() {
        let svc = create_test_service().await;
        let user = svc.user_create(new_user("a@example.com")).await.unwrap();
        let from = funded_account(&svc, user.id, "1000000001", 5_000).await;
        let to = funded_account(&svc, user.id, "1000000002", 0).await;

        let err = svc
            .ledger_post(
                NewTransaction {
                    user_id: user.id,
                    from_account_id: Some(from.id),
                    to_account_id: Some(to.id),
                    amount_cents: 6_000,
                    kind: TransactionKind::Transfer,
                    status: TransactionStatus::Completed,
                    reference: "t-1".to_string(),
                    method: "internal".to_string(),
                    extra_data: serde_json::json!({}),
                },
                &[Posting::debit(from.id, 6_000), Posting::credit(to.id, 6_000)],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EliteError>(),
            Some(EliteError::InsufficientFunds {
                available: 5_000,
                requested: 6_000
            })
        ));

        // Nothing was applied
        let from = svc.account_find_by_id(from.id).await.unwrap().unwrap();
        let to = svc.account_find_by_id(to.id).await.unwrap().unwrap();
        assert_eq!(from.balance_cents, 5_000);
        assert_eq!(to.balance_cents, 0);
        assert!(svc.transaction_find_by_reference("t-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ledger_settle_only_from_pending() {
        let svc = create_test_service().await;
        let user = svc.user_create(new_user("a@example.com")).await.unwrap();
        let account = funded_account(&svc, user.id, "1000000001", 0).await;

        let pending = svc
            .ledger_post(
                NewTransaction {
                    user_id: user.id,
                    from_account_id: None,
                    to_account_id: Some(account.id),
                    amount_cents: 2_500,
                    kind: TransactionKind::Deposit,
                    status: TransactionStatus::Pending,
                    reference: "d-1".to_string(),
                    method: "bank_transfer".to_string(),
                    extra_data: serde_json::json!({"provider": "bank_transfer"}),
                },
                &[],
            )
            .await
            .unwrap();
        assert!(pending.processed_at.is_none());

        let settled = svc
            .ledger_settle(
                pending.id,
                TransactionStatus::Completed,
                &[Posting::credit(account.id, 2_500)],
            )
            .await
            .unwrap();
        assert_eq!(settled.status, TransactionStatus::Completed);
        assert!(settled.processed_at.is_some());

        let err = svc
            .ledger_settle(pending.id, TransactionStatus::Rejected, &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EliteError>(),
            Some(EliteError::Conflict(_))
        ));

        let account = svc.account_find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(account.balance_cents, 2_500);
    }

    #[tokio::test]
    async fn test_user_update_keeps_untouched_columns() {
        let svc = create_test_service().await;
        let user = svc.user_create(new_user("a@example.com")).await.unwrap();

        svc.user_update(
            user.id,
            &UserPatch {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let updated = svc
            .user_update(
                user.id,
                &UserPatch {
                    selfie_photo: Some(Some("selfie.png".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.selfie_photo.as_deref(), Some("selfie.png"));

        let err = svc
            .user_update(999, &UserPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EliteError>(),
            Some(EliteError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_otp_invalidation_and_single_use() {
        let svc = create_test_service().await;
        let user = svc.user_create(new_user("a@example.com")).await.unwrap();
        let expires = utc_now() + chrono::Duration::minutes(10);

        let first = svc
            .otp_create(user.id, OtpPurpose::Login, "111111", None, expires)
            .await
            .unwrap();
        let second = svc
            .otp_create(user.id, OtpPurpose::Login, "222222", Some("ctx"), expires)
            .await
            .unwrap();

        let active = svc.otp_find_active(user.id, OtpPurpose::Login).await.unwrap().unwrap();
        assert_eq!(active.id, second.id);
        assert_eq!(active.context.as_deref(), Some("ctx"));
        assert_eq!(active.failed_attempts, 0);
        assert!(!svc.otp_mark_used(first.id).await.unwrap());
        assert!(svc.otp_mark_used(second.id).await.unwrap());
        assert!(!svc.otp_mark_used(second.id).await.unwrap());
        assert_eq!(
            svc.otp_count_since(user.id, utc_now() - chrono::Duration::hours(1))
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_otp_burned_after_repeated_failures() {
        let svc = create_test_service().await;
        let expires = utc_now() + chrono::Duration::minutes(10);
        let otp = svc
            .otp_create(1, OtpPurpose::PasswordReset, "123456", None, expires)
            .await
            .unwrap();

        assert!(!svc.otp_record_failure(otp.id, 3).await.unwrap());
        assert!(!svc.otp_record_failure(otp.id, 3).await.unwrap());
        assert!(svc.otp_record_failure(otp.id, 3).await.unwrap());
        assert!(
            svc.otp_find_active(1, OtpPurpose::PasswordReset)
                .await
                .unwrap()
                .is_none()
        );
        assert!(!svc.otp_mark_used(otp.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_pin_failure_counter_and_lock() {
        let svc = create_test_service().await;
        let now = utc_now();
        let lock_until = now + chrono::Duration::minutes(10);
        svc.pin_save(&PinInfo {
            user_id: 7,
            pin_hash: "h".to_string(),
            is_active: true,
            failed_attempts: 0,
            locked_until: None,
            last_used: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();

        for expected in 1..=2 {
            let pin = svc.pin_record_failure(7, 3, lock_until, now).await.unwrap().unwrap();
            assert_eq!(pin.failed_attempts, expected);
            assert!(pin.locked_until.is_none());
        }
        let locked = svc.pin_record_failure(7, 3, lock_until, now).await.unwrap().unwrap();
        assert_eq!(locked.failed_attempts, 3);
        assert!(locked.locked_until.is_some());

        // Further failures leave an active lock alone
        let again = svc.pin_record_failure(7, 3, lock_until, now).await.unwrap().unwrap();
        assert_eq!(again.failed_attempts, 3);
        assert!(!svc.pin_record_success(7, now).await.unwrap());

        // Past the lock a failure starts a new round
        let later = lock_until + chrono::Duration::seconds(1);
        let fresh = svc
            .pin_record_failure(7, 3, later + chrono::Duration::minutes(10), later)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fresh.failed_attempts, 1);
        assert!(fresh.locked_until.is_none());
        assert!(svc.pin_record_success(7, later).await.unwrap());

        assert!(svc.pin_set_active(7, false).await.unwrap());
        assert!(!svc.pin_set_active(8, false).await.unwrap());
        assert!(svc.pin_record_failure(8, 3, lock_until, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pin_upsert() {
        let svc = create_test_service().await;
        let now = utc_now();
        let mut pin = PinInfo {
            user_id: 7,
            pin_hash: "h1".to_string(),
            is_active: true,
            failed_attempts: 0,
            locked_until: None,
            last_used: None,
            created_at: now,
            updated_at: now,
        };
        svc.pin_save(&pin).await.unwrap();
        pin.failed_attempts = 2;
        svc.pin_save(&pin).await.unwrap();

        let stored = svc.pin_find_by_user(7).await.unwrap().unwrap();
        assert_eq!(stored.failed_attempts, 2);
        assert!(svc.pin_delete(7).await.unwrap());
        assert!(svc.pin_find_by_user(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_withdrawal_account_default_handling() {
        let svc = create_test_service().await;
        let bank = |number: &str| NewWithdrawalAccount {
            user_id: 1,
            account_type: Some(WithdrawalAccountType::Bank),
            provider: "bank_transfer".to_string(),
            account_number: Some(number.to_string()),
            bank_code: Some("058".to_string()),
            ..Default::default()
        };

        let first = svc.withdrawal_account_create(bank("0001"), false).await.unwrap();
        assert!(first.is_default);
        let second = svc.withdrawal_account_create(bank("0002"), true).await.unwrap();
        assert!(second.is_default);

        let listed = svc.withdrawal_account_find_by_user(1).await.unwrap();
        assert_eq!(listed.iter().filter(|a| a.is_default).count(), 1);
        assert_eq!(listed[0].id, second.id);

        svc.withdrawal_account_set_default(1, first.id).await.unwrap();
        assert!(svc.withdrawal_account_delete(first.id).await.unwrap());
        let remaining = svc.withdrawal_account_find_by_user(1).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].is_default);
    }

    #[tokio::test]
    async fn test_user_delete_refuses_funded_user() {
        let svc = create_test_service().await;
        let user = svc.user_create(new_user("a@example.com")).await.unwrap();
        funded_account(&svc, user.id, "1000000001", 100).await;

        assert!(svc.user_delete(user.id).await.is_err());

        let other = svc.user_create(new_user("b@example.com")).await.unwrap();
        funded_account(&svc, other.id, "1000000002", 0).await;
        assert!(svc.user_delete(other.id).await.unwrap());
        assert!(svc.account_find_by_number("1000000002").await.unwrap().is_none());
        assert!(!svc.user_delete(other.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_audit_log_filters_and_health() {
        let svc = create_test_service().await;
        svc.health_check().await.unwrap();
        assert_eq!(svc.storage_mode(), StorageMode::ExternalDb);

        for action in ["user_suspended", "kyc_reviewed", "user_suspended"] {
            svc.audit_log_create(NewAuditLog {
                actor_id: Some(1),
                action: action.to_string(),
                details: serde_json::json!({"user_id": 2}),
            })
            .await
            .unwrap();
        }

        let page = svc
            .audit_log_find_page(
                &AuditLogQuery {
                    action: Some("user_suspended".to_string()),
                    ..Default::default()
                },
                1,
                20,
            )
            .await
            .unwrap();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.page_items[0].details["user_id"], 2);
    }
}
