// Embedded persistence backend using RocksDB
// Provides single-node storage without an external database

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use rocksdb::{BlockBasedOptions, ColumnFamilyDescriptor, DB, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;

use elite_common::EliteError;
use elite_common::utils::utc_now;

use crate::model::*;
use crate::traits::*;

pub const CF_USERS: &str = "users";
pub const CF_ACCOUNTS: &str = "accounts";
pub const CF_TRANSACTIONS: &str = "transactions";
pub const CF_OTPS: &str = "otps";
pub const CF_PINS: &str = "pins";
pub const CF_WITHDRAWAL_ACCOUNTS: &str = "withdrawal_accounts";
pub const CF_AUDIT_LOGS: &str = "audit_logs";
/// Unique secondary keys: `email:`, `account_number:`, `reference:`
pub const CF_INDEX: &str = "index";
const CF_META: &str = "meta";

const ALL_CFS: &[&str] = &[
    CF_USERS,
    CF_ACCOUNTS,
    CF_TRANSACTIONS,
    CF_OTPS,
    CF_PINS,
    CF_WITHDRAWAL_ACCOUNTS,
    CF_AUDIT_LOGS,
    CF_INDEX,
    CF_META,
];

/// Zero padded so lexicographic key order equals numeric id order
fn id_key(id: i64) -> String {
    format!("{:020}", id)
}

fn email_key(email: &str) -> String {
    format!("email:{}", email)
}

fn account_number_key(number: &str) -> String {
    format!("account_number:{}", number)
}

fn reference_key(reference: &str) -> String {
    format!("reference:{}", reference)
}

/// Standalone embedded persistence using RocksDB
///
/// Values are JSON documents. Every read-modify-write runs under `write_lock`
/// and commits through a single `WriteBatch`, which keeps balance changes and
/// their transaction rows atomic.
pub struct EmbeddedPersistService {
    db: Arc<DB>,
    write_lock: Mutex<()>,
}

impl EmbeddedPersistService {
    /// Open (or create) a RocksDB database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(64 * 1024 * 1024);
        db_opts.set_max_write_buffer_number(3);
        db_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let mut block_opts = BlockBasedOptions::default();
        let cache = rocksdb::Cache::new_lru_cache(64 * 1024 * 1024);
        block_opts.set_block_cache(&cache);
        block_opts.set_bloom_filter(10.0, false);

        let mut cf_opts = Options::default();
        cf_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        cf_opts.set_block_based_table_factory(&block_opts);

        let cfs = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, cf_opts.clone()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cfs)
            .map_err(|e| anyhow::anyhow!("RocksDB open error: {}", e))?;

        tracing::info!(path = %path.as_ref().display(), "Embedded RocksDB storage opened");
        Ok(Self::new(Arc::new(db)))
    }

    /// Create from a raw RocksDB instance
    pub fn new(db: Arc<DB>) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
        }
    }

    /// Get a column family handle
    fn cf(&self, name: &str) -> anyhow::Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| anyhow::anyhow!("Column family '{}' not found", name))
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &str) -> anyhow::Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self
            .db
            .get_cf(cf, key.as_bytes())
            .map_err(|e| anyhow::anyhow!("RocksDB get error: {}", e))?
        {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_string(&self, cf_name: &str, key: &str) -> anyhow::Result<Option<String>> {
        let cf = self.cf(cf_name)?;
        let value = self
            .db
            .get_cf(cf, key.as_bytes())
            .map_err(|e| anyhow::anyhow!("RocksDB get error: {}", e))?;
        Ok(value.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Read every value of a column family in key order
    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> anyhow::Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut results = Vec::new();

        let iter = self.db.iterator_cf(cf, rocksdb::IteratorMode::Start);
        for item in iter {
            let (_, value) = item.map_err(|e| anyhow::anyhow!("RocksDB iterator error: {}", e))?;
            results.push(serde_json::from_slice(&value)?);
        }

        Ok(results)
    }

    fn batch_put<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf_name: &str,
        key: &str,
        value: &T,
    ) -> anyhow::Result<()> {
        let cf = self.cf(cf_name)?;
        batch.put_cf(cf, key.as_bytes(), serde_json::to_vec(value)?);
        Ok(())
    }

    fn batch_put_index(&self, batch: &mut WriteBatch, key: &str, id: i64) -> anyhow::Result<()> {
        let cf = self.cf(CF_INDEX)?;
        batch.put_cf(cf, key.as_bytes(), id.to_string().as_bytes());
        Ok(())
    }

    fn batch_delete(&self, batch: &mut WriteBatch, cf_name: &str, key: &str) -> anyhow::Result<()> {
        let cf = self.cf(cf_name)?;
        batch.delete_cf(cf, key.as_bytes());
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> anyhow::Result<()> {
        self.db
            .write(batch)
            .map_err(|e| anyhow::anyhow!("RocksDB write error: {}", e))
    }

    /// Allocate the next id of a sequence. Must be called under `write_lock`;
    /// the new counter value is staged into `batch`.
    fn next_id(&self, batch: &mut WriteBatch, sequence: &str) -> anyhow::Result<i64> {
        let key = format!("seq:{}", sequence);
        let current = self
            .get_string(CF_META, &key)?
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);
        let next = current + 1;
        let cf = self.cf(CF_META)?;
        batch.put_cf(cf, key.as_bytes(), next.to_string().as_bytes());
        Ok(next)
    }

    fn lookup_index(&self, key: &str) -> anyhow::Result<Option<i64>> {
        Ok(self
            .get_string(CF_INDEX, key)?
            .and_then(|v| v.parse::<i64>().ok()))
    }

    /// Stage postings into `batch`. Repeated postings to one account accumulate
    /// before the non-negative check.
    fn stage_postings(&self, batch: &mut WriteBatch, postings: &[Posting]) -> anyhow::Result<()> {
        let mut touched: Vec<AccountInfo> = Vec::new();

        for posting in postings {
            let index = match touched.iter().position(|a| a.id == posting.account_id) {
                Some(index) => index,
                None => {
                    let account: AccountInfo = self
                        .get_json(CF_ACCOUNTS, &id_key(posting.account_id))?
                        .ok_or_else(|| {
                            EliteError::NotFound(format!("account {}", posting.account_id))
                        })?;
                    touched.push(account);
                    touched.len() - 1
                }
            };

            let account = &mut touched[index];
            let next = account.balance_cents + posting.delta_cents;
            if next < 0 {
                return Err(EliteError::InsufficientFunds {
                    available: account.balance_cents,
                    requested: -posting.delta_cents,
                }
                .into());
            }
            account.balance_cents = next;
        }

        for account in &touched {
            self.batch_put(batch, CF_ACCOUNTS, &id_key(account.id), account)?;
        }
        Ok(())
    }

    fn user_by_id(&self, id: i64) -> anyhow::Result<Option<UserInfo>> {
        self.get_json(CF_USERS, &id_key(id))
    }

    fn users_matching(&self, query: &UserQuery) -> anyhow::Result<Vec<UserInfo>> {
        let mut users: Vec<UserInfo> = self
            .scan::<UserInfo>(CF_USERS)?
            .into_iter()
            .filter(|u| query.matches(u))
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(users)
    }

    fn transactions_matching(&self, query: &TransactionQuery) -> anyhow::Result<Vec<TransactionInfo>> {
        let mut txns: Vec<TransactionInfo> = self
            .scan::<TransactionInfo>(CF_TRANSACTIONS)?
            .into_iter()
            .filter(|t| query.matches(t))
            .collect();
        txns.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(txns)
    }

    /// Read-modify-write of one PIN row under `write_lock`. `change` returns
    /// false to leave the row as it is. Returns the row as stored afterwards.
    fn update_pin(
        &self,
        user_id: i64,
        change: impl FnOnce(&mut PinInfo) -> bool,
    ) -> anyhow::Result<Option<PinInfo>> {
        let _guard = self.write_lock.lock();

        let Some(mut pin) = self.get_json::<PinInfo>(CF_PINS, &id_key(user_id))? else {
            return Ok(None);
        };
        if change(&mut pin) {
            let mut batch = WriteBatch::default();
            self.batch_put(&mut batch, CF_PINS, &id_key(user_id), &pin)?;
            self.write(batch)?;
        }
        Ok(Some(pin))
    }

    fn withdrawal_accounts_of(&self, user_id: i64) -> anyhow::Result<Vec<WithdrawalAccountInfo>> {
        Ok(self
            .scan::<WithdrawalAccountInfo>(CF_WITHDRAWAL_ACCOUNTS)?
            .into_iter()
            .filter(|a| a.user_id == user_id)
            .collect())
    }
}

#[async_trait]
impl PersistenceService for EmbeddedPersistService {
    fn storage_mode(&self) -> StorageMode {
        StorageMode::Embedded
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        for name in ALL_CFS {
            self.cf(name)?;
        }
        self.get_string(CF_META, "seq:users")?;
        Ok(())
    }
}

#[async_trait]
impl UserPersistence for EmbeddedPersistService {
    async fn user_find_by_id(&self, id: i64) -> anyhow::Result<Option<UserInfo>> {
        self.user_by_id(id)
    }

    async fn user_find_by_email(&self, email: &str) -> anyhow::Result<Option<UserInfo>> {
        match self.lookup_index(&email_key(email))? {
            Some(id) => self.user_by_id(id),
            None => Ok(None),
        }
    }

    async fn user_create(&self, user: NewUser) -> anyhow::Result<UserInfo> {
        let _guard = self.write_lock.lock();

        if self.lookup_index(&email_key(&user.email))?.is_some() {
            return Err(EliteError::Conflict("email already registered".to_string()).into());
        }

        let mut batch = WriteBatch::default();
        let id = self.next_id(&mut batch, CF_USERS)?;
        let now = utc_now();
        let info = UserInfo {
            id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            password_hash: user.password_hash,
            is_active: true,
            is_verified: false,
            is_admin: user.is_admin,
            kyc_status: KycStatus::Pending,
            language_preference: "en".to_string(),
            last_password_change: Some(now),
            created_at: now,
            updated_at: now,
            ..Default::default()
        };

        self.batch_put(&mut batch, CF_USERS, &id_key(id), &info)?;
        self.batch_put_index(&mut batch, &email_key(&info.email), id)?;
        self.write(batch)?;
        Ok(info)
    }

    async fn user_update(&self, id: i64, patch: &UserPatch) -> anyhow::Result<UserInfo> {
        let _guard = self.write_lock.lock();

        let existing = self
            .user_by_id(id)?
            .ok_or_else(|| EliteError::NotFound("user".to_string()))?;
        let mut updated = existing.clone();
        patch.apply(&mut updated);
        updated.id = existing.id;
        updated.created_at = existing.created_at;
        updated.updated_at = utc_now();

        let mut batch = WriteBatch::default();
        if existing.email != updated.email {
            if self.lookup_index(&email_key(&updated.email))?.is_some() {
                return Err(EliteError::Conflict("email already registered".to_string()).into());
            }
            self.batch_delete(&mut batch, CF_INDEX, &email_key(&existing.email))?;
            self.batch_put_index(&mut batch, &email_key(&updated.email), id)?;
        }

        self.batch_put(&mut batch, CF_USERS, &id_key(id), &updated)?;
        self.write(batch)?;
        Ok(updated)
    }

    async fn user_delete(&self, id: i64) -> anyhow::Result<bool> {
        let _guard = self.write_lock.lock();

        let Some(user) = self.user_by_id(id)? else {
            return Ok(false);
        };

        let accounts: Vec<AccountInfo> = self
            .scan::<AccountInfo>(CF_ACCOUNTS)?
            .into_iter()
            .filter(|a| a.user_id == id)
            .collect();
        if accounts.iter().any(|a| a.balance_cents != 0) {
            return Err(EliteError::Conflict(
                "user still holds funds in one or more accounts".to_string(),
            )
            .into());
        }

        let mut batch = WriteBatch::default();
        for account in &accounts {
            self.batch_delete(&mut batch, CF_ACCOUNTS, &id_key(account.id))?;
            self.batch_delete(&mut batch, CF_INDEX, &account_number_key(&account.account_number))?;
        }
        for otp in self.scan::<OtpInfo>(CF_OTPS)?.into_iter().filter(|o| o.user_id == id) {
            self.batch_delete(&mut batch, CF_OTPS, &id_key(otp.id))?;
        }
        for wa in self.withdrawal_accounts_of(id)? {
            self.batch_delete(&mut batch, CF_WITHDRAWAL_ACCOUNTS, &id_key(wa.id))?;
        }
        self.batch_delete(&mut batch, CF_PINS, &id_key(id))?;
        self.batch_delete(&mut batch, CF_INDEX, &email_key(&user.email))?;
        self.batch_delete(&mut batch, CF_USERS, &id_key(id))?;
        self.write(batch)?;
        Ok(true)
    }

    async fn user_find_page(
        &self,
        query: &UserQuery,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<UserInfo>> {
        Ok(Page::from_vec(self.users_matching(query)?, page_no, page_size))
    }

    async fn user_count(&self, query: &UserQuery) -> anyhow::Result<u64> {
        Ok(self
            .scan::<UserInfo>(CF_USERS)?
            .iter()
            .filter(|u| query.matches(u))
            .count() as u64)
    }

    async fn user_created_since(&self, since: NaiveDateTime) -> anyhow::Result<Vec<NaiveDateTime>> {
        let mut times: Vec<NaiveDateTime> = self
            .scan::<UserInfo>(CF_USERS)?
            .into_iter()
            .map(|u| u.created_at)
            .filter(|t| *t >= since)
            .collect();
        times.sort();
        Ok(times)
    }
}

#[async_trait]
impl AccountPersistence for EmbeddedPersistService {
    async fn account_create(&self, account: NewAccount) -> anyhow::Result<AccountInfo> {
        let _guard = self.write_lock.lock();

        if self
            .lookup_index(&account_number_key(&account.account_number))?
            .is_some()
        {
            return Err(EliteError::Conflict("account number already in use".to_string()).into());
        }

        let mut batch = WriteBatch::default();
        let id = self.next_id(&mut batch, CF_ACCOUNTS)?;
        let info = AccountInfo {
            id,
            user_id: account.user_id,
            account_number: account.account_number,
            currency: account.currency,
            balance_cents: 0,
            account_type: account.account_type,
            is_active: true,
            created_at: utc_now(),
        };

        self.batch_put(&mut batch, CF_ACCOUNTS, &id_key(id), &info)?;
        self.batch_put_index(&mut batch, &account_number_key(&info.account_number), id)?;
        self.write(batch)?;
        Ok(info)
    }

    async fn account_find_by_id(&self, id: i64) -> anyhow::Result<Option<AccountInfo>> {
        self.get_json(CF_ACCOUNTS, &id_key(id))
    }

    async fn account_find_by_number(
        &self,
        account_number: &str,
    ) -> anyhow::Result<Option<AccountInfo>> {
        match self.lookup_index(&account_number_key(account_number))? {
            Some(id) => self.get_json(CF_ACCOUNTS, &id_key(id)),
            None => Ok(None),
        }
    }

    async fn account_find_by_user(&self, user_id: i64) -> anyhow::Result<Vec<AccountInfo>> {
        Ok(self
            .scan::<AccountInfo>(CF_ACCOUNTS)?
            .into_iter()
            .filter(|a| a.user_id == user_id)
            .collect())
    }
}

#[async_trait]
impl LedgerPersistence for EmbeddedPersistService {
    async fn ledger_post(
        &self,
        transaction: NewTransaction,
        postings: &[Posting],
    ) -> anyhow::Result<TransactionInfo> {
        let _guard = self.write_lock.lock();

        if self
            .lookup_index(&reference_key(&transaction.reference))?
            .is_some()
        {
            return Err(EliteError::Conflict("duplicate transaction reference".to_string()).into());
        }

        let mut batch = WriteBatch::default();
        self.stage_postings(&mut batch, postings)?;

        let id = self.next_id(&mut batch, CF_TRANSACTIONS)?;
        let now = utc_now();
        let info = TransactionInfo {
            id,
            user_id: transaction.user_id,
            from_account_id: transaction.from_account_id,
            to_account_id: transaction.to_account_id,
            amount_cents: transaction.amount_cents,
            kind: transaction.kind,
            status: transaction.status,
            reference: transaction.reference,
            method: transaction.method,
            extra_data: transaction.extra_data,
            created_at: now,
            processed_at: (transaction.status != TransactionStatus::Pending).then_some(now),
        };

        self.batch_put(&mut batch, CF_TRANSACTIONS, &id_key(id), &info)?;
        self.batch_put_index(&mut batch, &reference_key(&info.reference), id)?;
        self.write(batch)?;
        Ok(info)
    }

    async fn ledger_settle(
        &self,
        id: i64,
        status: TransactionStatus,
        postings: &[Posting],
    ) -> anyhow::Result<TransactionInfo> {
        let _guard = self.write_lock.lock();

        let mut info: TransactionInfo = self
            .get_json(CF_TRANSACTIONS, &id_key(id))?
            .ok_or_else(|| EliteError::NotFound("transaction".to_string()))?;
        if info.status != TransactionStatus::Pending {
            return Err(
                EliteError::Conflict(format!("transaction is already {}", info.status)).into(),
            );
        }

        let mut batch = WriteBatch::default();
        self.stage_postings(&mut batch, postings)?;

        info.status = status;
        info.processed_at = Some(utc_now());
        self.batch_put(&mut batch, CF_TRANSACTIONS, &id_key(id), &info)?;
        self.write(batch)?;
        Ok(info)
    }

    async fn transaction_find_by_id(&self, id: i64) -> anyhow::Result<Option<TransactionInfo>> {
        self.get_json(CF_TRANSACTIONS, &id_key(id))
    }

    async fn transaction_find_by_reference(
        &self,
        reference: &str,
    ) -> anyhow::Result<Option<TransactionInfo>> {
        match self.lookup_index(&reference_key(reference))? {
            Some(id) => self.get_json(CF_TRANSACTIONS, &id_key(id)),
            None => Ok(None),
        }
    }

    async fn transaction_find_page(
        &self,
        query: &TransactionQuery,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<TransactionInfo>> {
        Ok(Page::from_vec(
            self.transactions_matching(query)?,
            page_no,
            page_size,
        ))
    }

    async fn transaction_summary(
        &self,
        query: &TransactionQuery,
    ) -> anyhow::Result<TransactionSummary> {
        let txns = self.transactions_matching(query)?;
        Ok(TransactionSummary {
            count: txns.len() as u64,
            total_amount_cents: txns.iter().map(|t| t.amount_cents).sum(),
        })
    }

    async fn transaction_find_since(
        &self,
        since: NaiveDateTime,
    ) -> anyhow::Result<Vec<TransactionInfo>> {
        let mut txns = self.transactions_matching(&TransactionQuery {
            start: Some(since),
            ..Default::default()
        })?;
        txns.reverse();
        Ok(txns)
    }
}

#[async_trait]
impl OtpPersistence for EmbeddedPersistService {
    async fn otp_create(
        &self,
        user_id: i64,
        purpose: OtpPurpose,
        code: &str,
        context: Option<&str>,
        expires_at: NaiveDateTime,
    ) -> anyhow::Result<OtpInfo> {
        let _guard = self.write_lock.lock();

        let mut batch = WriteBatch::default();
        for mut previous in self
            .scan::<OtpInfo>(CF_OTPS)?
            .into_iter()
            .filter(|o| o.user_id == user_id && o.purpose == purpose && !o.is_used)
        {
            previous.is_used = true;
            self.batch_put(&mut batch, CF_OTPS, &id_key(previous.id), &previous)?;
        }

        let id = self.next_id(&mut batch, CF_OTPS)?;
        let info = OtpInfo {
            id,
            user_id,
            code: code.to_string(),
            purpose,
            is_used: false,
            failed_attempts: 0,
            context: context.map(str::to_string),
            created_at: utc_now(),
            expires_at,
        };
        self.batch_put(&mut batch, CF_OTPS, &id_key(id), &info)?;
        self.write(batch)?;
        Ok(info)
    }

    async fn otp_find_active(
        &self,
        user_id: i64,
        purpose: OtpPurpose,
    ) -> anyhow::Result<Option<OtpInfo>> {
        Ok(self
            .scan::<OtpInfo>(CF_OTPS)?
            .into_iter()
            .filter(|o| o.user_id == user_id && o.purpose == purpose && !o.is_used)
            .max_by_key(|o| o.id))
    }

    async fn otp_mark_used(&self, id: i64) -> anyhow::Result<bool> {
        let _guard = self.write_lock.lock();

        let Some(mut otp) = self.get_json::<OtpInfo>(CF_OTPS, &id_key(id))? else {
            return Ok(false);
        };
        if otp.is_used {
            return Ok(false);
        }
        otp.is_used = true;

        let mut batch = WriteBatch::default();
        self.batch_put(&mut batch, CF_OTPS, &id_key(id), &otp)?;
        self.write(batch)?;
        Ok(true)
    }

    async fn otp_record_failure(&self, id: i64, max_failures: i32) -> anyhow::Result<bool> {
        let _guard = self.write_lock.lock();

        let Some(mut otp) = self.get_json::<OtpInfo>(CF_OTPS, &id_key(id))? else {
            return Ok(true);
        };
        if otp.is_used {
            return Ok(true);
        }
        otp.failed_attempts += 1;
        otp.is_used = otp.failed_attempts >= max_failures;

        let mut batch = WriteBatch::default();
        self.batch_put(&mut batch, CF_OTPS, &id_key(id), &otp)?;
        self.write(batch)?;
        Ok(otp.is_used)
    }

    async fn otp_count_since(&self, user_id: i64, since: NaiveDateTime) -> anyhow::Result<u64> {
        Ok(self
            .scan::<OtpInfo>(CF_OTPS)?
            .iter()
            .filter(|o| o.user_id == user_id && o.created_at >= since)
            .count() as u64)
    }
}

#[async_trait]
impl PinPersistence for EmbeddedPersistService {
    async fn pin_find_by_user(&self, user_id: i64) -> anyhow::Result<Option<PinInfo>> {
        self.get_json(CF_PINS, &id_key(user_id))
    }

    async fn pin_save(&self, pin: &PinInfo) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock();

        let mut stored = pin.clone();
        stored.updated_at = utc_now();

        let mut batch = WriteBatch::default();
        self.batch_put(&mut batch, CF_PINS, &id_key(pin.user_id), &stored)?;
        self.write(batch)
    }

    async fn pin_delete(&self, user_id: i64) -> anyhow::Result<bool> {
        let _guard = self.write_lock.lock();

        if self.get_string(CF_PINS, &id_key(user_id))?.is_none() {
            return Ok(false);
        }
        let mut batch = WriteBatch::default();
        self.batch_delete(&mut batch, CF_PINS, &id_key(user_id))?;
        self.write(batch)?;
        Ok(true)
    }

    async fn pin_record_failure(
        &self,
        user_id: i64,
        max_attempts: i32,
        lock_until: NaiveDateTime,
        now: NaiveDateTime,
    ) -> anyhow::Result<Option<PinInfo>> {
        self.update_pin(user_id, |pin| {
            if pin.locked_until.is_some_and(|until| until <= now) {
                pin.failed_attempts = 0;
                pin.locked_until = None;
            }
            if pin.locked_until.is_some() {
                return false;
            }
            pin.failed_attempts += 1;
            if pin.failed_attempts >= max_attempts {
                pin.locked_until = Some(lock_until);
            }
            pin.updated_at = now;
            true
        })
    }

    async fn pin_record_success(&self, user_id: i64, now: NaiveDateTime) -> anyhow::Result<bool> {
        let mut updated = false;
        self.update_pin(user_id, |pin| {
            if pin.locked_until.is_some_and(|until| until > now) {
                return false;
            }
            pin.failed_attempts = 0;
            pin.locked_until = None;
            pin.last_used = Some(now);
            pin.updated_at = now;
            updated = true;
            true
        })?;
        Ok(updated)
    }

    async fn pin_clear_expired_lock(
        &self,
        user_id: i64,
        now: NaiveDateTime,
    ) -> anyhow::Result<bool> {
        let mut cleared = false;
        self.update_pin(user_id, |pin| {
            if !pin.locked_until.is_some_and(|until| until <= now) {
                return false;
            }
            pin.failed_attempts = 0;
            pin.locked_until = None;
            pin.updated_at = now;
            cleared = true;
            true
        })?;
        Ok(cleared)
    }

    async fn pin_set_active(&self, user_id: i64, active: bool) -> anyhow::Result<bool> {
        let pin = self.update_pin(user_id, |pin| {
            pin.is_active = active;
            pin.updated_at = utc_now();
            true
        })?;
        Ok(pin.is_some())
    }
}

#[async_trait]
impl WithdrawalAccountPersistence for EmbeddedPersistService {
    async fn withdrawal_account_create(
        &self,
        account: NewWithdrawalAccount,
        make_default: bool,
    ) -> anyhow::Result<WithdrawalAccountInfo> {
        let account_type = account
            .account_type
            .ok_or_else(|| EliteError::IllegalArgument("account_type is required".to_string()))?;

        let _guard = self.write_lock.lock();

        let existing = self.withdrawal_accounts_of(account.user_id)?;
        let is_default = make_default || existing.is_empty();

        let mut batch = WriteBatch::default();
        if is_default {
            for mut other in existing.into_iter().filter(|a| a.is_default) {
                other.is_default = false;
                self.batch_put(&mut batch, CF_WITHDRAWAL_ACCOUNTS, &id_key(other.id), &other)?;
            }
        }

        let id = self.next_id(&mut batch, CF_WITHDRAWAL_ACCOUNTS)?;
        let now = utc_now();
        let info = WithdrawalAccountInfo {
            id,
            user_id: account.user_id,
            account_type,
            provider: account.provider,
            account_name: account.account_name,
            account_number: account.account_number,
            bank_code: account.bank_code,
            bank_name: account.bank_name,
            wallet_address: account.wallet_address,
            wallet_network: account.wallet_network,
            cryptocurrency: account.cryptocurrency,
            phone_number: account.phone_number,
            mobile_network: account.mobile_network,
            is_verified: false,
            is_default,
            account_metadata: account.account_metadata,
            created_at: now,
            updated_at: now,
        };
        self.batch_put(&mut batch, CF_WITHDRAWAL_ACCOUNTS, &id_key(id), &info)?;
        self.write(batch)?;
        Ok(info)
    }

    async fn withdrawal_account_find_by_id(
        &self,
        id: i64,
    ) -> anyhow::Result<Option<WithdrawalAccountInfo>> {
        self.get_json(CF_WITHDRAWAL_ACCOUNTS, &id_key(id))
    }

    async fn withdrawal_account_find_by_user(
        &self,
        user_id: i64,
    ) -> anyhow::Result<Vec<WithdrawalAccountInfo>> {
        let mut accounts = self.withdrawal_accounts_of(user_id)?;
        accounts.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(accounts)
    }

    async fn withdrawal_account_save(
        &self,
        account: &WithdrawalAccountInfo,
    ) -> anyhow::Result<WithdrawalAccountInfo> {
        let _guard = self.write_lock.lock();

        let existing: WithdrawalAccountInfo = self
            .get_json(CF_WITHDRAWAL_ACCOUNTS, &id_key(account.id))?
            .ok_or_else(|| EliteError::NotFound("withdrawal account".to_string()))?;

        let mut updated = account.clone();
        updated.user_id = existing.user_id;
        updated.account_type = existing.account_type;
        updated.is_default = existing.is_default;
        updated.created_at = existing.created_at;
        updated.updated_at = utc_now();

        let mut batch = WriteBatch::default();
        self.batch_put(&mut batch, CF_WITHDRAWAL_ACCOUNTS, &id_key(account.id), &updated)?;
        self.write(batch)?;
        Ok(updated)
    }

    async fn withdrawal_account_delete(&self, id: i64) -> anyhow::Result<bool> {
        let _guard = self.write_lock.lock();

        let Some(existing) =
            self.get_json::<WithdrawalAccountInfo>(CF_WITHDRAWAL_ACCOUNTS, &id_key(id))?
        else {
            return Ok(false);
        };

        let mut batch = WriteBatch::default();
        self.batch_delete(&mut batch, CF_WITHDRAWAL_ACCOUNTS, &id_key(id))?;

        if existing.is_default {
            let next = self
                .withdrawal_accounts_of(existing.user_id)?
                .into_iter()
                .filter(|a| a.id != id)
                .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            if let Some(mut next) = next {
                next.is_default = true;
                self.batch_put(&mut batch, CF_WITHDRAWAL_ACCOUNTS, &id_key(next.id), &next)?;
            }
        }

        self.write(batch)?;
        Ok(true)
    }

    async fn withdrawal_account_set_default(
        &self,
        user_id: i64,
        id: i64,
    ) -> anyhow::Result<WithdrawalAccountInfo> {
        let _guard = self.write_lock.lock();

        let accounts = self.withdrawal_accounts_of(user_id)?;
        if !accounts.iter().any(|a| a.id == id) {
            return Err(EliteError::NotFound("withdrawal account".to_string()).into());
        }

        let mut batch = WriteBatch::default();
        let mut selected = None;
        for mut account in accounts {
            let should_be_default = account.id == id;
            if account.is_default != should_be_default {
                account.is_default = should_be_default;
                account.updated_at = utc_now();
                self.batch_put(&mut batch, CF_WITHDRAWAL_ACCOUNTS, &id_key(account.id), &account)?;
            }
            if should_be_default {
                selected = Some(account);
            }
        }
        self.write(batch)?;

        selected.ok_or_else(|| EliteError::NotFound("withdrawal account".to_string()).into())
    }
}

#[async_trait]
impl AuditPersistence for EmbeddedPersistService {
    async fn audit_log_create(&self, log: NewAuditLog) -> anyhow::Result<AuditLogInfo> {
        let _guard = self.write_lock.lock();

        let mut batch = WriteBatch::default();
        let id = self.next_id(&mut batch, CF_AUDIT_LOGS)?;
        let info = AuditLogInfo {
            id,
            actor_id: log.actor_id,
            action: log.action,
            details: log.details,
            created_at: utc_now(),
        };
        self.batch_put(&mut batch, CF_AUDIT_LOGS, &id_key(id), &info)?;
        self.write(batch)?;
        Ok(info)
    }

    async fn audit_log_find_page(
        &self,
        query: &AuditLogQuery,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<AuditLogInfo>> {
        let mut logs: Vec<AuditLogInfo> = self
            .scan::<AuditLogInfo>(CF_AUDIT_LOGS)?
            .into_iter()
            .filter(|l| query.matches(l))
            .collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(Page::from_vec(logs, page_no, page_size))
    }
}
