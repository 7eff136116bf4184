//! Money movement
//!
//! Every operation runs the same gate before touching a balance: the user must
//! have verified KYC, the amount must be positive and within the configured
//! per-transaction limit, and the source account must belong to the caller and
//! be active. Balance changes are handed to [`LedgerPersistence`] as postings
//! so the backend applies them atomically with the transaction row.
//!
//! [`LedgerPersistence`]: elite_persistence::LedgerPersistence

use std::sync::Arc;

use elite_common::{EliteError, utils::format_cents};
use elite_persistence::{
    AccountInfo, KycStatus, NewTransaction, Page, PersistenceService, Posting, TransactionInfo,
    TransactionKind, TransactionQuery, TransactionStatus, UserInfo, WithdrawalAccountInfo,
};
use serde::Deserialize;
use serde_json::json;

use crate::model::constants::{DEFAULT_LARGE_TRANSACTION_CENTS, DEFAULT_TRANSACTION_LIMIT_CENTS};

/// Bank code that designates this institution in transfer requests
pub const INTERNAL_BANK_CODE: &str = "ELITE_CREDIT";
pub const METHOD_INTERNAL: &str = "internal";
pub const METHOD_EXTERNAL: &str = "external";
pub const METHOD_MANUAL: &str = "manual";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerSettings {
    pub transaction_limit_cents: i64,
    /// Amounts above this are flagged for review
    pub large_transaction_cents: i64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            transaction_limit_cents: DEFAULT_TRANSACTION_LIMIT_CENTS,
            large_transaction_cents: DEFAULT_LARGE_TRANSACTION_CENTS,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct DepositRequest {
    pub account_id: i64,
    pub amount_cents: i64,
    pub provider: String,
    pub provider_reference: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: i64,
    pub to_account_number: String,
    pub to_bank_code: Option<String>,
    pub amount_cents: i64,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WithdrawRequest {
    pub account_id: i64,
    pub amount_cents: i64,
    pub withdrawal_account_id: Option<i64>,
    pub method: Option<String>,
}

fn trimmed(value: Option<&str>) -> &str {
    value.map(str::trim).unwrap_or_default()
}

impl TransferRequest {
    /// Identifies the money movement a confirmation code is issued for
    pub fn otp_context(&self) -> String {
        let bank_code = match trimmed(self.to_bank_code.as_deref()) {
            "" => INTERNAL_BANK_CODE.to_string(),
            code => code.to_uppercase(),
        };
        format!(
            "transfer:{}:{}:{}:{}",
            self.from_account_id,
            self.to_account_number.trim(),
            bank_code,
            self.amount_cents
        )
    }
}

impl WithdrawRequest {
    pub fn otp_context(&self) -> String {
        format!(
            "withdraw:{}:{}:{}:{}",
            self.account_id,
            self.amount_cents,
            self.withdrawal_account_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            trimmed(self.method.as_deref()).to_lowercase()
        )
    }
}

/// Validated transfer, ready to be posted
#[derive(Clone, Debug)]
pub struct TransferPlan {
    pub from: AccountInfo,
    /// Internal destination; `None` routes the transfer to another bank
    pub recipient: Option<AccountInfo>,
}

/// Validated withdrawal, ready to be posted
#[derive(Clone, Debug)]
pub struct WithdrawalPlan {
    pub account: AccountInfo,
    pub destination: Option<WithdrawalAccountInfo>,
}

/// Refuses money movement for users whose identity is not verified
pub fn check_kyc(user: &UserInfo) -> Result<(), EliteError> {
    let message = match user.kyc_status {
        KycStatus::Verified => return Ok(()),
        KycStatus::Pending => "KYC verification required. Please complete your KYC verification to perform transactions.".to_string(),
        KycStatus::Submitted => "KYC verification in progress. Your documents are under review. You cannot perform transactions until verification is complete.".to_string(),
        KycStatus::Rejected => format!(
            "KYC verification rejected. {}",
            user.kyc_rejection_reason
                .as_deref()
                .filter(|r| !r.is_empty())
                .unwrap_or("Please contact support or resubmit your documents.")
        ),
    };
    Err(EliteError::Forbidden(message))
}

/// Unique transaction reference: `txn_{user}_{8 hex}_{unix ts}`
pub fn new_reference(user_id: i64) -> String {
    let unique = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "txn_{}_{}_{}",
        user_id,
        &unique[..8],
        chrono::Utc::now().timestamp()
    )
}

#[derive(Clone)]
pub struct LedgerService {
    persistence: Arc<dyn PersistenceService>,
    settings: LedgerSettings,
}

impl LedgerService {
    pub fn new(persistence: Arc<dyn PersistenceService>, settings: LedgerSettings) -> Self {
        Self {
            persistence,
            settings,
        }
    }

    pub fn settings(&self) -> LedgerSettings {
        self.settings
    }

    pub fn check_amount(&self, amount_cents: i64) -> Result<(), EliteError> {
        if amount_cents <= 0 {
            return Err(EliteError::IllegalArgument(
                "Amount must be greater than zero".to_string(),
            ));
        }
        if amount_cents > self.settings.transaction_limit_cents {
            return Err(EliteError::Forbidden(format!(
                "Transaction amount exceeds your limit. Maximum allowed: {}. Please contact support for higher limits.",
                format_cents(self.settings.transaction_limit_cents)
            )));
        }
        Ok(())
    }

    /// KYC and amount checks shared by every operation
    fn gate(&self, user: &UserInfo, amount_cents: i64) -> Result<(), EliteError> {
        check_kyc(user)?;
        self.check_amount(amount_cents)
    }

    /// Account of `user_id` that may be used for a transaction
    pub async fn owned_account(&self, user_id: i64, account_id: i64) -> anyhow::Result<AccountInfo> {
        let account = self
            .persistence
            .account_find_by_id(account_id)
            .await?
            .filter(|a| a.user_id == user_id)
            .ok_or_else(|| EliteError::NotFound("Account".to_string()))?;
        if !account.is_active {
            return Err(EliteError::IllegalArgument("Account is inactive".to_string()).into());
        }
        Ok(account)
    }

    fn ensure_funds(account: &AccountInfo, amount_cents: i64) -> Result<(), EliteError> {
        if account.balance_cents < amount_cents {
            return Err(EliteError::InsufficientFunds {
                available: account.balance_cents,
                requested: amount_cents,
            });
        }
        Ok(())
    }

    /// Adds the review flag to large amounts
    fn annotate(&self, user: &UserInfo, amount_cents: i64, mut extra: serde_json::Value) -> serde_json::Value {
        if amount_cents > self.settings.large_transaction_cents {
            tracing::warn!(
                user_id = user.id,
                amount = %format_cents(amount_cents),
                "Large transaction flagged for review"
            );
            metrics::counter!("elite_ledger_flagged_total").increment(1);
            extra["flagged"] = json!(true);
        }
        extra
    }

    async fn post(
        &self,
        transaction: NewTransaction,
        postings: &[Posting],
    ) -> anyhow::Result<TransactionInfo> {
        let txn = self.persistence.ledger_post(transaction, postings).await?;
        metrics::counter!(
            "elite_ledger_postings_total",
            "kind" => txn.kind.as_str(),
            "status" => txn.status.as_str()
        )
        .increment(1);
        tracing::info!(
            user_id = txn.user_id,
            reference = %txn.reference,
            kind = %txn.kind,
            status = %txn.status,
            amount = %format_cents(txn.amount_cents),
            "Transaction recorded"
        );
        Ok(txn)
    }

    /// Record a deposit awaiting settlement. The balance moves on approval.
    pub async fn deposit(&self, user: &UserInfo, request: &DepositRequest) -> anyhow::Result<TransactionInfo> {
        self.gate(user, request.amount_cents)?;
        if request.provider.trim().is_empty() {
            return Err(EliteError::IllegalArgument("provider is required".to_string()).into());
        }
        let account = self.owned_account(user.id, request.account_id).await?;

        let extra = self.annotate(
            user,
            request.amount_cents,
            json!({
                "description": "Deposit",
                "provider_reference": request.provider_reference,
                "currency": account.currency,
            }),
        );

        self.post(
            NewTransaction {
                user_id: user.id,
                from_account_id: None,
                to_account_id: Some(account.id),
                amount_cents: request.amount_cents,
                kind: TransactionKind::Deposit,
                status: TransactionStatus::Pending,
                reference: new_reference(user.id),
                method: request.provider.trim().to_lowercase(),
                extra_data: extra,
            },
            &[],
        )
        .await
    }

    /// Validate a transfer without moving money
    pub async fn plan_transfer(&self, user: &UserInfo, request: &TransferRequest) -> anyhow::Result<TransferPlan> {
        self.gate(user, request.amount_cents)?;
        let from = self.owned_account(user.id, request.from_account_id).await?;
        Self::ensure_funds(&from, request.amount_cents)?;

        let bank_code = request
            .to_bank_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let internal = bank_code.is_none_or(|c| c.eq_ignore_ascii_case(INTERNAL_BANK_CODE));

        let recipient = self
            .persistence
            .account_find_by_number(request.to_account_number.trim())
            .await?;

        match recipient {
            Some(recipient) if internal => {
                if recipient.id == from.id {
                    return Err(EliteError::IllegalArgument(
                        "Cannot transfer to your own account".to_string(),
                    )
                    .into());
                }
                if !recipient.is_active {
                    return Err(EliteError::IllegalArgument(
                        "Recipient account is inactive".to_string(),
                    )
                    .into());
                }
                Ok(TransferPlan {
                    from,
                    recipient: Some(recipient),
                })
            }
            _ if internal => Err(EliteError::NotFound("Recipient account".to_string()).into()),
            _ => Ok(TransferPlan {
                from,
                recipient: None,
            }),
        }
    }

    /// Move money. Internal transfers complete immediately; transfers to
    /// other banks debit the sender and wait for settlement.
    pub async fn transfer(&self, user: &UserInfo, request: &TransferRequest) -> anyhow::Result<TransactionInfo> {
        let plan = self.plan_transfer(user, request).await?;
        let amount = request.amount_cents;
        let description = request
            .description
            .clone()
            .unwrap_or_else(|| "Funds transfer".to_string());

        let (transaction, postings) = match &plan.recipient {
            Some(recipient) => (
                NewTransaction {
                    user_id: user.id,
                    from_account_id: Some(plan.from.id),
                    to_account_id: Some(recipient.id),
                    amount_cents: amount,
                    kind: TransactionKind::Transfer,
                    status: TransactionStatus::Completed,
                    reference: new_reference(user.id),
                    method: METHOD_INTERNAL.to_string(),
                    extra_data: self.annotate(
                        user,
                        amount,
                        json!({
                            "description": description,
                            "recipient_account": recipient.account_number,
                            "sender_account": plan.from.account_number,
                        }),
                    ),
                },
                vec![
                    Posting::debit(plan.from.id, amount),
                    Posting::credit(recipient.id, amount),
                ],
            ),
            None => (
                NewTransaction {
                    user_id: user.id,
                    from_account_id: Some(plan.from.id),
                    to_account_id: None,
                    amount_cents: amount,
                    kind: TransactionKind::Transfer,
                    status: TransactionStatus::Pending,
                    reference: new_reference(user.id),
                    method: METHOD_EXTERNAL.to_string(),
                    extra_data: self.annotate(
                        user,
                        amount,
                        json!({
                            "description": description,
                            "recipient_account": request.to_account_number.trim(),
                            "bank_code": request.to_bank_code,
                            "sender_account": plan.from.account_number,
                        }),
                    ),
                },
                vec![Posting::debit(plan.from.id, amount)],
            ),
        };

        self.post(transaction, &postings).await
    }

    pub async fn plan_withdrawal(&self, user: &UserInfo, request: &WithdrawRequest) -> anyhow::Result<WithdrawalPlan> {
        self.gate(user, request.amount_cents)?;
        let account = self.owned_account(user.id, request.account_id).await?;
        Self::ensure_funds(&account, request.amount_cents)?;

        let destination = match request.withdrawal_account_id {
            Some(id) => Some(
                self.persistence
                    .withdrawal_account_find_by_id(id)
                    .await?
                    .filter(|wa| wa.user_id == user.id)
                    .ok_or_else(|| EliteError::NotFound("Withdrawal account".to_string()))?,
            ),
            None => None,
        };

        Ok(WithdrawalPlan {
            account,
            destination,
        })
    }

    /// Debit the account and leave the payout pending
    pub async fn withdraw(&self, user: &UserInfo, request: &WithdrawRequest) -> anyhow::Result<TransactionInfo> {
        let plan = self.plan_withdrawal(user, request).await?;
        let amount = request.amount_cents;

        let method = request
            .method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_lowercase)
            .or_else(|| plan.destination.as_ref().map(|d| d.provider.clone()))
            .unwrap_or_else(|| METHOD_MANUAL.to_string());

        let extra = self.annotate(
            user,
            amount,
            json!({
                "description": "Withdrawal",
                "withdrawal_account_id": plan.destination.as_ref().map(|d| d.id),
                "destination_type": plan.destination.as_ref().map(|d| d.account_type.as_str()),
            }),
        );

        self.post(
            NewTransaction {
                user_id: user.id,
                from_account_id: Some(plan.account.id),
                to_account_id: None,
                amount_cents: amount,
                kind: TransactionKind::Withdrawal,
                status: TransactionStatus::Pending,
                reference: new_reference(user.id),
                method,
                extra_data: extra,
            },
            &[Posting::debit(plan.account.id, amount)],
        )
        .await
    }

    async fn pending(&self, id: i64) -> anyhow::Result<TransactionInfo> {
        let txn = self
            .persistence
            .transaction_find_by_id(id)
            .await?
            .ok_or_else(|| EliteError::NotFound("Transaction".to_string()))?;
        if txn.status != TransactionStatus::Pending {
            return Err(EliteError::Conflict(format!("Transaction is already {}", txn.status)).into());
        }
        Ok(txn)
    }

    /// Settle a pending transaction. Deposits credit their account here;
    /// debits were taken when the transaction was created.
    pub async fn approve(&self, id: i64) -> anyhow::Result<TransactionInfo> {
        let txn = self.pending(id).await?;
        let postings: Vec<Posting> = match (txn.kind, txn.to_account_id) {
            (TransactionKind::Deposit, Some(to)) => vec![Posting::credit(to, txn.amount_cents)],
            _ => Vec::new(),
        };
        let settled = self
            .persistence
            .ledger_settle(id, TransactionStatus::Completed, &postings)
            .await?;
        metrics::counter!("elite_ledger_settlements_total", "outcome" => "approved").increment(1);
        tracing::info!(reference = %settled.reference, kind = %settled.kind, "Transaction approved");
        Ok(settled)
    }

    /// Reject a pending transaction, refunding any debit already taken
    pub async fn reject(&self, id: i64) -> anyhow::Result<TransactionInfo> {
        let txn = self.pending(id).await?;
        let postings: Vec<Posting> = match (txn.kind, txn.from_account_id) {
            (TransactionKind::Deposit, _) | (_, None) => Vec::new(),
            (_, Some(from)) => vec![Posting::credit(from, txn.amount_cents)],
        };
        let settled = self
            .persistence
            .ledger_settle(id, TransactionStatus::Rejected, &postings)
            .await?;
        metrics::counter!("elite_ledger_settlements_total", "outcome" => "rejected").increment(1);
        tracing::info!(reference = %settled.reference, kind = %settled.kind, "Transaction rejected");
        Ok(settled)
    }

    pub async fn history(
        &self,
        user_id: i64,
        kind: Option<TransactionKind>,
        status: Option<TransactionStatus>,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<TransactionInfo>> {
        let query = TransactionQuery {
            user_id: Some(user_id),
            kind,
            status,
            ..Default::default()
        };
        self.persistence
            .transaction_find_page(&query, page_no, page_size)
            .await
    }

    /// Transaction by reference, visible only to the user who made it
    pub async fn find_for_user(&self, user_id: i64, reference: &str) -> anyhow::Result<TransactionInfo> {
        self.persistence
            .transaction_find_by_reference(reference)
            .await?
            .filter(|t| t.user_id == user_id)
            .ok_or_else(|| EliteError::NotFound("Transaction".to_string()).into())
    }
}
