//! Money accounts and account number allocation

use std::sync::Arc;

use elite_common::{
    DEFAULT_CURRENCY, EliteError,
    utils::random_digits,
    validation::{message_of, validate_currency},
};
use elite_persistence::{AccountInfo, NewAccount, PersistenceService};
use serde::Serialize;

use super::ledger::INTERNAL_BANK_CODE;

pub const ACCOUNT_NUMBER_LENGTH: usize = 10;
pub const DEFAULT_ACCOUNT_TYPE: &str = "savings";
pub const EXTERNAL_HOLDER_NAME: &str = "External Account Holder";
const MAX_NUMBER_ATTEMPTS: usize = 16;

/// Answer of an account number lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedAccount {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

impl ResolvedAccount {
    fn missing() -> Self {
        Self {
            found: false,
            name: None,
            user_id: None,
        }
    }
}

#[derive(Clone)]
pub struct AccountService {
    persistence: Arc<dyn PersistenceService>,
}

impl AccountService {
    pub fn new(persistence: Arc<dyn PersistenceService>) -> Self {
        Self { persistence }
    }

    /// Open an account under a fresh 10-digit number. A number collision is
    /// retried with a new draw.
    pub async fn open(
        &self,
        user_id: i64,
        currency: Option<&str>,
        account_type: Option<&str>,
    ) -> anyhow::Result<AccountInfo> {
        let currency = currency
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CURRENCY)
            .to_ascii_uppercase();
        validate_currency(&currency).map_err(|e| EliteError::IllegalArgument(message_of(&e)))?;
        let account_type = account_type
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_ACCOUNT_TYPE)
            .to_lowercase();

        for _ in 0..MAX_NUMBER_ATTEMPTS {
            let result = self
                .persistence
                .account_create(NewAccount {
                    user_id,
                    account_number: random_digits(ACCOUNT_NUMBER_LENGTH),
                    currency: currency.clone(),
                    account_type: account_type.clone(),
                })
                .await;
            match result {
                Ok(account) => {
                    tracing::info!(
                        user_id,
                        account_id = account.id,
                        currency = %account.currency,
                        "Account opened"
                    );
                    return Ok(account);
                }
                Err(e) if matches!(e.downcast_ref::<EliteError>(), Some(EliteError::Conflict(_))) => {
                    tracing::debug!(user_id, "Account number collision, drawing again");
                }
                Err(e) => return Err(e),
            }
        }

        Err(EliteError::InternalError("could not allocate a unique account number".to_string()).into())
    }

    /// Open the default account a user gets on verification, unless one exists
    pub async fn ensure_default(&self, user_id: i64) -> anyhow::Result<AccountInfo> {
        if let Some(account) = self
            .persistence
            .account_find_by_user(user_id)
            .await?
            .into_iter()
            .next()
        {
            return Ok(account);
        }
        self.open(user_id, None, None).await
    }

    pub async fn list(&self, user_id: i64) -> anyhow::Result<Vec<AccountInfo>> {
        self.persistence.account_find_by_user(user_id).await
    }

    pub async fn find_owned(&self, user_id: i64, id: i64) -> anyhow::Result<AccountInfo> {
        self.persistence
            .account_find_by_id(id)
            .await?
            .filter(|a| a.user_id == user_id)
            .ok_or_else(|| EliteError::NotFound("Account".to_string()).into())
    }

    /// Name lookup for transfer recipients
    pub async fn resolve(&self, account_number: &str, bank_code: Option<&str>) -> anyhow::Result<ResolvedAccount> {
        let bank_code = bank_code.map(str::trim).filter(|c| !c.is_empty());
        let internal = bank_code.is_none_or(|c| c.eq_ignore_ascii_case(INTERNAL_BANK_CODE));

        if internal {
            let Some(account) = self.persistence.account_find_by_number(account_number).await? else {
                return Ok(ResolvedAccount::missing());
            };
            let name = self
                .persistence
                .user_find_by_id(account.user_id)
                .await?
                .map(|u| u.full_name())
                .unwrap_or_default();
            return Ok(ResolvedAccount {
                found: true,
                name: Some(name),
                user_id: Some(account.user_id),
            });
        }

        Ok(ResolvedAccount {
            found: true,
            name: Some(EXTERNAL_HOLDER_NAME.to_string()),
            user_id: None,
        })
    }
}
