//! Payout destinations (bank, crypto wallet, mobile money)

use std::sync::{Arc, LazyLock};

use elite_common::EliteError;
use elite_persistence::{
    NewWithdrawalAccount, PersistenceService, WithdrawalAccountInfo, WithdrawalAccountType,
};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

pub const PROVIDER_MANUAL: &str = "manual";
pub const CRYPTO_NETWORKS: [&str; 5] = ["ERC20", "BEP20", "TRC20", "BTC", "LTC"];
pub const CRYPTOCURRENCIES: [&str; 6] = ["BTC", "ETH", "USDT", "USDC", "BNB", "LTC"];

struct ProviderSpec {
    name: &'static str,
    countries: &'static [&'static str],
    networks: &'static [&'static str],
}

const BANK_PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "paystack",
        countries: &["NG", "GH", "KE", "ZA"],
        networks: &[],
    },
    ProviderSpec {
        name: "flutterwave",
        countries: &["NG", "GH", "KE", "UG", "TZ", "ZA"],
        networks: &[],
    },
];

const CRYPTO_PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "trust_wallet",
        countries: &[],
        networks: &["ERC20", "BEP20", "TRC20", "BTC", "LTC"],
    },
    ProviderSpec {
        name: "binance",
        countries: &[],
        networks: &["ERC20", "BEP20", "TRC20", "BTC"],
    },
    ProviderSpec {
        name: "okx",
        countries: &[],
        networks: &["ERC20", "BEP20", "TRC20", "BTC"],
    },
];

const MOBILE_MONEY_PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "paystack",
        countries: &["NG", "GH"],
        networks: &[],
    },
    ProviderSpec {
        name: "flutterwave",
        countries: &["NG", "GH", "UG", "TZ", "RW"],
        networks: &[],
    },
];

fn providers_for(account_type: WithdrawalAccountType) -> &'static [ProviderSpec] {
    match account_type {
        WithdrawalAccountType::Bank => BANK_PROVIDERS,
        WithdrawalAccountType::Crypto => CRYPTO_PROVIDERS,
        WithdrawalAccountType::MobileMoney => MOBILE_MONEY_PROVIDERS,
    }
}

static EVM_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("Invalid regex pattern"));
static TRON_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^T[A-Za-z1-9]{33}$").expect("Invalid regex pattern"));
static BTC_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[13][a-km-zA-HJ-NP-Z1-9]{25,34}$|^bc1[a-z0-9]{39,59}$")
        .expect("Invalid regex pattern")
});
static LTC_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[LM3][a-km-zA-HJ-NP-Z1-9]{26,33}$").expect("Invalid regex pattern")
});

/// Whether `address` is well formed for `network`
pub fn is_valid_wallet_address(address: &str, network: &str) -> bool {
    let pattern = match network {
        "ERC20" | "BEP20" => &*EVM_ADDRESS,
        "TRC20" => &*TRON_ADDRESS,
        "BTC" => &*BTC_ADDRESS,
        "LTC" => &*LTC_ADDRESS,
        _ => return false,
    };
    pattern.is_match(address)
}

/// Provider catalogue returned to clients
pub fn supported_providers() -> serde_json::Value {
    let section = |specs: &[ProviderSpec]| {
        let mut map = serde_json::Map::new();
        for spec in specs {
            let value = if spec.networks.is_empty() {
                json!({ "supported_countries": spec.countries })
            } else {
                json!({ "supported_networks": spec.networks })
            };
            map.insert(spec.name.to_string(), value);
        }
        map.insert(PROVIDER_MANUAL.to_string(), json!({ "manual_review": true }));
        serde_json::Value::Object(map)
    };
    json!({
        "bank": section(BANK_PROVIDERS),
        "crypto": section(CRYPTO_PROVIDERS),
        "mobile_money": section(MOBILE_MONEY_PROVIDERS),
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateWithdrawalAccount {
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
    pub account_metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateWithdrawalAccount {
    pub account_name: Option<String>,
    pub bank_name: Option<String>,
    pub mobile_network: Option<String>,
    pub account_metadata: Option<serde_json::Value>,
    pub is_default: Option<bool>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn required(value: &Option<String>, field: &str, account_type: WithdrawalAccountType) -> Result<String, EliteError> {
    non_empty(value).ok_or_else(|| {
        EliteError::IllegalArgument(format!(
            "{} is required for {} accounts",
            field, account_type
        ))
    })
}

impl CreateWithdrawalAccount {
    /// Check required fields for the account type and normalize the request
    pub fn validate(&self, user_id: i64) -> Result<NewWithdrawalAccount, EliteError> {
        let account_type = self
            .account_type
            .ok_or_else(|| EliteError::IllegalArgument("account_type is required".to_string()))?;

        let provider = self.provider.trim().to_lowercase();
        let spec = providers_for(account_type)
            .iter()
            .find(|spec| spec.name == provider);
        if spec.is_none() && provider != PROVIDER_MANUAL {
            return Err(EliteError::IllegalArgument(format!(
                "Provider {} is not supported for {} accounts",
                provider, account_type
            )));
        }

        let mut account = NewWithdrawalAccount {
            user_id,
            account_type: Some(account_type),
            provider,
            account_name: non_empty(&self.account_name),
            account_metadata: self.account_metadata.clone().unwrap_or_else(|| json!({})),
            ..Default::default()
        };

        match account_type {
            WithdrawalAccountType::Bank => {
                account.account_number = Some(required(&self.account_number, "account_number", account_type)?);
                account.bank_code = Some(required(&self.bank_code, "bank_code", account_type)?);
                account.bank_name = non_empty(&self.bank_name);
            }
            WithdrawalAccountType::Crypto => {
                let address = required(&self.wallet_address, "wallet_address", account_type)?;
                let network = required(&self.wallet_network, "wallet_network", account_type)?.to_uppercase();
                let currency = required(&self.cryptocurrency, "cryptocurrency", account_type)?.to_uppercase();

                if !CRYPTO_NETWORKS.contains(&network.as_str()) {
                    return Err(EliteError::IllegalArgument(format!(
                        "Unsupported wallet network {}",
                        network
                    )));
                }
                if !CRYPTOCURRENCIES.contains(&currency.as_str()) {
                    return Err(EliteError::IllegalArgument(format!(
                        "Unsupported cryptocurrency {}",
                        currency
                    )));
                }
                if let Some(spec) = spec
                    && !spec.networks.contains(&network.as_str())
                {
                    return Err(EliteError::IllegalArgument(format!(
                        "Provider {} does not support the {} network",
                        spec.name, network
                    )));
                }
                if !is_valid_wallet_address(&address, &network) {
                    return Err(EliteError::IllegalArgument(format!(
                        "Invalid {} wallet address",
                        network
                    )));
                }
                account.wallet_address = Some(address);
                account.wallet_network = Some(network);
                account.cryptocurrency = Some(currency);
            }
            WithdrawalAccountType::MobileMoney => {
                account.phone_number = Some(required(&self.phone_number, "phone_number", account_type)?);
                account.mobile_network = Some(required(&self.mobile_network, "mobile_network", account_type)?);
            }
        }

        Ok(account)
    }
}

#[derive(Clone)]
pub struct WithdrawalAccountService {
    persistence: Arc<dyn PersistenceService>,
}

impl WithdrawalAccountService {
    pub fn new(persistence: Arc<dyn PersistenceService>) -> Self {
        Self { persistence }
    }

    pub async fn create(&self, user_id: i64, request: &CreateWithdrawalAccount) -> anyhow::Result<WithdrawalAccountInfo> {
        let account = request.validate(user_id)?;
        let created = self
            .persistence
            .withdrawal_account_create(account, request.is_default)
            .await?;
        tracing::info!(
            user_id,
            id = created.id,
            account_type = %created.account_type,
            provider = %created.provider,
            "Withdrawal account created"
        );
        Ok(created)
    }

    pub async fn list(&self, user_id: i64) -> anyhow::Result<Vec<WithdrawalAccountInfo>> {
        self.persistence.withdrawal_account_find_by_user(user_id).await
    }

    pub async fn find(&self, user_id: i64, id: i64) -> anyhow::Result<WithdrawalAccountInfo> {
        self.persistence
            .withdrawal_account_find_by_id(id)
            .await?
            .filter(|a| a.user_id == user_id)
            .ok_or_else(|| EliteError::NotFound("Withdrawal account".to_string()).into())
    }

    pub async fn update(
        &self,
        user_id: i64,
        id: i64,
        request: &UpdateWithdrawalAccount,
    ) -> anyhow::Result<WithdrawalAccountInfo> {
        let mut account = self.find(user_id, id).await?;

        if let Some(name) = &request.account_name {
            account.account_name = Some(name.trim().to_string()).filter(|n| !n.is_empty());
        }
        if let Some(bank_name) = &request.bank_name
            && account.account_type == WithdrawalAccountType::Bank
        {
            account.bank_name = Some(bank_name.trim().to_string()).filter(|n| !n.is_empty());
        }
        if let Some(network) = non_empty(&request.mobile_network)
            && account.account_type == WithdrawalAccountType::MobileMoney
        {
            account.mobile_network = Some(network);
        }
        if let Some(metadata) = &request.account_metadata {
            account.account_metadata = metadata.clone();
        }

        let mut saved = self.persistence.withdrawal_account_save(&account).await?;
        if request.is_default == Some(true) && !saved.is_default {
            saved = self
                .persistence
                .withdrawal_account_set_default(user_id, id)
                .await?;
        }
        Ok(saved)
    }

    pub async fn delete(&self, user_id: i64, id: i64) -> anyhow::Result<()> {
        self.find(user_id, id).await?;
        self.persistence.withdrawal_account_delete(id).await?;
        tracing::info!(user_id, id, "Withdrawal account deleted");
        Ok(())
    }

    pub async fn set_default(&self, user_id: i64, id: i64) -> anyhow::Result<WithdrawalAccountInfo> {
        self.find(user_id, id).await?;
        self.persistence
            .withdrawal_account_set_default(user_id, id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use elite_persistence::{EmbeddedPersistService, NewUser};
    use tempfile::TempDir;

    use super::*;

    fn bank(number: &str, is_default: bool) -> CreateWithdrawalAccount {
        CreateWithdrawalAccount {
            account_type: Some(WithdrawalAccountType::Bank),
            provider: "Paystack".to_string(),
            account_number: Some(number.to_string()),
            bank_code: Some("058".to_string()),
            is_default,
            ..Default::default()
        }
    }

    #[test]
    fn test_wallet_address_patterns() {
        assert!(is_valid_wallet_address("0x52908400098527886E0F7030069857D2E4169EE7", "ERC20"));
        assert!(is_valid_wallet_address("0x52908400098527886E0F7030069857D2E4169EE7", "BEP20"));
        assert!(!is_valid_wallet_address("0x1234", "ERC20"));
        assert!(is_valid_wallet_address("TQn9Y2khEsLJW1ChVWFMSMeRDow5KcbLSE", "TRC20"));
        assert!(is_valid_wallet_address("1BoatSLRHtKNngkdXEeobR76b53LETtpyT", "BTC"));
        assert!(is_valid_wallet_address("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq", "BTC"));
        assert!(is_valid_wallet_address("LaMT348PWRnrqeeWArpwQPbuanpXDZGEUz", "LTC"));
        assert!(!is_valid_wallet_address("LaMT348PWRnrqeeWArpwQPbuanpXDZGEUz", "DOGE"));
    }

    #[test]
    fn test_validate_requirements() {
        let err = CreateWithdrawalAccount {
            account_type: Some(WithdrawalAccountType::Bank),
            provider: "paystack".to_string(),
            ..Default::default()
        }
        .validate(1)
        .unwrap_err();
        assert_eq!(err.to_string(), "account_number is required for bank accounts");

        let err = CreateWithdrawalAccount {
            account_type: Some(WithdrawalAccountType::Bank),
            provider: "binance".to_string(),
            ..Default::default()
        }
        .validate(1)
        .unwrap_err();
        assert!(err.to_string().contains("not supported"));

        let crypto = CreateWithdrawalAccount {
            account_type: Some(WithdrawalAccountType::Crypto),
            provider: "binance".to_string(),
            wallet_address: Some("LaMT348PWRnrqeeWArpwQPbuanpXDZGEUz".to_string()),
            wallet_network: Some("ltc".to_string()),
            cryptocurrency: Some("ltc".to_string()),
            ..Default::default()
        };
        assert!(crypto.validate(1).unwrap_err().to_string().contains("does not support"));

        let crypto = CreateWithdrawalAccount {
            provider: "trust_wallet".to_string(),
            ..crypto
        };
        let account = crypto.validate(1).unwrap();
        assert_eq!(account.wallet_network.as_deref(), Some("LTC"));

        let bad = CreateWithdrawalAccount {
            wallet_address: Some("0xdeadbeef".to_string()),
            wallet_network: Some("ERC20".to_string()),
            cryptocurrency: Some("USDT".to_string()),
            ..crypto
        };
        assert_eq!(bad.validate(1).unwrap_err().to_string(), "Invalid ERC20 wallet address");

        let mobile = CreateWithdrawalAccount {
            account_type: Some(WithdrawalAccountType::MobileMoney),
            provider: "manual".to_string(),
            phone_number: Some("+233201234567".to_string()),
            ..Default::default()
        };
        assert!(mobile.validate(1).unwrap_err().to_string().starts_with("mobile_network"));
    }

    #[test]
    fn test_supported_providers_catalogue() {
        let providers = supported_providers();
        assert_eq!(providers["bank"]["paystack"]["supported_countries"][0], "NG");
        assert_eq!(providers["crypto"]["trust_wallet"]["supported_networks"][4], "LTC");
        assert!(providers["mobile_money"]["manual"].is_object());
    }

    #[tokio::test]
    async fn test_single_default_account() {
        let dir = TempDir::new().unwrap();
        let persistence: Arc<dyn PersistenceService> =
            Arc::new(EmbeddedPersistService::open(dir.path()).unwrap());
        let user = persistence
            .user_create(NewUser {
                email: "wa@example.com".to_string(),
                password_hash: "x".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let service = WithdrawalAccountService::new(persistence.clone());

        let first = service.create(user.id, &bank("0001", false)).await.unwrap();
        assert!(first.is_default);
        let second = service.create(user.id, &bank("0002", false)).await.unwrap();
        assert!(!second.is_default);
        let third = service.create(user.id, &bank("0003", true)).await.unwrap();
        assert!(third.is_default);

        let defaults = |accounts: &[WithdrawalAccountInfo]| accounts.iter().filter(|a| a.is_default).count();
        assert_eq!(defaults(&service.list(user.id).await.unwrap()), 1);

        service.set_default(user.id, first.id).await.unwrap();
        let accounts = service.list(user.id).await.unwrap();
        assert_eq!(defaults(&accounts), 1);
        assert_eq!(accounts[0].id, first.id);

        service.delete(user.id, first.id).await.unwrap();
        let accounts = service.list(user.id).await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(defaults(&accounts), 1);

        assert!(service.find(user.id + 1, second.id).await.is_err());
    }
}
