//! Application state management
//!
//! This module defines the central application state shared across all handlers.

use std::sync::Arc;

use elite_auth::{
    Notifier,
    service::{otp::OtpService, pin::PinService, token},
};
use elite_persistence::PersistenceService;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::{
    middleware::rate_limit::AuthRateLimiter,
    service::{
        accounts::AccountService, analytics::AnalyticsService, audit::AuditService,
        kyc::KycService, ledger::LedgerService, storage::UploadStore, users::UserAdminService,
        withdrawal::WithdrawalAccountService,
    },
};

use super::config::Configuration;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub configuration: Configuration,
    /// Unified persistence service (SQL or embedded RocksDB)
    pub persistence: Arc<dyn PersistenceService>,
    pub notifier: Arc<dyn Notifier>,
    pub otp_service: OtpService,
    pub pin_service: PinService,
    pub ledger: LedgerService,
    pub accounts: AccountService,
    pub kyc: KycService,
    pub withdrawal_accounts: WithdrawalAccountService,
    pub analytics: AnalyticsService,
    pub users: UserAdminService,
    pub uploads: UploadStore,
    pub audit: AuditService,
    /// Brute force protection for the credential endpoints
    pub auth_rate_limiter: Arc<AuthRateLimiter>,
    /// Prometheus render handle, absent when no recorder is installed
    pub metrics_handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("configuration", &self.configuration)
            .field("storage_mode", &self.persistence.storage_mode())
            .field("uploads", &self.uploads.root())
            .field("metrics", &self.metrics_handle.is_some())
            .finish()
    }
}

impl AppState {
    pub fn new(
        configuration: Configuration,
        persistence: Arc<dyn PersistenceService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let otp_service = OtpService::new(
            persistence.clone(),
            notifier.clone(),
            configuration.otp_settings(),
        );
        let pin_service = PinService::new(persistence.clone(), configuration.pin_settings());
        let ledger = LedgerService::new(persistence.clone(), configuration.ledger_settings());
        let uploads = UploadStore::new(
            configuration.upload_root(),
            configuration.upload_max_file_size(),
        );
        let accounts = AccountService::new(persistence.clone());
        let kyc = KycService::new(persistence.clone(), uploads.clone());
        let withdrawal_accounts = WithdrawalAccountService::new(persistence.clone());
        let analytics = AnalyticsService::new(persistence.clone());
        let audit = AuditService::new(persistence.clone());
        let users = UserAdminService::new(persistence.clone(), notifier.clone(), audit.clone());
        let auth_rate_limiter = Arc::new(AuthRateLimiter::new(
            configuration.auth_rate_limit_config(),
        ));

        Self {
            configuration,
            persistence,
            notifier,
            otp_service,
            pin_service,
            ledger,
            accounts,
            kyc,
            withdrawal_accounts,
            analytics,
            users,
            uploads,
            audit,
            auth_rate_limiter,
            metrics_handle: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    pub fn persistence(&self) -> &dyn PersistenceService {
        self.persistence.as_ref()
    }

    /// Issue an access token for a user
    pub fn issue_token(&self, user_id: i64, email: &str, is_admin: bool) -> anyhow::Result<String> {
        Ok(token::encode_jwt_token(
            user_id,
            email,
            is_admin,
            &self.configuration.token_secret_key(),
            self.configuration.token_expire_seconds(),
        )?)
    }
}
