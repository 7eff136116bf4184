//! One-time password issuance and verification

use std::sync::Arc;

use chrono::{Duration, NaiveTime};
use elite_common::{EliteError, utils};
use elite_persistence::{OtpInfo, OtpPurpose, PersistenceService, UserInfo};
use tracing::{info, warn};

use crate::model::{
    DEFAULT_OTP_EXPIRY_MINUTES, DEFAULT_OTP_MAX_DAILY, DEFAULT_OTP_MAX_FAILED_ATTEMPTS,
    INVALID_OTP_MESSAGE, OTP_CODE_LENGTH,
};
use crate::notify::{Notifier, OtpMessage};

#[derive(Debug, Clone, Copy)]
pub struct OtpSettings {
    pub expiry_minutes: i64,
    pub max_daily: u64,
    /// Wrong guesses after which a code is burned
    pub max_failed_attempts: i32,
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self {
            expiry_minutes: DEFAULT_OTP_EXPIRY_MINUTES,
            max_daily: DEFAULT_OTP_MAX_DAILY,
            max_failed_attempts: DEFAULT_OTP_MAX_FAILED_ATTEMPTS,
        }
    }
}

#[derive(Clone)]
pub struct OtpService {
    persistence: Arc<dyn PersistenceService>,
    notifier: Arc<dyn Notifier>,
    settings: OtpSettings,
}

impl OtpService {
    pub fn new(
        persistence: Arc<dyn PersistenceService>,
        notifier: Arc<dyn Notifier>,
        settings: OtpSettings,
    ) -> Self {
        Self {
            persistence,
            notifier,
            settings,
        }
    }

    pub fn settings(&self) -> OtpSettings {
        self.settings
    }

    /// Issue a fresh code for `purpose`, replacing any unused one.
    ///
    /// Fails with `TooManyRequests` once the user reached the daily cap. A
    /// delivery failure is logged and does not fail the call.
    pub async fn issue(&self, user: &UserInfo, purpose: OtpPurpose) -> anyhow::Result<OtpInfo> {
        self.issue_bound(user, purpose, None).await
    }

    /// Issue a code that only confirms the operation described by `context`
    pub async fn issue_bound(
        &self,
        user: &UserInfo,
        purpose: OtpPurpose,
        context: Option<&str>,
    ) -> anyhow::Result<OtpInfo> {
        let now = utils::utc_now();
        let midnight = now.date().and_time(NaiveTime::MIN);
        let issued_today = self.persistence.otp_count_since(user.id, midnight).await?;
        if issued_today >= self.settings.max_daily {
            warn!(user_id = user.id, purpose = %purpose, "Daily OTP limit reached");
            return Err(EliteError::TooManyRequests(
                "Daily OTP limit reached. Please try again tomorrow.".to_string(),
            )
            .into());
        }

        let code = utils::random_digits(OTP_CODE_LENGTH);
        let expires_at = now + Duration::minutes(self.settings.expiry_minutes);
        let otp = self
            .persistence
            .otp_create(user.id, purpose, &code, context, expires_at)
            .await?;

        metrics::counter!("elite_otp_issued_total", "purpose" => purpose.as_str()).increment(1);

        let message = OtpMessage {
            email: user.email.clone(),
            name: user.full_name(),
            purpose,
            code,
            expiry_minutes: self.settings.expiry_minutes,
        };
        if let Err(e) = self.notifier.send_otp(&message).await {
            warn!(user_id = user.id, purpose = %purpose, error = %e, "Failed to deliver OTP");
        } else {
            info!(user_id = user.id, purpose = %purpose, "OTP issued");
        }

        Ok(otp)
    }

    /// Check and consume a code. Every failure reads the same to the caller.
    pub async fn verify(&self, user_id: i64, purpose: OtpPurpose, code: &str) -> anyhow::Result<()> {
        self.verify_bound(user_id, purpose, code, None).await
    }

    /// Check and consume a code issued for `context`. A wrong code or a
    /// different context counts against the code, which is burned after
    /// `max_failed_attempts` misses.
    pub async fn verify_bound(
        &self,
        user_id: i64,
        purpose: OtpPurpose,
        code: &str,
        context: Option<&str>,
    ) -> anyhow::Result<()> {
        let invalid = || EliteError::IllegalArgument(INVALID_OTP_MESSAGE.to_string());

        let otp = match self.persistence.otp_find_active(user_id, purpose).await? {
            Some(otp) => otp,
            None => return Err(invalid().into()),
        };

        if otp.is_used || otp.expires_at <= utils::utc_now() {
            warn!(user_id, purpose = %purpose, "OTP verification failed");
            return Err(invalid().into());
        }

        if otp.code != code.trim() || otp.context.as_deref() != context {
            let burned = self
                .persistence
                .otp_record_failure(otp.id, self.settings.max_failed_attempts)
                .await?;
            if burned {
                warn!(user_id, purpose = %purpose, "OTP burned after repeated failures");
            } else {
                warn!(user_id, purpose = %purpose, "OTP verification failed");
            }
            metrics::counter!("elite_otp_failed_total", "purpose" => purpose.as_str()).increment(1);
            return Err(invalid().into());
        }

        // A concurrent verify may have consumed it first
        if !self.persistence.otp_mark_used(otp.id).await? {
            return Err(invalid().into());
        }

        info!(user_id, purpose = %purpose, "OTP verified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemoryNotifier;
    use elite_persistence::{EmbeddedPersistService, NewUser, OtpPersistence, UserPersistence};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        persistence: Arc<EmbeddedPersistService>,
        notifier: Arc<MemoryNotifier>,
        service: OtpService,
        user: UserInfo,
    }

    async fn fixture(settings: OtpSettings) -> Fixture {
        let dir = TempDir::new().unwrap();
        let persistence = Arc::new(EmbeddedPersistService::open(dir.path()).unwrap());
        let notifier = Arc::new(MemoryNotifier::new());
        let service = OtpService::new(persistence.clone(), notifier.clone(), settings);
        let user = persistence
            .user_create(NewUser {
                email: "ada@example.com".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Obi".to_string(),
                phone: None,
                password_hash: "x".to_string(),
                is_admin: false,
            })
            .await
            .unwrap();
        Fixture {
            _dir: dir,
            persistence,
            notifier,
            service,
            user,
        }
    }

    #[tokio::test]
    async fn test_issue_and_verify_once() {
        let f = fixture(OtpSettings::default()).await;
        let otp = f.service.issue(&f.user, OtpPurpose::Login).await.unwrap();
        assert_eq!(otp.code.len(), 6);
        assert_eq!(
            f.notifier.last_code("ada@example.com", OtpPurpose::Login),
            Some(otp.code.clone())
        );

        f.service
            .verify(f.user.id, OtpPurpose::Login, &otp.code)
            .await
            .unwrap();
        let err = f
            .service
            .verify(f.user.id, OtpPurpose::Login, &otp.code)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), INVALID_OTP_MESSAGE);
    }

    #[tokio::test]
    async fn test_wrong_purpose_and_code_rejected() {
        let f = fixture(OtpSettings::default()).await;
        let otp = f.service.issue(&f.user, OtpPurpose::Transfer).await.unwrap();

        assert!(
            f.service
                .verify(f.user.id, OtpPurpose::Withdrawal, &otp.code)
                .await
                .is_err()
        );
        let wrong = if otp.code == "000000" { "111111" } else { "000000" };
        assert!(
            f.service
                .verify(f.user.id, OtpPurpose::Transfer, wrong)
                .await
                .is_err()
        );
        // Still usable after a wrong guess
        assert!(
            f.service
                .verify(f.user.id, OtpPurpose::Transfer, &otp.code)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_reissue_invalidates_previous() {
        let f = fixture(OtpSettings::default()).await;
        let first = f.service.issue(&f.user, OtpPurpose::Login).await.unwrap();
        let second = f.service.issue(&f.user, OtpPurpose::Login).await.unwrap();

        if first.code != second.code {
            assert!(
                f.service
                    .verify(f.user.id, OtpPurpose::Login, &first.code)
                    .await
                    .is_err()
            );
        }
        assert!(
            f.service
                .verify(f.user.id, OtpPurpose::Login, &second.code)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_expired_code_rejected() {
        let f = fixture(OtpSettings::default()).await;
        let expired = utils::utc_now() - Duration::minutes(1);
        f.persistence
            .otp_create(f.user.id, OtpPurpose::PasswordReset, "123456", None, expired)
            .await
            .unwrap();

        assert!(
            f.service
                .verify(f.user.id, OtpPurpose::PasswordReset, "123456")
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_daily_cap() {
        let f = fixture(OtpSettings {
            max_daily: 2,
            ..Default::default()
        })
        .await;
        f.service.issue(&f.user, OtpPurpose::Login).await.unwrap();
        f.service.issue(&f.user, OtpPurpose::Login).await.unwrap();

        let err = f
            .service
            .issue(&f.user, OtpPurpose::Login)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EliteError>(),
            Some(EliteError::TooManyRequests(_))
        ));
        assert_eq!(f.notifier.otp_count(), 2);
    }

    #[tokio::test]
    async fn test_code_burned_after_repeated_misses() {
        let f = fixture(OtpSettings {
            max_failed_attempts: 3,
            ..Default::default()
        })
        .await;
        let otp = f
            .service
            .issue(&f.user, OtpPurpose::PasswordReset)
            .await
            .unwrap();
        let wrong = if otp.code == "000000" { "111111" } else { "000000" };

        for _ in 0..3 {
            let err = f
                .service
                .verify(f.user.id, OtpPurpose::PasswordReset, wrong)
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), INVALID_OTP_MESSAGE);
        }
        // The right code no longer works once the code is burned
        assert!(
            f.service
                .verify(f.user.id, OtpPurpose::PasswordReset, &otp.code)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_bound_code_only_confirms_its_operation() {
        let f = fixture(OtpSettings::default()).await;
        let otp = f
            .service
            .issue_bound(&f.user, OtpPurpose::Transfer, Some("transfer:1:0001:500"))
            .await
            .unwrap();

        assert!(
            f.service
                .verify_bound(f.user.id, OtpPurpose::Transfer, &otp.code, Some("transfer:1:0002:500"))
                .await
                .is_err()
        );
        assert!(
            f.service
                .verify(f.user.id, OtpPurpose::Transfer, &otp.code)
                .await
                .is_err()
        );
        f.service
            .verify_bound(f.user.id, OtpPurpose::Transfer, &otp.code, Some("transfer:1:0001:500"))
            .await
            .unwrap();
    }
}
