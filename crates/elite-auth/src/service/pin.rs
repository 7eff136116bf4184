//! PIN management with failed-attempt lockout

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use elite_common::{EliteError, utils, validation};
use elite_persistence::{PersistenceService, PinInfo, UserInfo};
use serde::Serialize;
use tracing::{info, warn};

use crate::model::{DEFAULT_PIN_LOCK_MINUTES, DEFAULT_PIN_MAX_ATTEMPTS};
use crate::service::password;

#[derive(Debug, Clone, Copy)]
pub struct PinSettings {
    pub max_attempts: i32,
    pub lock_minutes: i64,
}

impl Default for PinSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_PIN_MAX_ATTEMPTS,
            lock_minutes: DEFAULT_PIN_LOCK_MINUTES,
        }
    }
}

/// PIN state as reported to its owner
#[derive(Debug, Clone, Serialize)]
pub struct PinStatus {
    pub pin_set: bool,
    pub is_active: bool,
    pub is_locked: bool,
    pub failed_attempts: i32,
    pub locked_until: Option<NaiveDateTime>,
    pub last_used: Option<NaiveDateTime>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Clone)]
pub struct PinService {
    persistence: Arc<dyn PersistenceService>,
    settings: PinSettings,
}

impl PinService {
    pub fn new(persistence: Arc<dyn PersistenceService>, settings: PinSettings) -> Self {
        Self {
            persistence,
            settings,
        }
    }

    /// Create or replace the PIN. Counters and any lock are cleared.
    pub async fn setup(&self, user_id: i64, pin: &str) -> anyhow::Result<PinInfo> {
        validation::validate_pin(pin)
            .map_err(|e| EliteError::IllegalArgument(validation::message_of(&e)))?;

        let now = utils::utc_now();
        let pin_hash = password::hash_secret(pin)?;
        let info = match self.persistence.pin_find_by_user(user_id).await? {
            Some(existing) => PinInfo {
                pin_hash,
                is_active: true,
                failed_attempts: 0,
                locked_until: None,
                updated_at: now,
                ..existing
            },
            None => PinInfo {
                user_id,
                pin_hash,
                is_active: true,
                failed_attempts: 0,
                locked_until: None,
                last_used: None,
                created_at: now,
                updated_at: now,
            },
        };
        self.persistence.pin_save(&info).await?;

        info!(user_id, "PIN set up");
        Ok(info)
    }

    /// Check `pin` for `user`, applying the lockout policy.
    pub async fn verify(&self, user: &UserInfo, pin: &str) -> anyhow::Result<()> {
        if !user.is_verified {
            return Err(
                EliteError::IllegalArgument("Please verify your email first".to_string()).into(),
            );
        }

        let info = match self.persistence.pin_find_by_user(user.id).await? {
            Some(info) if info.is_active => info,
            _ => return Err(pin_not_setup()),
        };

        let now = utils::utc_now();
        if let Some(locked_until) = info.locked_until.filter(|until| *until > now) {
            return Err(pin_locked(locked_until));
        }

        if !password::verify_secret(pin, &info.pin_hash) {
            let lock_until = now + Duration::minutes(self.settings.lock_minutes);
            let info = self
                .persistence
                .pin_record_failure(user.id, self.settings.max_attempts, lock_until, now)
                .await?
                .ok_or_else(pin_not_setup)?;

            let error = if info.locked_until.is_some() {
                warn!(user_id = user.id, "PIN locked after repeated failures");
                EliteError::Unauthorized(format!(
                    "PIN locked due to too many failed attempts. Try again in {} minutes.",
                    self.settings.lock_minutes
                ))
            } else {
                let remaining = self.settings.max_attempts - info.failed_attempts;
                warn!(user_id = user.id, remaining, "Invalid PIN");
                EliteError::Unauthorized(format!("Invalid PIN. {} attempts remaining", remaining))
            };
            return Err(error.into());
        }

        // Concurrent failures may have locked the PIN since it was read
        if !self.persistence.pin_record_success(user.id, now).await? {
            return match self.persistence.pin_find_by_user(user.id).await? {
                Some(PinInfo {
                    locked_until: Some(until),
                    ..
                }) => Err(pin_locked(until)),
                _ => Err(pin_not_setup()),
            };
        }

        info!(user_id = user.id, "PIN verified");
        Ok(())
    }

    /// Current state. An expired lock is cleared on read.
    pub async fn status(&self, user_id: i64) -> anyhow::Result<PinStatus> {
        let Some(mut info) = self.persistence.pin_find_by_user(user_id).await? else {
            return Ok(PinStatus {
                pin_set: false,
                is_active: false,
                is_locked: false,
                failed_attempts: 0,
                locked_until: None,
                last_used: None,
                created_at: None,
            });
        };

        let now = utils::utc_now();
        if info.locked_until.is_some_and(|until| until <= now) {
            self.persistence.pin_clear_expired_lock(user_id, now).await?;
            info.locked_until = None;
            info.failed_attempts = 0;
        }

        Ok(PinStatus {
            pin_set: true,
            is_active: info.is_active,
            is_locked: info.locked_until.is_some(),
            failed_attempts: info.failed_attempts,
            locked_until: info.locked_until,
            last_used: info.last_used,
            created_at: Some(info.created_at),
        })
    }

    /// Enable or disable an existing PIN
    pub async fn set_active(&self, user_id: i64, active: bool) -> anyhow::Result<()> {
        if !self.persistence.pin_set_active(user_id, active).await? {
            return Err(EliteError::NotFound("PIN".to_string()).into());
        }

        info!(user_id, active, "PIN state changed");
        Ok(())
    }

    pub async fn remove(&self, user_id: i64) -> anyhow::Result<()> {
        if !self.persistence.pin_delete(user_id).await? {
            return Err(EliteError::NotFound("PIN".to_string()).into());
        }
        info!(user_id, "PIN removed");
        Ok(())
    }

    /// Whether the user has a PIN that can be used to sign in
    pub async fn has_active_pin(&self, user_id: i64) -> anyhow::Result<bool> {
        Ok(self
            .persistence
            .pin_find_by_user(user_id)
            .await?
            .is_some_and(|p| p.is_active))
    }
}

fn pin_not_setup() -> anyhow::Error {
    EliteError::IllegalArgument("PIN not setup for this user".to_string()).into()
}

fn pin_locked(until: NaiveDateTime) -> anyhow::Error {
    EliteError::Locked(format!(
        "PIN locked. Try again after {}",
        until.format("%H:%M:%S")
    ))
    .into()
}
