//! Transaction PIN persistence trait

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::model::PinInfo;

#[async_trait]
pub trait PinPersistence: Send + Sync {
    async fn pin_find_by_user(&self, user_id: i64) -> anyhow::Result<Option<PinInfo>>;

    /// Insert or replace the PIN row of `pin.user_id`
    async fn pin_save(&self, pin: &PinInfo) -> anyhow::Result<()>;

    async fn pin_delete(&self, user_id: i64) -> anyhow::Result<bool>;

    /// Atomically count one wrong PIN. A lock that expired before `now` is
    /// cleared first; once the counter reaches `max_attempts` the PIN is
    /// locked until `lock_until`. An active lock is left untouched. Returns
    /// the row as stored afterwards, or None without a PIN.
    async fn pin_record_failure(
        &self,
        user_id: i64,
        max_attempts: i32,
        lock_until: NaiveDateTime,
        now: NaiveDateTime,
    ) -> anyhow::Result<Option<PinInfo>>;

    /// Reset the failure counter and stamp `last_used`, unless the PIN is
    /// locked at `now`. Returns false when nothing was updated.
    async fn pin_record_success(&self, user_id: i64, now: NaiveDateTime) -> anyhow::Result<bool>;

    /// Clear a lock that expired before `now` together with its counter
    async fn pin_clear_expired_lock(&self, user_id: i64, now: NaiveDateTime)
    -> anyhow::Result<bool>;

    async fn pin_set_active(&self, user_id: i64, active: bool) -> anyhow::Result<bool>;
}
