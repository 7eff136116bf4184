//! One-time password persistence trait

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::model::{OtpInfo, OtpPurpose};

#[async_trait]
pub trait OtpPersistence: Send + Sync {
    /// Store a new code, marking older unused codes of the same purpose as used.
    /// `context` binds the code to one operation.
    async fn otp_create(
        &self,
        user_id: i64,
        purpose: OtpPurpose,
        code: &str,
        context: Option<&str>,
        expires_at: NaiveDateTime,
    ) -> anyhow::Result<OtpInfo>;

    /// Most recent unused code for the purpose, expired or not
    async fn otp_find_active(
        &self,
        user_id: i64,
        purpose: OtpPurpose,
    ) -> anyhow::Result<Option<OtpInfo>>;

    /// Mark a code used. Returns false if it was already used.
    async fn otp_mark_used(&self, id: i64) -> anyhow::Result<bool>;

    /// Count one wrong guess against an unused code and burn it once
    /// `max_failures` is reached. Returns true when the code is now used.
    async fn otp_record_failure(&self, id: i64, max_failures: i32) -> anyhow::Result<bool>;

    /// Number of codes issued to the user at or after `since`
    async fn otp_count_since(&self, user_id: i64, since: NaiveDateTime) -> anyhow::Result<u64>;
}
