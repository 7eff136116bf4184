//! Delivery of one-time codes and account notices
//!
//! Codes are handed to a [`Notifier`]. The server wires in [`LogNotifier`];
//! tests use [`MemoryNotifier`] to read back what would have been mailed.

use async_trait::async_trait;
use elite_persistence::OtpPurpose;
use parking_lot::Mutex;
use tracing::info;

/// A code addressed to one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpMessage {
    pub email: String,
    pub name: String,
    pub purpose: OtpPurpose,
    pub code: String,
    pub expiry_minutes: i64,
}

impl OtpMessage {
    pub fn subject(&self) -> String {
        format!("Your OTP for {}", self.purpose)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_otp(&self, message: &OtpMessage) -> anyhow::Result<()>;

    /// Free-form notice such as a suspension or KYC decision
    async fn send_notice(&self, email: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Writes deliveries to the tracing log.
///
/// Codes are masked unless `reveal_codes` is set, which is only meant for
/// local development.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier {
    reveal_codes: bool,
}

impl LogNotifier {
    pub fn new(reveal_codes: bool) -> Self {
        Self { reveal_codes }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_otp(&self, message: &OtpMessage) -> anyhow::Result<()> {
        let code = if self.reveal_codes {
            message.code.as_str()
        } else {
            "******"
        };
        info!(
            email = %message.email,
            purpose = %message.purpose,
            code = %code,
            expiry_minutes = message.expiry_minutes,
            subject = %message.subject(),
            "OTP dispatched"
        );
        Ok(())
    }

    async fn send_notice(&self, email: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(email = %email, subject = %subject, body = %body, "Notice dispatched");
        Ok(())
    }
}

/// Keeps every delivery in memory
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    otps: Mutex<Vec<OtpMessage>>,
    notices: Mutex<Vec<(String, String)>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest code sent to `email` for `purpose`
    pub fn last_code(&self, email: &str, purpose: OtpPurpose) -> Option<String> {
        self.otps
            .lock()
            .iter()
            .rev()
            .find(|m| m.email == email && m.purpose == purpose)
            .map(|m| m.code.clone())
    }

    pub fn otp_count(&self) -> usize {
        self.otps.lock().len()
    }

    pub fn notices_for(&self, email: &str) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .filter(|(to, _)| to == email)
            .map(|(_, subject)| subject.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send_otp(&self, message: &OtpMessage) -> anyhow::Result<()> {
        self.otps.lock().push(message.clone());
        Ok(())
    }

    async fn send_notice(&self, email: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
        self.notices
            .lock()
            .push((email.to_string(), subject.to_string()));
        Ok(())
    }
}
