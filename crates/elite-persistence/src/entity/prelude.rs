pub use super::accounts::Entity as Accounts;
pub use super::audit_logs::Entity as AuditLogs;
pub use super::otps::Entity as Otps;
pub use super::transactions::Entity as Transactions;
pub use super::user_pins::Entity as UserPins;
pub use super::users::Entity as Users;
pub use super::withdrawal_accounts::Entity as WithdrawalAccounts;
