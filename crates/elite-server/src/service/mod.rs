pub mod accounts;
pub mod analytics;
pub mod audit;
pub mod kyc;
pub mod ledger;
pub mod storage;
pub mod users;
pub mod withdrawal;
