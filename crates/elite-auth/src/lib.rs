//! Elite Auth - Authentication and verification
//!
//! This crate provides:
//! - JWT token handling
//! - Password and PIN hashing
//! - One-time password issuance and verification
//! - PIN lockout handling
//! - The notification seam used to deliver codes

pub mod model;
pub mod notify;
pub mod service;

// Re-export commonly used types
pub use model::*;
pub use notify::{LogNotifier, MemoryNotifier, Notifier, OtpMessage};
