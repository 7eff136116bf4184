//! Authentication service implementations

pub mod otp;
pub mod password;
pub mod pin;
pub mod token;
