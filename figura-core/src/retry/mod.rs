//! Retry module
//! - policy.rs: deterministic exponential backoff executor

pub mod policy;

pub use policy::*;
