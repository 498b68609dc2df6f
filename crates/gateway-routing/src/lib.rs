//! # Gateway Routing
//!
//! Credential selection for the Gemini relay gateway.
//!
//! This crate provides:
//! - Round-robin rotation over a pool of upstream keys
//! - Skip-invalid selection driven by per-key failure counts
//! - Reset and status primitives for health checking
//! - Hot reload of the key list with state carry-over

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod credential_pool;

// Re-export main types
pub use credential_pool::{Credential, CredentialPool, PoolStatus};
