//! HSM-backed Ethereum signing and ApeX account onboarding
//!
//! - HSM session management over a PKCS#11-shaped device seam
//! - Ethereum signature recovery for HSM-produced `(r, s)` pairs
//! - Signers over HSM keys, local keys and external wallets
//! - STARK key derivation and the ApeX registration flow

pub mod adapters;
pub mod config;
pub mod core;
pub mod device;
pub mod error;
pub mod signing;

pub use error::AppError;
