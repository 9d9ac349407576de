//! HSM device bindings
//!
//! This module provides the blocking device seam used by the session manager:
//! - `HsmDevice` - the PKCS#11-shaped operations the core relies on
//! - `SimulatedDevice` - in-memory secp256k1 keys for tests and dry runs
//! - `Pkcs11Device` - a real PKCS#11 binding (feature `pkcs11`)

pub mod errors;
pub mod simulated;

#[cfg(feature = "pkcs11")]
pub mod pkcs11;

use std::path::Path;

pub use errors::{HsmError, HsmResult};
pub use simulated::SimulatedDevice;

#[cfg(feature = "pkcs11")]
pub use pkcs11::Pkcs11Device;

/// Blocking operations exposed by an HSM device.
///
/// Implementations are not required to be safe for concurrent use; the
/// session manager serializes every call behind a single device lock and
/// runs it on the blocking thread pool.
pub trait HsmDevice: Send + 'static {
    /// Load the vendor library and initialize it
    fn load(&mut self, library_path: &Path) -> HsmResult<()>;

    /// Open a read/write serial session on the first slot with a token
    fn open_session(&mut self) -> HsmResult<()>;

    /// Log the crypto user into the open session
    fn login(&mut self, pin: &str) -> HsmResult<()>;

    /// Log out of the open session
    fn logout(&mut self) -> HsmResult<()>;

    /// Drop the open session (never fails; errors are the device's problem)
    fn close_session(&mut self);

    /// `CKA_EC_POINT` of the public key object carrying `label`
    fn public_key_point(&mut self, label: &str) -> HsmResult<Vec<u8>>;

    /// `CKM_ECDSA` over a prehashed 32-byte message; returns `r || s`
    fn sign_ecdsa(&mut self, label: &str, hash: &[u8; 32]) -> HsmResult<Vec<u8>>;
}
