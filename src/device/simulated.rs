//! Simulated HSM device
//!
//! Software stand-in for a PKCS#11 token. Keys live in memory as k256
//! signing keys, the public point is returned DER-wrapped exactly like
//! CloudHSM returns `CKA_EC_POINT`, and signatures come back as raw `r || s`
//! without a recovery id. Counters are shared through `DeviceStats` so
//! callers can observe how many logins/signs actually reached the device
//! after the device has been moved into a session.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ethers::types::U256;
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;

use super::{HsmDevice, HsmError, HsmResult};
use crate::core::recovery::secp256k1_order;

/// Observable call counters for a `SimulatedDevice`
#[derive(Debug, Clone, Default)]
pub struct DeviceStats {
    logins: Arc<AtomicUsize>,
    logouts: Arc<AtomicUsize>,
    signs: Arc<AtomicUsize>,
}

impl DeviceStats {
    /// Number of successful logins
    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    /// Number of logout attempts (successful or not)
    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    /// Number of ECDSA operations performed
    pub fn signs(&self) -> usize {
        self.signs.load(Ordering::SeqCst)
    }
}

/// In-memory HSM device
pub struct SimulatedDevice {
    pin: String,
    keys: HashMap<String, SigningKey>,
    stats: DeviceStats,
    loaded: bool,
    session_open: bool,
    logged_in: bool,
    has_token: bool,
    fail_load: bool,
    fail_logout: bool,
    high_s: bool,
    login_delay: Option<Duration>,
}

impl SimulatedDevice {
    /// Create an empty device accepting `pin`
    pub fn new(pin: impl Into<String>) -> Self {
        Self {
            pin: pin.into(),
            keys: HashMap::new(),
            stats: DeviceStats::default(),
            loaded: false,
            session_open: false,
            logged_in: false,
            has_token: true,
            fail_load: false,
            fail_logout: false,
            high_s: false,
            login_delay: None,
        }
    }

    /// Provision a key under `label` from a 32-byte secret scalar
    pub fn with_key(mut self, label: &str, secret: &[u8; 32]) -> HsmResult<Self> {
        let key = SigningKey::from_slice(&secret[..]).map_err(|e| {
            HsmError::DeviceError(format!("Invalid secret for '{}': {}", label, e))
        })?;
        self.keys.insert(label.to_string(), key);
        Ok(self)
    }

    /// Provision a freshly generated random key under `label`
    pub fn with_random_key(mut self, label: &str) -> Self {
        let key = SigningKey::random(&mut rand::rngs::OsRng);
        self.keys.insert(label.to_string(), key);
        self
    }

    /// Simulate a device without any initialized token
    pub fn without_token(mut self) -> Self {
        self.has_token = false;
        self
    }

    /// Make `load` fail as if the vendor library were missing
    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    /// Make `logout` fail (local state must still clear)
    pub fn failing_logout(mut self) -> Self {
        self.fail_logout = true;
        self
    }

    /// Emit the high-s twin of every signature, as some HSMs do
    pub fn emitting_high_s(mut self) -> Self {
        self.high_s = true;
        self
    }

    /// Block inside `login` for `delay` to widen the Opening window
    pub fn with_login_delay(mut self, delay: Duration) -> Self {
        self.login_delay = Some(delay);
        self
    }

    /// Shared counters handle
    pub fn stats(&self) -> DeviceStats {
        self.stats.clone()
    }

    fn key(&self, label: &str) -> HsmResult<&SigningKey> {
        self.keys.get(label).ok_or_else(|| HsmError::KeyNotFound {
            label: label.to_string(),
        })
    }

    fn ensure_logged_in(&self) -> HsmResult<()> {
        if !self.logged_in {
            return Err(HsmError::DeviceError("CKR_USER_NOT_LOGGED_IN".to_string()));
        }
        Ok(())
    }
}

impl HsmDevice for SimulatedDevice {
    fn load(&mut self, library_path: &Path) -> HsmResult<()> {
        if self.fail_load {
            return Err(HsmError::LoadFailed {
                path: library_path.display().to_string(),
                reason: "library not found".to_string(),
            });
        }
        self.loaded = true;
        Ok(())
    }

    fn open_session(&mut self) -> HsmResult<()> {
        if !self.loaded {
            return Err(HsmError::DeviceError("CKR_CRYPTOKI_NOT_INITIALIZED".to_string()));
        }
        if !self.has_token {
            return Err(HsmError::SlotNotFound("no slot with a token present".to_string()));
        }
        self.session_open = true;
        Ok(())
    }

    fn login(&mut self, pin: &str) -> HsmResult<()> {
        if let Some(delay) = self.login_delay {
            std::thread::sleep(delay);
        }
        if !self.session_open {
            return Err(HsmError::LoginFailed("CKR_SESSION_HANDLE_INVALID".to_string()));
        }
        if pin != self.pin {
            return Err(HsmError::LoginFailed("CKR_PIN_INCORRECT".to_string()));
        }
        self.logged_in = true;
        self.stats.logins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn logout(&mut self) -> HsmResult<()> {
        self.stats.logouts.fetch_add(1, Ordering::SeqCst);
        if self.fail_logout {
            return Err(HsmError::DeviceError("CKR_DEVICE_REMOVED".to_string()));
        }
        self.logged_in = false;
        Ok(())
    }

    fn close_session(&mut self) {
        self.logged_in = false;
        self.session_open = false;
    }

    fn public_key_point(&mut self, label: &str) -> HsmResult<Vec<u8>> {
        self.ensure_logged_in()?;
        let key = self.key(label)?;
        let point = key.verifying_key().to_encoded_point(false);
        // DER OCTET STRING header, as returned for CKA_EC_POINT
        let mut der = vec![0x04, 0x41];
        der.extend_from_slice(point.as_bytes());
        Ok(der)
    }

    fn sign_ecdsa(&mut self, label: &str, hash: &[u8; 32]) -> HsmResult<Vec<u8>> {
        self.ensure_logged_in()?;
        let key = self.key(label)?;
        let signature: Signature = key
            .sign_prehash(hash)
            .map_err(|e| HsmError::DeviceError(format!("CKM_ECDSA failed: {}", e)))?;
        self.stats.signs.fetch_add(1, Ordering::SeqCst);

        let mut raw = signature.to_bytes().to_vec();
        if self.high_s {
            let s = U256::from_big_endian(&raw[32..]);
            let flipped = secp256k1_order() - s;
            flipped.to_big_endian(&mut raw[32..]);
        }
        Ok(raw)
    }
}
