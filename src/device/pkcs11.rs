//! PKCS#11 device binding (CloudHSM, SoftHSM, YubiHSM...)
//!
//! Thin `cryptoki` wrapper implementing `HsmDevice`. The private scalar never
//! leaves the token: keys are looked up by `CKA_LABEL` and used through
//! `CKM_ECDSA` on a prehashed message.

use std::path::Path;

use cryptoki::context::{CInitializeArgs, Pkcs11};
use cryptoki::mechanism::Mechanism;
use cryptoki::object::{Attribute, AttributeType, ObjectClass, ObjectHandle};
use cryptoki::session::{Session, UserType};
use cryptoki::types::AuthPin;

use super::{HsmDevice, HsmError, HsmResult};

/// `HsmDevice` backed by a vendor PKCS#11 library
#[derive(Default)]
pub struct Pkcs11Device {
    context: Option<Pkcs11>,
    session: Option<Session>,
}

impl Pkcs11Device {
    pub fn new() -> Self {
        Self::default()
    }

    fn session(&self) -> HsmResult<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| HsmError::DeviceError("no open PKCS#11 session".to_string()))
    }

    fn find_key(&self, label: &str, class: ObjectClass) -> HsmResult<ObjectHandle> {
        let template = [
            Attribute::Class(class),
            Attribute::Label(label.as_bytes().to_vec()),
        ];
        let handles = self
            .session()?
            .find_objects(&template)
            .map_err(|e| HsmError::DeviceError(format!("C_FindObjects failed: {}", e)))?;
        handles.into_iter().next().ok_or_else(|| HsmError::KeyNotFound {
            label: label.to_string(),
        })
    }
}

impl HsmDevice for Pkcs11Device {
    fn load(&mut self, library_path: &Path) -> HsmResult<()> {
        let load_err = |reason: String| HsmError::LoadFailed {
            path: library_path.display().to_string(),
            reason,
        };
        let context = Pkcs11::new(library_path).map_err(|e| load_err(e.to_string()))?;
        context
            .initialize(CInitializeArgs::OsThreads)
            .map_err(|e| load_err(e.to_string()))?;
        self.context = Some(context);
        Ok(())
    }

    fn open_session(&mut self) -> HsmResult<()> {
        let context = self
            .context
            .as_ref()
            .ok_or_else(|| HsmError::DeviceError("PKCS#11 library not loaded".to_string()))?;
        let slot = context
            .get_slots_with_token()
            .map_err(|e| HsmError::SlotNotFound(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| HsmError::SlotNotFound("no slot with a token present".to_string()))?;
        let session = context
            .open_rw_session(slot)
            .map_err(|e| HsmError::DeviceError(format!("C_OpenSession failed: {}", e)))?;
        self.session = Some(session);
        Ok(())
    }

    fn login(&mut self, pin: &str) -> HsmResult<()> {
        let pin = AuthPin::new(pin.to_string());
        self.session()
            .map_err(|e| HsmError::LoginFailed(e.to_string()))?
            .login(UserType::User, Some(&pin))
            .map_err(|e| HsmError::LoginFailed(e.to_string()))
    }

    fn logout(&mut self) -> HsmResult<()> {
        self.session()?
            .logout()
            .map_err(|e| HsmError::DeviceError(format!("C_Logout failed: {}", e)))
    }

    fn close_session(&mut self) {
        // Dropping the handle issues C_CloseSession
        self.session = None;
    }

    fn public_key_point(&mut self, label: &str) -> HsmResult<Vec<u8>> {
        let handle = self.find_key(label, ObjectClass::PUBLIC_KEY)?;
        let attributes = self
            .session()?
            .get_attributes(handle, &[AttributeType::EcPoint])
            .map_err(|e| HsmError::DeviceError(format!("C_GetAttributeValue failed: {}", e)))?;
        attributes
            .into_iter()
            .find_map(|attribute| match attribute {
                Attribute::EcPoint(point) => Some(point),
                _ => None,
            })
            .ok_or_else(|| HsmError::InvalidPublicKey {
                label: label.to_string(),
                reason: "CKA_EC_POINT missing".to_string(),
            })
    }

    fn sign_ecdsa(&mut self, label: &str, hash: &[u8; 32]) -> HsmResult<Vec<u8>> {
        let handle = self.find_key(label, ObjectClass::PRIVATE_KEY)?;
        self.session()?
            .sign(&Mechanism::Ecdsa, handle, hash)
            .map_err(|e| HsmError::DeviceError(format!("C_Sign failed: {}", e)))
    }
}
