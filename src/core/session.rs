//! HSM session manager
//!
//! `HsmSession` is the monitor guarding the single logical connection to an
//! HSM device. It is constructed explicitly and shared by `Arc`:
//!
//! - the Closed → Opening → Ready transition runs inside one critical
//!   section (`open_lock`), so concurrent `start()` calls log in once;
//! - readiness is broadcast on a `watch` channel, so any number of
//!   `await_ready()` callers wait without touching `open_lock`;
//! - every device call goes through a single device mutex on the blocking
//!   pool, because PKCS#11 sessions do not allow concurrent operations.
//!
//! # Lifecycle
//!
//! ```ignore
//! let session = Arc::new(HsmSession::new(Pkcs11Device::new()));
//! session.start(&pin, "/opt/cloudhsm/lib/libcloudhsm_pkcs11.so").await?;
//! let key = session.key_reference("eth-key").await?;
//! // ... sign ...
//! session.close().await;
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{watch, Mutex as AsyncMutex};

use super::key_ref::KeyReference;
use super::recovery::RawSignature;
use crate::device::{HsmDevice, HsmError, HsmResult};

/// Lifecycle state of the HSM session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    Ready,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Closed => write!(f, "closed"),
            SessionState::Opening => write!(f, "opening"),
            SessionState::Ready => write!(f, "ready"),
        }
    }
}

/// Value broadcast to readiness waiters
#[derive(Debug, Clone, Copy)]
struct SessionStatus {
    state: SessionState,
    /// Bumped by every `close()`; waiters fail when it moves
    close_epoch: u64,
    /// Bumped by every failed open
    open_failures: u64,
}

/// Monitor owning the device session
pub struct HsmSession<D: HsmDevice> {
    device: Arc<Mutex<D>>,
    open_lock: Arc<AsyncMutex<()>>,
    status: Arc<watch::Sender<SessionStatus>>,
}

fn lock_device<D>(device: &Mutex<D>) -> HsmResult<MutexGuard<'_, D>> {
    device
        .lock()
        .map_err(|_| HsmError::DeviceError("device lock poisoned".to_string()))
}

fn open_and_login<D: HsmDevice>(device: &mut D, library_path: &Path, pin: &str) -> HsmResult<()> {
    device.load(library_path)?;
    device.open_session()?;
    if let Err(e) = device.login(pin) {
        device.close_session();
        return Err(e);
    }
    Ok(())
}

impl<D: HsmDevice> HsmSession<D> {
    /// Wrap `device` in a new, closed session
    pub fn new(device: D) -> Self {
        let (status, _) = watch::channel(SessionStatus {
            state: SessionState::Closed,
            close_epoch: 0,
            open_failures: 0,
        });
        Self {
            device: Arc::new(Mutex::new(device)),
            open_lock: Arc::new(AsyncMutex::new(())),
            status: Arc::new(status),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    /// Open the device session and log in. Idempotent once Ready.
    ///
    /// The open/login runs on the blocking pool and owns the critical
    /// section until it settles, so cancelling this future never leaves the
    /// session stuck in `Opening`.
    #[tracing::instrument(skip(self, pin, library_path))]
    pub async fn start(&self, pin: &str, library_path: impl AsRef<Path>) -> HsmResult<()> {
        if self.state() == SessionState::Ready {
            return Ok(());
        }

        let guard = Arc::clone(&self.open_lock).lock_owned().await;
        if self.state() == SessionState::Ready {
            tracing::debug!("[HSM] session already opened by a concurrent caller");
            return Ok(());
        }
        self.status.send_modify(|s| s.state = SessionState::Opening);

        let device = Arc::clone(&self.device);
        let status = Arc::clone(&self.status);
        let library_path: PathBuf = library_path.as_ref().to_path_buf();
        let pin = pin.to_string();

        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let result = lock_device(&*device)
                .and_then(|mut device| open_and_login(&mut *device, &library_path, &pin));
            status.send_modify(|s| {
                if result.is_ok() {
                    s.state = SessionState::Ready;
                } else {
                    s.state = SessionState::Closed;
                    s.open_failures += 1;
                }
            });
            result
        });

        match task.await {
            Ok(Ok(())) => {
                tracing::info!("[HSM] PKCS11: Logged in.");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "[HSM] PKCS11 Error when creating session");
                Err(e)
            }
            Err(e) => {
                self.status.send_modify(|s| {
                    s.state = SessionState::Closed;
                    s.open_failures += 1;
                });
                tracing::error!(error = %e, "[HSM] session open task aborted");
                Err(HsmError::DeviceError(format!("session open task failed: {}", e)))
            }
        }
    }

    /// Wait until the session is Ready.
    ///
    /// Fails with `SessionClosed` if `close()` runs while waiting. Dropping
    /// the returned future only drops this waiter's receiver.
    pub async fn await_ready(&self) -> HsmResult<()> {
        let mut rx = self.status.subscribe();
        let epoch = rx.borrow().close_epoch;
        loop {
            {
                let status = rx.borrow_and_update();
                if status.close_epoch != epoch {
                    return Err(HsmError::SessionClosed);
                }
                if status.state == SessionState::Ready {
                    return Ok(());
                }
            }
            rx.changed().await.map_err(|_| HsmError::SessionClosed)?;
        }
    }

    /// Log out and drop the device session. Idempotent.
    ///
    /// Logout errors are logged and swallowed; local state always ends
    /// `Closed` and pending `await_ready()` calls fail.
    pub async fn close(&self) {
        let _guard = self.open_lock.lock().await;

        if self.state() != SessionState::Closed {
            let result = self
                .with_device(|device| {
                    let result = device.logout();
                    device.close_session();
                    result
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "[HSM] PKCS11 Error when logging out session");
            }
            tracing::info!("[HSM] PKCS11: Session closed.");
        }

        self.status.send_modify(|s| {
            s.state = SessionState::Closed;
            s.close_epoch += 1;
        });
    }

    /// Raw `CKA_EC_POINT` of the key labeled `label`
    pub async fn get_public_key(&self, label: &str) -> HsmResult<Vec<u8>> {
        self.ensure_ready().await?;
        let label = label.to_string();
        self.with_device(move |device| device.public_key_point(&label))
            .await
    }

    /// Resolve `label` to a `KeyReference` (label + address)
    pub async fn key_reference(&self, label: &str) -> HsmResult<KeyReference> {
        let point = self.get_public_key(label).await?;
        let reference = KeyReference::from_ec_point(label, &point)?;
        tracing::info!(label = %label, address = %reference.checksum_address(), "[HSM] key resolved");
        Ok(reference)
    }

    /// ECDSA over a prehashed 32-byte message with the key labeled `label`
    #[tracing::instrument(skip(self, hash))]
    pub async fn sign(&self, label: &str, hash: [u8; 32]) -> HsmResult<RawSignature> {
        self.ensure_ready().await?;
        let owned_label = label.to_string();
        let raw = self
            .with_device(move |device| device.sign_ecdsa(&owned_label, &hash))
            .await?;
        RawSignature::from_bytes(&raw).map_err(|e| HsmError::DeviceError(e.to_string()))
    }

    /// Like `await_ready`, but an open that fails while waiting fails the
    /// device call with `NotStarted` instead of waiting for a retry.
    async fn ensure_ready(&self) -> HsmResult<()> {
        let mut rx = self.status.subscribe();
        let initial = *rx.borrow_and_update();
        loop {
            let status = *rx.borrow_and_update();
            if status.close_epoch != initial.close_epoch {
                return Err(HsmError::SessionClosed);
            }
            if status.open_failures != initial.open_failures {
                return Err(HsmError::NotStarted);
            }
            match status.state {
                SessionState::Ready => return Ok(()),
                SessionState::Closed => return Err(HsmError::NotStarted),
                SessionState::Opening => {}
            }
            rx.changed().await.map_err(|_| HsmError::SessionClosed)?;
        }
    }

    /// Run `op` against the device on the blocking pool, one call at a time
    async fn with_device<T, F>(&self, op: F) -> HsmResult<T>
    where
        F: FnOnce(&mut D) -> HsmResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let device = Arc::clone(&self.device);
        tokio::task::spawn_blocking(move || {
            let mut device = lock_device(&*device)?;
            op(&mut *device)
        })
        .await
        .map_err(|e| HsmError::DeviceError(format!("device task failed: {}", e)))?
    }
}
