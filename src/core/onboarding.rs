//! Key derivation & registration orchestrator
//!
//! One `Orchestrator` drives one onboarding attempt through
//! `Idle → KeyDerived → NonceRequested → Registering → Registered`, or into
//! `Failed` at the first error. There are no retries: the nonce is
//! single-use, so a failed attempt is restarted from scratch by the caller.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ethers::types::transaction::eip712::TypedData;
use ethers::types::Address;
use ethers::utils::to_checksum;
use serde::{Deserialize, Serialize};

use super::session::HsmSession;
use super::stark::StarkKeyPair;
use crate::adapters::apex::types::{
    ApiCredentials, ApiEnvelope, NonceRequest, RegisterUserRequest, RegistrationData,
};
use crate::adapters::apex::ApexConfig;
use crate::adapters::errors::{RegistrationError, RegistrationResult};
use crate::adapters::traits::RegistrationApi;
use crate::device::HsmDevice;
use crate::signing::{EthSigner, HsmSigner, SignRequest, SignerError};

/// Origin the exchange binds its signing payloads to
pub const ONLY_SIGN_ON: &str = "https://pro.apex.exchange";

/// Progress of one onboarding attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnboardingState {
    Idle,
    KeyDerived,
    NonceRequested,
    Registering,
    Registered,
    Failed,
}

impl fmt::Display for OnboardingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OnboardingState::Idle => "idle",
            OnboardingState::KeyDerived => "key_derived",
            OnboardingState::NonceRequested => "nonce_requested",
            OnboardingState::Registering => "registering",
            OnboardingState::Registered => "registered",
            OnboardingState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Inputs of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingRequest {
    /// Use this STARK key instead of deriving one from the signer
    pub stark_private_key: Option<String>,
    pub token: String,
    /// Chain id of the EIP-712 domains and the nonce request
    pub network_id: u64,
    /// Fee manager registered as `ethMulAddress`
    pub fee_manager: Option<String>,
}

impl OnboardingRequest {
    pub fn from_config(config: &ApexConfig, stark_private_key: Option<String>) -> Self {
        Self {
            stark_private_key,
            token: config.token.clone(),
            network_id: config.preset.network_id,
            fee_manager: config.preset.fee_manager.clone(),
        }
    }
}

/// Per-attempt registration state. Nonce and credentials are write-once.
#[derive(Debug, Clone)]
pub struct RegistrationSession {
    ethereum_address: Address,
    stark_key_pair: StarkKeyPair,
    nonce: Option<String>,
    api_credentials: Option<ApiCredentials>,
    account_position_id: Option<String>,
}

impl RegistrationSession {
    pub fn new(ethereum_address: Address, stark_key_pair: StarkKeyPair) -> Self {
        Self {
            ethereum_address,
            stark_key_pair,
            nonce: None,
            api_credentials: None,
            account_position_id: None,
        }
    }

    pub fn ethereum_address(&self) -> Address {
        self.ethereum_address
    }

    pub fn stark_key_pair(&self) -> &StarkKeyPair {
        &self.stark_key_pair
    }

    pub fn nonce(&self) -> Option<&str> {
        self.nonce.as_deref()
    }

    pub fn api_credentials(&self) -> Option<&ApiCredentials> {
        self.api_credentials.as_ref()
    }

    pub fn account_position_id(&self) -> Option<&str> {
        self.account_position_id.as_deref()
    }

    pub fn set_nonce(&mut self, nonce: String) -> RegistrationResult<()> {
        if self.nonce.is_some() {
            return Err(RegistrationError::AlreadySet("nonce"));
        }
        self.nonce = Some(nonce);
        Ok(())
    }

    pub fn set_registration(
        &mut self,
        credentials: ApiCredentials,
        account_position_id: String,
    ) -> RegistrationResult<()> {
        if self.api_credentials.is_some() {
            return Err(RegistrationError::AlreadySet("api_credentials"));
        }
        self.api_credentials = Some(credentials);
        self.account_position_id = Some(account_position_id);
        Ok(())
    }

    /// Output artifact, once registered
    pub fn output(&self) -> Option<OnboardingOutput> {
        Some(OnboardingOutput {
            ethereum_address: to_checksum(&self.ethereum_address, None),
            stark_key_pair: self.stark_key_pair.clone(),
            api_key_credentials: self.api_credentials.clone()?,
            account_position_id: self.account_position_id.clone()?,
        })
    }
}

/// What the operator must persist after a successful registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingOutput {
    pub ethereum_address: String,
    pub stark_key_pair: StarkKeyPair,
    pub api_key_credentials: ApiCredentials,
    pub account_position_id: String,
}

/// Terminal result of `Orchestrator::run`
#[derive(Debug, Clone, PartialEq)]
pub enum OnboardingOutcome {
    Registered(OnboardingOutput),
    Failed {
        /// State the attempt was in when it failed
        state: OnboardingState,
        error: RegistrationError,
    },
}

impl OnboardingOutcome {
    pub fn output(&self) -> Option<&OnboardingOutput> {
        match self {
            OnboardingOutcome::Registered(output) => Some(output),
            OnboardingOutcome::Failed { .. } => None,
        }
    }
}

fn typed_data(value: serde_json::Value) -> RegistrationResult<TypedData> {
    serde_json::from_value(value)
        .map_err(|e| SignerError::Wallet(format!("EIP-712 payload: {}", e)).into())
}

/// Fixed payload whose signature seeds the STARK key
pub fn key_derivation_payload(network_id: u64) -> RegistrationResult<TypedData> {
    typed_data(serde_json::json!({
        "types": {
            "EIP712Domain": [
                {"name": "name", "type": "string"},
                {"name": "version", "type": "string"},
                {"name": "chainId", "type": "uint256"}
            ],
            "ApeX": [
                {"name": "action", "type": "string"},
                {"name": "onlySignOn", "type": "string"}
            ]
        },
        "primaryType": "ApeX",
        "domain": {"name": "ApeX", "version": "1.0", "chainId": network_id},
        "message": {"action": "L2 Key", "onlySignOn": ONLY_SIGN_ON}
    }))
}

/// Payload proving control of the Ethereum key for `nonce`
pub fn onboarding_payload(network_id: u64, nonce: &str) -> RegistrationResult<TypedData> {
    typed_data(serde_json::json!({
        "types": {
            "EIP712Domain": [
                {"name": "name", "type": "string"},
                {"name": "version", "type": "string"},
                {"name": "chainId", "type": "uint256"}
            ],
            "ApeX": [
                {"name": "action", "type": "string"},
                {"name": "onlySignOn", "type": "string"},
                {"name": "nonce", "type": "string"}
            ]
        },
        "primaryType": "ApeX",
        "domain": {"name": "ApeX", "version": "1.0", "chainId": network_id},
        "message": {"action": "ApeX Onboarding", "onlySignOn": ONLY_SIGN_ON, "nonce": nonce}
    }))
}

/// Derive the STARK key pair bound to `signer`'s Ethereum identity
pub async fn derive_stark_key<S: EthSigner + ?Sized>(
    signer: &S,
    ethereum_address: Address,
    network_id: u64,
) -> RegistrationResult<StarkKeyPair> {
    let payload = key_derivation_payload(network_id)?;
    let request = SignRequest::typed(&payload)?.with_signer_address(ethereum_address);
    let signature = signer.sign(&request).await?;
    Ok(StarkKeyPair::derive_from_signature(&signature.to_bytes())?)
}

/// Drives one onboarding attempt
pub struct Orchestrator<'a, S: EthSigner, A: RegistrationApi> {
    signer: &'a S,
    api: &'a A,
    request: OnboardingRequest,
    state: OnboardingState,
    session: Option<RegistrationSession>,
}

impl<'a, S: EthSigner, A: RegistrationApi> Orchestrator<'a, S, A> {
    pub fn new(signer: &'a S, api: &'a A, request: OnboardingRequest) -> Self {
        Self {
            signer,
            api,
            request,
            state: OnboardingState::Idle,
            session: None,
        }
    }

    pub fn state(&self) -> OnboardingState {
        self.state
    }

    pub fn session(&self) -> Option<&RegistrationSession> {
        self.session.as_ref()
    }

    /// Run the attempt to a terminal state. Runs at most once.
    pub async fn run(&mut self) -> OnboardingOutcome {
        if self.state != OnboardingState::Idle {
            return OnboardingOutcome::Failed {
                state: self.state,
                error: RegistrationError::AttemptFinished,
            };
        }

        match self.advance().await {
            Ok(output) => {
                tracing::info!(
                    eth_address = %output.ethereum_address,
                    position_id = %output.account_position_id,
                    "[ONBOARD] Registered"
                );
                OnboardingOutcome::Registered(output)
            }
            Err(error) => {
                let state = self.state;
                self.state = OnboardingState::Failed;
                tracing::error!(state = %state, error = %error, "[ONBOARD] Onboarding failed");
                OnboardingOutcome::Failed { state, error }
            }
        }
    }

    async fn advance(&mut self) -> RegistrationResult<OnboardingOutput> {
        let ethereum_address = self.signer.address().ok_or(SignerError::NoSignerAddress)?;
        let checksum = to_checksum(&ethereum_address, None);

        // Idle -> KeyDerived
        let stark_key_pair = match &self.request.stark_private_key {
            Some(private_key) => StarkKeyPair::from_private_key(private_key)?,
            None => derive_stark_key(self.signer, ethereum_address, self.request.network_id).await?,
        };
        tracing::info!(
            eth_address = %checksum,
            stark_public_key = %stark_key_pair.public_key,
            "[ONBOARD] STARK key ready"
        );
        let mut session = RegistrationSession::new(ethereum_address, stark_key_pair.clone());
        self.state = OnboardingState::KeyDerived;

        // KeyDerived -> NonceRequested
        let nonce = self
            .api
            .generate_nonce(&NonceRequest {
                stark_key: stark_key_pair.public_key.clone(),
                eth_address: checksum.clone(),
                chain_id: self.request.network_id,
            })
            .await?;
        session.set_nonce(nonce.nonce.clone())?;
        self.session = Some(session);
        self.state = OnboardingState::NonceRequested;
        tracing::debug!(eth_address = %checksum, "[ONBOARD] nonce acquired");

        // NonceRequested -> Registering
        self.state = OnboardingState::Registering;
        let payload = onboarding_payload(self.request.network_id, &nonce.nonce)?;
        let sign_request = SignRequest::personal(&payload)?.with_signer_address(ethereum_address);
        let signature = self.signer.sign_personal(&sign_request).await?;

        let register = RegisterUserRequest {
            stark_key: stark_key_pair.public_key.clone(),
            stark_key_y_coordinate: stark_key_pair.public_key_y_coordinate.clone(),
            ethereum_address: checksum,
            nonce: nonce.nonce,
            token: self.request.token.clone(),
            eth_mul_address: self.request.fee_manager.clone(),
        };
        let raw = self.api.register_user(&register, &signature.to_hex()).await?;

        // Registering -> Registered
        if raw.get("data").is_none() {
            return Err(RegistrationError::MissingDataField { raw });
        }
        let envelope: ApiEnvelope<RegistrationData> = serde_json::from_value(raw)
            .map_err(|e| RegistrationError::InvalidResponse(format!("registration data: {}", e)))?;
        let data = envelope.data;

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| RegistrationError::InvalidResponse("registration session lost".to_string()))?;
        session.set_registration(data.api_key, data.account.position_id)?;
        let output = session
            .output()
            .ok_or_else(|| RegistrationError::InvalidResponse("registration incomplete".to_string()))?;
        self.state = OnboardingState::Registered;
        Ok(output)
    }
}

/// Onboard every HSM label in turn on one shared session.
///
/// Each label gets its own derived STARK key; `template.stark_private_key`
/// is ignored. A failing label does not stop the batch.
pub async fn onboard_labels<D: HsmDevice, A: RegistrationApi>(
    session: Arc<HsmSession<D>>,
    labels: &[String],
    api: &A,
    template: &OnboardingRequest,
) -> BTreeMap<String, OnboardingOutcome> {
    let mut outcomes = BTreeMap::new();
    let request = OnboardingRequest {
        stark_private_key: None,
        ..template.clone()
    };

    for label in labels {
        tracing::info!(label = %label, "[ONBOARD] Onboarding HSM key");
        let outcome = match HsmSigner::connect(Arc::clone(&session), label).await {
            Ok(signer) => Orchestrator::new(&signer, api, request.clone()).run().await,
            Err(e) => {
                tracing::error!(label = %label, error = %e, "[ONBOARD] Cannot bind HSM key");
                OnboardingOutcome::Failed {
                    state: OnboardingState::Idle,
                    error: e.into(),
                }
            }
        };
        outcomes.insert(label.clone(), outcome);
    }
    outcomes
}

/// Registered artifacts of a batch, keyed by label
pub fn registered_outputs(
    outcomes: &BTreeMap<String, OnboardingOutcome>,
) -> BTreeMap<String, OnboardingOutput> {
    outcomes
        .iter()
        .filter_map(|(label, outcome)| outcome.output().map(|o| (label.clone(), o.clone())))
        .collect()
}
