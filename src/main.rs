//! hsm_onboard entry point
//!
//! 1. Loads configuration (`ONBOARD_CONFIG` YAML file, then environment)
//! 2. Resolves the signer: HSM labels, plain key, or wallet RPC
//! 3. Runs the ApeX onboarding flow
//! 4. Prints the output artifact as JSON on stdout
//!
//! Logs go to stderr so stdout can be redirected straight into storage.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use serde_json::Value;
use tracing::{error, info};

use hsm_onboard::adapters::apex::ApexClient;
use hsm_onboard::adapters::traits::RegistrationApi;
use hsm_onboard::config::constants::{hsm_ready_timeout, log_configuration};
use hsm_onboard::config::{load_onboard_config, SigningMethod};
use hsm_onboard::core::logging::{init_logging, SanitizedValue};
use hsm_onboard::core::{
    onboard_labels, registered_outputs, HsmSession, OnboardingOutcome, OnboardingRequest,
    Orchestrator,
};
use hsm_onboard::signing::{AnySigner, EthSigner};

#[cfg(feature = "pkcs11")]
type Device = hsm_onboard::device::Pkcs11Device;
#[cfg(not(feature = "pkcs11"))]
type Device = hsm_onboard::device::SimulatedDevice;

#[cfg(feature = "pkcs11")]
fn hsm_device() -> anyhow::Result<Device> {
    Ok(hsm_onboard::device::Pkcs11Device::new())
}

#[cfg(not(feature = "pkcs11"))]
fn hsm_device() -> anyhow::Result<Device> {
    bail!("HSM signing requires a build with the `pkcs11` feature")
}

async fn run_single<S: EthSigner, A: RegistrationApi>(
    signer: &S,
    api: &A,
    request: OnboardingRequest,
) -> anyhow::Result<Value> {
    match Orchestrator::new(signer, api, request).run().await {
        OnboardingOutcome::Registered(output) => Ok(serde_json::to_value(output)?),
        OnboardingOutcome::Failed { state, error } => {
            Err(anyhow!(error).context(format!("onboarding failed in state '{}'", state)))
        }
    }
}

async fn run_hsm<A: RegistrationApi>(
    session: Arc<HsmSession<Device>>,
    labels: &[String],
    api: &A,
    request: OnboardingRequest,
) -> anyhow::Result<Value> {
    if let [label] = labels {
        let signer = AnySigner::hsm(Arc::clone(&session), label)
            .await
            .with_context(|| format!("binding HSM key '{}'", label))?;
        return run_single(&signer, api, request).await;
    }

    let outcomes = onboard_labels(session, labels, api, &request).await;
    let failed: Vec<&String> = outcomes
        .iter()
        .filter(|(_, outcome)| outcome.output().is_none())
        .map(|(label, _)| label)
        .collect();
    let artifact = serde_json::to_value(registered_outputs(&outcomes))?;

    if !failed.is_empty() {
        // Registered accounts must still reach the operator
        println!("{}", serde_json::to_string_pretty(&artifact)?);
        bail!("{} of {} labels failed: {:?}", failed.len(), labels.len(), failed);
    }
    Ok(artifact)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();
    log_configuration();

    let config = load_onboard_config().map_err(|e| {
        error!(error = %e, "[CONFIG] Configuration failed");
        e
    })?;
    info!(config = ?config, "[CONFIG] Loaded");

    let method = config.signing_method()?;
    let apex = config.apex_config();
    info!(
        network = %apex.network,
        endpoint = %apex.preset.endpoint,
        token = %apex.token,
        "[ONBOARD] Target exchange"
    );

    let request = OnboardingRequest::from_config(&apex, config.stark_private_key.clone());
    let api = ApexClient::new(apex);

    let artifact = match method {
        SigningMethod::Hsm {
            pin,
            library_path,
            labels,
        } => {
            info!(
                pin = %SanitizedValue::new(&pin),
                library = %library_path.display(),
                labels = labels.len(),
                "[HSM] Starting session"
            );
            let session = Arc::new(HsmSession::new(hsm_device()?));
            tokio::time::timeout(hsm_ready_timeout(), session.start(&pin, &library_path))
                .await
                .map_err(|_| anyhow!("HSM session not ready after {:?}", hsm_ready_timeout()))??;

            let result = run_hsm(Arc::clone(&session), &labels, &api, request).await;
            session.close().await;
            result?
        }
        SigningMethod::LocalKey { private_key } => {
            let signer = AnySigner::<Device>::local_key(&private_key)?;
            run_single(&signer, &api, request).await?
        }
        SigningMethod::Wallet { rpc_url, account } => {
            let signer = AnySigner::<Device>::json_rpc_wallet(&rpc_url, account)?;
            run_single(&signer, &api, request).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&artifact)?);
    info!("[ONBOARD] Done");
    Ok(())
}
