//! ApeX REST client
//!
//! Form-encoded POSTs against the public onboarding endpoints. Responses are
//! read as JSON regardless of HTTP status: the exchange reports business
//! errors as `{code, msg}` bodies, which the caller must see verbatim.

use async_trait::async_trait;

use super::config::ApexConfig;
use super::types::{ApiEnvelope, NonceRequest, NonceResponse, RegisterUserRequest};
use crate::adapters::create_http_client;
use crate::adapters::errors::{RegistrationError, RegistrationResult};
use crate::adapters::traits::RegistrationApi;

const GENERATE_NONCE_PATH: &str = "/api/v1/generate-nonce";
const ONBOARDING_PATH: &str = "/api/v2/onboarding";

/// HTTP implementation of `RegistrationApi`
#[derive(Debug, Clone)]
pub struct ApexClient {
    http: reqwest::Client,
    config: ApexConfig,
}

impl ApexClient {
    pub fn new(config: ApexConfig) -> Self {
        Self {
            http: create_http_client("apex"),
            config,
        }
    }

    pub fn config(&self) -> &ApexConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.preset.endpoint.trim_end_matches('/'), path)
    }

    async fn read_json(response: reqwest::Response) -> RegistrationResult<serde_json::Value> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RegistrationError::Transport(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| {
            RegistrationError::InvalidResponse(format!("HTTP {} with non-JSON body ({}): {}", status, e, body))
        })
    }
}

#[async_trait]
impl RegistrationApi for ApexClient {
    async fn generate_nonce(&self, request: &NonceRequest) -> RegistrationResult<NonceResponse> {
        let url = self.url(GENERATE_NONCE_PATH);
        tracing::debug!(url = %url, eth_address = %request.eth_address, "[ONBOARD] requesting nonce");

        let response = self
            .http
            .post(&url)
            .form(request)
            .send()
            .await
            .map_err(|e| RegistrationError::Transport(e.to_string()))?;
        let raw = Self::read_json(response).await?;

        if raw.get("data").is_none() {
            return Err(RegistrationError::MissingDataField { raw });
        }
        let envelope: ApiEnvelope<NonceResponse> = serde_json::from_value(raw)
            .map_err(|e| RegistrationError::InvalidResponse(format!("nonce response: {}", e)))?;
        Ok(envelope.data)
    }

    async fn register_user(
        &self,
        request: &RegisterUserRequest,
        onboarding_signature: &str,
    ) -> RegistrationResult<serde_json::Value> {
        let url = self.url(ONBOARDING_PATH);
        tracing::debug!(url = %url, token = %request.token, "[ONBOARD] submitting registration");

        let response = self
            .http
            .post(&url)
            .header("APEX-SIGNATURE", onboarding_signature)
            .header("APEX-ETHEREUM-ADDRESS", &request.ethereum_address)
            .form(request)
            .send()
            .await
            .map_err(|e| RegistrationError::Transport(e.to_string()))?;
        Self::read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(url: String) -> ApexClient {
        ApexClient::new(ApexConfig::default().with_endpoint(url))
    }

    fn nonce_request() -> NonceRequest {
        NonceRequest {
            stark_key: "0xabc".to_string(),
            eth_address: "0xdef".to_string(),
            chain_id: 5,
        }
    }

    fn register_request() -> RegisterUserRequest {
        RegisterUserRequest {
            stark_key: "0xabc".to_string(),
            stark_key_y_coordinate: "0x123".to_string(),
            ethereum_address: "0xdef".to_string(),
            nonce: "99".to_string(),
            token: "USDC".to_string(),
            eth_mul_address: Some("0xfee".to_string()),
        }
    }

    #[tokio::test]
    async fn test_generate_nonce_posts_form() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/generate-nonce")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("starkKey".into(), "0xabc".into()),
                Matcher::UrlEncoded("ethAddress".into(), "0xdef".into()),
                Matcher::UrlEncoded("chainId".into(), "5".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"nonce":"1234","nonceExpired":1700000000}}"#)
            .create_async()
            .await;

        let nonce = client(server.url()).generate_nonce(&nonce_request()).await.unwrap();
        assert_eq!(nonce.nonce, "1234");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_nonce_error_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/generate-nonce")
            .with_status(400)
            .with_body(r#"{"code":10001,"msg":"bad stark key"}"#)
            .create_async()
            .await;

        let err = client(server.url()).generate_nonce(&nonce_request()).await.unwrap_err();
        match err {
            RegistrationError::MissingDataField { raw } => assert_eq!(raw["code"], 10001),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_user_sends_signature_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/onboarding")
            .match_header("APEX-SIGNATURE", "0xsig")
            .match_header("APEX-ETHEREUM-ADDRESS", "0xdef")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("nonce".into(), "99".into()),
                Matcher::UrlEncoded("token".into(), "USDC".into()),
                Matcher::UrlEncoded("starkKeyYCoordinate".into(), "0x123".into()),
                Matcher::UrlEncoded("ethMulAddress".into(), "0xfee".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"apiKey":{"key":"k","secret":"s","passphrase":"p"},"account":{"positionId":"1"}}}"#)
            .create_async()
            .await;

        let raw = client(server.url())
            .register_user(&register_request(), "0xsig")
            .await
            .unwrap();
        assert_eq!(raw["data"]["apiKey"]["key"], "k");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_json_body_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v2/onboarding")
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let err = client(server.url())
            .register_user(&register_request(), "0xsig")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidResponse(_)));
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let err = client("http://127.0.0.1:1".to_string())
            .generate_nonce(&nonce_request())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Transport(_)));
    }
}
