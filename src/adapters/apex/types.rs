//! ApeX REST payloads

use serde::{Deserialize, Deserializer, Serialize};

/// Body of `POST /api/v1/generate-nonce`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceRequest {
    pub stark_key: String,
    pub eth_address: String,
    pub chain_id: u64,
}

/// `data` of the nonce response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NonceResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub nonce: String,
}

/// Body of `POST /api/v2/onboarding`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    pub stark_key: String,
    pub stark_key_y_coordinate: String,
    pub ethereum_address: String,
    pub nonce: String,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eth_mul_address: Option<String>,
}

/// `{ "data": ... }` envelope wrapping successful responses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: T,
}

/// API key issued on registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCredentials {
    pub key: String,
    pub secret: String,
    pub passphrase: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(deserialize_with = "string_or_number")]
    pub position_id: String,
}

/// `data` of a successful registration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationData {
    pub api_key: ApiCredentials,
    pub account: AccountInfo,
}

/// Ids come back as JSON strings or numbers depending on the endpoint
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nonce_request_is_camel_case() {
        let request = NonceRequest {
            stark_key: "0xabc".to_string(),
            eth_address: "0xdef".to_string(),
            chain_id: 5,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, json!({"starkKey": "0xabc", "ethAddress": "0xdef", "chainId": 5}));
    }

    #[test]
    fn test_register_request_omits_missing_fee_manager() {
        let request = RegisterUserRequest {
            stark_key: "0x1".to_string(),
            stark_key_y_coordinate: "0x2".to_string(),
            ethereum_address: "0x3".to_string(),
            nonce: "7".to_string(),
            token: "USDC".to_string(),
            eth_mul_address: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("ethMulAddress").is_none());
        assert_eq!(value["starkKeyYCoordinate"], "0x2");
    }

    #[test]
    fn test_registration_data_parses_numeric_position() {
        let data: ApiEnvelope<RegistrationData> = serde_json::from_value(json!({
            "data": {
                "apiKey": {"key": "k1", "secret": "s1", "passphrase": "p1"},
                "account": {"positionId": 42, "ethereumAddress": "0x0"}
            }
        }))
        .unwrap();
        assert_eq!(data.data.account.position_id, "42");
        assert_eq!(data.data.api_key.key, "k1");
    }

    #[test]
    fn test_nonce_response_accepts_string_or_number() {
        let a: NonceResponse = serde_json::from_value(json!({"nonce": "123"})).unwrap();
        let b: NonceResponse = serde_json::from_value(json!({"nonce": 123})).unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_value::<NonceResponse>(json!({"nonce": null})).is_err());
    }
}
