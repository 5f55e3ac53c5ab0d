//! Signed HTTP client for provider calls.
//!
//! Wraps reqwest with the FASP signature profile: every outbound request
//! carries Content-Digest, Signature-Input and Signature headers signed by
//! the server keypair owned by the provider record. Responses that carry
//! signature headers are verified against the provider's public key.
//!
//! Construction is gated on provider confirmation; only the registration
//! info fetch bypasses the gate, via `for_registration`.

use reqwest::Method;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;

use crate::provider::Provider;
use crate::signing;
use crate::types::{FaspError, ProviderRequestError, Result};

/// Client tunables, derived from bridge configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bounded timeout for each provider call
    pub request_timeout: Duration,
    /// Allowed clock skew for response signature `created` params (seconds)
    pub max_skew_secs: i64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_skew_secs: 300,
        }
    }
}

/// HTTP client bound to one provider's base URL and key material
pub struct SignedRequestClient {
    http: reqwest::Client,
    provider: Provider,
    max_skew_secs: i64,
}

impl SignedRequestClient {
    /// Build a client for a confirmed provider. Unconfirmed providers are
    /// refused locally before any network call.
    pub fn for_provider(provider: &Provider, config: &ClientConfig) -> Result<Self> {
        if !provider.confirmed {
            return Err(FaspError::ProviderNotConfirmed(provider.id.to_string()));
        }
        Self::for_registration(provider, config)
    }

    /// Build a client without the confirmation gate. Only the registration
    /// info fetch uses this, before the operator has confirmed the provider.
    pub fn for_registration(provider: &Provider, config: &ClientConfig) -> Result<Self> {
        // Fail fast on undecodable key material
        provider.signing_key()?;
        provider.provider_key()?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderRequestError::Network(e.to_string()))?;

        Ok(Self {
            http,
            provider: provider.clone(),
            max_skew_secs: config.max_skew_secs,
        })
    }

    pub async fn get(&self, path: &str) -> std::result::Result<JsonValue, ProviderRequestError> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: Option<&JsonValue>,
    ) -> std::result::Result<JsonValue, ProviderRequestError> {
        self.send(Method::POST, path, body).await
    }

    pub async fn delete(&self, path: &str) -> std::result::Result<JsonValue, ProviderRequestError> {
        self.send(Method::DELETE, path, None).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&JsonValue>,
    ) -> std::result::Result<JsonValue, ProviderRequestError> {
        let url = self.provider.url(path);
        let body_bytes = match body {
            Some(value) => serde_json::to_vec(value)
                .map_err(|e| ProviderRequestError::MalformedJson(e.to_string()))?,
            None => Vec::new(),
        };

        let signing_key = self
            .provider
            .signing_key()
            .map_err(|e| ProviderRequestError::Network(e.to_string()))?;

        let headers = signing::sign_request(
            method.as_str(),
            &url,
            &body_bytes,
            &signing_key,
            &self.provider.remote_identifier,
            signing::created_now(),
        );

        debug!(
            provider_id = %self.provider.id,
            method = %method,
            url = %url,
            "Sending signed provider request"
        );

        let mut request = self
            .http
            .request(method, &url)
            .header("content-digest", &headers.content_digest)
            .header("signature-input", &headers.signature_input)
            .header("signature", &headers.signature);

        if !body_bytes.is_empty() {
            request = request
                .header("content-type", "application/json")
                .body(body_bytes);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderRequestError::Network(e.to_string()))?;

        let status = response.status();
        let response_digest = header_value(&response, "content-digest");
        let response_sig_input = header_value(&response, "signature-input");
        let response_sig = header_value(&response, "signature");

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderRequestError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ProviderRequestError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).to_string(),
            });
        }

        // Verify whatever signature material the provider attached
        if let Some(digest) = &response_digest {
            if !signing::digest_matches(digest, &bytes) {
                return Err(ProviderRequestError::DigestMismatch);
            }
        }
        if let (Some(digest), Some(sig_input), Some(sig)) =
            (&response_digest, &response_sig_input, &response_sig)
        {
            let provider_key = self
                .provider
                .provider_key()
                .map_err(|e| ProviderRequestError::InvalidSignature(e.to_string()))?;
            signing::verify_response(
                status.as_u16(),
                digest,
                sig_input,
                sig,
                &provider_key,
                self.max_skew_secs,
            )?;
        }

        if bytes.is_empty() {
            return Ok(JsonValue::Null);
        }

        serde_json::from_slice(&bytes).map_err(|e| ProviderRequestError::MalformedJson(e.to_string()))
    }
}

fn header_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{encode_public_key, encode_signing_key, generate_keypair};
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn confirmed_provider(base_url: &str) -> Provider {
        let provider_keypair = generate_keypair();
        let mut provider = Provider::new(
            base_url,
            "Test Provider",
            "remote-1",
            &encode_public_key(&provider_keypair.verifying_key()),
        )
        .unwrap();
        provider.confirmed = true;
        provider
    }

    #[test]
    fn test_unconfirmed_provider_refused_locally() {
        let mut provider = confirmed_provider("https://fasp.example.com");
        provider.confirmed = false;

        let result = SignedRequestClient::for_provider(&provider, &ClientConfig::default());
        assert!(matches!(result, Err(FaspError::ProviderNotConfirmed(_))));
    }

    #[tokio::test]
    async fn test_get_parses_json_and_signs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/provider_info"))
            .and(header_exists("signature"))
            .and(header_exists("signature-input"))
            .and(header_exists("content-digest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "capabilities": [{"id": "trends", "version": "1.0"}]
            })))
            .mount(&server)
            .await;

        let provider = confirmed_provider(&server.uri());
        let client = SignedRequestClient::for_provider(&provider, &ClientConfig::default()).unwrap();

        let body = client.get("/provider_info").await.unwrap();
        assert_eq!(body["capabilities"][0]["id"], "trends");
    }

    #[tokio::test]
    async fn test_non_2xx_is_typed_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/capabilities/trends/1/activation"))
            .respond_with(ResponseTemplate::new(422).set_body_string("nope"))
            .mount(&server)
            .await;

        let provider = confirmed_provider(&server.uri());
        let client = SignedRequestClient::for_provider(&provider, &ClientConfig::default()).unwrap();

        let err = client
            .post("/capabilities/trends/1/activation", None)
            .await
            .unwrap_err();
        match err {
            ProviderRequestError::Status { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, "nope");
                assert!(!err_retryable(status));
            }
            other => panic!("Expected status error, got {:?}", other),
        }
    }

    fn err_retryable(status: u16) -> bool {
        ProviderRequestError::Status {
            status,
            body: String::new(),
        }
        .is_retryable()
    }

    #[tokio::test]
    async fn test_malformed_json_is_typed_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/provider_info"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let provider = confirmed_provider(&server.uri());
        let client = SignedRequestClient::for_provider(&provider, &ClientConfig::default()).unwrap();

        let err = client.get("/provider_info").await.unwrap_err();
        assert!(matches!(err, ProviderRequestError::MalformedJson(_)));
    }

    #[tokio::test]
    async fn test_empty_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/capabilities/trends/1/activation"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let provider = confirmed_provider(&server.uri());
        let client = SignedRequestClient::for_provider(&provider, &ClientConfig::default()).unwrap();

        let body = client
            .delete("/capabilities/trends/1/activation")
            .await
            .unwrap();
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn test_response_digest_mismatch_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/provider_info"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .insert_header("content-digest", "sha-256=:AAAA:"),
            )
            .mount(&server)
            .await;

        let provider = confirmed_provider(&server.uri());
        let client = SignedRequestClient::for_provider(&provider, &ClientConfig::default()).unwrap();

        let err = client.get("/provider_info").await.unwrap_err();
        assert!(matches!(err, ProviderRequestError::DigestMismatch));
    }

    #[tokio::test]
    async fn test_signed_response_verified() {
        // Provider signs its response; client must accept it with the right
        // key and reject it after the key is swapped.
        let provider_keypair = generate_keypair();
        let body = br#"{"ok":true}"#;
        let headers = crate::signing::sign_response(
            200,
            body,
            &provider_keypair,
            "remote-1",
            crate::signing::created_now(),
        );

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/provider_info"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(body.to_vec())
                    .insert_header("content-digest", headers.content_digest.as_str())
                    .insert_header("signature-input", headers.signature_input.as_str())
                    .insert_header("signature", headers.signature.as_str()),
            )
            .mount(&server)
            .await;

        let mut provider = confirmed_provider(&server.uri());
        provider.provider_public_key = encode_public_key(&provider_keypair.verifying_key());
        // Keep a distinct server-side keypair
        provider.server_key = encode_signing_key(&generate_keypair());

        let client = SignedRequestClient::for_provider(&provider, &ClientConfig::default()).unwrap();
        let parsed = client.get("/provider_info").await.unwrap();
        assert_eq!(parsed["ok"], true);

        // Same response, wrong provider key
        let mut wrong_key = confirmed_provider(&server.uri());
        wrong_key.provider_public_key = encode_public_key(&generate_keypair().verifying_key());
        let client = SignedRequestClient::for_provider(&wrong_key, &ClientConfig::default()).unwrap();
        let err = client.get("/provider_info").await.unwrap_err();
        assert!(matches!(err, ProviderRequestError::InvalidSignature(_)));
    }
}
