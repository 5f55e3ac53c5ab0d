//! HTTP message signatures for the FASP protocol.
//!
//! Implements the RFC 9421 profile the protocol requires: every request
//! carries a `Content-Digest` header (SHA-256 of the body) plus
//! `Signature-Input`/`Signature` headers with an Ed25519 signature over
//! `"@method"`, `"@target-uri"` and `"content-digest"`. Provider responses
//! sign `"@status"` and `"content-digest"` and are verified against the
//! public key exchanged at registration.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::types::ProviderRequestError;

/// Signature label used on the wire
const SIG_LABEL: &str = "sig1";

/// Headers attached to an outbound signed request
#[derive(Debug, Clone)]
pub struct SignatureHeaders {
    /// `Content-Digest` header value
    pub content_digest: String,
    /// `Signature-Input` header value
    pub signature_input: String,
    /// `Signature` header value
    pub signature: String,
}

/// Compute the `Content-Digest` header value for a body.
pub fn content_digest(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    format!("sha-256=:{}:", BASE64.encode(digest))
}

/// Check a received `Content-Digest` header against the actual body.
pub fn digest_matches(header: &str, body: &[u8]) -> bool {
    header.trim() == content_digest(body)
}

/// Unix seconds now, used as the `created` signature parameter.
pub fn created_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Build the signature parameters suffix: `;created=…;keyid="…";alg="ed25519"`
fn signature_params(components: &[&str], created: i64, key_id: &str) -> String {
    let list = components
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(" ");
    format!("({});created={};keyid=\"{}\";alg=\"ed25519\"", list, created, key_id)
}

/// Build the canonical signature base over the covered components.
fn signature_base(components: &[(&str, &str)], params: &str) -> String {
    let mut base = String::new();
    for (name, value) in components {
        base.push_str(&format!("\"{}\": {}\n", name, value));
    }
    base.push_str(&format!("\"@signature-params\": {}", params));
    base
}

/// Sign an outbound request, producing the three signature headers.
pub fn sign_request(
    method: &str,
    target_uri: &str,
    body: &[u8],
    key: &SigningKey,
    key_id: &str,
    created: i64,
) -> SignatureHeaders {
    let digest = content_digest(body);
    let params = signature_params(&["@method", "@target-uri", "content-digest"], created, key_id);
    let base = signature_base(
        &[
            ("@method", method),
            ("@target-uri", target_uri),
            ("content-digest", &digest),
        ],
        &params,
    );

    let signature: Signature = key.sign(base.as_bytes());

    SignatureHeaders {
        content_digest: digest,
        signature_input: format!("{}={}", SIG_LABEL, params),
        signature: format!("{}=:{}:", SIG_LABEL, BASE64.encode(signature.to_bytes())),
    }
}

/// Parsed `Signature-Input` header
struct ParsedInput {
    components: Vec<String>,
    params: String,
}

/// Parse a `Signature-Input` header value for our label.
fn parse_signature_input(header: &str) -> Result<ParsedInput, ProviderRequestError> {
    let rest = header
        .trim()
        .strip_prefix(SIG_LABEL)
        .and_then(|r| r.strip_prefix('='))
        .ok_or_else(|| {
            ProviderRequestError::InvalidSignature(format!("Unknown signature label in: {}", header))
        })?;

    let close = rest.find(')').ok_or_else(|| {
        ProviderRequestError::InvalidSignature("Malformed component list".to_string())
    })?;
    let list = rest
        .get(1..close)
        .ok_or_else(|| ProviderRequestError::InvalidSignature("Malformed component list".to_string()))?;

    let components = list
        .split_whitespace()
        .map(|c| c.trim_matches('"').to_string())
        .collect();

    Ok(ParsedInput {
        components,
        params: rest.to_string(),
    })
}

/// Extract the base64 signature bytes from a `Signature` header.
fn parse_signature(header: &str) -> Result<Signature, ProviderRequestError> {
    let value = header
        .trim()
        .strip_prefix(SIG_LABEL)
        .and_then(|r| r.strip_prefix("=:"))
        .and_then(|r| r.strip_suffix(':'))
        .ok_or_else(|| ProviderRequestError::InvalidSignature("Malformed Signature header".to_string()))?;

    let bytes = BASE64
        .decode(value)
        .map_err(|e| ProviderRequestError::InvalidSignature(format!("Invalid base64: {}", e)))?;
    let arr: [u8; 64] = bytes
        .try_into()
        .map_err(|_| ProviderRequestError::InvalidSignature("Signature must be 64 bytes".to_string()))?;
    Ok(Signature::from_bytes(&arr))
}

/// Verify a signed response from a provider.
///
/// Rebuilds the signature base from the covered components the provider
/// declared and verifies the Ed25519 signature with the provider's key.
/// The `created` parameter must fall within `max_skew_secs` of now.
pub fn verify_response(
    status: u16,
    content_digest_header: &str,
    signature_input_header: &str,
    signature_header: &str,
    provider_key: &VerifyingKey,
    max_skew_secs: i64,
) -> Result<(), ProviderRequestError> {
    let input = parse_signature_input(signature_input_header)?;
    let signature = parse_signature(signature_header)?;

    // Reject stale or future-dated signatures
    if let Some(created) = extract_created(&input.params) {
        let now = created_now();
        if (now - created).abs() > max_skew_secs {
            return Err(ProviderRequestError::InvalidSignature(format!(
                "Signature created={} outside allowed skew",
                created
            )));
        }
    }

    let status_str = status.to_string();
    let mut covered: Vec<(&str, &str)> = Vec::new();
    for component in &input.components {
        match component.as_str() {
            "@status" => covered.push(("@status", &status_str)),
            "content-digest" => covered.push(("content-digest", content_digest_header)),
            other => {
                return Err(ProviderRequestError::InvalidSignature(format!(
                    "Unsupported covered component: {}",
                    other
                )))
            }
        }
    }

    let base = signature_base(&covered, &input.params);
    provider_key
        .verify(base.as_bytes(), &signature)
        .map_err(|_| ProviderRequestError::InvalidSignature("Verification failed".to_string()))
}

/// Sign a response the way a provider would. Used by tests to produce
/// verifiable provider responses.
pub fn sign_response(
    status: u16,
    body: &[u8],
    key: &SigningKey,
    key_id: &str,
    created: i64,
) -> SignatureHeaders {
    let digest = content_digest(body);
    let status_str = status.to_string();
    let params = signature_params(&["@status", "content-digest"], created, key_id);
    let base = signature_base(&[("@status", &status_str), ("content-digest", &digest)], &params);

    let signature: Signature = key.sign(base.as_bytes());

    SignatureHeaders {
        content_digest: digest,
        signature_input: format!("{}={}", SIG_LABEL, params),
        signature: format!("{}=:{}:", SIG_LABEL, BASE64.encode(signature.to_bytes())),
    }
}

/// Pull the `created` parameter out of the signature params string.
fn extract_created(params: &str) -> Option<i64> {
    params
        .split(';')
        .find_map(|p| p.trim().strip_prefix("created="))
        .and_then(|v| v.parse().ok())
}
