//! Provider records: identity, trust, and capability state.
//!
//! A provider record holds everything this server knows about one auxiliary
//! service: its base URL, the keypair this server generated for it at
//! registration, the provider's own public key, its confirmation state, and
//! its declared capabilities. Nothing signed is ever sent to a provider that
//! has not been confirmed.

pub mod capability;
pub mod registry;

pub use capability::{diff_capabilities, Capability, CapabilityAction, CapabilityChange};
pub use registry::ProviderRegistry;

use chrono::{DateTime, Utc};
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::keys;
use crate::types::{FaspError, Result};

/// A registered auxiliary service provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    /// Local record id
    pub id: Uuid,

    /// Provider's base URL; all protocol paths are resolved against it
    pub base_url: String,

    /// Human-readable provider name
    pub name: String,

    /// Opaque identifier the provider assigned to this server during
    /// registration; used as the signature keyid
    pub remote_identifier: String,

    /// Base64 secret key of the Ed25519 keypair this server generated for
    /// this provider (exclusively owned by this record)
    pub server_key: String,

    /// Base64 public key the provider supplied out-of-band
    pub provider_public_key: String,

    /// Until confirmed, no signed call is attempted and capability checks
    /// report false
    pub confirmed: bool,

    /// Ordered capability list as last persisted
    pub capabilities: Vec<Capability>,

    /// Privacy policy document from /provider_info
    pub privacy_policy: Option<JsonValue>,

    pub contact_email: Option<String>,
    pub fediverse_account: Option<String>,
    pub sign_in_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response body of `GET /provider_info`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    #[serde(default)]
    pub privacy_policy: Option<JsonValue>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub sign_in_url: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub fediverse_account: Option<String>,
}

impl Provider {
    /// Create a new unconfirmed provider with a freshly generated keypair.
    pub fn new(
        base_url: impl Into<String>,
        name: impl Into<String>,
        remote_identifier: impl Into<String>,
        provider_public_key_b64: &str,
    ) -> Result<Self> {
        let base_url = base_url.into();
        if base_url.is_empty() {
            return Err(FaspError::Validation("base_url is required".to_string()));
        }

        // Reject undecodable key material at creation, never persist it
        keys::decode_public_key(provider_public_key_b64)?;

        let server_key = keys::generate_keypair();
        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4(),
            base_url,
            name: name.into(),
            remote_identifier: remote_identifier.into(),
            server_key: keys::encode_signing_key(&server_key),
            provider_public_key: provider_public_key_b64.to_string(),
            confirmed: false,
            capabilities: Vec::new(),
            privacy_policy: None,
            contact_email: None,
            fediverse_account: None,
            sign_in_url: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Resolve a protocol path against the base URL.
    ///
    /// Contract: when `path` starts with `/`, trailing slashes are stripped
    /// from the base URL before concatenation so no `//` appears. Any other
    /// path is concatenated directly, unmodified.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url.trim_end_matches('/'), path)
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// Whether this provider declares a capability, regardless of its
    /// enabled state. Always false for unconfirmed providers.
    pub fn capability(&self, id: &str) -> bool {
        self.confirmed && self.capabilities.iter().any(|c| c.id == id)
    }

    /// Whether this provider declares a capability with `enabled == true`.
    /// Always false for unconfirmed providers.
    pub fn capability_enabled(&self, id: &str) -> bool {
        self.confirmed && self.capabilities.iter().any(|c| c.id == id && c.is_enabled())
    }

    /// Decode the server-side signing key for this provider.
    pub fn signing_key(&self) -> Result<SigningKey> {
        keys::decode_signing_key(&self.server_key)
    }

    /// Decode the provider's public key.
    pub fn provider_key(&self) -> Result<VerifyingKey> {
        keys::decode_public_key(&self.provider_public_key)
    }

    /// Base64 of this server's public key, shown to the provider operator.
    pub fn server_public_key_base64(&self) -> Result<String> {
        Ok(keys::encode_public_key(&self.signing_key()?.verifying_key()))
    }

    /// Base64 SHA-256 fingerprint of the provider's public key, for manual
    /// verification tooling.
    pub fn provider_public_key_fingerprint(&self) -> Result<String> {
        Ok(keys::fingerprint(&self.provider_key()?))
    }

    /// Replace the provider public key from its base64 form.
    pub fn set_provider_public_key_base64(&mut self, encoded: &str) -> Result<()> {
        keys::decode_public_key(encoded)?;
        self.provider_public_key = encoded.to_string();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Apply a fetched /provider_info document to this record.
    ///
    /// Enabled flags already recorded locally survive the refresh: the remote
    /// document describes what the provider offers, not what we activated.
    pub fn apply_info(&mut self, info: ProviderInfo) {
        let previous = std::mem::take(&mut self.capabilities);

        self.capabilities = info
            .capabilities
            .into_iter()
            .map(|mut cap| {
                if cap.enabled.is_none() {
                    if let Some(existing) = previous.iter().find(|c| c.id == cap.id) {
                        cap.enabled = existing.enabled;
                    }
                }
                cap
            })
            .collect();

        self.privacy_policy = info.privacy_policy;
        self.sign_in_url = info.sign_in_url;
        self.contact_email = info.contact_email;
        self.fediverse_account = info.fediverse_account;
        self.updated_at = Utc::now();
    }
}
