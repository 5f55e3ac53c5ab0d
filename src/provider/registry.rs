//! Provider registry: registration, confirmation, capability sync.
//!
//! The registry is the only writer of provider state. Capability changes go
//! through an explicit before/after snapshot taken under the record lock,
//! so each enabled-flag change issues exactly one remote activation or
//! deactivation call and reapplying an identical list issues none.

use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backfill::{BackfillRequest, Category};
use crate::client::{ClientConfig, SignedRequestClient};
use crate::store::{BackfillStore, ProviderStore, SubscriptionStore};
use crate::subscriptions::{Subscription, Thresholds};
use crate::types::{FaspError, Result};
use crate::worker::{Job, JobQueue};

use super::capability::{diff_capabilities, Capability, CapabilityAction, CapabilityChange};
use super::{Provider, ProviderInfo};

/// Parameters of an inbound provider registration
#[derive(Debug, Clone)]
pub struct CreateProviderParams {
    pub base_url: String,
    pub name: String,
    pub remote_identifier: String,
    /// Base64 Ed25519 public key the provider supplied
    pub provider_public_key: String,
    /// Registrations may arrive pre-confirmed (e.g. operator-initiated)
    pub confirmed: bool,
}

/// Key material shown to operators after registration, for out-of-band
/// verification against what the provider displays.
#[derive(Debug, Clone)]
pub struct RegistrationDisplay {
    pub server_public_key_base64: String,
    pub provider_public_key_fingerprint: String,
}

pub struct ProviderRegistry {
    providers: Arc<ProviderStore>,
    backfills: Arc<BackfillStore>,
    subscriptions: Arc<SubscriptionStore>,
    jobs: JobQueue,
    client_config: ClientConfig,
    /// Page size applied to backfill requests that do not specify one
    default_max_count: usize,
}

impl ProviderRegistry {
    pub fn new(
        providers: Arc<ProviderStore>,
        backfills: Arc<BackfillStore>,
        subscriptions: Arc<SubscriptionStore>,
        jobs: JobQueue,
        client_config: ClientConfig,
        default_max_count: usize,
    ) -> Self {
        Self {
            providers,
            backfills,
            subscriptions,
            jobs,
            client_config,
            default_max_count,
        }
    }

    /// Register a provider: generate this server's keypair, persist the
    /// record, then schedule the async info fetch.
    pub fn create_provider(&self, params: CreateProviderParams) -> Result<Provider> {
        let mut provider = Provider::new(
            params.base_url,
            params.name,
            params.remote_identifier,
            &params.provider_public_key,
        )?;
        provider.confirmed = params.confirmed;

        let provider_id = self.providers.insert(provider.clone());
        info!(
            provider_id = %provider_id,
            base_url = %provider.base_url,
            confirmed = provider.confirmed,
            "Provider registered"
        );

        self.jobs.enqueue(Job::FetchProviderInfo { provider_id })?;
        Ok(provider)
    }

    /// Confirm a provider and re-run the info fetch.
    pub fn confirm(&self, provider_id: Uuid) -> Result<Provider> {
        let provider = self.providers.update(provider_id, |p| {
            p.confirmed = true;
            p.updated_at = chrono::Utc::now();
            p.clone()
        })?;

        info!(provider_id = %provider_id, "Provider confirmed");
        self.jobs.enqueue(Job::FetchProviderInfo { provider_id })?;
        Ok(provider)
    }

    pub fn get(&self, provider_id: Uuid) -> Result<Provider> {
        self.providers.get(provider_id)
    }

    /// Key material for the operator-facing registration screen.
    pub fn registration_display(&self, provider_id: Uuid) -> Result<RegistrationDisplay> {
        let provider = self.providers.get(provider_id)?;
        Ok(RegistrationDisplay {
            server_public_key_base64: provider.server_public_key_base64()?,
            provider_public_key_fingerprint: provider.provider_public_key_fingerprint()?,
        })
    }

    /// Fetch /provider_info and apply it to the record. Runs during
    /// registration (before confirmation, so the gate is bypassed here and
    /// only here) and again after confirmation.
    pub async fn fetch_provider_info(&self, provider_id: Uuid) -> Result<Provider> {
        let provider = self.providers.get(provider_id)?;
        let client = SignedRequestClient::for_registration(&provider, &self.client_config)?;

        let body = client.get("/provider_info").await?;
        let info: ProviderInfo = serde_json::from_value(body)
            .map_err(|e| FaspError::Validation(format!("Invalid provider_info: {}", e)))?;

        self.providers.update(provider_id, |p| {
            p.apply_info(info);
            p.clone()
        })
    }

    /// Replace the capability list and issue the implied remote calls.
    ///
    /// The old list is snapshotted under the record lock, so racing updates
    /// cannot both observe the same prior state. Remote call failures leave
    /// the local flags as attempted: the enabled flag records intent, not
    /// confirmed remote state.
    pub async fn set_capabilities(
        &self,
        provider_id: Uuid,
        capabilities: Vec<Capability>,
    ) -> Result<Vec<CapabilityChange>> {
        let (provider, changes) = self.providers.update(provider_id, |p| {
            let old = std::mem::replace(&mut p.capabilities, capabilities);
            let changes = diff_capabilities(&old, &p.capabilities);
            p.updated_at = chrono::Utc::now();
            (p.clone(), changes)
        })?;

        if changes.is_empty() {
            debug!(provider_id = %provider_id, "Capability list unchanged, no remote calls");
            return Ok(changes);
        }

        if !provider.confirmed {
            warn!(
                provider_id = %provider_id,
                "Capability flags changed on unconfirmed provider, remote sync skipped"
            );
            return Ok(changes);
        }

        let client = SignedRequestClient::for_provider(&provider, &self.client_config)?;
        for change in &changes {
            let path = change.capability.activation_path();
            let result = match change.action {
                CapabilityAction::Activate => client.post(&path, None).await,
                CapabilityAction::Deactivate => client.delete(&path).await,
            };
            match result {
                Ok(_) => {
                    info!(
                        provider_id = %provider_id,
                        capability = %change.capability.id,
                        action = ?change.action,
                        "Capability synced with provider"
                    );
                }
                Err(e) => {
                    // Local state keeps the attempted flag; operators see
                    // the failure here
                    error!(
                        provider_id = %provider_id,
                        capability = %change.capability.id,
                        action = ?change.action,
                        error = %e,
                        "Capability sync call failed"
                    );
                }
            }
        }

        Ok(changes)
    }

    /// Create a backfill request for a confirmed provider and schedule
    /// exactly one fulfillment step. A request without an explicit
    /// `max_count` gets the configured default page size.
    pub fn create_backfill_request(
        &self,
        provider_id: Uuid,
        category: Category,
        max_count: Option<usize>,
    ) -> Result<BackfillRequest> {
        let provider = self.providers.get(provider_id)?;
        if !provider.confirmed {
            return Err(FaspError::ProviderNotConfirmed(provider_id.to_string()));
        }

        let max_count = max_count.unwrap_or(self.default_max_count);
        let request = BackfillRequest::new(provider_id, category, max_count)?;
        let request_id = self.backfills.insert(request.clone());

        info!(
            provider_id = %provider_id,
            request_id = %request_id,
            category = %category,
            max_count = max_count,
            "Backfill request created"
        );

        self.jobs.enqueue(Job::FulfillBackfill { request_id, attempt: 0 })?;
        Ok(request)
    }

    /// Provider callback after consuming a page: schedule the next step.
    /// A terminal request is a no-op.
    pub fn continue_backfill(&self, request_id: Uuid) -> Result<()> {
        let request = self.backfills.get(request_id)?;
        if request.fulfilled {
            debug!(request_id = %request_id, "Continuation on fulfilled request ignored");
            return Ok(());
        }
        self.jobs.enqueue(Job::FulfillBackfill { request_id, attempt: 0 })
    }

    /// Create a subscription for a confirmed provider. Category and type
    /// strings come off the wire and are validated here.
    pub fn create_subscription(
        &self,
        provider_id: Uuid,
        category: &str,
        subscription_type: &str,
        max_batch_size: usize,
        thresholds: Option<Thresholds>,
    ) -> Result<Subscription> {
        let provider = self.providers.get(provider_id)?;
        if !provider.confirmed {
            return Err(FaspError::ProviderNotConfirmed(provider_id.to_string()));
        }

        let subscription = Subscription::from_params(
            provider_id,
            category,
            subscription_type,
            max_batch_size,
            thresholds,
        )?;
        self.subscriptions.insert(subscription.clone());

        info!(
            provider_id = %provider_id,
            subscription_id = %subscription.id,
            category = %subscription.category,
            subscription_type = subscription.subscription_type.as_str(),
            "Subscription created"
        );
        Ok(subscription)
    }

    /// Remove a provider and everything scoped to it. Confirmed providers
    /// get a best-effort signed deregistration call first; its failure does
    /// not block removal.
    pub async fn delete_provider(&self, provider_id: Uuid) -> Result<()> {
        let provider = self.providers.get(provider_id)?;

        if provider.confirmed {
            match SignedRequestClient::for_provider(&provider, &self.client_config) {
                Ok(client) => {
                    if let Err(e) = client.delete("/registration").await {
                        warn!(provider_id = %provider_id, error = %e, "Deregistration call failed");
                    }
                }
                Err(e) => {
                    warn!(provider_id = %provider_id, error = %e, "Could not build deregistration client");
                }
            }
        }

        let backfills = self.backfills.remove_for_provider(provider_id);
        let subscriptions = self.subscriptions.remove_for_provider(provider_id);
        self.providers.remove(provider_id);

        info!(
            provider_id = %provider_id,
            backfills_removed = backfills,
            subscriptions_removed = subscriptions,
            "Provider deleted"
        );
        Ok(())
    }
}
