//! In-memory record stores with concurrent access.
//!
//! Providers, backfill requests and subscriptions live in dashmap-backed
//! stores. Updates run under the entry lock, so a capability diff or a
//! cursor write always sees the last-committed record and two racing
//! updates cannot be lost.

use dashmap::DashMap;
use uuid::Uuid;

use crate::backfill::BackfillRequest;
use crate::provider::Provider;
use crate::subscriptions::Subscription;
use crate::types::{FaspError, Result};

/// Store of registered providers
pub struct ProviderStore {
    providers: DashMap<Uuid, Provider>,
}

impl ProviderStore {
    pub fn new() -> Self {
        Self {
            providers: DashMap::new(),
        }
    }

    pub fn insert(&self, provider: Provider) -> Uuid {
        let id = provider.id;
        self.providers.insert(id, provider);
        id
    }

    pub fn get(&self, id: Uuid) -> Result<Provider> {
        self.providers
            .get(&id)
            .map(|p| p.clone())
            .ok_or_else(|| FaspError::ProviderNotFound(id.to_string()))
    }

    /// Apply a mutation under the entry lock and return the closure's
    /// result. The closure sees the last-committed state of the record.
    pub fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut Provider) -> R) -> Result<R> {
        let mut entry = self
            .providers
            .get_mut(&id)
            .ok_or_else(|| FaspError::ProviderNotFound(id.to_string()))?;
        Ok(f(entry.value_mut()))
    }

    pub fn remove(&self, id: Uuid) -> Option<Provider> {
        self.providers.remove(&id).map(|(_, p)| p)
    }
}

impl Default for ProviderStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Store of backfill requests
pub struct BackfillStore {
    requests: DashMap<Uuid, BackfillRequest>,
}

impl BackfillStore {
    pub fn new() -> Self {
        Self {
            requests: DashMap::new(),
        }
    }

    pub fn insert(&self, request: BackfillRequest) -> Uuid {
        let id = request.id;
        self.requests.insert(id, request);
        id
    }

    pub fn get(&self, id: Uuid) -> Result<BackfillRequest> {
        self.requests
            .get(&id)
            .map(|r| r.clone())
            .ok_or_else(|| FaspError::BackfillRequestNotFound(id.to_string()))
    }

    /// Apply a mutation under the entry lock.
    pub fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut BackfillRequest) -> R) -> Result<R> {
        let mut entry = self
            .requests
            .get_mut(&id)
            .ok_or_else(|| FaspError::BackfillRequestNotFound(id.to_string()))?;
        Ok(f(entry.value_mut()))
    }

    pub fn list_for_provider(&self, provider_id: Uuid) -> Vec<BackfillRequest> {
        self.requests
            .iter()
            .filter(|r| r.provider_id == provider_id)
            .map(|r| r.clone())
            .collect()
    }

    pub fn remove_for_provider(&self, provider_id: Uuid) -> usize {
        let before = self.requests.len();
        self.requests.retain(|_, r| r.provider_id != provider_id);
        before - self.requests.len()
    }
}

impl Default for BackfillStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Store of provider subscriptions
pub struct SubscriptionStore {
    subscriptions: DashMap<Uuid, Subscription>,
}

impl SubscriptionStore {
    pub fn new() -> Self {
        Self {
            subscriptions: DashMap::new(),
        }
    }

    pub fn insert(&self, subscription: Subscription) -> Uuid {
        let id = subscription.id;
        self.subscriptions.insert(id, subscription);
        id
    }

    pub fn list_for_provider(&self, provider_id: Uuid) -> Vec<Subscription> {
        self.subscriptions
            .iter()
            .filter(|s| s.provider_id == provider_id)
            .map(|s| s.clone())
            .collect()
    }

    pub fn remove_for_provider(&self, provider_id: Uuid) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|_, s| s.provider_id != provider_id);
        before - self.subscriptions.len()
    }
}

impl Default for SubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backfill::Category;
    use crate::keys::{encode_public_key, generate_keypair};

    fn test_provider() -> Provider {
        Provider::new(
            "https://fasp.example.com",
            "Test",
            "remote-1",
            &encode_public_key(&generate_keypair().verifying_key()),
        )
        .unwrap()
    }

    #[test]
    fn test_provider_store_crud() {
        let store = ProviderStore::new();
        let id = store.insert(test_provider());

        assert_eq!(store.get(id).unwrap().name, "Test");

        store.update(id, |p| p.confirmed = true).unwrap();
        assert!(store.get(id).unwrap().confirmed);

        assert!(store.remove(id).is_some());
        assert!(matches!(store.get(id), Err(FaspError::ProviderNotFound(_))));
    }

    #[test]
    fn test_update_missing_provider() {
        let store = ProviderStore::new();
        let result = store.update(Uuid::new_v4(), |p| p.confirmed = true);
        assert!(matches!(result, Err(FaspError::ProviderNotFound(_))));
    }

    #[test]
    fn test_update_returns_closure_result() {
        let store = ProviderStore::new();
        let id = store.insert(test_provider());
        let old_name = store
            .update(id, |p| {
                let old = p.name.clone();
                p.name = "Renamed".to_string();
                old
            })
            .unwrap();
        assert_eq!(old_name, "Test");
        assert_eq!(store.get(id).unwrap().name, "Renamed");
    }

    #[test]
    fn test_backfill_store_scoped_by_provider() {
        let store = BackfillStore::new();
        let provider_a = Uuid::new_v4();
        let provider_b = Uuid::new_v4();

        store.insert(BackfillRequest::new(provider_a, Category::Account, 10).unwrap());
        store.insert(BackfillRequest::new(provider_a, Category::Content, 10).unwrap());
        store.insert(BackfillRequest::new(provider_b, Category::Account, 10).unwrap());

        assert_eq!(store.list_for_provider(provider_a).len(), 2);
        assert_eq!(store.remove_for_provider(provider_a), 2);
        assert_eq!(store.list_for_provider(provider_a).len(), 0);
        assert_eq!(store.list_for_provider(provider_b).len(), 1);
    }
}
