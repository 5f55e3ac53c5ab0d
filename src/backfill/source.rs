//! Record sources for backfill pagination.
//!
//! The cursor engine only needs two queries per category: a descending-id
//! page with a strict exclusive upper bound, and an existence probe below a
//! given id. The trait keeps the engine independent of where records
//! actually live; `InMemoryDataset` is the concurrent in-process
//! implementation used by the bridge and its tests.

use dashmap::DashMap;

use super::Category;

/// One exportable record: a monotonically increasing id (snowflake-style)
/// plus the canonical federation URI handed to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: u64,
    pub uri: String,
}

/// Category-scoped record queries the cursor engine paginates over.
pub trait BackfillSource: Send + Sync {
    /// Eligible records for `category` with id strictly below `before` (no
    /// bound when `None`), ordered by id descending, at most `limit`.
    fn page(&self, category: Category, before: Option<u64>, limit: usize) -> Vec<Record>;

    /// Whether at least one eligible record exists with id strictly below
    /// `id`. Existence only; never counts.
    fn exists_below(&self, category: Category, id: u64) -> bool;
}

/// An account eligible for export only when discoverable and not the
/// instance service actor.
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub id: u64,
    pub uri: String,
    pub discoverable: bool,
    pub instance_actor: bool,
}

/// A status eligible for export only when its author opted into indexing.
#[derive(Debug, Clone)]
pub struct StatusRecord {
    pub id: u64,
    pub uri: String,
    pub indexable: bool,
}

/// Concurrent in-memory dataset of accounts and statuses.
pub struct InMemoryDataset {
    accounts: DashMap<u64, AccountRecord>,
    statuses: DashMap<u64, StatusRecord>,
}

impl InMemoryDataset {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            statuses: DashMap::new(),
        }
    }

    pub fn insert_account(&self, account: AccountRecord) {
        self.accounts.insert(account.id, account);
    }

    pub fn insert_status(&self, status: StatusRecord) {
        self.statuses.insert(status.id, status);
    }

    pub fn remove_account(&self, id: u64) {
        self.accounts.remove(&id);
    }

    pub fn remove_status(&self, id: u64) {
        self.statuses.remove(&id);
    }

    /// Eligible record (id, uri) pairs for a category, unordered.
    fn eligible(&self, category: Category) -> Vec<Record> {
        match category {
            Category::Account => self
                .accounts
                .iter()
                .filter(|a| a.discoverable && !a.instance_actor)
                .map(|a| Record {
                    id: a.id,
                    uri: a.uri.clone(),
                })
                .collect(),
            Category::Content => self
                .statuses
                .iter()
                .filter(|s| s.indexable)
                .map(|s| Record {
                    id: s.id,
                    uri: s.uri.clone(),
                })
                .collect(),
        }
    }
}

impl Default for InMemoryDataset {
    fn default() -> Self {
        Self::new()
    }
}

impl BackfillSource for InMemoryDataset {
    fn page(&self, category: Category, before: Option<u64>, limit: usize) -> Vec<Record> {
        let mut records = self.eligible(category);
        if let Some(bound) = before {
            records.retain(|r| r.id < bound);
        }
        records.sort_by(|a, b| b.id.cmp(&a.id));
        records.truncate(limit);
        records
    }

    fn exists_below(&self, category: Category, id: u64) -> bool {
        self.eligible(category).iter().any(|r| r.id < id)
    }
}
