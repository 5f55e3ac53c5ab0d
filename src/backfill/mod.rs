//! Backfill requests: cursor-paginated historical export to a provider.
//!
//! A provider that subscribes to a data category receives the existing
//! records in descending-id pages. Each request tracks one sweep: the
//! category, the page size, an opaque cursor marking the last id already
//! handed out, and a terminal `fulfilled` flag.

pub mod engine;
pub mod source;

pub use engine::Fulfillment;
pub use source::{BackfillSource, InMemoryDataset, Record};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{FaspError, Result};

/// Default page size for a backfill request
pub const DEFAULT_MAX_COUNT: usize = 100;

/// Data category a backfill covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Discoverable, non-instance-actor accounts
    Account,
    /// Indexable statuses
    Content,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Account => "account",
            Category::Content => "content",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One backfill sweep for one provider and category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillRequest {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub category: Category,

    /// Id of the last object returned in the most recently consumed page,
    /// as an opaque string. Exclusive upper bound for the next page.
    pub cursor: Option<String>,

    /// Page size, must be positive
    pub max_count: usize,

    /// Terminal: once true, no further pagination occurs
    pub fulfilled: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BackfillRequest {
    /// Create a new pending request. `max_count` of zero is rejected here,
    /// before anything is persisted.
    pub fn new(provider_id: Uuid, category: Category, max_count: usize) -> Result<Self> {
        if max_count == 0 {
            return Err(FaspError::Validation("max_count must be positive".to_string()));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            provider_id,
            category,
            cursor: None,
            max_count,
            fulfilled: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Parse the opaque cursor back into a record id.
    pub fn cursor_id(&self) -> Result<Option<u64>> {
        match &self.cursor {
            None => Ok(None),
            Some(raw) => raw
                .parse::<u64>()
                .map(Some)
                .map_err(|_| FaspError::InvalidCursor(raw.clone())),
        }
    }
}
