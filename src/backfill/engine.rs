//! Backfill cursor engine.
//!
//! Drives one fulfillment step of a backfill request: compute the current
//! page (descending ids, strictly below the persisted cursor), hand its
//! URIs to the provider, then advance the cursor exactly once. Because ids
//! only grow over time, the strict `id < cursor` bound guarantees no record
//! is skipped by concurrent inserts above the cursor and no record is
//! returned twice.
//!
//! A `Fulfillment` memoizes its page; it is built fresh for every step.
//! Calling `advance` twice on the same instance consumes two pages, so one
//! step must never advance more than once.

use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::source::{BackfillSource, Record};
use super::BackfillRequest;
use crate::client::{ClientConfig, SignedRequestClient};
use crate::store::{BackfillStore, ProviderStore};
use crate::types::Result;

/// Outcome of one `advance` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Cursor moved to the id of the last object in the consumed page
    Advanced { cursor: String },
    /// No unseen records remained; request is now terminal
    Fulfilled,
    /// Request was already terminal; nothing changed
    AlreadyFulfilled,
}

/// One fulfillment step over a backfill request
pub struct Fulfillment<'a> {
    request: BackfillRequest,
    source: &'a dyn BackfillSource,
    page: Option<Vec<Record>>,
}

impl<'a> Fulfillment<'a> {
    pub fn new(request: BackfillRequest, source: &'a dyn BackfillSource) -> Self {
        Self {
            request,
            source,
            page: None,
        }
    }

    pub fn request(&self) -> &BackfillRequest {
        &self.request
    }

    /// The current page: category scope, `id < cursor` when one is set,
    /// descending, at most `max_count`. Computed once per instance.
    pub fn next_objects(&mut self) -> Result<&[Record]> {
        if self.page.is_none() {
            let before = self.request.cursor_id()?;
            let page = self
                .source
                .page(self.request.category, before, self.request.max_count);
            self.page = Some(page);
        }
        Ok(self.page.as_deref().unwrap_or_default())
    }

    /// Canonical federation URIs of the current page, the payload actually
    /// handed to the provider.
    pub fn next_uris(&mut self) -> Result<Vec<String>> {
        Ok(self
            .next_objects()?
            .iter()
            .map(|r| r.uri.clone())
            .collect())
    }

    /// Whether any unseen record exists strictly below the current page.
    /// Existence probe only; an empty page means no.
    pub fn more_objects_available(&mut self) -> Result<bool> {
        let category = self.request.category;
        let last_id = match self.next_objects()?.last() {
            Some(record) => record.id,
            None => return Ok(false),
        };
        Ok(self.source.exists_below(category, last_id))
    }

    /// Consume the current page: persist the cursor at its last id, or mark
    /// the request fulfilled when nothing remains below it. A fulfilled
    /// request is terminal and advancing it is a no-op.
    pub fn advance(&mut self, store: &BackfillStore) -> Result<AdvanceOutcome> {
        if self.request.fulfilled {
            return Ok(AdvanceOutcome::AlreadyFulfilled);
        }

        if self.more_objects_available()? {
            let last_id = self
                .next_objects()?
                .last()
                .map(|r| r.id)
                .unwrap_or_default();
            let cursor = last_id.to_string();

            store.update(self.request.id, |r| {
                r.cursor = Some(cursor.clone());
                r.updated_at = chrono::Utc::now();
            })?;
            self.request.cursor = Some(cursor.clone());
            // Page is stale now; the next step builds a new Fulfillment
            self.page = None;

            Ok(AdvanceOutcome::Advanced { cursor })
        } else {
            store.update(self.request.id, |r| {
                r.fulfilled = true;
                r.updated_at = chrono::Utc::now();
            })?;
            self.request.fulfilled = true;

            Ok(AdvanceOutcome::Fulfilled)
        }
    }
}

/// Run one fulfillment step for a stored request: announce the current page
/// to the provider, then advance the cursor.
///
/// The announcement happens before any cursor mutation, so a network
/// failure leaves the request untouched and the scheduler may retry the
/// step safely.
pub async fn run_fulfillment_step(
    providers: &ProviderStore,
    backfills: &BackfillStore,
    source: &dyn BackfillSource,
    client_config: &ClientConfig,
    request_id: Uuid,
) -> Result<AdvanceOutcome> {
    let request = backfills.get(request_id)?;
    if request.fulfilled {
        debug!(request_id = %request_id, "Backfill request already fulfilled, skipping");
        return Ok(AdvanceOutcome::AlreadyFulfilled);
    }

    let provider = providers.get(request.provider_id)?;
    let client = SignedRequestClient::for_provider(&provider, client_config)?;

    let mut fulfillment = Fulfillment::new(request, source);
    let uris = fulfillment.next_uris()?;
    let more = fulfillment.more_objects_available()?;

    if !uris.is_empty() {
        let announcement = json!({
            "source": { "backfillRequest": { "id": request_id } },
            "category": fulfillment.request().category,
            "objectUris": uris,
            "moreObjectsAvailable": more,
        });
        client
            .post("/data_sharing/v0/announcements", Some(&announcement))
            .await?;
    }

    let outcome = fulfillment.advance(backfills)?;
    match &outcome {
        AdvanceOutcome::Advanced { cursor } => {
            debug!(request_id = %request_id, cursor = %cursor, "Backfill page consumed");
        }
        AdvanceOutcome::Fulfilled => {
            info!(request_id = %request_id, "Backfill request fulfilled");
        }
        AdvanceOutcome::AlreadyFulfilled => {
            warn!(request_id = %request_id, "Backfill request became terminal mid-step");
        }
    }
    Ok(outcome)
}
