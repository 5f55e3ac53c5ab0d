//! Subscription threshold records.
//!
//! A confirmed provider can subscribe to lifecycle or trend events for a
//! data category. The record is a plain value holder: batch size plus the
//! engagement thresholds the dispatch paths consult, with one derived
//! computation (the start of the qualifying timeframe).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backfill::Category;
use crate::types::{FaspError, Result};

/// Kind of event stream a subscription covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionType {
    /// Create/update/delete notifications
    Lifecycle,
    /// Engagement-threshold trend candidates
    Trends,
}

impl SubscriptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionType::Lifecycle => "lifecycle",
            SubscriptionType::Trends => "trends",
        }
    }
}

/// Engagement thresholds for trend subscriptions
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    /// Qualifying window in minutes
    pub timeframe: i64,
    pub shares: u32,
    pub likes: u32,
    pub replies: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            timeframe: 15,
            shares: 3,
            likes: 3,
            replies: 3,
        }
    }
}

/// One provider subscription for one category and stream type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub category: Category,
    pub subscription_type: SubscriptionType,
    pub max_batch_size: usize,
    pub thresholds: Thresholds,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(
        provider_id: Uuid,
        category: Category,
        subscription_type: SubscriptionType,
        max_batch_size: usize,
        thresholds: Thresholds,
    ) -> Result<Self> {
        if max_batch_size == 0 {
            return Err(FaspError::Validation("max_batch_size must be positive".to_string()));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            provider_id,
            category,
            subscription_type,
            max_batch_size,
            thresholds,
            created_at: Utc::now(),
        })
    }

    /// Build a subscription from wire-level string parameters. Unknown
    /// category or subscription type strings surface as creation failures,
    /// never as panics at the protocol boundary.
    pub fn from_params(
        provider_id: Uuid,
        category: &str,
        subscription_type: &str,
        max_batch_size: usize,
        thresholds: Option<Thresholds>,
    ) -> Result<Self> {
        let category = parse_category(category)?;
        let subscription_type = parse_subscription_type(subscription_type)?;
        Self::new(
            provider_id,
            category,
            subscription_type,
            max_batch_size,
            thresholds.unwrap_or_default(),
        )
    }

    /// Lower time bound for qualifying engagement events.
    pub fn timeframe_start(&self) -> DateTime<Utc> {
        self.timeframe_start_at(Utc::now())
    }

    fn timeframe_start_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::minutes(self.thresholds.timeframe)
    }
}

fn parse_category(raw: &str) -> Result<Category> {
    match raw {
        "account" => Ok(Category::Account),
        "content" => Ok(Category::Content),
        other => Err(FaspError::Validation(format!("Unknown category: {}", other))),
    }
}

fn parse_subscription_type(raw: &str) -> Result<SubscriptionType> {
    match raw {
        "lifecycle" => Ok(SubscriptionType::Lifecycle),
        "trends" => Ok(SubscriptionType::Trends),
        other => Err(FaspError::Validation(format!("Unknown subscription type: {}", other))),
    }
}
