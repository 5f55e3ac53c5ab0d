//! fasp-bridge - signed-protocol bridge to Fediverse Auxiliary Service Providers
//!
//! A FASP provider augments a fediverse server with trends, recommendations
//! or moderation signals. This crate implements the server side of that
//! pairing:
//!
//! - **Signed Request Client**: Ed25519 HTTP message signatures on every
//!   provider call, with response verification
//! - **Provider Registry**: registration, confirmation, key material,
//!   capability state
//! - **Capability Negotiation**: snapshot-diffed activation/deactivation
//!   calls, issued only on change
//! - **Backfill Cursor Engine**: descending-id pagination with a persisted
//!   exclusive cursor, terminal once exhausted
//! - **Subscription Thresholds**: trend/lifecycle criteria consumed by the
//!   dispatch paths

pub mod backfill;
pub mod client;
pub mod config;
pub mod keys;
pub mod provider;
pub mod signing;
pub mod store;
pub mod subscriptions;
pub mod types;
pub mod worker;

pub use config::Args;
pub use types::{FaspError, ProviderRequestError, Result};
