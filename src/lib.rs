//! Discussion harvester library.
//!
//! Harvests discussion threads from a paginated group listing with a fixed
//! pool of workers, keeps the ones whose titles match configured patterns,
//! suppresses duplicates, and optionally enriches them from each thread's
//! own page.

pub mod aggregate;
pub mod config;
pub mod constants;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod filter;
pub mod models;
pub mod pipeline;
pub mod scheduler;
pub mod sink;

pub use aggregate::{AggregateResult, ErrorSummary};
pub use error::HarvestError;
pub use models::DiscussionRecord;
