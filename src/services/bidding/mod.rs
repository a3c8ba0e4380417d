//! Competitive bidding engine
//!
//! Layered as pure functions feeding a stateful orchestrator:
//!
//! - `calculators` — money math (minimum increments, compensation splits)
//! - `rules` — validation and policy predicates over session snapshots
//! - `processors` — auto-bid counters and winner determination
//! - `service` — persistence, per-session locking, cascade, settlement
//!
//! Everything below `service` is side-effect free and unit tested in
//! isolation.

pub mod calculators;
pub mod processors;
pub mod rules;
pub mod service;
pub mod types;

pub use service::BiddingService;
pub use types::{BiddingConfig, BiddingError};
