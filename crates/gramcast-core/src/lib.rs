//! Core orchestration logic for gramcast: bulk broadcasts and member
//! migrations against a rate-limited messaging platform.
//!
//! This crate is intentionally framework-agnostic. Telegram lives behind
//! ports (traits) implemented in the adapter crate.

pub mod backoff;
pub mod broadcast;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod migrate;
pub mod orchestrator;
mod pacing;
pub mod platform;
pub mod quota;
pub mod registry;
pub mod schedule;

pub use errors::{Error, Result};
