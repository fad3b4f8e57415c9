//! Domain layer types and invariants.

pub mod access;
pub mod analytics;
pub mod briefing;
pub mod entities;
pub mod error;
pub mod slug;
pub mod types;
