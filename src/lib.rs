//! Cached content access, admin approvals and the project briefing wizard for
//! an agency site backed by a hosted Postgres REST service.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
