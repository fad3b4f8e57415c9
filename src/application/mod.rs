//! Application services: content, access, session, contact and the briefing wizard.

pub mod access;
pub mod backend;
pub mod clock;
pub mod contact;
pub mod content;
pub mod error;
pub mod mutation;
pub mod notify;
pub mod session;
pub mod wizard;
