//! The briefing wizard: stage navigation, validation and channel hand-off.

mod controller;
mod delivery;
mod summary;

pub use controller::{SubmitOutcome, WizardController, WizardError};
pub use delivery::{
    Channel, ChannelLauncher, Launch, LaunchKind, RecordingLauncher, mailto_link, scheduler_link,
    whatsapp_link,
};
pub use summary::format_summary;
