//! Hand-off links for a finished briefing and the port that opens them.

use std::sync::Mutex;

use url::Url;

use crate::cache::lock::mutex_lock;
use crate::domain::types::Locale;

const SOURCE: &str = "application::wizard::delivery";

/// External channels a briefing can be handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    WhatsApp,
    Email,
    /// Embedded scheduling widget, shown in place of the form.
    Scheduler,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::WhatsApp => "whatsapp",
            Channel::Email => "email",
            Channel::Scheduler => "scheduler",
        }
    }
}

/// Opens hand-off links. Delivery is not confirmed; the link is opened and
/// the user finishes in the other application.
pub trait ChannelLauncher: Send + Sync {
    fn open_in_new_window(&self, url: &Url);
    fn navigate(&self, url: &Url);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchKind {
    NewWindow,
    Navigate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub kind: LaunchKind,
    pub url: Url,
}

/// Keeps every launch instead of opening it.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    launches: Mutex<Vec<Launch>>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn launches(&self) -> Vec<Launch> {
        mutex_lock(&self.launches, SOURCE, "launches").clone()
    }

    fn record(&self, kind: LaunchKind, url: &Url) {
        mutex_lock(&self.launches, SOURCE, "record").push(Launch {
            kind,
            url: url.clone(),
        });
    }
}

impl ChannelLauncher for RecordingLauncher {
    fn open_in_new_window(&self, url: &Url) {
        self.record(LaunchKind::NewWindow, url);
    }

    fn navigate(&self, url: &Url) {
        self.record(LaunchKind::Navigate, url);
    }
}

/// `https://wa.me/<number>?text=<summary>`
pub fn whatsapp_link(number: &str, summary: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!(
        "https://wa.me/{number}?text={}",
        urlencoding::encode(summary)
    ))
}

/// `mailto:<recipient>?subject=<subject>&body=<summary>`
pub fn mailto_link(recipient: &str, subject: &str, summary: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!(
        "mailto:{recipient}?subject={}&body={}",
        urlencoding::encode(subject),
        urlencoding::encode(summary)
    ))
}

/// Scheduling widget address for `locale`.
pub fn scheduler_link(base: &Url, locale: Locale) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut().append_pair("locale", locale.code());
    url
}
