use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::application::notify::{Notifier, Toast};
use crate::config::DeliverySettings;
use crate::domain::briefing::{BriefingRecord, FieldError, FormStage, validate_all, validate_stage};
use crate::domain::types::Locale;

use super::delivery::{Channel, ChannelLauncher, mailto_link, scheduler_link, whatsapp_link};
use super::summary::format_summary;

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("briefing is incomplete: {} field(s) need attention", .0.len())]
    Validation(Vec<FieldError>),
    #[error("submit is only available on the confirmation stage")]
    NotAtConfirmation { stage: FormStage },
    #[error("briefing was already sent; close the scheduler to start a new one")]
    AlreadySubmitted,
    #[error("failed to build hand-off link: {0}")]
    Link(#[from] url::ParseError),
}

/// What a successful submit did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub summary: String,
    pub dispatched: Vec<Channel>,
    /// The form stays filled until the scheduling widget is closed.
    pub showing_scheduler: bool,
}

/// State machine behind the four-stage briefing form.
pub struct WizardController {
    stage: FormStage,
    record: BriefingRecord,
    errors: Vec<FieldError>,
    showing_scheduler: bool,
    locale: Locale,
    delivery: DeliverySettings,
    launcher: Arc<dyn ChannelLauncher>,
    notifier: Arc<dyn Notifier>,
}

impl WizardController {
    pub fn new(
        delivery: DeliverySettings,
        locale: Locale,
        launcher: Arc<dyn ChannelLauncher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            stage: FormStage::Personal,
            record: BriefingRecord::default(),
            errors: Vec::new(),
            showing_scheduler: false,
            locale,
            delivery,
            launcher,
            notifier,
        }
    }

    pub fn stage(&self) -> FormStage {
        self.stage
    }

    pub fn record(&self) -> &BriefingRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut BriefingRecord {
        &mut self.record
    }

    /// Field messages from the last failed validation.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn is_showing_scheduler(&self) -> bool {
        self.showing_scheduler
    }

    /// Widget address while the scheduler is shown.
    pub fn scheduler_url(&self) -> Option<Url> {
        self.showing_scheduler
            .then(|| scheduler_link(&self.delivery.scheduler_url, self.locale))
    }

    /// Check `stage`'s own fields. Never moves the stage.
    pub fn validate_stage(&mut self, stage: FormStage) -> bool {
        self.errors = validate_stage(stage, &self.record, self.locale);
        self.errors.is_empty()
    }

    /// Move one stage forward when the current stage is valid.
    pub fn advance(&mut self) -> bool {
        let Some(next) = self.stage.next() else {
            return false;
        };
        if !self.validate_stage(self.stage) {
            debug!(stage = ?self.stage, errors = self.errors.len(), "Stage blocked");
            return false;
        }
        self.stage = next;
        true
    }

    /// Move one stage back. Always allowed except from the first stage.
    pub fn retreat(&mut self) -> bool {
        match self.stage.previous() {
            Some(previous) => {
                self.stage = previous;
                self.errors.clear();
                true
            }
            None => false,
        }
    }

    /// Hand the briefing to every chosen channel.
    ///
    /// Every stage is validated again first; on any failure nothing is
    /// dispatched and the stage does not move. Without the scheduler the
    /// form resets right away, otherwise it resets on
    /// [`WizardController::close_scheduler`] and submit is refused until then.
    pub fn submit(&mut self) -> Result<SubmitOutcome, WizardError> {
        if self.showing_scheduler {
            return Err(WizardError::AlreadySubmitted);
        }
        if !self.stage.is_terminal() {
            return Err(WizardError::NotAtConfirmation { stage: self.stage });
        }
        let errors = validate_all(&self.record, self.locale);
        if !errors.is_empty() {
            self.errors = errors.clone();
            return Err(WizardError::Validation(errors));
        }

        let summary = format_summary(&self.record, self.locale);
        let whatsapp = self
            .record
            .prefer_whats_app
            .then(|| whatsapp_link(&self.delivery.whatsapp_number, &summary))
            .transpose()?;
        let email = self
            .record
            .prefer_email
            .then(|| {
                mailto_link(
                    &self.delivery.email_recipient,
                    &self.delivery.email_subject,
                    &summary,
                )
            })
            .transpose()?;

        let mut dispatched = Vec::new();
        if let Some(url) = whatsapp {
            self.launcher.open_in_new_window(&url);
            dispatched.push(Channel::WhatsApp);
        }
        if let Some(url) = email {
            self.launcher.navigate(&url);
            dispatched.push(Channel::Email);
        }
        if self.record.prefer_calendly {
            self.showing_scheduler = true;
            dispatched.push(Channel::Scheduler);
        }

        let (title, description) = submitted_copy(self.locale);
        self.notifier.notify(Toast::success(title, description));
        info!(
            channels = ?dispatched.iter().map(|channel| channel.as_str()).collect::<Vec<_>>(),
            phone_requested = self.record.prefer_phone,
            "Briefing submitted"
        );

        let showing_scheduler = self.showing_scheduler;
        if !showing_scheduler {
            self.reset_form();
        }

        Ok(SubmitOutcome {
            summary,
            dispatched,
            showing_scheduler,
        })
    }

    /// Hide the scheduling widget and start over.
    pub fn close_scheduler(&mut self) {
        self.showing_scheduler = false;
        self.reset_form();
    }

    pub fn reset_form(&mut self) {
        self.record = BriefingRecord::default();
        self.stage = FormStage::Personal;
        self.errors.clear();
    }

    /// Switch the validation and summary language. A change resets the form
    /// so no message from the old locale stays on screen.
    pub fn set_locale(&mut self, locale: Locale) -> bool {
        if locale == self.locale {
            return false;
        }
        self.locale = locale;
        self.reset_form();
        true
    }
}

fn submitted_copy(locale: Locale) -> (&'static str, &'static str) {
    match locale {
        Locale::Pt => (
            "Briefing enviado!",
            "Recebemos suas informações e entraremos em contato em breve.",
        ),
        Locale::En => (
            "Briefing sent!",
            "We received your details and will get in touch soon.",
        ),
        Locale::Es => (
            "¡Briefing enviado!",
            "Recibimos tu información y te contactaremos pronto.",
        ),
    }
}
