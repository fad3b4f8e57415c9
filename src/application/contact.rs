//! Contact form and newsletter sign-up.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::application::backend::{Backend, Row, Table, encode_row};
use crate::application::error::AppError;
use crate::application::mutation::MutationContext;
use crate::cache::Mutation;
use crate::domain::briefing::is_valid_email;
use crate::domain::types::Locale;

const CONTACT_EMAIL_FUNCTION: &str = "send-contact-email";
const MIN_NAME_CHARS: usize = 2;
const MIN_MESSAGE_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    Subscribed,
    AlreadySubscribed,
}

#[derive(Clone)]
pub struct ContactService {
    backend: Arc<dyn Backend>,
    mutations: MutationContext,
}

impl ContactService {
    pub fn new(backend: Arc<dyn Backend>, mutations: MutationContext) -> Self {
        Self { backend, mutations }
    }

    /// Store the submission, then ask the email function to forward it.
    ///
    /// The stored row decides success; a failed email call is only logged.
    pub async fn submit_contact(
        &self,
        submission: ContactSubmission,
        locale: Locale,
    ) -> Result<(), AppError> {
        self.mutations
            .run(Mutation::SubmitContact, async {
                validate_submission(&submission, locale)?;
                let row = encode_row(&submission)?;
                self.backend.insert(Table::ContactSubmissions, row).await?;

                let mut payload = serde_json::to_value(&submission)
                    .map_err(|err| AppError::unexpected(err.to_string()))?;
                if let Value::Object(fields) = &mut payload {
                    fields.insert("locale".into(), json!(locale.code()));
                }
                match self.backend.invoke(CONTACT_EMAIL_FUNCTION, payload).await {
                    Ok(_) => debug!(function = CONTACT_EMAIL_FUNCTION, "Contact email sent"),
                    Err(err) => warn!(
                        function = CONTACT_EMAIL_FUNCTION,
                        error = %err,
                        "Contact email failed; submission kept"
                    ),
                }
                Ok(())
            })
            .await
    }

    /// A repeated address counts as success.
    pub async fn subscribe_newsletter(&self, email: &str) -> Result<Subscription, AppError> {
        self.mutations
            .run_with(
                Mutation::SubscribeNewsletter,
                async {
                    let email = email.trim();
                    if !is_valid_email(email) {
                        return Err(AppError::invalid_input("invalid email address"));
                    }
                    let mut row = Row::new();
                    row.insert("email".into(), Value::from(email));
                    match self.backend.insert(Table::NewsletterSubscriptions, row).await {
                        Ok(_) => Ok(Subscription::Subscribed),
                        Err(err) if err.is_unique_violation() => Ok(Subscription::AlreadySubscribed),
                        Err(err) => Err(err.into()),
                    }
                },
                |outcome| match outcome {
                    Subscription::Subscribed => "Inscrição realizada com sucesso!".to_string(),
                    Subscription::AlreadySubscribed => {
                        "Este e-mail já está inscrito na nossa newsletter.".to_string()
                    }
                },
            )
            .await
    }
}

fn validate_submission(submission: &ContactSubmission, locale: Locale) -> Result<(), AppError> {
    let mut problems = Vec::new();
    if submission.name.trim().chars().count() < MIN_NAME_CHARS {
        problems.push(message(ContactProblem::Name, locale));
    }
    if !is_valid_email(submission.email.trim()) {
        problems.push(message(ContactProblem::Email, locale));
    }
    if submission.message.trim().chars().count() < MIN_MESSAGE_CHARS {
        problems.push(message(ContactProblem::Message, locale));
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(AppError::invalid_input(problems.join("; ")))
    }
}

#[derive(Clone, Copy)]
enum ContactProblem {
    Name,
    Email,
    Message,
}

fn message(problem: ContactProblem, locale: Locale) -> &'static str {
    match (problem, locale) {
        (ContactProblem::Name, Locale::Pt) => "Nome deve ter pelo menos 2 caracteres",
        (ContactProblem::Name, Locale::En) => "Name must be at least 2 characters",
        (ContactProblem::Name, Locale::Es) => "El nombre debe tener al menos 2 caracteres",
        (ContactProblem::Email, Locale::Pt) => "E-mail inválido",
        (ContactProblem::Email, Locale::En) => "Invalid email address",
        (ContactProblem::Email, Locale::Es) => "Correo electrónico inválido",
        (ContactProblem::Message, Locale::Pt) => "Mensagem deve ter pelo menos 10 caracteres",
        (ContactProblem::Message, Locale::En) => "Message must be at least 10 characters",
        (ContactProblem::Message, Locale::Es) => "El mensaje debe tener al menos 10 caracteres",
    }
}
