//! Sign-in, sign-up and sign-out against the backend's auth endpoints.

use std::sync::Arc;

use crate::application::backend::{AuthUser, Backend};
use crate::application::error::AppError;
use crate::application::mutation::MutationContext;
use crate::cache::Mutation;
use crate::domain::briefing::is_valid_email;

const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Clone)]
pub struct SessionService {
    backend: Arc<dyn Backend>,
    mutations: MutationContext,
}

impl SessionService {
    pub fn new(backend: Arc<dyn Backend>, mutations: MutationContext) -> Self {
        Self { backend, mutations }
    }

    pub async fn current_user(&self) -> Result<Option<AuthUser>, AppError> {
        Ok(self.backend.current_user().await?)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AppError> {
        self.mutations
            .run(Mutation::SignIn, async {
                check_credentials(email, password)?;
                Ok(self.backend.sign_in(email.trim(), password).await?)
            })
            .await
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<AuthUser, AppError> {
        self.mutations
            .run(Mutation::SignUp, async {
                check_credentials(email, password)?;
                if full_name.trim().is_empty() {
                    return Err(AppError::invalid_input("full name must not be empty"));
                }
                Ok(self
                    .backend
                    .sign_up(email.trim(), password, full_name.trim())
                    .await?)
            })
            .await
    }

    pub async fn sign_out(&self) -> Result<(), AppError> {
        self.mutations
            .run(Mutation::SignOut, async { Ok(self.backend.sign_out().await?) })
            .await
    }
}

fn check_credentials(email: &str, password: &str) -> Result<(), AppError> {
    if !is_valid_email(email.trim()) {
        return Err(AppError::invalid_input("invalid email address"));
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::invalid_input(format!(
            "password must have at least {MIN_PASSWORD_CHARS} characters"
        )));
    }
    Ok(())
}
