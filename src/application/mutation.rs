//! Shared write path: run the remote call, then invalidate and notify.

use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use tracing::{info, warn};

use crate::application::error::AppError;
use crate::application::notify::{Notifier, Toast};
use crate::cache::{Mutation, QueryCache};

const SUCCESS_TITLE: &str = "Sucesso!";
const ERROR_TITLE: &str = "Erro";

/// Everything a write needs besides the backend itself.
#[derive(Clone)]
pub struct MutationContext {
    cache: Arc<QueryCache>,
    notifier: Arc<dyn Notifier>,
}

impl MutationContext {
    pub fn new(cache: Arc<QueryCache>, notifier: Arc<dyn Notifier>) -> Self {
        Self { cache, notifier }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Await `work`; on success invalidate what `mutation` makes stale.
    ///
    /// Exactly one toast is emitted either way. A failed write leaves the cache
    /// untouched.
    pub async fn run<T, Fut>(&self, mutation: Mutation, work: Fut) -> Result<T, AppError>
    where
        Fut: Future<Output = Result<T, AppError>>,
    {
        self.run_with(mutation, work, |_| success_copy(mutation).to_string())
            .await
    }

    /// Like [`MutationContext::run`], with the success description derived
    /// from the result.
    pub async fn run_with<T, Fut, D>(
        &self,
        mutation: Mutation,
        work: Fut,
        describe: D,
    ) -> Result<T, AppError>
    where
        Fut: Future<Output = Result<T, AppError>>,
        D: FnOnce(&T) -> String,
    {
        match work.await {
            Ok(value) => {
                let invalidated = self.cache.invalidate(&mutation.invalidates());
                counter!(
                    "agencia_mutation_total",
                    "mutation" => mutation.name(),
                    "outcome" => "success"
                )
                .increment(1);
                info!(
                    mutation = mutation.name(),
                    invalidated, "Mutation succeeded"
                );
                self.notifier
                    .notify(Toast::success(SUCCESS_TITLE, describe(&value)));
                Ok(value)
            }
            Err(err) => {
                counter!(
                    "agencia_mutation_total",
                    "mutation" => mutation.name(),
                    "outcome" => "failure"
                )
                .increment(1);
                warn!(mutation = mutation.name(), error = %err, "Mutation failed");
                self.notifier
                    .notify(Toast::error(ERROR_TITLE, err.user_message()));
                Err(err)
            }
        }
    }
}

fn success_copy(mutation: Mutation) -> &'static str {
    match mutation {
        Mutation::CreateArticle => "Artigo criado com sucesso!",
        Mutation::UpdateArticle { .. } => "Artigo atualizado com sucesso!",
        Mutation::DeleteArticle { .. } => "Artigo excluído com sucesso!",
        Mutation::CreateAuthor => "Autor criado com sucesso!",
        Mutation::CreateAdminRequest => {
            "Solicitação enviada! Aguarde a aprovação de um administrador."
        }
        Mutation::ApproveAdminRequest => "Solicitação aprovada com sucesso!",
        Mutation::RejectAdminRequest => "Solicitação rejeitada.",
        Mutation::DeleteUserProfile => "Usuário removido com sucesso!",
        Mutation::UpdateAdminLevel => "Nível de administrador atualizado!",
        Mutation::UpdateUserRole => "Função do usuário atualizada!",
        Mutation::SignIn => "Login realizado com sucesso!",
        Mutation::SignUp => "Conta criada! Verifique seu e-mail para confirmar.",
        Mutation::SignOut => "Você saiu da sua conta.",
        Mutation::SubmitContact => "Mensagem enviada! Entraremos em contato em breve.",
        Mutation::SubscribeNewsletter => "Inscrição realizada com sucesso!",
    }
}
