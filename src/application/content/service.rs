use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::backend::{Backend, Filter, Row, Table, decode_row};
use crate::application::clock::Clock;
use crate::application::error::AppError;
use crate::application::mutation::MutationContext;
use crate::cache::{Mutation, QueryCache, QueryKey, QueryKind};
use crate::domain::analytics::AnalyticsStats;
use crate::domain::entities::{Article, ArticleAnalytics, ArticleWithAuthor, Author};
use crate::domain::types::ArticleStatus;

use super::commands::{
    ArticlePatch, NewArticle, NewAuthor, article_insert_row, article_patch_row, author_insert_row,
};
use super::queries;

/// Engagement counters kept by the backend procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Views,
    Shares,
    Likes,
}

impl Counter {
    pub fn procedure(self) -> &'static str {
        match self {
            Counter::Views => "increment_article_views",
            Counter::Shares => "increment_article_shares",
            Counter::Likes => "increment_article_likes",
        }
    }
}

/// Cached reads and invalidating writes for articles and authors.
#[derive(Clone)]
pub struct ContentService {
    backend: Arc<dyn Backend>,
    cache: Arc<QueryCache>,
    mutations: MutationContext,
    clock: Arc<dyn Clock>,
}

impl ContentService {
    pub fn new(backend: Arc<dyn Backend>, mutations: MutationContext, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            cache: Arc::clone(mutations.cache()),
            mutations,
            clock,
        }
    }

    pub async fn list_all_articles(&self) -> Result<Vec<ArticleWithAuthor>, AppError> {
        let backend = Arc::clone(&self.backend);
        self.cache
            .fetch(QueryKey::new(QueryKind::AllArticles), move || async move {
                queries::list_all_articles(backend.as_ref()).await
            })
            .await
    }

    /// Articles linked to the signed-in user; empty without a session.
    pub async fn list_my_articles(&self) -> Result<Vec<ArticleWithAuthor>, AppError> {
        let Some(user) = self.backend.current_user().await? else {
            debug!("No session, my-articles is empty");
            return Ok(Vec::new());
        };
        let backend = Arc::clone(&self.backend);
        self.cache
            .fetch(
                QueryKey::with_param(QueryKind::MyArticles, user.id.to_string()),
                move || async move { queries::list_my_articles(backend.as_ref(), user.id).await },
            )
            .await
    }

    /// The public blog listing: published and due, newest publication first.
    pub async fn list_published_articles(&self) -> Result<Vec<ArticleWithAuthor>, AppError> {
        let backend = Arc::clone(&self.backend);
        let now = self.clock.now();
        self.cache
            .fetch(QueryKey::new(QueryKind::BlogArticles), move || async move {
                queries::list_published_articles(backend.as_ref(), now).await
            })
            .await
    }

    pub async fn get_article_by_slug(&self, slug: &str) -> Result<ArticleWithAuthor, AppError> {
        let backend = Arc::clone(&self.backend);
        let now = self.clock.now();
        let owned_slug = slug.to_string();
        self.cache
            .fetch(QueryKey::article_by_slug(slug), move || async move {
                queries::get_article_by_slug(backend.as_ref(), &owned_slug, now).await
            })
            .await
    }

    /// Any article regardless of status, for editing.
    pub async fn get_article_by_id(&self, id: Uuid) -> Result<Article, AppError> {
        let backend = Arc::clone(&self.backend);
        self.cache
            .fetch(QueryKey::article_by_id(id), move || async move {
                queries::get_article_by_id(backend.as_ref(), id).await
            })
            .await
    }

    pub async fn list_authors(&self) -> Result<Vec<Author>, AppError> {
        let backend = Arc::clone(&self.backend);
        self.cache
            .fetch(QueryKey::new(QueryKind::Authors), move || async move {
                queries::list_authors(backend.as_ref()).await
            })
            .await
    }

    pub async fn list_article_analytics(&self) -> Result<Vec<ArticleAnalytics>, AppError> {
        let backend = Arc::clone(&self.backend);
        let now = self.clock.now();
        self.cache
            .fetch(QueryKey::new(QueryKind::ArticleAnalytics), move || async move {
                queries::list_article_analytics(backend.as_ref(), now).await
            })
            .await
    }

    pub async fn compute_analytics_stats(&self) -> Result<AnalyticsStats, AppError> {
        let backend = Arc::clone(&self.backend);
        let now = self.clock.now();
        self.cache
            .fetch(QueryKey::new(QueryKind::AnalyticsStats), move || async move {
                let rows = queries::list_article_analytics(backend.as_ref(), now).await?;
                Ok(AnalyticsStats::from_rows(&rows))
            })
            .await
    }

    /// Insert an article and link it to the signed-in user, if any.
    pub async fn create_article(&self, input: NewArticle) -> Result<Article, AppError> {
        self.mutations
            .run(Mutation::CreateArticle, async {
                let row = article_insert_row(&input, self.clock.now())?;
                let created: Article =
                    decode_row(self.backend.insert(Table::Articles, row).await?)?;

                if let Some(user) = self.backend.current_user().await? {
                    let mut link = Row::new();
                    link.insert("user_id".into(), json!(user.id.to_string()));
                    link.insert("article_id".into(), json!(created.id.to_string()));
                    if let Err(err) = self.backend.insert(Table::UserArticles, link).await {
                        self.discard_article(created.id).await;
                        return Err(err.into());
                    }
                }
                Ok(created)
            })
            .await
    }

    pub async fn update_article(&self, id: Uuid, patch: ArticlePatch) -> Result<Article, AppError> {
        self.mutations
            .run(Mutation::UpdateArticle { id }, async {
                let stored_published_at = match patch.status {
                    Some(ArticleStatus::Published) if patch.published_at.is_none() => {
                        let stored = queries::get_article_by_id(self.backend.as_ref(), id).await?;
                        (stored.status == ArticleStatus::Published)
                            .then_some(stored.published_at)
                            .flatten()
                    }
                    _ => None,
                };
                let row = article_patch_row(&patch, stored_published_at, self.clock.now())?;
                let mut updated = self
                    .backend
                    .update(Table::Articles, &[Filter::eq("id", id.to_string())], row)
                    .await?;
                let row = updated.pop().ok_or_else(|| AppError::not_found("article"))?;
                Ok(decode_row(row)?)
            })
            .await
    }

    pub async fn delete_article(&self, id: Uuid) -> Result<(), AppError> {
        self.mutations
            .run(Mutation::DeleteArticle { id }, async {
                self.backend
                    .delete(Table::Articles, &[Filter::eq("id", id.to_string())])
                    .await?;
                Ok(())
            })
            .await
    }

    pub async fn create_author(&self, input: NewAuthor) -> Result<Author, AppError> {
        self.mutations
            .run(Mutation::CreateAuthor, async {
                let row = author_insert_row(&input)?;
                Ok(decode_row(self.backend.insert(Table::Authors, row).await?)?)
            })
            .await
    }

    /// Undo an article insert whose ownership link could not be written.
    async fn discard_article(&self, id: Uuid) {
        match self
            .backend
            .delete(Table::Articles, &[Filter::eq("id", id.to_string())])
            .await
        {
            Ok(()) => warn!(article_id = %id, "Article link failed, insert discarded"),
            Err(err) => error!(
                article_id = %id,
                error = %err,
                "Article link failed and the insert could not be discarded"
            ),
        }
    }

    pub async fn increment_views(&self, slug: &str) -> Result<(), AppError> {
        self.increment(Counter::Views, slug).await
    }

    pub async fn increment_shares(&self, slug: &str) -> Result<(), AppError> {
        self.increment(Counter::Shares, slug).await
    }

    pub async fn increment_likes(&self, slug: &str) -> Result<(), AppError> {
        self.increment(Counter::Likes, slug).await
    }

    /// Fire-and-forget counter bump. No toast, no invalidation, no duplicate guard.
    async fn increment(&self, counter: Counter, slug: &str) -> Result<(), AppError> {
        let procedure = counter.procedure();
        match self
            .backend
            .rpc(procedure, json!({ "article_slug": slug }))
            .await
        {
            Ok(_) => {
                debug!(procedure, slug, "Counter incremented");
                Ok(())
            }
            Err(err) => {
                warn!(procedure, slug, error = %err, "Counter increment failed");
                Err(err.into())
            }
        }
    }
}
