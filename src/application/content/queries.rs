//! Uncached reads against the content relations.
//!
//! Each function issues the backend calls for one read and maps rows to
//! domain types. Caching happens one level up, in the service.

use std::collections::{BTreeSet, HashMap};

use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::backend::{
    DataBackend, Filter, Table, TableQuery, decode_row, decode_rows, timestamp_value,
};
use crate::application::error::AppError;
use crate::domain::entities::{Article, ArticleAnalytics, ArticleWithAuthor, Author};
use crate::domain::types::ArticleStatus;

pub async fn list_all_articles<B>(backend: &B) -> Result<Vec<ArticleWithAuthor>, AppError>
where
    B: DataBackend + ?Sized,
{
    let rows = backend
        .select(&TableQuery::from(Table::Articles).order_desc("created_at"))
        .await?;
    attach_authors(backend, decode_rows(rows)?).await
}

/// Articles linked to `user_id` through the join table, newest first.
pub async fn list_my_articles<B>(
    backend: &B,
    user_id: Uuid,
) -> Result<Vec<ArticleWithAuthor>, AppError>
where
    B: DataBackend + ?Sized,
{
    let links = backend
        .select(
            &TableQuery::from(Table::UserArticles)
                .filter(Filter::eq("user_id", user_id.to_string())),
        )
        .await?;
    let article_ids: BTreeSet<String> = links
        .iter()
        .filter_map(|link| link.get("article_id").and_then(|id| id.as_str()))
        .map(str::to_string)
        .collect();
    if article_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = backend
        .select(
            &TableQuery::from(Table::Articles)
                .filter(Filter::any_of("id", article_ids))
                .order_desc("created_at"),
        )
        .await?;
    attach_authors(backend, decode_rows(rows)?).await
}

/// Published articles whose publication time is at or before `now`.
pub async fn list_published_articles<B>(
    backend: &B,
    now: OffsetDateTime,
) -> Result<Vec<ArticleWithAuthor>, AppError>
where
    B: DataBackend + ?Sized,
{
    let articles = published_articles(backend, now).await?;
    attach_authors(backend, articles).await
}

pub async fn get_article_by_slug<B>(
    backend: &B,
    slug: &str,
    now: OffsetDateTime,
) -> Result<ArticleWithAuthor, AppError>
where
    B: DataBackend + ?Sized,
{
    let query = published_query(now)?.filter(Filter::eq("slug", slug));
    let article: Article = match backend.select_single(&query).await {
        Ok(row) => decode_row(row)?,
        Err(err) if err.is_no_rows() => return Err(AppError::not_found("article")),
        Err(err) => return Err(err.into()),
    };
    // The row filter already applies this; keep the guard for backends that
    // ignore the time predicate.
    if !article.is_publicly_visible(now) {
        return Err(AppError::not_found("article"));
    }

    let mut joined = attach_authors(backend, vec![article]).await?;
    joined.pop().ok_or_else(|| AppError::not_found("article"))
}

pub async fn get_article_by_id<B>(backend: &B, id: Uuid) -> Result<Article, AppError>
where
    B: DataBackend + ?Sized,
{
    let query = TableQuery::from(Table::Articles).filter(Filter::eq("id", id.to_string()));
    match backend.select_single(&query).await {
        Ok(row) => Ok(decode_row(row)?),
        Err(err) if err.is_no_rows() => Err(AppError::not_found("article")),
        Err(err) => Err(err.into()),
    }
}

pub async fn list_authors<B>(backend: &B) -> Result<Vec<Author>, AppError>
where
    B: DataBackend + ?Sized,
{
    let rows = backend
        .select(&TableQuery::from(Table::Authors).order_asc("name"))
        .await?;
    Ok(decode_rows(rows)?)
}

/// Engagement counters of every published article, most viewed first.
pub async fn list_article_analytics<B>(
    backend: &B,
    now: OffsetDateTime,
) -> Result<Vec<ArticleAnalytics>, AppError>
where
    B: DataBackend + ?Sized,
{
    let mut analytics: Vec<ArticleAnalytics> = published_articles(backend, now)
        .await?
        .iter()
        .map(ArticleAnalytics::from)
        .collect();
    analytics.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.slug.cmp(&b.slug)));
    Ok(analytics)
}

fn published_query(now: OffsetDateTime) -> Result<TableQuery, AppError> {
    Ok(TableQuery::from(Table::Articles)
        .filter(Filter::eq("status", ArticleStatus::Published.as_str()))
        .filter(Filter::lte("published_at", timestamp_value(Some(now))?)))
}

async fn published_articles<B>(backend: &B, now: OffsetDateTime) -> Result<Vec<Article>, AppError>
where
    B: DataBackend + ?Sized,
{
    let rows = backend
        .select(&published_query(now)?.order_desc("published_at"))
        .await?;
    let mut articles: Vec<Article> = decode_rows(rows)?;
    articles.retain(|article| article.is_publicly_visible(now));
    Ok(articles)
}

/// Join author rows client-side with one `in` lookup.
async fn attach_authors<B>(
    backend: &B,
    articles: Vec<Article>,
) -> Result<Vec<ArticleWithAuthor>, AppError>
where
    B: DataBackend + ?Sized,
{
    let author_ids: BTreeSet<String> = articles
        .iter()
        .map(|article| article.author_id.to_string())
        .collect();
    if author_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = backend
        .select(&TableQuery::from(Table::Authors).filter(Filter::any_of("id", author_ids)))
        .await?;
    let authors: HashMap<Uuid, Author> = decode_rows::<Author>(rows)?
        .into_iter()
        .map(|author| (author.id, author))
        .collect();

    Ok(articles
        .into_iter()
        .map(|article| ArticleWithAuthor {
            author: authors.get(&article.author_id).cloned(),
            article,
        })
        .collect())
}
