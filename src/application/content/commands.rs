//! Write payloads for articles and authors, and the rows they become.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::backend::{Row, encode_row, timestamp_value};
use crate::application::error::AppError;
use crate::domain::slug::derive_slug;
use crate::domain::types::ArticleStatus;

const WORDS_PER_MINUTE: usize = 200;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewArticle {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    pub summary: String,
    pub content: String,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    pub author_id: Uuid,
    pub status: ArticleStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub scheduled_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub read_time: Option<i32>,
    #[serde(default)]
    pub category: Option<String>,
}

impl NewArticle {
    pub fn draft(
        title: impl Into<String>,
        summary: impl Into<String>,
        content: impl Into<String>,
        author_id: Uuid,
    ) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            summary: summary.into(),
            content: content.into(),
            cover_image_url: None,
            author_id,
            status: ArticleStatus::Draft,
            published_at: None,
            scheduled_at: None,
            read_time: None,
            category: None,
        }
    }

    pub fn with_status(mut self, status: ArticleStatus) -> Self {
        self.status = status;
        self
    }

    pub fn published_at(mut self, at: OffsetDateTime) -> Self {
        self.published_at = Some(at);
        self
    }
}

/// Partial article update. `None` leaves the column as it is.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub cover_image_url: Option<String>,
    pub author_id: Option<Uuid>,
    pub status: Option<ArticleStatus>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub scheduled_at: Option<OffsetDateTime>,
    pub read_time: Option<i32>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewAuthor {
    pub name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub social_links: Option<Value>,
}

impl NewAuthor {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bio: None,
            avatar_url: None,
            social_links: None,
        }
    }
}

#[derive(Serialize)]
struct ArticleInsert<'a> {
    title: &'a str,
    subtitle: Option<&'a str>,
    slug: String,
    summary: &'a str,
    content: &'a str,
    cover_image_url: Option<&'a str>,
    author_id: Uuid,
    status: ArticleStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    published_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    scheduled_at: Option<OffsetDateTime>,
    read_time: i32,
    category: Option<&'a str>,
}

/// Minutes to read `content`, never less than one.
pub fn estimate_read_time(content: &str) -> i32 {
    let words = content.split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    i32::try_from(minutes).unwrap_or(i32::MAX)
}

/// Published-at and scheduled-at after applying the status rules.
fn status_timestamps(
    status: ArticleStatus,
    published_at: Option<OffsetDateTime>,
    scheduled_at: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> Result<(Option<OffsetDateTime>, Option<OffsetDateTime>), AppError> {
    match status {
        ArticleStatus::Draft => Ok((None, scheduled_at)),
        ArticleStatus::Published => Ok((Some(published_at.unwrap_or(now)), scheduled_at)),
        ArticleStatus::Scheduled => match scheduled_at {
            Some(at) => Ok((published_at, Some(at))),
            None => Err(AppError::invalid_input(
                "scheduled articles need a scheduled_at time",
            )),
        },
    }
}

pub(crate) fn article_insert_row(input: &NewArticle, now: OffsetDateTime) -> Result<Row, AppError> {
    if input.title.trim().is_empty() {
        return Err(AppError::invalid_input("article title must not be empty"));
    }
    let slug = derive_slug(&input.title)?;
    let (published_at, scheduled_at) =
        status_timestamps(input.status, input.published_at, input.scheduled_at, now)?;

    let insert = ArticleInsert {
        title: input.title.trim(),
        subtitle: input.subtitle.as_deref(),
        slug,
        summary: &input.summary,
        content: &input.content,
        cover_image_url: input.cover_image_url.as_deref(),
        author_id: input.author_id,
        status: input.status,
        published_at,
        scheduled_at,
        read_time: input
            .read_time
            .unwrap_or_else(|| estimate_read_time(&input.content)),
        category: input.category.as_deref(),
    };
    Ok(encode_row(&insert)?)
}

/// `stored_published_at` is the row's current publication date; an edit that
/// keeps an article published reuses it instead of stamping `now`.
pub(crate) fn article_patch_row(
    patch: &ArticlePatch,
    stored_published_at: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> Result<Row, AppError> {
    let mut row = Row::new();

    if let Some(title) = patch.title.as_deref() {
        if title.trim().is_empty() {
            return Err(AppError::invalid_input("article title must not be empty"));
        }
        row.insert("title".into(), Value::from(title.trim()));
        row.insert("slug".into(), Value::from(derive_slug(title)?));
    }
    set_text(&mut row, "subtitle", patch.subtitle.as_deref());
    set_text(&mut row, "summary", patch.summary.as_deref());
    set_text(&mut row, "cover_image_url", patch.cover_image_url.as_deref());
    set_text(&mut row, "category", patch.category.as_deref());
    if let Some(content) = patch.content.as_deref() {
        row.insert("content".into(), Value::from(content));
        if patch.read_time.is_none() {
            row.insert("read_time".into(), Value::from(estimate_read_time(content)));
        }
    }
    if let Some(read_time) = patch.read_time {
        row.insert("read_time".into(), Value::from(read_time));
    }
    if let Some(author_id) = patch.author_id {
        row.insert("author_id".into(), Value::from(author_id.to_string()));
    }

    match patch.status {
        Some(status) => {
            let (published_at, scheduled_at) = status_timestamps(
                status,
                patch.published_at.or(stored_published_at),
                patch.scheduled_at,
                now,
            )?;
            row.insert("status".into(), Value::from(status.as_str()));
            row.insert("published_at".into(), timestamp_value(published_at)?);
            if scheduled_at.is_some() {
                row.insert("scheduled_at".into(), timestamp_value(scheduled_at)?);
            }
        }
        None => {
            if patch.published_at.is_some() {
                row.insert("published_at".into(), timestamp_value(patch.published_at)?);
            }
            if patch.scheduled_at.is_some() {
                row.insert("scheduled_at".into(), timestamp_value(patch.scheduled_at)?);
            }
        }
    }

    row.insert("updated_at".into(), timestamp_value(Some(now))?);
    Ok(row)
}

pub(crate) fn author_insert_row(input: &NewAuthor) -> Result<Row, AppError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::invalid_input("author name must not be empty"));
    }
    let mut row = Row::new();
    row.insert("name".into(), Value::from(name));
    set_text(&mut row, "bio", input.bio.as_deref());
    set_text(&mut row, "avatar_url", input.avatar_url.as_deref());
    if let Some(links) = input.social_links.as_ref() {
        row.insert("social_links".into(), links.clone());
    }
    Ok(row)
}

fn set_text(row: &mut Row, column: &str, value: Option<&str>) {
    if let Some(value) = value {
        row.insert(column.into(), Value::from(value));
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const NOW: OffsetDateTime = datetime!(2026-03-10 12:00 UTC);

    #[test]
    fn read_time_rounds_up_and_has_a_floor() {
        assert_eq!(estimate_read_time(""), 1);
        assert_eq!(estimate_read_time(&"word ".repeat(200)), 1);
        assert_eq!(estimate_read_time(&"word ".repeat(201)), 2);
    }

    #[test]
    fn insert_derives_slug_and_read_time() {
        let input = NewArticle::draft(
            "Título com Acentuação & Símbolos!",
            "resumo",
            "um dois três",
            Uuid::nil(),
        );
        let row = article_insert_row(&input, NOW).expect("row");

        assert_eq!(row["slug"], "titulo-com-acentuacao-simbolos");
        assert_eq!(row["read_time"], 1);
        assert_eq!(row["status"], "draft");
        assert!(row["published_at"].is_null());
    }

    #[test]
    fn publishing_without_a_date_stamps_now() {
        let input = NewArticle::draft("Hello", "s", "c", Uuid::nil())
            .with_status(ArticleStatus::Published);
        let row = article_insert_row(&input, NOW).expect("row");

        assert_eq!(row["published_at"], "2026-03-10T12:00:00Z");
    }

    #[test]
    fn draft_clears_publication_date() {
        let input = NewArticle::draft("Hello", "s", "c", Uuid::nil()).published_at(NOW);
        let row = article_insert_row(&input, NOW).expect("row");

        assert!(row["published_at"].is_null());
    }

    #[test]
    fn scheduling_requires_a_date() {
        let input = NewArticle::draft("Hello", "s", "c", Uuid::nil())
            .with_status(ArticleStatus::Scheduled);
        let err = article_insert_row(&input, NOW).expect_err("missing scheduled_at");

        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn patch_rederives_slug_and_stamps_updated_at() {
        let patch = ArticlePatch {
            title: Some("Novo Título".to_string()),
            ..Default::default()
        };
        let row = article_patch_row(&patch, None, NOW).expect("row");

        assert_eq!(row["slug"], "novo-titulo");
        assert_eq!(row["updated_at"], "2026-03-10T12:00:00Z");
        assert!(!row.contains_key("status"));
    }

    #[test]
    fn republishing_keeps_the_stored_publication_date() {
        let patch = ArticlePatch {
            status: Some(ArticleStatus::Published),
            content: Some("typo fix".to_string()),
            ..Default::default()
        };
        let stored = datetime!(2025-01-01 00:00 UTC);

        let row = article_patch_row(&patch, Some(stored), NOW).expect("row");
        assert_eq!(row["published_at"], "2025-01-01T00:00:00Z");

        let first_publication = article_patch_row(&patch, None, NOW).expect("row");
        assert_eq!(first_publication["published_at"], "2026-03-10T12:00:00Z");
    }

    #[test]
    fn blank_author_names_are_rejected() {
        assert!(author_insert_row(&NewAuthor::named("  ")).is_err());
        let row = author_insert_row(&NewAuthor::named(" Ana ")).expect("row");
        assert_eq!(row["name"], "Ana");
    }
}
