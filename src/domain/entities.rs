//! Domain entities mirrored from the hosted database relations.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{AdminLevel, ArticleStatus, RequestStatus, UserRole};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    pub slug: String,
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
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub shares: i64,
    #[serde(default)]
    pub likes: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Article {
    /// Public listings only show published articles whose publication time has passed.
    pub fn is_publicly_visible(&self, now: OffsetDateTime) -> bool {
        self.status == ArticleStatus::Published
            && self.published_at.is_some_and(|published| published <= now)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub social_links: Option<serde_json::Value>,
}

/// Article joined with its author row, as listed on the blog and dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleWithAuthor {
    #[serde(flatten)]
    pub article: Article,
    pub author: Option<Author>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: UserRole,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub admin_level: Option<AdminLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "role")]
    pub requested_role: Option<UserRole>,
    pub status: RequestStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub requested_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub reviewed_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub reviewed_by: Option<Uuid>,
}

impl AdminRequest {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

/// Engagement counters for a single published article.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleAnalytics {
    pub article_id: Uuid,
    pub title: String,
    pub slug: String,
    pub views: i64,
    pub shares: i64,
    pub likes: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
}

impl From<&Article> for ArticleAnalytics {
    fn from(article: &Article) -> Self {
        Self {
            article_id: article.id,
            title: article.title.clone(),
            slug: article.slug.clone(),
            views: article.views,
            shares: article.shares,
            likes: article.likes,
            published_at: article.published_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;
    use time::macros::datetime;

    use super::*;

    fn sample_article(status: ArticleStatus, published_at: Option<OffsetDateTime>) -> Article {
        let stamp = datetime!(2026-01-10 09:00 UTC);
        Article {
            id: Uuid::nil(),
            title: "Growth".to_string(),
            subtitle: None,
            slug: "growth".to_string(),
            summary: "Summary".to_string(),
            content: "Body".to_string(),
            cover_image_url: None,
            author_id: Uuid::nil(),
            status,
            published_at,
            scheduled_at: None,
            read_time: Some(3),
            category: None,
            views: 0,
            shares: 0,
            likes: 0,
            created_at: stamp,
            updated_at: stamp,
        }
    }

    #[test]
    fn visibility_requires_due_publication() {
        let now = datetime!(2026-01-10 12:00 UTC);

        let due = sample_article(ArticleStatus::Published, Some(now));
        assert!(due.is_publicly_visible(now));

        let early = sample_article(
            ArticleStatus::Published,
            Some(now + Duration::milliseconds(1)),
        );
        assert!(!early.is_publicly_visible(now));

        let undated = sample_article(ArticleStatus::Published, None);
        assert!(!undated.is_publicly_visible(now));

        let draft = sample_article(ArticleStatus::Draft, Some(now));
        assert!(!draft.is_publicly_visible(now));
    }

    #[test]
    fn article_decodes_database_row() {
        let row = serde_json::json!({
            "id": "00000000-0000-0000-0000-000000000001",
            "title": "Row",
            "slug": "row",
            "summary": "s",
            "content": "c",
            "author_id": "00000000-0000-0000-0000-000000000002",
            "status": "published",
            "published_at": "2026-01-10T09:00:00.250+00:00",
            "created_at": "2026-01-09T09:00:00Z",
            "updated_at": "2026-01-09T09:00:00Z",
            "views": 12
        });

        let article: Article = serde_json::from_value(row).expect("decode");
        assert_eq!(article.views, 12);
        assert_eq!(article.shares, 0);
        assert!(article.subtitle.is_none());
        assert_eq!(
            article.published_at,
            Some(datetime!(2026-01-10 09:00:00.250 UTC))
        );
    }
}
