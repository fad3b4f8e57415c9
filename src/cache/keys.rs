//! Query cache keys.
//!
//! A key is the read operation plus its parameters. Invalidation targets either
//! a whole operation family or one exact key.

use std::fmt;

use uuid::Uuid;

/// Read operations whose results are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    AllArticles,
    MyArticles,
    /// Published-and-due listing on the public blog.
    BlogArticles,
    ArticleBySlug,
    ArticleById,
    Authors,
    /// Capability check for the current session.
    AdminCheck,
    ArticleAnalytics,
    AnalyticsStats,
    UserProfiles,
    AdminRequests,
    MyAdminRequest,
}

impl QueryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::AllArticles => "all-articles",
            QueryKind::MyArticles => "my-articles",
            QueryKind::BlogArticles => "blog-articles",
            QueryKind::ArticleBySlug => "article-by-slug",
            QueryKind::ArticleById => "article",
            QueryKind::Authors => "authors",
            QueryKind::AdminCheck => "admin-check",
            QueryKind::ArticleAnalytics => "article-analytics",
            QueryKind::AnalyticsStats => "analytics-stats",
            QueryKind::UserProfiles => "user-profiles",
            QueryKind::AdminRequests => "admin-requests",
            QueryKind::MyAdminRequest => "my-admin-request",
        }
    }

    /// Reads whose result depends on who is signed in.
    pub fn is_session_scoped(self) -> bool {
        matches!(
            self,
            QueryKind::MyArticles | QueryKind::AdminCheck | QueryKind::MyAdminRequest
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub kind: QueryKind,
    pub param: Option<String>,
}

impl QueryKey {
    pub fn new(kind: QueryKind) -> Self {
        Self { kind, param: None }
    }

    pub fn with_param(kind: QueryKind, param: impl Into<String>) -> Self {
        Self {
            kind,
            param: Some(param.into()),
        }
    }

    pub fn article_by_id(id: Uuid) -> Self {
        Self::with_param(QueryKind::ArticleById, id.to_string())
    }

    pub fn article_by_slug(slug: &str) -> Self {
        Self::with_param(QueryKind::ArticleBySlug, slug)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.param {
            Some(param) => write!(f, "{}/{}", self.kind.as_str(), param),
            None => f.write_str(self.kind.as_str()),
        }
    }
}

/// Selects the cached reads an invalidation applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPattern {
    /// Every key of this operation, whatever its parameters.
    Kind(QueryKind),
    Exact(QueryKey),
}

impl KeyPattern {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            KeyPattern::Kind(kind) => key.kind == *kind,
            KeyPattern::Exact(exact) => exact == key,
        }
    }

    pub fn kind(&self) -> QueryKind {
        match self {
            KeyPattern::Kind(kind) => *kind,
            KeyPattern::Exact(key) => key.kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_pattern_matches_every_parameter() {
        let pattern = KeyPattern::Kind(QueryKind::ArticleById);
        assert!(pattern.matches(&QueryKey::article_by_id(Uuid::nil())));
        assert!(pattern.matches(&QueryKey::article_by_id(Uuid::new_v4())));
        assert!(!pattern.matches(&QueryKey::new(QueryKind::AllArticles)));
    }

    #[test]
    fn exact_pattern_matches_one_key() {
        let id = Uuid::new_v4();
        let pattern = KeyPattern::Exact(QueryKey::article_by_id(id));
        assert!(pattern.matches(&QueryKey::article_by_id(id)));
        assert!(!pattern.matches(&QueryKey::article_by_id(Uuid::nil())));
    }

    #[test]
    fn keys_display_as_paths() {
        assert_eq!(QueryKey::new(QueryKind::Authors).to_string(), "authors");
        assert_eq!(
            QueryKey::article_by_slug("hello").to_string(),
            "article-by-slug/hello"
        );
    }
}
