//! Aggregations over article engagement counters.

use serde::Serialize;

use crate::domain::entities::ArticleAnalytics;

pub const TOP_ARTICLES_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsStats {
    pub total_articles: usize,
    pub total_views: i64,
    pub total_shares: i64,
    pub total_likes: i64,
    pub average_views: f64,
    /// Highest view counts first, ties broken by slug.
    pub top_articles: Vec<ArticleAnalytics>,
}

impl AnalyticsStats {
    pub fn from_rows(rows: &[ArticleAnalytics]) -> Self {
        let (total_views, total_shares, total_likes) =
            rows.iter().fold((0_i64, 0_i64, 0_i64), |(v, s, l), row| {
                (
                    v.saturating_add(row.views),
                    s.saturating_add(row.shares),
                    l.saturating_add(row.likes),
                )
            });

        let average_views = if rows.is_empty() {
            0.0
        } else {
            total_views as f64 / rows.len() as f64
        };

        let mut ranked = rows.to_vec();
        ranked.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.slug.cmp(&b.slug)));
        ranked.truncate(TOP_ARTICLES_LIMIT);

        Self {
            total_articles: rows.len(),
            total_views,
            total_shares,
            total_likes,
            average_views,
            top_articles: ranked,
        }
    }
}
