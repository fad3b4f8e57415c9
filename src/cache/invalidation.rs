//! The invalidation graph: which cached reads each write makes stale.
//!
//! Writes run their invalidation only after the backend confirmed success, so
//! a later read of any key listed here refetches instead of serving old data.

use uuid::Uuid;

use super::keys::{KeyPattern, QueryKey, QueryKind};

const ARTICLE_LISTINGS: [QueryKind; 5] = [
    QueryKind::AllArticles,
    QueryKind::MyArticles,
    QueryKind::BlogArticles,
    QueryKind::ArticleAnalytics,
    QueryKind::AnalyticsStats,
];

const SESSION_SCOPED: [QueryKind; 3] = [
    QueryKind::MyArticles,
    QueryKind::AdminCheck,
    QueryKind::MyAdminRequest,
];

/// Writes issued against the hosted backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutation {
    CreateArticle,
    UpdateArticle { id: Uuid },
    DeleteArticle { id: Uuid },
    CreateAuthor,
    CreateAdminRequest,
    ApproveAdminRequest,
    RejectAdminRequest,
    DeleteUserProfile,
    UpdateAdminLevel,
    UpdateUserRole,
    SignIn,
    SignUp,
    SignOut,
    SubmitContact,
    SubscribeNewsletter,
}

impl Mutation {
    pub fn name(self) -> &'static str {
        match self {
            Mutation::CreateArticle => "create_article",
            Mutation::UpdateArticle { .. } => "update_article",
            Mutation::DeleteArticle { .. } => "delete_article",
            Mutation::CreateAuthor => "create_author",
            Mutation::CreateAdminRequest => "create_admin_request",
            Mutation::ApproveAdminRequest => "approve_admin_request",
            Mutation::RejectAdminRequest => "reject_admin_request",
            Mutation::DeleteUserProfile => "delete_user_profile",
            Mutation::UpdateAdminLevel => "update_admin_level",
            Mutation::UpdateUserRole => "update_user_role",
            Mutation::SignIn => "sign_in",
            Mutation::SignUp => "sign_up",
            Mutation::SignOut => "sign_out",
            Mutation::SubmitContact => "submit_contact",
            Mutation::SubscribeNewsletter => "subscribe_newsletter",
        }
    }

    pub fn invalidates(self) -> Vec<KeyPattern> {
        match self {
            Mutation::CreateArticle => kinds(&ARTICLE_LISTINGS),
            Mutation::UpdateArticle { id } | Mutation::DeleteArticle { id } => {
                let mut patterns = kinds(&ARTICLE_LISTINGS);
                patterns.push(KeyPattern::Exact(QueryKey::article_by_id(id)));
                patterns.push(KeyPattern::Kind(QueryKind::ArticleBySlug));
                patterns
            }
            Mutation::CreateAuthor => kinds(&[QueryKind::Authors]),
            Mutation::CreateAdminRequest => {
                kinds(&[QueryKind::MyAdminRequest, QueryKind::AdminRequests])
            }
            Mutation::ApproveAdminRequest => kinds(&[
                QueryKind::AdminRequests,
                QueryKind::MyAdminRequest,
                QueryKind::UserProfiles,
                QueryKind::AdminCheck,
            ]),
            Mutation::RejectAdminRequest => kinds(&[QueryKind::AdminRequests]),
            Mutation::DeleteUserProfile | Mutation::UpdateAdminLevel | Mutation::UpdateUserRole => {
                kinds(&[QueryKind::UserProfiles, QueryKind::AdminCheck])
            }
            Mutation::SignIn | Mutation::SignUp | Mutation::SignOut => kinds(&SESSION_SCOPED),
            Mutation::SubmitContact | Mutation::SubscribeNewsletter => Vec::new(),
        }
    }
}

fn kinds(kinds: &[QueryKind]) -> Vec<KeyPattern> {
    kinds.iter().copied().map(KeyPattern::Kind).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits(mutation: Mutation, key: &QueryKey) -> bool {
        mutation.invalidates().iter().any(|pattern| pattern.matches(key))
    }

    #[test]
    fn article_writes_touch_the_three_listings() {
        let id = Uuid::new_v4();
        for mutation in [
            Mutation::CreateArticle,
            Mutation::UpdateArticle { id },
            Mutation::DeleteArticle { id },
        ] {
            for kind in [
                QueryKind::AllArticles,
                QueryKind::MyArticles,
                QueryKind::BlogArticles,
            ] {
                assert!(hits(mutation, &QueryKey::new(kind)), "{mutation:?} {kind:?}");
            }
            assert!(!hits(mutation, &QueryKey::new(QueryKind::Authors)));
        }
    }

    #[test]
    fn update_targets_only_its_own_article_entry() {
        let id = Uuid::new_v4();
        let mutation = Mutation::UpdateArticle { id };
        assert!(hits(mutation, &QueryKey::article_by_id(id)));
        assert!(!hits(mutation, &QueryKey::article_by_id(Uuid::new_v4())));
        assert!(!hits(
            Mutation::CreateArticle,
            &QueryKey::article_by_id(id)
        ));
    }

    #[test]
    fn reject_only_refreshes_the_request_listing() {
        let patterns = Mutation::RejectAdminRequest.invalidates();
        assert_eq!(patterns, vec![KeyPattern::Kind(QueryKind::AdminRequests)]);
    }

    #[test]
    fn approval_refreshes_permissions() {
        assert!(hits(
            Mutation::ApproveAdminRequest,
            &QueryKey::new(QueryKind::AdminCheck)
        ));
        assert!(hits(
            Mutation::ApproveAdminRequest,
            &QueryKey::new(QueryKind::UserProfiles)
        ));
    }

    #[test]
    fn profile_writes_refresh_profiles() {
        for mutation in [
            Mutation::DeleteUserProfile,
            Mutation::UpdateAdminLevel,
            Mutation::UpdateUserRole,
        ] {
            assert!(hits(mutation, &QueryKey::new(QueryKind::UserProfiles)));
        }
    }

    #[test]
    fn session_changes_drop_per_user_reads() {
        for kind in SESSION_SCOPED {
            assert!(kind.is_session_scoped());
            assert!(hits(Mutation::SignOut, &QueryKey::new(kind)));
        }
        assert!(!hits(
            Mutation::SignOut,
            &QueryKey::new(QueryKind::BlogArticles)
        ));
    }

    #[test]
    fn contact_writes_invalidate_nothing() {
        assert!(Mutation::SubmitContact.invalidates().is_empty());
        assert!(Mutation::SubscribeNewsletter.invalidates().is_empty());
    }
}
