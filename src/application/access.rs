//! Profiles, admin-access requests and the session capability check.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::backend::{
    AuthUser, Backend, Filter, Row, Table, TableQuery, decode_row, decode_rows, timestamp_value,
};
use crate::application::clock::Clock;
use crate::application::error::AppError;
use crate::application::mutation::MutationContext;
use crate::cache::{Mutation, QueryCache, QueryKey, QueryKind};
use crate::domain::access::{Capabilities, Role};
use crate::domain::entities::{AdminRequest, UserProfile};
use crate::domain::types::{AdminLevel, RequestStatus, UserRole};

const ANONYMOUS_PARAM: &str = "anonymous";

/// Outcome of the capability check for the current session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessCheck {
    pub user: Option<AuthUser>,
    pub profile: Option<UserProfile>,
    pub role: Role,
    pub capabilities: Capabilities,
}

impl AccessCheck {
    pub fn anonymous() -> Self {
        Self::resolve(None, None)
    }

    fn resolve(user: Option<AuthUser>, profile: Option<UserProfile>) -> Self {
        let role = Role::from_profile(profile.as_ref());
        Self {
            user,
            profile,
            role,
            capabilities: role.capabilities(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewAdminRequest {
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub message: Option<String>,
    pub role: UserRole,
}

#[derive(Clone)]
pub struct AccessService {
    backend: Arc<dyn Backend>,
    cache: Arc<QueryCache>,
    mutations: MutationContext,
    clock: Arc<dyn Clock>,
}

impl AccessService {
    pub fn new(backend: Arc<dyn Backend>, mutations: MutationContext, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            cache: Arc::clone(mutations.cache()),
            mutations,
            clock,
        }
    }

    /// Resolve the session's role. Never fails: any lookup error degrades to
    /// an anonymous result.
    pub async fn check_approved_admin(&self) -> AccessCheck {
        let user = match self.backend.current_user().await {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "Session lookup failed, treating as anonymous");
                return AccessCheck::anonymous();
            }
        };
        let param = user
            .as_ref()
            .map_or_else(|| ANONYMOUS_PARAM.to_string(), |user| user.id.to_string());

        let backend = Arc::clone(&self.backend);
        let key = QueryKey::with_param(QueryKind::AdminCheck, param);
        let fetched = self
            .cache
            .fetch(key, move || async move {
                let Some(user) = user else {
                    return Ok(AccessCheck::anonymous());
                };
                let query = TableQuery::from(Table::Profiles)
                    .filter(Filter::eq("id", user.id.to_string()));
                let profile = match backend.select_single(&query).await {
                    Ok(row) => match decode_row::<UserProfile>(row) {
                        Ok(profile) => Some(profile),
                        Err(err) => {
                            warn!(user_id = %user.id, error = %err, "Undecodable profile row");
                            None
                        }
                    },
                    Err(err) if err.is_no_rows() => None,
                    Err(err) => {
                        warn!(user_id = %user.id, error = %err, "Profile lookup failed");
                        None
                    }
                };
                Ok(AccessCheck::resolve(Some(user), profile))
            })
            .await;

        fetched.unwrap_or_else(|err| {
            warn!(error = %err, "Capability check failed, treating as anonymous");
            AccessCheck::anonymous()
        })
    }

    pub async fn list_user_profiles(&self) -> Result<Vec<UserProfile>, AppError> {
        let backend = Arc::clone(&self.backend);
        self.cache
            .fetch(QueryKey::new(QueryKind::UserProfiles), move || async move {
                let rows = backend
                    .select(&TableQuery::from(Table::Profiles).order_asc("email"))
                    .await?;
                Ok(decode_rows(rows)?)
            })
            .await
    }

    pub async fn list_admin_requests(&self) -> Result<Vec<AdminRequest>, AppError> {
        let backend = Arc::clone(&self.backend);
        self.cache
            .fetch(QueryKey::new(QueryKind::AdminRequests), move || async move {
                let rows = backend
                    .select(&TableQuery::from(Table::AdminRequests).order_desc("requested_at"))
                    .await?;
                Ok(decode_rows(rows)?)
            })
            .await
    }

    /// The signed-in user's latest request; `None` when there is none.
    pub async fn get_my_admin_request(&self) -> Result<Option<AdminRequest>, AppError> {
        let Some(user) = self.backend.current_user().await? else {
            return Ok(None);
        };
        let backend = Arc::clone(&self.backend);
        self.cache
            .fetch(
                QueryKey::with_param(QueryKind::MyAdminRequest, user.id.to_string()),
                move || async move {
                    let query = TableQuery::from(Table::AdminRequests)
                        .filter(Filter::eq("user_id", user.id.to_string()))
                        .order_desc("requested_at")
                        .limit(1);
                    match backend.select_single(&query).await {
                        Ok(row) => Ok(Some(decode_row(row)?)),
                        Err(err) if err.is_no_rows() => Ok(None),
                        Err(err) => Err(err.into()),
                    }
                },
            )
            .await
    }

    pub async fn create_admin_request(
        &self,
        input: NewAdminRequest,
    ) -> Result<AdminRequest, AppError> {
        self.mutations
            .run(Mutation::CreateAdminRequest, async {
                let user = self.require_user().await?;
                let mut row = Row::new();
                row.insert("user_id".into(), Value::from(user.id.to_string()));
                row.insert("email".into(), Value::from(input.email.trim()));
                row.insert("full_name".into(), Value::from(input.full_name.trim()));
                if let Some(message) = input.message.as_deref() {
                    row.insert("message".into(), Value::from(message));
                }
                row.insert("role".into(), Value::from(input.role.as_str()));
                row.insert(
                    "status".into(),
                    Value::from(RequestStatus::Pending.as_str()),
                );
                Ok(decode_row(
                    self.backend.insert(Table::AdminRequests, row).await?,
                )?)
            })
            .await
    }

    /// Approve a pending request and grant the requested role.
    ///
    /// The request update and the profile upsert are separate remote calls.
    /// When the upsert fails the request stays approved without a matching
    /// profile; the failure is logged and returned, nothing is rolled back.
    pub async fn approve_admin_request(
        &self,
        request_id: Uuid,
        role: UserRole,
    ) -> Result<UserProfile, AppError> {
        self.mutations
            .run(Mutation::ApproveAdminRequest, async {
                let reviewer = self.require_user().await?;
                let request = self.fetch_request(request_id).await?;
                if !request.is_pending() {
                    return Err(AppError::invalid_input(format!(
                        "admin request is already {}",
                        request.status.as_str()
                    )));
                }

                let review = self.review_row(RequestStatus::Approved, reviewer.id, self.clock.now())?;
                let reviewed = self
                    .backend
                    .update(
                        Table::AdminRequests,
                        &[
                            Filter::eq("id", request_id.to_string()),
                            Filter::eq("status", RequestStatus::Pending.as_str()),
                        ],
                        review,
                    )
                    .await?;
                if reviewed.is_empty() {
                    return Err(AppError::not_found("pending admin request"));
                }

                let mut profile = Row::new();
                profile.insert("id".into(), Value::from(request.user_id.to_string()));
                profile.insert("email".into(), Value::from(request.email.clone()));
                profile.insert("full_name".into(), Value::from(request.full_name.clone()));
                profile.insert("role".into(), Value::from(role.as_str()));
                profile.insert("approved".into(), Value::Bool(true));

                match self.backend.upsert(Table::Profiles, profile, "id").await {
                    Ok(row) => Ok(decode_row(row)?),
                    Err(err) => {
                        error!(
                            request_id = %request_id,
                            user_id = %request.user_id,
                            error = %err,
                            "Request approved but profile upsert failed"
                        );
                        Err(err.into())
                    }
                }
            })
            .await
    }

    pub async fn reject_admin_request(&self, request_id: Uuid) -> Result<AdminRequest, AppError> {
        self.mutations
            .run(Mutation::RejectAdminRequest, async {
                let reviewer = self.require_user().await?;
                let review = self.review_row(RequestStatus::Rejected, reviewer.id, self.clock.now())?;
                let mut rows = self
                    .backend
                    .update(
                        Table::AdminRequests,
                        &[
                            Filter::eq("id", request_id.to_string()),
                            Filter::eq("status", RequestStatus::Pending.as_str()),
                        ],
                        review,
                    )
                    .await?;
                let row = rows
                    .pop()
                    .ok_or_else(|| AppError::not_found("pending admin request"))?;
                Ok(decode_row(row)?)
            })
            .await
    }

    pub async fn delete_user_profile(&self, user_id: Uuid) -> Result<(), AppError> {
        self.mutations
            .run(Mutation::DeleteUserProfile, async {
                self.backend
                    .delete(Table::Profiles, &[Filter::eq("id", user_id.to_string())])
                    .await?;
                Ok(())
            })
            .await
    }

    pub async fn update_admin_level(
        &self,
        user_id: Uuid,
        level: AdminLevel,
    ) -> Result<UserProfile, AppError> {
        self.mutations
            .run(
                Mutation::UpdateAdminLevel,
                self.patch_profile(user_id, "admin_level", Value::from(level.as_str())),
            )
            .await
    }

    pub async fn update_user_role(
        &self,
        user_id: Uuid,
        role: UserRole,
    ) -> Result<UserProfile, AppError> {
        self.mutations
            .run(
                Mutation::UpdateUserRole,
                self.patch_profile(user_id, "role", Value::from(role.as_str())),
            )
            .await
    }

    async fn patch_profile(
        &self,
        user_id: Uuid,
        column: &str,
        value: Value,
    ) -> Result<UserProfile, AppError> {
        let mut patch = Row::new();
        patch.insert(column.into(), value);
        let mut rows = self
            .backend
            .update(Table::Profiles, &[Filter::eq("id", user_id.to_string())], patch)
            .await?;
        let row = rows.pop().ok_or_else(|| AppError::not_found("user profile"))?;
        Ok(decode_row(row)?)
    }

    async fn require_user(&self) -> Result<AuthUser, AppError> {
        self.backend
            .current_user()
            .await?
            .ok_or(AppError::Unauthenticated)
    }

    async fn fetch_request(&self, request_id: Uuid) -> Result<AdminRequest, AppError> {
        let query =
            TableQuery::from(Table::AdminRequests).filter(Filter::eq("id", request_id.to_string()));
        match self.backend.select_single(&query).await {
            Ok(row) => Ok(decode_row(row)?),
            Err(err) if err.is_no_rows() => Err(AppError::not_found("admin request")),
            Err(err) => Err(err.into()),
        }
    }

    fn review_row(
        &self,
        status: RequestStatus,
        reviewer: Uuid,
        at: OffsetDateTime,
    ) -> Result<Row, AppError> {
        let mut row = Row::new();
        row.insert("status".into(), Value::from(status.as_str()));
        row.insert("reviewed_by".into(), Value::from(reviewer.to_string()));
        row.insert("reviewed_at".into(), timestamp_value(Some(at))?);
        Ok(row)
    }
}
