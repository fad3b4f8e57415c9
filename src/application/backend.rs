//! Port describing the hosted backend: table operations, remote procedures,
//! server functions and the auth sub-interface.

use std::fmt;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Error code the REST layer returns when a single-row read matched nothing.
pub const NO_ROWS_CODE: &str = "PGRST116";
/// Postgres unique constraint violation.
pub const UNIQUE_VIOLATION_CODE: &str = "23505";

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    pub code: Option<String>,
    pub message: String,
    pub status: Option<u16>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn no_rows() -> Self {
        Self::with_code(
            NO_ROWS_CODE,
            "JSON object requested, multiple (or no) rows returned",
        )
        .with_status(406)
    }

    pub fn is_no_rows(&self) -> bool {
        self.code.as_deref() == Some(NO_ROWS_CODE)
    }

    pub fn is_unique_violation(&self) -> bool {
        self.code.as_deref() == Some(UNIQUE_VIOLATION_CODE)
    }

    pub fn decode(err: impl fmt::Display) -> Self {
        Self::new(format!("failed to decode backend payload: {err}"))
    }
}

/// Relations exposed by the hosted backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Articles,
    Authors,
    Profiles,
    AdminRequests,
    ContactSubmissions,
    ScheduleSubmissions,
    ArticleAnalytics,
    UserArticles,
    NewsletterSubscriptions,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Articles => "articles",
            Table::Authors => "authors",
            Table::Profiles => "profiles",
            Table::AdminRequests => "admin_requests",
            Table::ContactSubmissions => "contact_submissions",
            Table::ScheduleSubmissions => "schedule_submissions",
            Table::ArticleAnalytics => "article_analytics",
            Table::UserArticles => "user_articles",
            Table::NewsletterSubscriptions => "newsletter_subscriptions",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lte,
    In,
}

impl FilterOp {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Lte => "lte",
            FilterOp::In => "in",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: &'static str,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Self {
            column,
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn lte(column: &'static str, value: impl Into<Value>) -> Self {
        Self {
            column,
            op: FilterOp::Lte,
            value: value.into(),
        }
    }

    pub fn any_of<I, V>(column: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            column,
            op: FilterOp::In,
            value: Value::Array(values.into_iter().map(Into::into).collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub descending: bool,
}

/// A read against one relation.
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    pub table: Table,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl TableQuery {
    pub fn from(table: Table) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_asc(mut self, column: &'static str) -> Self {
        self.order.push(Order {
            column,
            descending: false,
        });
        self
    }

    pub fn order_desc(mut self, column: &'static str) -> Self {
        self.order.push(Order {
            column,
            descending: true,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

/// Table and procedure access against the hosted backend.
#[async_trait]
pub trait DataBackend: Send + Sync {
    async fn select(&self, query: &TableQuery) -> Result<Vec<Row>, BackendError>;

    /// Exactly one row, or an error carrying [`NO_ROWS_CODE`].
    async fn select_single(&self, query: &TableQuery) -> Result<Row, BackendError>;

    async fn insert(&self, table: Table, row: Row) -> Result<Row, BackendError>;

    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Row,
    ) -> Result<Vec<Row>, BackendError>;

    async fn upsert(&self, table: Table, row: Row, on_conflict: &str) -> Result<Row, BackendError>;

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<(), BackendError>;

    /// Call a database procedure.
    async fn rpc(&self, function: &str, args: Value) -> Result<Value, BackendError>;

    /// Invoke a deployed server function.
    async fn invoke(&self, function: &str, payload: Value) -> Result<Value, BackendError>;
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn current_user(&self) -> Result<Option<AuthUser>, BackendError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, BackendError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<AuthUser, BackendError>;

    async fn sign_out(&self) -> Result<(), BackendError>;
}

/// Both halves of the backend, as held by the services.
pub trait Backend: DataBackend + AuthBackend {}

impl<T> Backend for T where T: DataBackend + AuthBackend {}

pub fn decode_row<T: DeserializeOwned>(row: Row) -> Result<T, BackendError> {
    serde_json::from_value(Value::Object(row)).map_err(BackendError::decode)
}

pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, BackendError> {
    rows.into_iter().map(decode_row).collect()
}

/// RFC 3339 text for a timestamp column, `null` when absent.
pub fn timestamp_value(at: Option<OffsetDateTime>) -> Result<Value, BackendError> {
    match at {
        Some(at) => at
            .format(&Rfc3339)
            .map(Value::from)
            .map_err(BackendError::decode),
        None => Ok(Value::Null),
    }
}

pub fn encode_row<T: Serialize>(value: &T) -> Result<Row, BackendError> {
    match serde_json::to_value(value).map_err(BackendError::decode)? {
        Value::Object(row) => Ok(row),
        other => Err(BackendError::new(format!(
            "expected an object payload, got `{other}`"
        ))),
    }
}
