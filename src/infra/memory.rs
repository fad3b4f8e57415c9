//! In-process backend with the same filtering and error conventions as the
//! hosted service. Used by the test suites and for offline runs.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::application::backend::{
    AuthBackend, AuthUser, BackendError, DataBackend, Filter, FilterOp, Row, Table, TableQuery,
    timestamp_value,
};
use crate::application::clock::Clock;
use crate::cache::lock::mutex_lock;

const SOURCE: &str = "infra::memory";
const PERMISSION_DENIED_CODE: &str = "42501";
const UNKNOWN_FUNCTION_CODE: &str = "PGRST202";

/// A server-function call kept for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub function: String,
    pub payload: Value,
}

#[derive(Debug, Clone)]
struct Account {
    user: AuthUser,
    password: String,
}

pub struct MemoryBackend {
    clock: Arc<dyn Clock>,
    tables: Mutex<HashMap<Table, Vec<Row>>>,
    accounts: Mutex<Vec<Account>>,
    session: Mutex<Option<AuthUser>>,
    invocations: Mutex<Vec<Invocation>>,
    failing_tables: Mutex<HashSet<Table>>,
    failing_functions: Mutex<HashSet<String>>,
    select_calls: AtomicUsize,
    latency: Option<Duration>,
}

impl MemoryBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tables: Mutex::new(HashMap::new()),
            accounts: Mutex::new(Vec::new()),
            session: Mutex::new(None),
            invocations: Mutex::new(Vec::new()),
            failing_tables: Mutex::new(HashSet::new()),
            failing_functions: Mutex::new(HashSet::new()),
            select_calls: AtomicUsize::new(0),
            latency: None,
        }
    }

    /// Delay every read, so concurrent callers overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Store rows as-is apart from the usual column defaults.
    pub fn seed(&self, table: Table, rows: impl IntoIterator<Item = Value>) {
        let now = self.clock.now();
        let mut tables = mutex_lock(&self.tables, SOURCE, "seed");
        let stored = tables.entry(table).or_default();
        for value in rows {
            if let Value::Object(mut row) = value {
                apply_defaults(table, &mut row, now);
                stored.push(row);
            }
        }
    }

    pub fn rows(&self, table: Table) -> Vec<Row> {
        mutex_lock(&self.tables, SOURCE, "rows")
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn register_user(&self, email: &str, password: &str) -> AuthUser {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
        };
        mutex_lock(&self.accounts, SOURCE, "register_user").push(Account {
            user: user.clone(),
            password: password.to_string(),
        });
        user
    }

    pub fn set_session(&self, user: Option<AuthUser>) {
        *mutex_lock(&self.session, SOURCE, "set_session") = user;
    }

    /// Reject every write to `table` with a permission error.
    pub fn fail_writes_to(&self, table: Table) {
        mutex_lock(&self.failing_tables, SOURCE, "fail_writes_to").insert(table);
    }

    pub fn fail_function(&self, function: &str) {
        mutex_lock(&self.failing_functions, SOURCE, "fail_function").insert(function.to_string());
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        mutex_lock(&self.invocations, SOURCE, "invocations").clone()
    }

    /// Number of table reads served so far.
    pub fn select_calls(&self) -> usize {
        self.select_calls.load(AtomicOrdering::SeqCst)
    }

    fn check_writable(&self, table: Table) -> Result<(), BackendError> {
        if mutex_lock(&self.failing_tables, SOURCE, "check_writable").contains(&table) {
            return Err(BackendError::with_code(
                PERMISSION_DENIED_CODE,
                format!("permission denied for table {table}"),
            )
            .with_status(403));
        }
        Ok(())
    }

    async fn read(&self, query: &TableQuery) -> Vec<Row> {
        self.select_calls.fetch_add(1, AtomicOrdering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let tables = mutex_lock(&self.tables, SOURCE, "read");
        let mut rows: Vec<Row> = tables
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_all(row, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(tables);

        rows.sort_by(|left, right| {
            for order in &query.order {
                let ordering = compare_columns(left.get(order.column), right.get(order.column));
                let ordering = if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        rows
    }

    fn store(&self, table: Table, mut row: Row) -> Result<Row, BackendError> {
        apply_defaults(table, &mut row, self.clock.now());
        let mut tables = mutex_lock(&self.tables, SOURCE, "store");
        let stored = tables.entry(table).or_default();
        if let Some(column) = unique_column(table)
            && let Some(value) = row.get(column)
            && stored.iter().any(|existing| existing.get(column) == Some(value))
        {
            return Err(BackendError::with_code(
                "23505",
                format!("duplicate key value violates unique constraint \"{table}_{column}_key\""),
            )
            .with_status(409));
        }
        stored.push(row.clone());
        Ok(row)
    }

    fn bump_counter(&self, column: &str, args: &Value) -> Result<Value, BackendError> {
        let slug = args
            .get("article_slug")
            .and_then(Value::as_str)
            .ok_or_else(|| BackendError::new("missing argument `article_slug`").with_status(400))?;
        let mut tables = mutex_lock(&self.tables, SOURCE, "bump_counter");
        if let Some(article) = tables
            .entry(Table::Articles)
            .or_default()
            .iter_mut()
            .find(|row| row.get("slug").and_then(Value::as_str) == Some(slug))
        {
            let current = article.get(column).and_then(Value::as_i64).unwrap_or(0);
            article.insert(column.to_string(), Value::from(current + 1));
        }
        Ok(Value::Null)
    }
}

#[async_trait]
impl DataBackend for MemoryBackend {
    async fn select(&self, query: &TableQuery) -> Result<Vec<Row>, BackendError> {
        Ok(self.read(query).await)
    }

    async fn select_single(&self, query: &TableQuery) -> Result<Row, BackendError> {
        let mut rows = self.read(query).await;
        if rows.len() == 1 {
            Ok(rows.remove(0))
        } else {
            Err(BackendError::no_rows())
        }
    }

    async fn insert(&self, table: Table, row: Row) -> Result<Row, BackendError> {
        self.check_writable(table)?;
        self.store(table, row)
    }

    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Row,
    ) -> Result<Vec<Row>, BackendError> {
        self.check_writable(table)?;
        let mut tables = mutex_lock(&self.tables, SOURCE, "update");
        let mut updated = Vec::new();
        for row in tables.entry(table).or_default().iter_mut() {
            if matches_all(row, filters) {
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn upsert(&self, table: Table, row: Row, on_conflict: &str) -> Result<Row, BackendError> {
        self.check_writable(table)?;
        let key = row.get(on_conflict).cloned();
        {
            let mut tables = mutex_lock(&self.tables, SOURCE, "upsert");
            if let Some(key) = key
                && let Some(existing) = tables
                    .entry(table)
                    .or_default()
                    .iter_mut()
                    .find(|existing| existing.get(on_conflict) == Some(&key))
            {
                for (column, value) in row {
                    existing.insert(column, value);
                }
                return Ok(existing.clone());
            }
        }
        self.store(table, row)
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<(), BackendError> {
        self.check_writable(table)?;
        mutex_lock(&self.tables, SOURCE, "delete")
            .entry(table)
            .or_default()
            .retain(|row| !matches_all(row, filters));
        Ok(())
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value, BackendError> {
        match function {
            "increment_article_views" => self.bump_counter("views", &args),
            "increment_article_shares" => self.bump_counter("shares", &args),
            "increment_article_likes" => self.bump_counter("likes", &args),
            other => Err(BackendError::with_code(
                UNKNOWN_FUNCTION_CODE,
                format!("Could not find the function public.{other}"),
            )
            .with_status(404)),
        }
    }

    async fn invoke(&self, function: &str, payload: Value) -> Result<Value, BackendError> {
        mutex_lock(&self.invocations, SOURCE, "invoke").push(Invocation {
            function: function.to_string(),
            payload,
        });
        if mutex_lock(&self.failing_functions, SOURCE, "invoke").contains(function) {
            return Err(
                BackendError::new(format!("function `{function}` returned an error"))
                    .with_status(500),
            );
        }
        Ok(json!({ "ok": true }))
    }
}

#[async_trait]
impl AuthBackend for MemoryBackend {
    async fn current_user(&self) -> Result<Option<AuthUser>, BackendError> {
        Ok(mutex_lock(&self.session, SOURCE, "current_user").clone())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, BackendError> {
        let user = mutex_lock(&self.accounts, SOURCE, "sign_in")
            .iter()
            .find(|account| {
                account.user.email.as_deref() == Some(email) && account.password == password
            })
            .map(|account| account.user.clone())
            .ok_or_else(|| {
                BackendError::with_code("invalid_credentials", "Invalid login credentials")
                    .with_status(400)
            })?;
        self.set_session(Some(user.clone()));
        Ok(user)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _full_name: &str,
    ) -> Result<AuthUser, BackendError> {
        let exists = mutex_lock(&self.accounts, SOURCE, "sign_up")
            .iter()
            .any(|account| account.user.email.as_deref() == Some(email));
        if exists {
            return Err(
                BackendError::with_code("user_already_exists", "User already registered")
                    .with_status(422),
            );
        }
        let user = self.register_user(email, password);
        self.set_session(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.set_session(None);
        Ok(())
    }
}

fn unique_column(table: Table) -> Option<&'static str> {
    match table {
        Table::Articles => Some("slug"),
        Table::Profiles => Some("id"),
        Table::NewsletterSubscriptions => Some("email"),
        _ => None,
    }
}

fn apply_defaults(table: Table, row: &mut Row, now: OffsetDateTime) {
    let stamp = timestamp_value(Some(now)).unwrap_or(Value::Null);
    row.entry("id")
        .or_insert_with(|| Value::from(Uuid::new_v4().to_string()));
    row.entry("created_at").or_insert_with(|| stamp.clone());

    match table {
        Table::Articles => {
            row.entry("updated_at").or_insert_with(|| stamp.clone());
            for counter in ["views", "shares", "likes"] {
                row.entry(counter).or_insert_with(|| Value::from(0));
            }
        }
        Table::AdminRequests => {
            row.entry("status").or_insert_with(|| Value::from("pending"));
            row.entry("requested_at").or_insert_with(|| stamp.clone());
        }
        Table::Profiles => {
            row.entry("approved").or_insert(Value::Bool(false));
        }
        _ => {}
    }
}

fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| matches(row.get(filter.column), filter))
}

fn matches(cell: Option<&Value>, filter: &Filter) -> bool {
    let cell = cell.unwrap_or(&Value::Null);
    match filter.op {
        FilterOp::Eq => same_value(cell, &filter.value),
        FilterOp::In => match &filter.value {
            Value::Array(items) => items.iter().any(|item| same_value(cell, item)),
            other => same_value(cell, other),
        },
        FilterOp::Lte => !cell.is_null() && compare_values(cell, &filter.value) != Ordering::Greater,
    }
}

fn same_value(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        _ => compare_values(left, right) == Ordering::Equal,
    }
}

/// Nulls sort last, as Postgres does for ascending order.
fn compare_columns(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    let left = left.unwrap_or(&Value::Null);
    let right = right.unwrap_or(&Value::Null);
    match (left.is_null(), right.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare_values(left, right),
    }
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    if let (Some(left), Some(right)) = (left.as_f64(), right.as_f64()) {
        return left.partial_cmp(&right).unwrap_or(Ordering::Equal);
    }
    let left = text(left);
    let right = text(right);
    if let (Ok(left), Ok(right)) = (
        OffsetDateTime::parse(&left, &Rfc3339),
        OffsetDateTime::parse(&right, &Rfc3339),
    ) {
        return left.cmp(&right);
    }
    left.cmp(&right)
}

fn text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
