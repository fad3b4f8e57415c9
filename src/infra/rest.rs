//! HTTP adapter for a PostgREST-style hosted backend.
//!
//! Tables live under `/rest/v1`, procedures under `/rest/v1/rpc`, server
//! functions under `/functions/v1` and the auth endpoints under `/auth/v1`.

use std::sync::RwLock;

use async_trait::async_trait;
use reqwest::{
    Client, Method, RequestBuilder, Response, StatusCode, Url,
    header::{ACCEPT, AUTHORIZATION, HeaderValue},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::application::backend::{
    AuthBackend, AuthUser, BackendError, DataBackend, Filter, FilterOp, Row, Table, TableQuery,
};
use crate::cache::lock::{rw_read, rw_write};
use crate::config::BackendSettings;

use super::error::InfraError;

const SOURCE: &str = "infra::rest";
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";
const MERGE_DUPLICATES: &str = "return=representation,resolution=merge-duplicates";

#[derive(Debug, Clone)]
struct Session {
    access_token: String,
    user: AuthUser,
}

/// Hosted backend reached over HTTP.
#[derive(Debug)]
pub struct RestBackend {
    client: Client,
    base: Url,
    anon_key: Option<String>,
    session: RwLock<Option<Session>>,
}

impl RestBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self, InfraError> {
        let url = settings
            .url
            .as_ref()
            .ok_or_else(|| InfraError::configuration("backend.url is required"))?;
        let base = url
            .join("/")
            .map_err(|err| InfraError::configuration(format!("invalid backend.url: {err}")))?;
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            base,
            anon_key: settings.anon_key.clone(),
            session: RwLock::new(None),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("agencia/", env!("CARGO_PKG_VERSION"))
    }

    fn url(&self, path: &str) -> Result<Url, BackendError> {
        self.base
            .join(path)
            .map_err(|err| BackendError::new(format!("invalid endpoint `{path}`: {err}")))
    }

    fn table_url(&self, table: Table, filters: &[Filter]) -> Result<Url, BackendError> {
        let mut url = self.url(&format!("rest/v1/{table}"))?;
        {
            let mut pairs = url.query_pairs_mut();
            for filter in filters {
                pairs.append_pair(filter.column, &filter_expression(filter));
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, BackendError> {
        let mut builder = self.client.request(method, url);
        if let Some(key) = self.anon_key.as_deref() {
            builder = builder.header("apikey", header_value(key)?);
        }
        let token = rw_read(&self.session, SOURCE, "request")
            .as_ref()
            .map(|session| session.access_token.clone())
            .or_else(|| self.anon_key.clone());
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, header_value(&format!("Bearer {token}"))?);
        }
        Ok(builder)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value, BackendError> {
        let response = builder.send().await.map_err(transport)?;
        parse_response(response).await
    }

    fn store_session(&self, session: Option<Session>) {
        *rw_write(&self.session, SOURCE, "store_session") = session;
    }

    fn access_token(&self) -> Option<String> {
        rw_read(&self.session, SOURCE, "access_token")
            .as_ref()
            .map(|session| session.access_token.clone())
    }
}

#[async_trait]
impl DataBackend for RestBackend {
    async fn select(&self, query: &TableQuery) -> Result<Vec<Row>, BackendError> {
        let url = query_url(self.table_url(query.table, &query.filters)?, query);
        debug!(table = %query.table, url = %url, "select");
        let value = self.send(self.request(Method::GET, url)?).await?;
        rows_from(value)
    }

    async fn select_single(&self, query: &TableQuery) -> Result<Row, BackendError> {
        let url = query_url(self.table_url(query.table, &query.filters)?, query);
        debug!(table = %query.table, url = %url, "select single");
        let builder = self
            .request(Method::GET, url)?
            .header(ACCEPT, SINGLE_OBJECT);
        row_from(self.send(builder).await?)
    }

    async fn insert(&self, table: Table, row: Row) -> Result<Row, BackendError> {
        let url = self.table_url(table, &[])?;
        let builder = self
            .request(Method::POST, url)?
            .header("Prefer", RETURN_REPRESENTATION)
            .header(ACCEPT, SINGLE_OBJECT)
            .json(&row);
        row_from(self.send(builder).await?)
    }

    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Row,
    ) -> Result<Vec<Row>, BackendError> {
        let url = self.table_url(table, filters)?;
        let builder = self
            .request(Method::PATCH, url)?
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&patch);
        rows_from(self.send(builder).await?)
    }

    async fn upsert(&self, table: Table, row: Row, on_conflict: &str) -> Result<Row, BackendError> {
        let mut url = self.table_url(table, &[])?;
        url.query_pairs_mut().append_pair("on_conflict", on_conflict);
        let builder = self
            .request(Method::POST, url)?
            .header("Prefer", MERGE_DUPLICATES)
            .header(ACCEPT, SINGLE_OBJECT)
            .json(&row);
        row_from(self.send(builder).await?)
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<(), BackendError> {
        let url = self.table_url(table, filters)?;
        self.send(self.request(Method::DELETE, url)?).await?;
        Ok(())
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value, BackendError> {
        let url = self.url(&format!("rest/v1/rpc/{function}"))?;
        self.send(self.request(Method::POST, url)?.json(&args)).await
    }

    async fn invoke(&self, function: &str, payload: Value) -> Result<Value, BackendError> {
        let url = self.url(&format!("functions/v1/{function}"))?;
        self.send(self.request(Method::POST, url)?.json(&payload))
            .await
    }
}

#[async_trait]
impl AuthBackend for RestBackend {
    async fn current_user(&self) -> Result<Option<AuthUser>, BackendError> {
        if self.access_token().is_none() {
            return Ok(None);
        }
        let url = self.url("auth/v1/user")?;
        match self.send(self.request(Method::GET, url)?).await {
            Ok(value) => Ok(Some(user_from(value)?)),
            Err(err) if err.status == Some(StatusCode::UNAUTHORIZED.as_u16()) => {
                debug!("Session expired");
                self.store_session(None);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, BackendError> {
        let mut url = self.url("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let builder = self
            .request(Method::POST, url)?
            .json(&json!({ "email": email, "password": password }));
        let session = session_from(self.send(builder).await?)?;
        let user = session.user.clone();
        self.store_session(Some(session));
        Ok(user)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<AuthUser, BackendError> {
        let url = self.url("auth/v1/signup")?;
        let builder = self.request(Method::POST, url)?.json(&json!({
            "email": email,
            "password": password,
            "data": { "full_name": full_name },
        }));
        let value = self.send(builder).await?;
        // Without email confirmation the response is a full session.
        if value.get("access_token").is_some() {
            let session = session_from(value)?;
            let user = session.user.clone();
            self.store_session(Some(session));
            Ok(user)
        } else {
            user_from(value)
        }
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        if self.access_token().is_none() {
            return Ok(());
        }
        let url = self.url("auth/v1/logout")?;
        self.send(self.request(Method::POST, url)?).await?;
        self.store_session(None);
        Ok(())
    }
}

/// PostgREST operator syntax, e.g. `eq.published` or `in.(a,b)`.
fn filter_expression(filter: &Filter) -> String {
    match (filter.op, &filter.value) {
        (FilterOp::In, Value::Array(items)) => {
            let items: Vec<String> = items
                .iter()
                .map(|item| quote_list_item(&scalar_text(item)))
                .collect();
            format!("in.({})", items.join(","))
        }
        (FilterOp::Eq, Value::Null) => "is.null".to_string(),
        (op, value) => format!("{}.{}", op.as_str(), scalar_text(value)),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn quote_list_item(item: &str) -> String {
    if item.contains([',', '(', ')', '"']) {
        format!("\"{}\"", item.replace('"', "\\\""))
    } else {
        item.to_string()
    }
}

fn query_url(mut url: Url, query: &TableQuery) -> Url {
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("select", "*");
        if !query.order.is_empty() {
            let order: Vec<String> = query
                .order
                .iter()
                .map(|order| {
                    let direction = if order.descending { "desc" } else { "asc" };
                    format!("{}.{direction}", order.column)
                })
                .collect();
            pairs.append_pair("order", &order.join(","));
        }
        if let Some(limit) = query.limit {
            pairs.append_pair("limit", &limit.to_string());
        }
    }
    url
}

fn header_value(text: &str) -> Result<HeaderValue, BackendError> {
    HeaderValue::from_str(text).map_err(|err| BackendError::new(format!("invalid header: {err}")))
}

fn transport(err: reqwest::Error) -> BackendError {
    let status = err.status().map(|status| status.as_u16());
    let error = BackendError::new(format!("request failed: {err}"));
    match status {
        Some(status) => error.with_status(status),
        None => error,
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<Value>,
    message: Option<String>,
    msg: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

async fn parse_response(response: Response) -> Result<Value, BackendError> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(transport)?;

    if !status.is_success() {
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
        let message = body
            .message
            .or(body.error_description)
            .or(body.msg)
            .or(body.error)
            .unwrap_or_else(|| {
                format!("status {status} body {}", String::from_utf8_lossy(&bytes))
            });
        let error = match body.code {
            Some(Value::String(code)) => BackendError::with_code(code, message),
            Some(Value::Number(code)) => BackendError::with_code(code.to_string(), message),
            _ => BackendError::new(message),
        };
        return Err(error.with_status(status.as_u16()));
    }

    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(BackendError::decode)
}

fn rows_from(value: Value) -> Result<Vec<Row>, BackendError> {
    match value {
        Value::Array(items) => items.into_iter().map(row_from).collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(BackendError::new(format!("expected a row list, got `{other}`"))),
    }
}

fn row_from(value: Value) -> Result<Row, BackendError> {
    match value {
        Value::Object(row) => Ok(row),
        other => Err(BackendError::new(format!("expected a row, got `{other}`"))),
    }
}

#[derive(Debug, Deserialize)]
struct UserBody {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionBody {
    access_token: String,
    user: UserBody,
}

fn user_from(value: Value) -> Result<AuthUser, BackendError> {
    let body: UserBody = serde_json::from_value(value).map_err(BackendError::decode)?;
    Ok(AuthUser {
        id: body.id,
        email: body.email,
    })
}

fn session_from(value: Value) -> Result<Session, BackendError> {
    let body: SessionBody = serde_json::from_value(value).map_err(BackendError::decode)?;
    Ok(Session {
        access_token: body.access_token,
        user: AuthUser {
            id: body.user.id,
            email: body.user.email,
        },
    })
}
