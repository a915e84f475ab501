//! Request context extraction.
//!
//! # Responsibilities
//! - Reduce an incoming HTTP request to the immutable facts the dispatch
//!   core consumes: method, path, headers, negotiated accept list,
//!   transport classification, parsed query and body, session state
//! - Carry the request id added by the request-id layer
//!
//! # Design Decisions
//! - Everything is extracted once, before dispatch; handlers never touch
//!   the hyper request again
//! - Method names and header names are lower-cased up front
//! - Body parsing is by content type (JSON or form); anything else leaves
//!   the body absent rather than failing the request

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::config::schema::ServerConfig;
use crate::http::session::SessionStore;

/// Transport classification used by the `accepts-connect` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Get,
    Xhr,
    Websocket,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Get => "get",
            Transport::Xhr => "xhr",
            Transport::Websocket => "websocket",
        }
    }
}

/// The immutable request facts shared by the whole chain.
#[derive(Debug)]
pub struct RequestInfo {
    pub id: String,
    /// Lower-cased HTTP method, or socket event name.
    pub method: String,
    pub path: String,
    /// Lower-cased header names with their values.
    pub headers: Vec<(String, String)>,
    /// Accept types in header order, lower-cased, parameters stripped.
    pub accept: Vec<String>,
    pub content_type: Option<String>,
    pub transport: Transport,
    pub authenticated: bool,
    pub session_id: Option<String>,
    /// Session values at request start; the chain mutates its own copy.
    pub session_values: Option<Value>,
    /// Parsed query string, when present.
    pub query: Option<Value>,
    /// Parsed request body, when present and parseable.
    pub body: Option<Value>,
}

impl RequestInfo {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            method: method.into().to_lowercase(),
            path: path.into(),
            headers: Vec::new(),
            accept: Vec::new(),
            content_type: None,
            transport: Transport::Get,
            authenticated: false,
            session_id: None,
            session_values: None,
            query: None,
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, query: Value) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_authenticated(mut self, authenticated: bool) -> Self {
        self.authenticated = authenticated;
        self
    }

    pub fn with_session(mut self, id: impl Into<String>, values: Value) -> Self {
        self.session_id = Some(id.into());
        self.session_values = Some(values);
        self
    }

    pub fn with_accept<I, S>(mut self, accept: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accept = accept.into_iter().map(|a| a.into().to_lowercase()).collect();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.headers
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Extract the request context from an incoming hyper request. Consumes the
/// request to read its body.
pub async fn extract(
    request: Request<Body>,
    sessions: &SessionStore,
    config: &ServerConfig,
) -> Arc<RequestInfo> {
    let (parts, body) = request.into_parts();

    let headers: Vec<(String, String)> = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    let header = |name: &str| {
        headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    };

    let id = header("x-request-id")
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let accept = header("accept").map(parse_accept).unwrap_or_default();
    let content_type = header("content-type")
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_lowercase());
    let transport = classify_transport(header("upgrade"), header("x-requested-with"));

    let session = sessions.lookup(header("cookie"), &config.session.cookie_name);
    let (session_id, session_values, authenticated) = match session {
        Some((id, data)) => (Some(id), Some(data.values), data.authenticated),
        None => (None, None, false),
    };

    let query = parts.uri.query().map(parse_query);
    let body = read_body(body, content_type.as_deref(), config.limits.body_limit_bytes).await;

    let mut info = RequestInfo::new(parts.method.as_str(), parts.uri.path());
    info.id = id;
    info.headers = headers;
    info.accept = accept;
    info.content_type = content_type;
    info.transport = transport;
    info.authenticated = authenticated;
    info.session_id = session_id;
    info.session_values = session_values;
    info.query = query;
    info.body = body;

    debug!(
        request_id = %info.id,
        method = %info.method,
        path = %info.path,
        transport = info.transport.as_str(),
        authenticated = info.authenticated,
        "request context extracted"
    );

    Arc::new(info)
}

/// `Accept: text/html, application/json;q=0.9` → `["text/html",
/// "application/json"]`.
fn parse_accept(header: &str) -> Vec<String> {
    header
        .split(',')
        .filter_map(|part| {
            let ty = part.split(';').next().unwrap_or("").trim().to_lowercase();
            (!ty.is_empty()).then_some(ty)
        })
        .collect()
}

fn classify_transport(upgrade: Option<&str>, requested_with: Option<&str>) -> Transport {
    if upgrade
        .map(|u| u.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
    {
        return Transport::Websocket;
    }
    if requested_with
        .map(|x| x.eq_ignore_ascii_case("xmlhttprequest"))
        .unwrap_or(false)
    {
        return Transport::Xhr;
    }
    Transport::Get
}

fn parse_query(raw: &str) -> Value {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        map.insert(key.into_owned(), Value::String(value.into_owned()));
    }
    Value::Object(map)
}

async fn read_body(body: Body, content_type: Option<&str>, limit: usize) -> Option<Value> {
    let bytes = axum::body::to_bytes(body, limit).await.ok()?;
    if bytes.is_empty() {
        return None;
    }
    match content_type {
        Some("application/json") => serde_json::from_slice(&bytes).ok(),
        Some("application/x-www-form-urlencoded") => {
            let mut map = Map::new();
            for (key, value) in url::form_urlencoded::parse(&bytes) {
                map.insert(key.into_owned(), Value::String(value.into_owned()));
            }
            Some(Value::Object(map))
        }
        _ => None,
    }
}
