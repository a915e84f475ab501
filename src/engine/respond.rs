//! Response finalization.
//!
//! # Responsibilities
//! - Turn a completed response plan into an HTTP response
//! - Issue redirects
//! - Negotiate between JSON and plain-text rendering of the staged fields
//!
//! # Design Decisions
//! - A declared mime type wins over negotiation; otherwise JSON is the
//!   default and text is chosen only when the client's accept list
//!   excludes JSON
//! - Invalid header names/values staged by handlers are dropped with a
//!   warning rather than failing the response

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tracing::warn;

use super::state::{ResponsePlan, RouterState};

/// Finalize and send: redirect if one was staged, otherwise the
/// content-negotiated body. Marks the plan as sent.
pub fn finalize(state: &RouterState) -> Response {
    let plan = state.response_plan();
    state.mark_sent();

    if let Some(target) = &plan.redirect_target {
        let mut response = Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, target.as_str());
        response = with_plan_headers(response, &plan);
        return response
            .body(Body::empty())
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response());
    }

    let status = StatusCode::from_u16(plan.status).unwrap_or(StatusCode::OK);
    let json = match plan.mime_type.as_deref() {
        Some(mime) => mime.contains("json"),
        None => accept_allows_json(&state.request.accept),
    };

    let (content_type, body) = if json {
        (
            "application/json".to_string(),
            Value::Object(plan.send_fields.clone()).to_string(),
        )
    } else {
        let text = match plan.send_fields.get("body") {
            Some(Value::String(body)) => body.clone(),
            Some(other) => other.to_string(),
            None => plan
                .status_message
                .clone()
                .unwrap_or_else(|| Value::Object(plan.send_fields.clone()).to_string()),
        };
        (
            plan.mime_type
                .clone()
                .unwrap_or_else(|| "text/plain; charset=utf-8".to_string()),
            text,
        )
    };

    let mut response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type);
    response = with_plan_headers(response, &plan);
    response
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Response for a chain that produced nothing.
pub fn fallthrough_response(status: u16) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::NOT_FOUND);
    let reason = status.canonical_reason().unwrap_or("");
    (status, reason.to_string()).into_response()
}

fn with_plan_headers(
    mut builder: axum::http::response::Builder,
    plan: &ResponsePlan,
) -> axum::http::response::Builder {
    for (name, value) in &plan.headers {
        match (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            (Ok(name), Ok(value)) => {
                builder = builder.header(name, value);
            }
            _ => warn!(header = %name, "dropping invalid staged header"),
        }
    }
    builder
}

/// JSON is the default; only an accept list that cannot take JSON pushes
/// the response to text.
fn accept_allows_json(accept: &[String]) -> bool {
    if accept.is_empty() {
        return true;
    }
    accept
        .iter()
        .any(|a| a == "*/*" || a == "application/json" || a == "application/*")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::http::request::RequestInfo;

    use super::*;

    #[test]
    fn staged_fields_render_as_json_by_default() {
        let state = RouterState::new(Arc::new(RequestInfo::new("get", "/")));
        state.send("greeting", Value::String("hello".into()));
        state.set_status(201);

        let response = finalize(&state);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert!(state.response_sent());
    }

    #[test]
    fn redirect_wins_over_fields() {
        let state = RouterState::new(Arc::new(RequestInfo::new("get", "/")));
        state.send("ignored", Value::Bool(true));
        state.redirect("/elsewhere");

        let response = finalize(&state);
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/elsewhere"
        );
    }

    #[test]
    fn text_only_clients_get_the_body_field() {
        let request = RequestInfo::new("get", "/").with_accept(["text/html"]);
        let state = RouterState::new(Arc::new(request));
        state.send("body", Value::String("<p>hi</p>".into()));

        let response = finalize(&state);
        let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/plain"));
    }

    #[test]
    fn fallthrough_uses_canonical_reason() {
        let response = fallthrough_response(404);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
