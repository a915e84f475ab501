//! Sequential candidate execution.
//!
//! # Responsibilities
//! - Build the admitted candidate list for a request
//! - Run candidates one at a time with the short-circuit protocol
//! - Drive the error-path and socket variants through the same loop
//!
//! # Design Decisions
//! - Admission failures are silent exclusion, not errors
//! - A handler error is caught and logged; remaining candidates never run
//! - Zero candidates is a plain fallthrough, not an error

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, error};

use crate::app::App;
use crate::handler::annotations::keys;
use crate::handler::params::ResolveCx;
use crate::handler::Flow;
use crate::http::request::RequestInfo;
use crate::routing::{get_methods, Candidate};
use crate::security::GateContext;

use super::state::{RouterState, SocketSender};

/// Terminal states of one request's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// A redirect was issued or the response was finalized.
    Sent,
    /// The chain ended without producing a response.
    Fallthrough,
}

/// Candidates for `path`, admitted by the security gate. With
/// `errors_only`, handlers must additionally carry a truthy
/// `accept-errors` annotation.
fn admitted_candidates(
    app: &App,
    request: &RequestInfo,
    path: &str,
    status: u16,
    errors_only: bool,
) -> Vec<Candidate> {
    let cx = GateContext::from_request(request, status, &app.schemas);
    let filter = move |_id: crate::handler::HandlerId, annotations: &crate::handler::AnnotationSet| {
        if !app.gate.admit(annotations, &cx) {
            return false;
        }
        if errors_only {
            return annotations
                .get(keys::ACCEPT_ERRORS)
                .map(|v| v.truthy())
                .unwrap_or(false);
        }
        true
    };
    get_methods(&app.table, &app.annotations, path, Some(&filter))
}

/// Run candidates against the state until one of the termination
/// conditions fires.
pub async fn run_chain(
    app: &App,
    state: &RouterState,
    candidates: Vec<Candidate>,
    extra: Option<&Value>,
) -> Completion {
    let total = candidates.len();
    for (index, candidate) in candidates.into_iter().enumerate() {
        let params = app.injector.resolve(
            candidate.dependencies(),
            &ResolveCx {
                state,
                extra,
                handler: candidate.id(),
                resources: &app.resources,
            },
        );

        debug!(
            handler = %candidate.name(),
            method_path = %candidate.method_path(),
            position = index + 1,
            of = total,
            "invoking candidate"
        );

        match candidate.invoke(state.clone(), params).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Done) => state.mark_done(),
            Ok(Flow::Redirect(target)) => state.redirect(target),
            Err(err) => {
                error!(
                    handler = %candidate.name(),
                    method_path = %candidate.method_path(),
                    error = %err,
                    "handler failed; chain falls through"
                );
                return Completion::Fallthrough;
            }
        }

        if state.redirect_target().is_some() {
            return Completion::Sent;
        }
        if state.is_done() {
            return if state.response_sent() {
                Completion::Fallthrough
            } else {
                Completion::Sent
            };
        }
        if state.response_sent() {
            return Completion::Fallthrough;
        }
    }
    Completion::Fallthrough
}

/// Normal dispatch: fresh state, candidates from the request path.
pub async fn dispatch(app: &App, request: Arc<RequestInfo>) -> (RouterState, Completion) {
    let state = RouterState::new(request.clone());
    let candidates =
        admitted_candidates(app, &request, &request.path, state.status(), false);
    let completion = run_chain(app, &state, candidates, None).await;
    (state, completion)
}

/// Error-path dispatch over the same state: candidates come from the
/// synthesized `/error/<status>` path and must accept errors.
pub async fn dispatch_error(app: &App, state: &RouterState, status: u16) -> Completion {
    state.set_status(status);
    let path = format!("/error/{status}");
    let candidates = admitted_candidates(app, &state.request, &path, status, true);
    let extra = json!({ "status": status });
    run_chain(app, state, candidates, Some(&extra)).await
}

/// Socket dispatch: the request is synthesized from a verb-named socket
/// event; handlers can push frames through `sender`, and event params
/// surface as the `params` document.
pub async fn dispatch_socket(
    app: &App,
    request: Arc<RequestInfo>,
    sender: SocketSender,
    extra: Option<&Value>,
) -> (RouterState, Completion) {
    let state = RouterState::new(request.clone()).with_socket(sender);
    let candidates =
        admitted_candidates(app, &request, &request.path, state.status(), false);
    let completion = run_chain(app, &state, candidates, extra).await;
    (state, completion)
}
