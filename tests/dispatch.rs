//! Execution engine behavior: short-circuits, fallthrough, shared
//! documents, error-path and socket dispatch.

use std::sync::Arc;

use serde_json::{json, Value};

use component_server::engine::executor::{dispatch, dispatch_error, dispatch_socket, Completion};
use component_server::engine::state::Slot;
use component_server::handler::{
    handler_fn, Dependency, Flow, HandlerCall, HandlerMeta, HandlerSet, Visibility,
};
use component_server::http::request::{RequestInfo, Transport};

mod common;
use common::{app_with, call_log, failing, logged, recorder};

/// Three overlay siblings under one (component, group, name) identity all
/// become candidates for the collapsed path, in registration order.
fn chain_sets(
    h1: component_server::handler::HandlerFn,
    h2: component_server::handler::HandlerFn,
    h3: component_server::handler::HandlerFn,
) -> Vec<(&'static str, &'static str, HandlerSet)> {
    vec![
        ("/chain", "run", HandlerSet::from_root("/srv/a").handler("index", HandlerMeta::new(), h1)),
        ("/chain", "run", HandlerSet::from_root("/srv/b").handler("index", HandlerMeta::new(), h2)),
        ("/chain", "run", HandlerSet::from_root("/srv/c").handler("index", HandlerMeta::new(), h3)),
    ]
}

#[tokio::test]
async fn done_short_circuits_the_chain() {
    let log = call_log();
    let app = app_with(chain_sets(
        recorder(&log, "h1", Flow::Done),
        recorder(&log, "h2", Flow::Continue),
        recorder(&log, "h3", Flow::Continue),
    ));

    let request = Arc::new(RequestInfo::new("get", "/chain/run/index"));
    let (state, completion) = dispatch(&app, request).await;

    assert_eq!(completion, Completion::Sent);
    assert!(state.is_done());
    assert_eq!(logged(&log), ["h1"]);
}

#[tokio::test]
async fn handler_error_stops_the_chain_without_propagating() {
    let log = call_log();
    let app = app_with(chain_sets(
        failing(&log, "h1"),
        recorder(&log, "h2", Flow::Continue),
        recorder(&log, "h3", Flow::Continue),
    ));

    let request = Arc::new(RequestInfo::new("get", "/chain/run/index"));
    let (_state, completion) = dispatch(&app, request).await;

    assert_eq!(completion, Completion::Fallthrough);
    assert_eq!(logged(&log), ["h1"], "h2 and h3 must never run after an error");
}

#[tokio::test]
async fn all_continue_falls_through_in_registration_order() {
    let log = call_log();
    let app = app_with(chain_sets(
        recorder(&log, "h1", Flow::Continue),
        recorder(&log, "h2", Flow::Continue),
        recorder(&log, "h3", Flow::Continue),
    ));

    let request = Arc::new(RequestInfo::new("get", "/chain/run/index"));
    let (_state, completion) = dispatch(&app, request).await;

    assert_eq!(completion, Completion::Fallthrough);
    assert_eq!(logged(&log), ["h1", "h2", "h3"]);
}

#[tokio::test]
async fn redirect_short_circuits() {
    let log = call_log();
    let app = app_with(chain_sets(
        recorder(&log, "h1", Flow::Redirect("/elsewhere".into())),
        recorder(&log, "h2", Flow::Continue),
        recorder(&log, "h3", Flow::Continue),
    ));

    let request = Arc::new(RequestInfo::new("get", "/chain/run/index"));
    let (state, completion) = dispatch(&app, request).await;

    assert_eq!(completion, Completion::Sent);
    assert_eq!(state.redirect_target().as_deref(), Some("/elsewhere"));
    assert_eq!(logged(&log), ["h1"]);
}

#[tokio::test]
async fn document_mutations_are_visible_to_later_handlers() {
    let writer = handler_fn(|call| async move {
        call.state
            .doc_slot(Slot::Document)
            .lock()
            .unwrap()
            .as_object_mut()
            .unwrap()
            .insert("title".into(), json!("from h1"));
        Ok(Flow::Continue)
    });
    let reader = handler_fn(|call| async move {
        let title = call
            .state
            .doc_slot(Slot::Document)
            .lock()
            .unwrap()
            .get("title")
            .cloned()
            .unwrap_or(Value::Null);
        call.state.send("observed", title);
        Ok(Flow::Done)
    });

    let app = app_with(vec![
        (
            "/doc",
            "flow",
            HandlerSet::from_root("/srv/a").handler(
                "index",
                HandlerMeta::new().dependencies([Dependency::Document]),
                writer,
            ),
        ),
        (
            "/doc",
            "flow",
            HandlerSet::from_root("/srv/b").handler(
                "index",
                HandlerMeta::new().dependencies([Dependency::Document]),
                reader,
            ),
        ),
    ]);

    let request = Arc::new(RequestInfo::new("get", "/doc/flow/index"));
    let (state, completion) = dispatch(&app, request).await;

    assert_eq!(completion, Completion::Sent);
    let plan = state.response_plan();
    assert_eq!(plan.send_fields["observed"], json!("from h1"));
}

#[tokio::test]
async fn scope_resolves_siblings_from_inside_a_handler_body() {
    // A defines `greet`; B's body reaches it through the composed view.
    let greet = handler_fn(|call| async move {
        call.state.send("greeting", json!("hello from A"));
        Ok(Flow::Continue)
    });
    let entry = handler_fn(|call| async move {
        assert!(call.scope.has("greet"));
        let inner = call
            .scope
            .invoke(
                "greet",
                HandlerCall {
                    state: call.state.clone(),
                    scope: call.scope.clone(),
                    params: Default::default(),
                },
            )
            .expect("sibling member must resolve");
        inner.await?;

        // Mutation attempts are rejected and leave the view intact.
        let noop = handler_fn(|_| async { Ok(Flow::Continue) });
        assert!(call.scope.set("x", noop).is_err());
        assert!(call.scope.remove("greet").is_err());
        assert!(call.scope.has("greet"));

        Ok(Flow::Done)
    });

    let app = app_with(vec![
        (
            "/compose",
            "page",
            HandlerSet::from_root("/srv/base").handler(
                "greet",
                HandlerMeta::new().visibility(Visibility::Protected),
                greet,
            ),
        ),
        (
            "/compose",
            "page",
            HandlerSet::from_root("/srv/theme").handler("index", HandlerMeta::new(), entry),
        ),
    ]);

    let request = Arc::new(RequestInfo::new("get", "/compose/page/index"));
    let (state, completion) = dispatch(&app, request).await;

    assert_eq!(completion, Completion::Sent);
    assert_eq!(
        state.response_plan().send_fields["greeting"],
        json!("hello from A")
    );
}

#[tokio::test]
async fn gate_excludes_and_admits_end_to_end() {
    let log = call_log();
    let app = app_with(vec![(
        "/account",
        "api",
        HandlerSet::new().handler(
            "update",
            HandlerMeta::new().methods(["post"]).authenticated(true),
            recorder(&log, "update", Flow::Done),
        ),
    )]);

    // Unauthenticated GET: excluded.
    let request = Arc::new(RequestInfo::new("get", "/account/api/update"));
    let (_state, completion) = dispatch(&app, request).await;
    assert_eq!(completion, Completion::Fallthrough);
    assert!(logged(&log).is_empty());

    // Authenticated POST: admitted.
    let request = Arc::new(
        RequestInfo::new("post", "/account/api/update").with_authenticated(true),
    );
    let (_state, completion) = dispatch(&app, request).await;
    assert_eq!(completion, Completion::Sent);
    assert_eq!(logged(&log), ["update"]);
}

#[tokio::test]
async fn error_path_requires_accept_errors() {
    let log = call_log();
    let error_page = handler_fn(|call| async move {
        let status = call
            .state
            .doc_slot(Slot::Params)
            .lock()
            .unwrap()
            .get("status")
            .cloned()
            .unwrap_or(Value::Null);
        call.state.send("error", status);
        Ok(Flow::Done)
    });

    let app = app_with(vec![
        // Registered for /error/404 via index collapse, opted into errors.
        (
            "/error",
            "404",
            HandlerSet::from_root("/srv/a").handler(
                "index",
                HandlerMeta::new()
                    .accept_errors()
                    .dependencies([Dependency::Params]),
                error_page,
            ),
        ),
        // Same identity, no accept-errors: must stay out of error dispatch.
        (
            "/error",
            "404",
            HandlerSet::from_root("/srv/b").handler(
                "index",
                HandlerMeta::new(),
                recorder(&log, "bystander", Flow::Done),
            ),
        ),
    ]);

    let request = Arc::new(RequestInfo::new("get", "/missing/page"));
    let (state, completion) = dispatch(&app, request).await;
    assert_eq!(completion, Completion::Fallthrough);

    let completion = dispatch_error(&app, &state, 404).await;
    assert_eq!(completion, Completion::Sent);
    assert_eq!(state.status(), 404);
    assert_eq!(state.response_plan().send_fields["error"], json!(404));
    assert!(logged(&log).is_empty(), "handler without accept-errors ran on the error path");
}

#[tokio::test]
async fn socket_dispatch_reaches_verb_named_handlers_and_pushes_frames() {
    let handler = handler_fn(|call| async move {
        if let Some(sender) = &call.state.socket {
            let _ = sender.send("tick".to_string());
        }
        call.state.send("ack", json!(true));
        Ok(Flow::Done)
    });

    let app = app_with(vec![(
        "/live",
        "feed",
        HandlerSet::new().handler(
            "index",
            HandlerMeta::new()
                .methods(["subscribe"])
                .accepts_connect(["websocket"]),
            handler,
        ),
    )]);

    let request = Arc::new(
        RequestInfo::new("subscribe", "/live/feed/index")
            .with_transport(Transport::Websocket),
    );
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let (state, completion) = dispatch_socket(&app, request, tx, None).await;

    assert_eq!(completion, Completion::Sent);
    assert_eq!(state.response_plan().send_fields["ack"], json!(true));
    assert_eq!(rx.recv().await.as_deref(), Some("tick"));

    // The same event over plain HTTP transport is not admitted.
    let request = Arc::new(RequestInfo::new("subscribe", "/live/feed/index"));
    let (_state, completion) = dispatch(&app, request).await;
    assert_eq!(completion, Completion::Fallthrough);
}
