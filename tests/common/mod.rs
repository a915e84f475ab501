//! Shared fixtures for integration tests.

use std::sync::{Arc, Mutex};

use component_server::app::{App, AppBuilder};
use component_server::config::ServerConfig;
use component_server::handler::{handler_fn, Flow, HandlerFn, HandlerSet};

/// Order-preserving record of which handlers ran.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn logged(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// A handler that records its tag and returns a fixed flow.
pub fn recorder(log: &CallLog, tag: &str, flow: Flow) -> HandlerFn {
    let log = log.clone();
    let tag = tag.to_string();
    handler_fn(move |_call| {
        let log = log.clone();
        let tag = tag.clone();
        let flow = flow.clone();
        async move {
            log.lock().unwrap().push(tag);
            Ok(flow)
        }
    })
}

/// A handler that records its tag, then fails.
pub fn failing(log: &CallLog, tag: &str) -> HandlerFn {
    let log = log.clone();
    let tag = tag.to_string();
    handler_fn(move |_call| {
        let log = log.clone();
        let tag = tag.clone();
        async move {
            log.lock().unwrap().push(tag.clone());
            Err(component_server::HandlerError::msg(format!("{tag} exploded")))
        }
    })
}

/// Build a frozen app from (component_path, group, set) registrations.
pub fn app_with(registrations: Vec<(&str, &str, HandlerSet)>) -> Arc<App> {
    let mut builder = AppBuilder::new(ServerConfig::default());
    for (component, group, set) in registrations {
        builder
            .register_handlers(component, group, set)
            .expect("fixture registration failed");
    }
    Arc::new(builder.build())
}
