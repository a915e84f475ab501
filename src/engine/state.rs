//! Per-request router state.
//!
//! # Design Decisions
//! - The state is a bundle of shared cells: cloning it hands the same
//!   request, response plan, done flag, and document slots to an injected
//!   parameter or a candidate closure. One request owns one bundle; nothing
//!   here is shared across requests.
//! - Document slots are lazily initialized on first access so every handler
//!   in a chain observes the mutations of the handlers before it.
//! - Locks guard only synchronous reads/writes; handlers must not hold a
//!   slot guard across an await point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::http::request::RequestInfo;

/// Shared, lazily-created JSON structure (document, body, query, ...).
pub type SharedDoc = Arc<Mutex<Value>>;

/// Channel for server-pushed socket frames, present on socket requests.
pub type SocketSender = mpsc::UnboundedSender<String>;

/// Set-once completion flag shared between the engine and injected `done`
/// parameters.
#[derive(Debug, Clone, Default)]
pub struct DoneSignal(Arc<AtomicBool>);

impl DoneSignal {
    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Everything the response will be built from.
#[derive(Debug, Clone)]
pub struct ResponsePlan {
    pub status: u16,
    pub status_message: Option<String>,
    pub headers: Vec<(String, String)>,
    pub send_fields: Map<String, Value>,
    pub redirect_target: Option<String>,
    pub mime_type: Option<String>,
    pub sent: bool,
}

impl Default for ResponsePlan {
    fn default() -> Self {
        Self {
            status: 200,
            status_message: None,
            headers: Vec::new(),
            send_fields: Map::new(),
            redirect_target: None,
            mime_type: None,
            sent: false,
        }
    }
}

pub type SharedResponse = Arc<Mutex<ResponsePlan>>;

/// Named document slots on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Document,
    Body,
    Query,
    Session,
    Params,
}

#[derive(Debug, Default)]
struct DocSlots {
    document: Option<SharedDoc>,
    body: Option<SharedDoc>,
    query: Option<SharedDoc>,
    session: Option<SharedDoc>,
    params: Option<SharedDoc>,
}

impl DocSlots {
    fn slot_mut(&mut self, slot: Slot) -> &mut Option<SharedDoc> {
        match slot {
            Slot::Document => &mut self.document,
            Slot::Body => &mut self.body,
            Slot::Query => &mut self.query,
            Slot::Session => &mut self.session,
            Slot::Params => &mut self.params,
        }
    }
}

#[derive(Debug, Default)]
struct ActiveComponent {
    name: String,
    path: String,
}

/// The state owned by one request's handler chain.
#[derive(Debug, Clone)]
pub struct RouterState {
    pub request: Arc<RequestInfo>,
    pub response: SharedResponse,
    pub socket: Option<SocketSender>,
    docs: Arc<Mutex<DocSlots>>,
    done: DoneSignal,
    active: Arc<Mutex<ActiveComponent>>,
}

impl RouterState {
    /// Fresh state for one request. Body, query, and session slots are
    /// seeded from what the HTTP layer already parsed; the rest initialize
    /// lazily on first injection.
    pub fn new(request: Arc<RequestInfo>) -> Self {
        let mut slots = DocSlots::default();
        if let Some(body) = &request.body {
            slots.body = Some(Arc::new(Mutex::new(body.clone())));
        }
        if let Some(query) = &request.query {
            slots.query = Some(Arc::new(Mutex::new(query.clone())));
        }
        if let Some(session) = &request.session_values {
            slots.session = Some(Arc::new(Mutex::new(session.clone())));
        }

        Self {
            request,
            response: Arc::new(Mutex::new(ResponsePlan::default())),
            socket: None,
            docs: Arc::new(Mutex::new(slots)),
            done: DoneSignal::default(),
            active: Arc::new(Mutex::new(ActiveComponent::default())),
        }
    }

    pub fn with_socket(mut self, sender: SocketSender) -> Self {
        self.socket = Some(sender);
        self
    }

    /// Lazily-initialized document slot. The first access creates an empty
    /// object; later accesses return the same shared structure.
    pub fn doc_slot(&self, slot: Slot) -> SharedDoc {
        self.doc_slot_seeded(slot, || Value::Object(Map::new()))
    }

    pub fn doc_slot_seeded(&self, slot: Slot, seed: impl FnOnce() -> Value) -> SharedDoc {
        let mut slots = self.docs.lock().expect("doc slots mutex poisoned");
        slots
            .slot_mut(slot)
            .get_or_insert_with(|| Arc::new(Mutex::new(seed())))
            .clone()
    }

    /// A slot without forcing initialization.
    pub fn try_doc(&self, slot: Slot) -> Option<SharedDoc> {
        self.docs
            .lock()
            .expect("doc slots mutex poisoned")
            .slot_mut(slot)
            .clone()
    }

    pub fn mark_done(&self) {
        self.done.set();
    }

    pub fn is_done(&self) -> bool {
        self.done.get()
    }

    pub fn done_signal(&self) -> DoneSignal {
        self.done.clone()
    }

    pub fn status(&self) -> u16 {
        self.response.lock().expect("response mutex poisoned").status
    }

    pub fn set_status(&self, status: u16) {
        self.response.lock().expect("response mutex poisoned").status = status;
    }

    pub fn set_status_message(&self, message: impl Into<String>) {
        self.response
            .lock()
            .expect("response mutex poisoned")
            .status_message = Some(message.into());
    }

    pub fn header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.response
            .lock()
            .expect("response mutex poisoned")
            .headers
            .push((name.into(), value.into()));
    }

    /// Stage a field for the content-negotiated send.
    pub fn send(&self, key: impl Into<String>, value: Value) {
        self.response
            .lock()
            .expect("response mutex poisoned")
            .send_fields
            .insert(key.into(), value);
    }

    pub fn set_mime(&self, mime: impl Into<String>) {
        self.response
            .lock()
            .expect("response mutex poisoned")
            .mime_type = Some(mime.into());
    }

    pub fn redirect(&self, target: impl Into<String>) {
        self.response
            .lock()
            .expect("response mutex poisoned")
            .redirect_target = Some(target.into());
    }

    pub fn redirect_target(&self) -> Option<String> {
        self.response
            .lock()
            .expect("response mutex poisoned")
            .redirect_target
            .clone()
    }

    pub fn response_sent(&self) -> bool {
        self.response.lock().expect("response mutex poisoned").sent
    }

    pub fn mark_sent(&self) {
        self.response.lock().expect("response mutex poisoned").sent = true;
    }

    /// Snapshot of the full response plan, used by finalization.
    pub fn response_plan(&self) -> ResponsePlan {
        self.response.lock().expect("response mutex poisoned").clone()
    }

    pub fn set_active(&self, name: &str, path: &str) {
        let mut active = self.active.lock().expect("active mutex poisoned");
        active.name = name.to_string();
        active.path = path.to_string();
    }

    /// (active_component_name, active_component_path) of the handler
    /// currently invoked.
    pub fn active(&self) -> (String, String) {
        let active = self.active.lock().expect("active mutex poisoned");
        (active.name.clone(), active.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::RequestInfo;

    #[test]
    fn doc_slots_initialize_once_and_share() {
        let state = RouterState::new(Arc::new(RequestInfo::new("get", "/")));

        assert!(state.try_doc(Slot::Document).is_none());
        let first = state.doc_slot(Slot::Document);
        first
            .lock()
            .unwrap()
            .as_object_mut()
            .unwrap()
            .insert("title".into(), Value::String("x".into()));

        let second = state.doc_slot(Slot::Document);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().unwrap()["title"], Value::String("x".into()));
    }

    #[test]
    fn body_slot_is_seeded_from_parsed_request() {
        let request = RequestInfo::new("post", "/submit")
            .with_body(serde_json::json!({"name": "a"}));
        let state = RouterState::new(Arc::new(request));

        let body = state.doc_slot(Slot::Body);
        assert_eq!(body.lock().unwrap()["name"], Value::String("a".into()));
    }

    #[test]
    fn clones_share_done_and_response() {
        let state = RouterState::new(Arc::new(RequestInfo::new("get", "/")));
        let other = state.clone();

        other.mark_done();
        other.set_status(204);

        assert!(state.is_done());
        assert_eq!(state.status(), 204);
    }
}
