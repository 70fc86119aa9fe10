//! Per-call reasoning tracker.
//!
//! A [`StreamSession`] lives exactly as long as one streaming call. It
//! remembers which reasoning kinds currently have an open panel, the text
//! accumulated for each, and the visible answer text. Frames are folded into
//! it one at a time, in wire order.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::error::FrameError;
use crate::core::events::{resolve_frame, EventKind, ReasoningKind, ResolvedEvent, StreamEvent};
use crate::core::reasoning::ReasoningStore;
use crate::core::sse::SseFrame;

/// Observer hooks for one streaming call. Every method defaults to a no-op,
/// so implementors pick the subset they care about.
pub trait StreamCallbacks: Send {
    fn on_text_delta(&mut self, _text: &str) {}

    /// `part` is the raw part object when the trace was opened by a
    /// `*_part.added` event.
    fn on_reasoning_start(&mut self, _kind: ReasoningKind, _part: Option<&Value>) {}

    fn on_reasoning_delta(&mut self, _kind: ReasoningKind, _delta: &str) {}

    fn on_reasoning_done(&mut self, _kind: ReasoningKind, _final_text: &str) {}

    fn on_completed(&mut self, _final_text: &str, _raw_event: Option<&Value>) {}

    fn on_error(&mut self, _error: &FrameError) {}

    /// Sees every typed event before it is dispatched.
    fn on_event(&mut self, _event: &ResolvedEvent) {}
}

impl StreamCallbacks for () {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// A completion signal has been seen; later frames are only drained.
    Completed,
}

#[derive(Debug)]
pub struct StreamSession {
    conversation_id: String,
    window_id: Option<String>,
    active: HashMap<ReasoningKind, String>,
    texts: HashMap<String, String>,
    final_text: String,
    completed: bool,
}

impl StreamSession {
    pub fn new(conversation_id: impl Into<String>, window_id: Option<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            window_id,
            active: HashMap::new(),
            texts: HashMap::new(),
            final_text: String::new(),
            completed: false,
        }
    }

    pub fn final_text(&self) -> &str {
        &self.final_text
    }

    pub fn into_final_text(self) -> String {
        self.final_text
    }

    pub fn window_id(&self) -> Option<&str> {
        self.window_id.as_deref()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Panel currently open for `kind`, if any.
    pub fn active_panel(&self, kind: ReasoningKind) -> Option<&str> {
        self.active.get(&kind).map(String::as_str)
    }

    pub fn open_panel_count(&self) -> usize {
        self.active.len()
    }

    /// Resolve and apply one decoded frame.
    pub fn process_frame(
        &mut self,
        frame: &SseFrame,
        store: &ReasoningStore,
        callbacks: &mut dyn StreamCallbacks,
    ) -> Flow {
        match resolve_frame(frame) {
            Ok(StreamEvent::Done) => self.complete(None, store, callbacks),
            Ok(StreamEvent::Typed(event)) => {
                callbacks.on_event(&event);
                self.apply(&event, store, callbacks)
            }
            Err(err) => {
                warn!(event = %frame.event, error = %err, "Skipping malformed stream frame");
                callbacks.on_error(&err);
                self.flow()
            }
        }
    }

    pub fn apply(
        &mut self,
        event: &ResolvedEvent,
        store: &ReasoningStore,
        callbacks: &mut dyn StreamCallbacks,
    ) -> Flow {
        match &event.kind {
            EventKind::Error => {
                callbacks.on_error(&FrameError::Upstream(event.data.clone()));
                return self.flow();
            }
            EventKind::Unknown => return self.flow(),
            _ if self.completed => {
                debug!(event_type = %event.event_type, "Ignoring event after completion");
                return Flow::Completed;
            }
            _ => {}
        }

        match &event.kind {
            EventKind::OutputTextDelta { delta } => {
                if !delta.is_empty() {
                    self.final_text.push_str(delta);
                    callbacks.on_text_delta(delta);
                }
            }
            EventKind::Completed => return self.complete(Some(&event.data), store, callbacks),
            EventKind::ReasoningPartAdded { kind, part } => {
                self.ensure_panel(*kind, part.as_ref(), store, callbacks);
            }
            EventKind::ReasoningDelta { kind, delta } => {
                let panel_id = self.ensure_panel(*kind, None, store, callbacks);
                if !delta.is_empty() {
                    self.texts
                        .entry(panel_id.clone())
                        .or_default()
                        .push_str(delta);
                    store.append_panel_text(&panel_id, delta);
                    callbacks.on_reasoning_delta(*kind, delta);
                }
            }
            EventKind::ReasoningDone { kind, text } => {
                self.finish_kind(*kind, text.as_deref(), store, callbacks);
            }
            EventKind::Error | EventKind::Unknown => {}
        }
        Flow::Continue
    }

    fn flow(&self) -> Flow {
        if self.completed {
            Flow::Completed
        } else {
            Flow::Continue
        }
    }

    /// Panel id for `kind`, opening one if the kind is not active.
    fn ensure_panel(
        &mut self,
        kind: ReasoningKind,
        part: Option<&Value>,
        store: &ReasoningStore,
        callbacks: &mut dyn StreamCallbacks,
    ) -> String {
        if let Some(panel_id) = self.active.get(&kind) {
            return panel_id.clone();
        }
        let panel = store.create_panel(&self.conversation_id, self.window_id.as_deref(), kind);
        self.active.insert(kind, panel.id.clone());
        self.texts.insert(panel.id.clone(), String::new());
        callbacks.on_reasoning_start(kind, part);
        panel.id.clone()
    }

    fn finish_kind(
        &mut self,
        kind: ReasoningKind,
        final_text: Option<&str>,
        store: &ReasoningStore,
        callbacks: &mut dyn StreamCallbacks,
    ) {
        let existing = self.active.get(&kind).cloned();
        let panel_id = match existing {
            Some(panel_id) => panel_id,
            // A text trace may arrive whole, as a single done event.
            None if kind == ReasoningKind::Text && final_text.is_some() => {
                self.ensure_panel(kind, None, store, callbacks)
            }
            None => {
                debug!(kind = kind.as_str(), "Done event without an open panel");
                return;
            }
        };

        self.active.remove(&kind);
        let mut text = self.texts.remove(&panel_id).unwrap_or_default();
        if let Some(authoritative) = final_text {
            text = authoritative.to_string();
        }
        store.complete_panel(&panel_id, final_text);
        callbacks.on_reasoning_done(kind, &text);
    }

    /// Handle `response.completed` or `[DONE]`. Only the first signal counts.
    fn complete(
        &mut self,
        raw_event: Option<&Value>,
        store: &ReasoningStore,
        callbacks: &mut dyn StreamCallbacks,
    ) -> Flow {
        if self.completed {
            return Flow::Completed;
        }
        self.close_all(store, false);
        self.completed = true;
        callbacks.on_completed(&self.final_text, raw_event);
        Flow::Completed
    }

    /// Close everything after a transport end that carried no completion
    /// signal. Panels are completed with whatever text they have.
    pub fn finalize(&mut self, store: &ReasoningStore) {
        if !self.completed {
            self.close_all(store, false);
        }
    }

    /// Close everything after cancellation or a broken transport. Open
    /// panels keep their partial text and are flagged as abandoned.
    pub fn abandon(&mut self, store: &ReasoningStore) {
        if !self.completed {
            self.close_all(store, true);
        }
    }

    fn close_all(&mut self, store: &ReasoningStore, abandoned: bool) {
        for kind in ReasoningKind::ALL {
            let Some(panel_id) = self.active.remove(&kind) else {
                continue;
            };
            self.texts.remove(&panel_id);
            if abandoned {
                store.abandon_panel(&panel_id);
            } else {
                store.complete_panel(&panel_id, None);
            }
        }
        if let Some(window_id) = self.window_id.as_deref() {
            store.collapse_window(window_id);
        }
    }
}
