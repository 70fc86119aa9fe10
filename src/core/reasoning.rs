//! Reasoning windows and panels as seen by observers.
//!
//! Records are immutable once published: a mutation edits a record in place
//! only while nothing else holds it, and otherwise swaps in a fresh copy, so
//! a reader holding a snapshot never sees a half-applied change. Each change
//! is also broadcast to subscribers.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::debug;

use crate::core::events::ReasoningKind;
use crate::utils::ids::generate_id;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// One collapsible reasoning region bound to a single model response.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningWindow {
    pub id: String,
    pub conversation_id: String,
    pub model: String,
    /// Position in the message list the window is attached to.
    pub anchor_index: usize,
    pub open: bool,
    pub created_at: DateTime<Utc>,
}

/// One accumulation buffer for one reasoning kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningPanel {
    pub id: String,
    pub conversation_id: String,
    /// Owning window, if the stream had one.
    pub response_id: Option<String>,
    pub kind: ReasoningKind,
    pub text: String,
    pub open: bool,
    pub started_at: DateTime<Utc>,
    pub done: bool,
    /// Closed because its stream was cancelled or broke, not by a terminal event.
    pub abandoned: bool,
}

#[derive(Debug, Clone)]
pub enum StoreChange {
    Window(Arc<ReasoningWindow>),
    Panel(Arc<ReasoningPanel>),
    ConversationCleared(String),
}

#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub windows: Vec<Arc<ReasoningWindow>>,
    pub panels: Vec<Arc<ReasoningPanel>>,
}

impl StoreSnapshot {
    pub fn open_panels(&self) -> impl Iterator<Item = &Arc<ReasoningPanel>> {
        self.panels.iter().filter(|panel| panel.open)
    }

    pub fn open_windows(&self) -> impl Iterator<Item = &Arc<ReasoningWindow>> {
        self.windows.iter().filter(|window| window.open)
    }
}

/// Records in creation order plus id lookups into those vectors.
#[derive(Debug, Default)]
struct StoreState {
    windows: Vec<Arc<ReasoningWindow>>,
    panels: Vec<Arc<ReasoningPanel>>,
    window_index: HashMap<String, usize>,
    panel_index: HashMap<String, usize>,
}

impl StoreState {
    fn window_slot(&mut self, window_id: &str) -> Option<&mut Arc<ReasoningWindow>> {
        let index = *self.window_index.get(window_id)?;
        self.windows.get_mut(index)
    }

    fn panel_slot(&mut self, panel_id: &str) -> Option<&mut Arc<ReasoningPanel>> {
        let index = *self.panel_index.get(panel_id)?;
        self.panels.get_mut(index)
    }

    fn reindex(&mut self) {
        self.window_index = self
            .windows
            .iter()
            .enumerate()
            .map(|(index, window)| (window.id.clone(), index))
            .collect();
        self.panel_index = self
            .panels
            .iter()
            .enumerate()
            .map(|(index, panel)| (panel.id.clone(), index))
            .collect();
    }
}

/// Shared store handle; clones refer to the same records.
///
/// Change notifications are sent while the write lock is held, so
/// subscribers see changes in exactly the order they were applied.
#[derive(Debug, Clone)]
pub struct ReasoningStore {
    state: Arc<RwLock<StoreState>>,
    changes: broadcast::Sender<StoreChange>,
}

impl Default for ReasoningStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReasoningStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            changes,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Must be called with the write guard held.
    fn publish(&self, _guard: &RwLockWriteGuard<'_, StoreState>, change: StoreChange) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }

    pub fn create_window(
        &self,
        conversation_id: &str,
        model: &str,
        anchor_index: usize,
    ) -> Arc<ReasoningWindow> {
        let window = Arc::new(ReasoningWindow {
            id: generate_id("rw"),
            conversation_id: conversation_id.to_string(),
            model: model.to_string(),
            anchor_index,
            open: true,
            created_at: Utc::now(),
        });
        {
            let mut state = self.write();
            let index = state.windows.len();
            state.window_index.insert(window.id.clone(), index);
            state.windows.push(Arc::clone(&window));
            self.publish(&state, StoreChange::Window(Arc::clone(&window)));
        }
        debug!(window_id = %window.id, conversation_id, model, anchor_index, "Reasoning window created");
        window
    }

    /// Mark a window closed. Returns `false` if it was already closed or unknown.
    pub fn collapse_window(&self, window_id: &str) -> bool {
        {
            let mut state = self.write();
            let Some(slot) = state.window_slot(window_id) else {
                return false;
            };
            if !slot.open {
                return false;
            }
            Arc::make_mut(slot).open = false;
            let updated = Arc::clone(slot);
            self.publish(&state, StoreChange::Window(updated));
        }
        debug!(window_id, "Reasoning window collapsed");
        true
    }

    pub fn create_panel(
        &self,
        conversation_id: &str,
        response_id: Option<&str>,
        kind: ReasoningKind,
    ) -> Arc<ReasoningPanel> {
        let panel = Arc::new(ReasoningPanel {
            id: generate_id("rp"),
            conversation_id: conversation_id.to_string(),
            response_id: response_id.map(str::to_owned),
            kind,
            text: String::new(),
            open: true,
            started_at: Utc::now(),
            done: false,
            abandoned: false,
        });
        {
            let mut state = self.write();
            let index = state.panels.len();
            state.panel_index.insert(panel.id.clone(), index);
            state.panels.push(Arc::clone(&panel));
            self.publish(&state, StoreChange::Panel(Arc::clone(&panel)));
        }
        debug!(panel_id = %panel.id, kind = kind.as_str(), "Reasoning panel opened");
        panel
    }

    /// Apply `update` to a panel when `applies` accepts its current state.
    ///
    /// The record is edited in place when no snapshot or pending change still
    /// holds it, and copied otherwise, so published records never change.
    fn update_panel<P, F>(
        &self,
        panel_id: &str,
        applies: P,
        update: F,
    ) -> Option<Arc<ReasoningPanel>>
    where
        P: FnOnce(&ReasoningPanel) -> bool,
        F: FnOnce(&mut ReasoningPanel),
    {
        let mut state = self.write();
        let slot = state.panel_slot(panel_id)?;
        if !applies(slot.as_ref()) {
            return None;
        }
        update(Arc::make_mut(slot));
        let updated = Arc::clone(slot);
        self.publish(&state, StoreChange::Panel(Arc::clone(&updated)));
        Some(updated)
    }

    /// Append to an open panel. Closed panels are frozen and ignore appends.
    pub fn append_panel_text(&self, panel_id: &str, delta: &str) -> Option<Arc<ReasoningPanel>> {
        if delta.is_empty() {
            return None;
        }
        self.update_panel(
            panel_id,
            |current| current.open,
            |panel| panel.text.push_str(delta),
        )
    }

    /// Freeze a panel, optionally overwriting its text with an authoritative
    /// final value. No-op on a panel that is already done.
    pub fn complete_panel(
        &self,
        panel_id: &str,
        final_text: Option<&str>,
    ) -> Option<Arc<ReasoningPanel>> {
        let completed = self.update_panel(
            panel_id,
            |current| !current.done,
            |panel| {
                if let Some(text) = final_text.filter(|text| !text.is_empty()) {
                    panel.text = text.to_string();
                }
                panel.open = false;
                panel.done = true;
            },
        );
        if completed.is_some() {
            debug!(panel_id, "Reasoning panel completed");
        }
        completed
    }

    /// Close a panel whose stream went away, keeping the partial text.
    pub fn abandon_panel(&self, panel_id: &str) -> Option<Arc<ReasoningPanel>> {
        let abandoned = self.update_panel(
            panel_id,
            |current| !current.done,
            |panel| {
                panel.open = false;
                panel.done = true;
                panel.abandoned = true;
            },
        );
        if abandoned.is_some() {
            debug!(panel_id, "Reasoning panel abandoned");
        }
        abandoned
    }

    pub fn window(&self, window_id: &str) -> Option<Arc<ReasoningWindow>> {
        let state = self.read();
        let index = *state.window_index.get(window_id)?;
        state.windows.get(index).cloned()
    }

    pub fn panel(&self, panel_id: &str) -> Option<Arc<ReasoningPanel>> {
        let state = self.read();
        let index = *state.panel_index.get(panel_id)?;
        state.panels.get(index).cloned()
    }

    pub fn panels_for_window(&self, window_id: &str) -> Vec<Arc<ReasoningPanel>> {
        self.read()
            .panels
            .iter()
            .filter(|panel| panel.response_id.as_deref() == Some(window_id))
            .cloned()
            .collect()
    }

    pub fn windows_for_conversation(&self, conversation_id: &str) -> Vec<Arc<ReasoningWindow>> {
        self.read()
            .windows
            .iter()
            .filter(|window| window.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.read();
        StoreSnapshot {
            windows: state.windows.clone(),
            panels: state.panels.clone(),
        }
    }

    /// Drop every record tagged with `conversation_id`.
    pub fn clear_conversation(&self, conversation_id: &str) {
        let mut state = self.write();
        state
            .windows
            .retain(|window| window.conversation_id != conversation_id);
        state
            .panels
            .retain(|panel| panel.conversation_id != conversation_id);
        state.reindex();
        self.publish(
            &state,
            StoreChange::ConversationCleared(conversation_id.to_string()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_only_while_open_and_freezes_on_completion() {
        let store = ReasoningStore::new();
        let panel = store.create_panel("conv", None, ReasoningKind::Summary);

        store.append_panel_text(&panel.id, "Thinking");
        store.append_panel_text(&panel.id, " hard");
        let completed = store.complete_panel(&panel.id, None).expect("completed");
        assert_eq!(completed.text, "Thinking hard");
        assert!(completed.done);
        assert!(!completed.open);

        assert!(store.append_panel_text(&panel.id, "late").is_none());
        assert!(store.complete_panel(&panel.id, Some("other")).is_none());
        assert_eq!(store.panel(&panel.id).unwrap().text, "Thinking hard");
    }

    #[test]
    fn final_text_overrides_accumulated_deltas() {
        let store = ReasoningStore::new();
        let panel = store.create_panel("conv", None, ReasoningKind::Text);
        store.append_panel_text(&panel.id, "draft");
        let completed = store
            .complete_panel(&panel.id, Some("authoritative"))
            .unwrap();
        assert_eq!(completed.text, "authoritative");
    }

    #[test]
    fn mutations_replace_records_instead_of_editing_them() {
        let store = ReasoningStore::new();
        let window = store.create_window("conv", "gpt-5", 3);
        let before = store.snapshot();

        assert!(store.collapse_window(&window.id));
        assert!(!store.collapse_window(&window.id));

        assert!(before.windows[0].open, "old snapshot must not change");
        assert!(!store.window(&window.id).unwrap().open);
        assert_eq!(store.window(&window.id).unwrap().anchor_index, 3);
    }

    #[test]
    fn abandon_marks_panel_closed_and_keeps_text() {
        let store = ReasoningStore::new();
        let panel = store.create_panel("conv", Some("rw_1"), ReasoningKind::Text);
        store.append_panel_text(&panel.id, "partial");
        let abandoned = store.abandon_panel(&panel.id).unwrap();
        assert!(abandoned.abandoned);
        assert!(abandoned.done);
        assert!(!abandoned.open);
        assert_eq!(abandoned.text, "partial");
        assert_eq!(store.snapshot().open_panels().count(), 0);
    }

    #[test]
    fn queries_filter_by_window_and_conversation() {
        let store = ReasoningStore::new();
        let first = store.create_window("a", "o3", 1);
        let second = store.create_window("b", "o3", 1);
        store.create_panel("a", Some(&first.id), ReasoningKind::Summary);
        store.create_panel("a", Some(&first.id), ReasoningKind::Text);
        store.create_panel("b", Some(&second.id), ReasoningKind::Text);

        assert_eq!(store.panels_for_window(&first.id).len(), 2);
        assert_eq!(store.windows_for_conversation("b").len(), 1);

        store.clear_conversation("a");
        let snapshot = store.snapshot();
        assert_eq!(snapshot.windows.len(), 1);
        assert_eq!(snapshot.panels.len(), 1);
        assert_eq!(snapshot.windows[0].id, second.id);
    }

    #[test]
    fn subscribers_receive_whole_records() {
        let store = ReasoningStore::new();
        let mut changes = store.subscribe();
        let panel = store.create_panel("conv", None, ReasoningKind::Summary);
        store.append_panel_text(&panel.id, "abc");

        match changes.try_recv().expect("creation change") {
            StoreChange::Panel(record) => assert_eq!(record.text, ""),
            other => panic!("unexpected change {other:?}"),
        }
        match changes.try_recv().expect("append change") {
            StoreChange::Panel(record) => {
                assert_eq!(record.id, panel.id);
                assert_eq!(record.text, "abc");
            }
            other => panic!("unexpected change {other:?}"),
        }
    }

    #[test]
    fn held_snapshot_keeps_text_while_appends_continue() {
        let store = ReasoningStore::new();
        let id = store.create_panel("conv", None, ReasoningKind::Text).id.clone();
        store.append_panel_text(&id, "one");
        let held = store.snapshot();

        for _ in 0..1000 {
            store.append_panel_text(&id, "x");
        }

        assert_eq!(held.panels[0].text, "one");
        assert_eq!(store.panel(&id).unwrap().text.len(), 3 + 1000);
    }

    #[test]
    fn lookups_survive_clearing_other_conversations() {
        let store = ReasoningStore::new();
        store.create_window("a", "o3", 0);
        store.create_panel("a", None, ReasoningKind::Summary);
        let window = store.create_window("b", "o3", 0);
        let panel = store.create_panel("b", Some(&window.id), ReasoningKind::Text);

        store.clear_conversation("a");

        assert_eq!(store.window(&window.id).unwrap().conversation_id, "b");
        let appended = store.append_panel_text(&panel.id, "still here").unwrap();
        assert_eq!(appended.text, "still here");
        assert!(store.collapse_window(&window.id));
    }

    #[test]
    fn no_panel_change_is_delivered_after_its_conversation_is_cleared() {
        for _ in 0..300 {
            let store = ReasoningStore::new();
            let mut changes = store.subscribe();
            let panel = store.create_panel("conv", None, ReasoningKind::Text);

            std::thread::scope(|scope| {
                scope.spawn(|| {
                    for _ in 0..50 {
                        store.append_panel_text(&panel.id, "x");
                    }
                });
                store.clear_conversation("conv");
            });

            let mut cleared = false;
            while let Ok(change) = changes.try_recv() {
                match change {
                    StoreChange::ConversationCleared(id) => {
                        assert_eq!(id, "conv");
                        cleared = true;
                    }
                    StoreChange::Panel(record) => {
                        assert!(!cleared, "panel {} changed after clear", record.id);
                    }
                    StoreChange::Window(_) => {}
                }
            }
            assert!(cleared);
            assert!(store.panel(&panel.id).is_none());
        }
    }
}
