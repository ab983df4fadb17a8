//! Committed messages of the active thread and the view derived from them.

use epsimo_core::{merge_by_id, Message, ThreadState};

use crate::editing::MessageEditor;
use crate::stream::{StreamState, StreamStatus};

/// How the chat view should follow new content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    /// Same number of messages (one grew in place): ease towards the bottom.
    Smooth,
    /// Messages were added or removed: jump to the bottom.
    Instant,
}

impl ScrollBehavior {
    /// Pick the behavior for a change from `previous` to `current` rendered messages.
    #[must_use]
    pub const fn between(previous: usize, current: usize) -> Self {
        if previous == current {
            Self::Smooth
        } else {
            Self::Instant
        }
    }
}

/// Ordered committed messages plus the continuation pointer.
#[derive(Debug, Default)]
pub struct MessageStore {
    /// `None` while the thread is loading.
    messages: Option<Vec<Message>>,
    next: Vec<String>,
    rendered_count: Option<usize>,
}

impl MessageStore {
    /// An empty store in the loading state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with a freshly fetched thread state.
    pub fn load(&mut self, state: ThreadState) {
        self.messages = Some(state.values);
        self.next = state.next;
    }

    /// Forget the current thread and return to the loading state.
    pub fn clear(&mut self) {
        self.messages = None;
        self.next.clear();
        self.rendered_count = None;
    }

    /// Whether the thread is still loading.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.messages.is_none()
    }

    /// Committed messages, once loaded.
    #[must_use]
    pub fn committed(&self) -> Option<&[Message]> {
        self.messages.as_deref()
    }

    /// Pending graph nodes reported by the server.
    #[must_use]
    pub fn next(&self) -> &[String] {
        &self.next
    }

    /// Messages to display.
    ///
    /// Streamed messages are merged by id over the committed ones while a run
    /// is active or has not been reloaded yet; drafts then replace the message
    /// with the same id.
    #[must_use]
    pub fn rendered(&self, stream: &StreamState, editor: &MessageEditor) -> Vec<Message> {
        let mut messages = self.messages.clone().unwrap_or_default();
        if stream.status != StreamStatus::Idle {
            merge_by_id(&mut messages, stream.messages.clone());
        }
        for msg in &mut messages {
            if let Some(draft) = editor.draft_for(&msg.id) {
                *msg = draft.clone();
            }
        }
        messages
    }

    /// Record the number of rendered messages and return how to scroll.
    ///
    /// The first observation after a load always jumps.
    pub fn observe_rendered(&mut self, count: usize) -> ScrollBehavior {
        let behavior = match self.rendered_count {
            Some(previous) => ScrollBehavior::between(previous, count),
            None => ScrollBehavior::Instant,
        };
        self.rendered_count = Some(count);
        behavior
    }

    /// Whether "continue conversation" should be offered.
    #[must_use]
    pub fn can_continue(&self, stream: StreamStatus, editor: &MessageEditor) -> bool {
        !self.next.is_empty() && stream != StreamStatus::Inflight && editor.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epsimo_core::ThreadId;
    use serde_json::json;

    fn msg(id: &str, kind: &str, text: &str) -> Message {
        serde_json::from_value(json!({"id": id, "type": kind, "content": text})).unwrap()
    }

    fn loaded(next: &[&str]) -> MessageStore {
        let mut store = MessageStore::new();
        store.load(ThreadState {
            values: vec![msg("a", "human", "hi"), msg("b", "ai", "hello")],
            next: next.iter().map(ToString::to_string).collect(),
        });
        store
    }

    fn editor() -> MessageEditor {
        MessageEditor::new(Some(ThreadId::new("t1").unwrap()))
    }

    fn texts(messages: &[Message]) -> Vec<String> {
        messages.iter().map(Message::text).collect()
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    #[test]
    fn loading_until_first_load() {
        let store = MessageStore::new();
        assert!(store.is_loading());
        assert!(store.committed().is_none());
        assert!(!loaded(&[]).is_loading());
    }

    #[test]
    fn draft_replaces_committed_message_in_place() {
        let store = loaded(&[]);
        let mut editor = editor();
        editor.record_edits(msg("b", "ai", "edited"));

        let rendered = store.rendered(&StreamState::default(), &editor);
        assert_eq!(texts(&rendered), vec!["hi", "edited"]);
        assert_eq!(texts(store.committed().unwrap()), vec!["hi", "hello"]);
    }

    #[test]
    fn inflight_stream_is_merged_by_id() {
        let store = loaded(&[]);
        let mut stream = StreamState::inflight(Some(msg("c", "human", "more")));
        stream.messages.push(msg("b", "ai", "hello again"));

        let rendered = store.rendered(&stream, &editor());
        assert_eq!(texts(&rendered), vec!["hi", "hello again", "more"]);
    }

    #[test]
    fn idle_stream_is_not_rendered() {
        let store = loaded(&[]);
        let mut stream = StreamState::default();
        stream.messages.push(msg("z", "ai", "stale"));

        assert_eq!(store.rendered(&stream, &editor()).len(), 2);
    }

    // =========================================================================
    // Scrolling
    // =========================================================================

    #[test]
    fn same_count_scrolls_smoothly() {
        assert_eq!(ScrollBehavior::between(4, 4), ScrollBehavior::Smooth);
    }

    #[test]
    fn changed_count_scrolls_instantly() {
        assert_eq!(ScrollBehavior::between(4, 5), ScrollBehavior::Instant);
        assert_eq!(ScrollBehavior::between(5, 4), ScrollBehavior::Instant);
    }

    #[test]
    fn observe_tracks_previous_count() {
        let mut store = loaded(&[]);
        assert_eq!(store.observe_rendered(2), ScrollBehavior::Instant);
        assert_eq!(store.observe_rendered(2), ScrollBehavior::Smooth);
        assert_eq!(store.observe_rendered(3), ScrollBehavior::Instant);

        store.clear();
        assert_eq!(store.observe_rendered(3), ScrollBehavior::Instant);
    }

    // =========================================================================
    // Continuation
    // =========================================================================

    #[test]
    fn continue_requires_next() {
        let store = loaded(&[]);
        assert!(!store.can_continue(StreamStatus::Done, &editor()));
    }

    #[test]
    fn continue_offered_when_idle_with_next() {
        let store = loaded(&["agent"]);
        assert!(store.can_continue(StreamStatus::Idle, &editor()));
        assert!(store.can_continue(StreamStatus::Done, &editor()));
        assert!(store.can_continue(StreamStatus::Error, &editor()));
    }

    #[test]
    fn continue_hidden_while_inflight() {
        let store = loaded(&["agent"]);
        assert!(!store.can_continue(StreamStatus::Inflight, &editor()));
    }

    #[test]
    fn continue_hidden_with_pending_edits() {
        let store = loaded(&["agent"]);
        let mut editor = editor();
        editor.record_edits(msg("a", "human", "changed"));
        assert!(!store.can_continue(StreamStatus::Done, &editor));
    }
}
