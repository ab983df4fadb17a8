//! Local message edits and their commit to the thread state.
//!
//! Drafts live only in memory until committed. A draft overrides the committed
//! message with the same id when the chat is rendered.

use epsimo_client::PlatformClient;
use epsimo_core::{ApiResult, Message, MessageId, ThreadId};

/// Result of a commit attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The drafts were written and the set was cleared.
    Committed,
    /// No thread is active; nothing was sent.
    NoThread,
    /// There were no drafts; nothing was sent.
    NothingToCommit,
}

/// Working set of edited messages for the active thread.
///
/// Drafts are kept in the order they were first recorded. Recording a draft
/// for an id that already has one replaces it in place.
#[derive(Debug, Default)]
pub struct MessageEditor {
    thread_id: Option<ThreadId>,
    drafts: Vec<Message>,
}

impl MessageEditor {
    /// Create an editor for `thread_id` (or for no thread yet).
    #[must_use]
    pub fn new(thread_id: Option<ThreadId>) -> Self {
        Self {
            thread_id,
            drafts: Vec::new(),
        }
    }

    /// Switch to another thread, dropping any drafts of the previous one.
    pub fn set_thread(&mut self, thread_id: Option<ThreadId>) {
        if self.thread_id != thread_id {
            self.drafts.clear();
        }
        self.thread_id = thread_id;
    }

    /// The thread drafts will be committed to.
    #[must_use]
    pub fn thread_id(&self) -> Option<&ThreadId> {
        self.thread_id.as_ref()
    }

    /// Record `msg` as the draft for its id.
    pub fn record_edits(&mut self, msg: Message) {
        match self.drafts.iter_mut().find(|d| d.id == msg.id) {
            Some(existing) => *existing = msg,
            None => self.drafts.push(msg),
        }
    }

    /// Drop the draft for `id`, or every draft when `id` is `None`.
    pub fn abandon_edits(&mut self, id: Option<&MessageId>) {
        match id {
            Some(id) => self.drafts.retain(|d| &d.id != id),
            None => self.drafts.clear(),
        }
    }

    /// Write all drafts to the thread state in one request.
    ///
    /// On success the set is cleared and `on_committed` is invoked once. On
    /// failure the drafts are kept and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the API error if the thread state could not be updated.
    pub async fn commit_edits(
        &mut self,
        client: &PlatformClient,
        on_committed: impl FnOnce(),
    ) -> ApiResult<CommitOutcome> {
        let Some(thread_id) = self.thread_id.as_ref() else {
            tracing::debug!("Commit requested without an active thread");
            return Ok(CommitOutcome::NoThread);
        };
        if self.drafts.is_empty() {
            return Ok(CommitOutcome::NothingToCommit);
        }

        if let Err(e) = client.update_thread_state(thread_id, &self.drafts).await {
            tracing::error!(thread_id = %thread_id, drafts = self.drafts.len(), error = %e, "Failed to commit message edits");
            return Err(e);
        }

        tracing::info!(thread_id = %thread_id, drafts = self.drafts.len(), "Committed message edits");
        self.drafts.clear();
        on_committed();
        Ok(CommitOutcome::Committed)
    }

    /// Returns `true` if there are no drafts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    /// Number of drafts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    /// The draft recorded for `id`, if any.
    #[must_use]
    pub fn draft_for(&self, id: &MessageId) -> Option<&Message> {
        self.drafts.iter().find(|d| &d.id == id)
    }

    /// Drafts in insertion order.
    #[must_use]
    pub fn drafts(&self) -> &[Message] {
        &self.drafts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epsimo_client::{SessionContext, SessionState};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn msg(id: &str, text: &str) -> Message {
        serde_json::from_value(json!({"id": id, "type": "human", "content": text})).unwrap()
    }

    fn id(s: &str) -> MessageId {
        MessageId::new(s).unwrap()
    }

    fn thread() -> Option<ThreadId> {
        Some(ThreadId::new("t1").unwrap())
    }

    fn client(uri: &str) -> PlatformClient {
        let session = SessionContext::in_memory(SessionState::fresh());
        session.set_token("T").unwrap();
        PlatformClient::new(uri, session)
    }

    // =========================================================================
    // Recording and abandoning
    // =========================================================================

    #[test]
    fn record_keys_draft_by_id() {
        let mut editor = MessageEditor::new(thread());
        editor.record_edits(msg("a", "draft A"));

        assert_eq!(editor.len(), 1);
        assert_eq!(editor.draft_for(&id("a")).unwrap().text(), "draft A");
    }

    #[test]
    fn re_recording_keeps_position() {
        let mut editor = MessageEditor::new(thread());
        editor.record_edits(msg("a", "A1"));
        editor.record_edits(msg("b", "B1"));
        editor.record_edits(msg("a", "A2"));

        let texts: Vec<_> = editor.drafts().iter().map(Message::text).collect();
        assert_eq!(texts, vec!["A2", "B1"]);
    }

    #[test]
    fn abandon_one_removes_exactly_that_id() {
        let mut editor = MessageEditor::new(thread());
        editor.record_edits(msg("a", "A"));
        editor.record_edits(msg("b", "B"));

        editor.abandon_edits(Some(&id("a")));
        assert!(editor.draft_for(&id("a")).is_none());
        assert!(editor.draft_for(&id("b")).is_some());

        // Unknown ids are ignored.
        editor.abandon_edits(Some(&id("zzz")));
        assert_eq!(editor.len(), 1);
    }

    #[test]
    fn abandon_all_empties_set() {
        let mut editor = MessageEditor::new(thread());
        editor.record_edits(msg("a", "A"));
        editor.record_edits(msg("b", "B"));

        editor.abandon_edits(None);
        assert!(editor.is_empty());
    }

    #[test]
    fn switching_thread_drops_drafts() {
        let mut editor = MessageEditor::new(thread());
        editor.record_edits(msg("a", "A"));

        editor.set_thread(thread());
        assert_eq!(editor.len(), 1);

        editor.set_thread(Some(ThreadId::new("t2").unwrap()));
        assert!(editor.is_empty());
    }

    // =========================================================================
    // Committing
    // =========================================================================

    #[tokio::test]
    async fn commit_without_thread_is_noop() {
        let server = MockServer::start().await;
        let mut editor = MessageEditor::new(None);
        editor.record_edits(msg("a", "A"));

        let mut called = false;
        let outcome = editor
            .commit_edits(&client(&server.uri()), || called = true)
            .await
            .unwrap();

        assert_eq!(outcome, CommitOutcome::NoThread);
        assert!(!called);
        assert_eq!(editor.len(), 1);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_with_no_drafts_sends_nothing() {
        let server = MockServer::start().await;
        let mut editor = MessageEditor::new(thread());

        let mut called = false;
        let outcome = editor
            .commit_edits(&client(&server.uri()), || called = true)
            .await
            .unwrap();

        assert_eq!(outcome, CommitOutcome::NothingToCommit);
        assert!(!called);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_sends_drafts_in_insertion_order_and_clears() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads/t1/state"))
            .and(body_json(json!({"values": [
                {"id": "a", "type": "human", "content": "draft A"},
                {"id": "b", "type": "human", "content": "draft B"}
            ]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let mut editor = MessageEditor::new(thread());
        editor.record_edits(msg("a", "draft A"));
        editor.record_edits(msg("b", "draft B"));

        let mut calls = 0;
        let outcome = editor
            .commit_edits(&client(&server.uri()), || calls += 1)
            .await
            .unwrap();

        assert_eq!(outcome, CommitOutcome::Committed);
        assert!(editor.is_empty());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn failed_commit_preserves_edits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads/t1/state"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let mut editor = MessageEditor::new(thread());
        editor.record_edits(msg("a", "draft A"));
        editor.record_edits(msg("b", "draft B"));

        let mut called = false;
        let err = editor
            .commit_edits(&client(&server.uri()), || called = true)
            .await
            .unwrap_err();

        assert_eq!(err.kind, epsimo_core::ErrorKind::Server);
        assert!(!called);
        assert_eq!(editor.len(), 2);
        assert_eq!(editor.drafts()[0].text(), "draft A");
    }
}
