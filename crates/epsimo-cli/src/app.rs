//! Application state for the chat TUI.
//!
//! `App` owns the thread list, the active route and the three controllers of
//! the chat view (message store, edit controller, stream controller). All
//! mutation happens on the UI loop; background tasks only send updates.

use std::time::Duration;

use tokio::sync::mpsc;

use epsimo_client::PlatformClient;
use epsimo_core::{
    ApiError, ApiResult, Assistant, Message, MessageId, RunId, Thread, ThreadId, ThreadInfo,
};

use crate::editing::{CommitOutcome, MessageEditor};
use crate::messages::{MessageStore, ScrollBehavior};
use crate::resolver::{self, Resolved, Route};
use crate::stream::{StreamController, StreamStatus, StreamUpdate};

/// Refresh interval for the thread list.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Shown for a run that ended in error.
pub const STREAM_ERROR_TEXT: &str = "An error has occurred. Please try again.";

/// Longest thread name derived from a first message.
const THREAD_NAME_LEN: usize = 40;

/// Which UI column has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    /// Left column: thread list.
    #[default]
    Threads,
    /// Right column: chat and input.
    Chat,
}

/// Input mode for dialogs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Chat input or command keys.
    #[default]
    Normal,
    /// Prompting for the name of a new thread.
    NewThread,
    /// Editing the text of a message.
    EditingMessage(MessageId),
}

/// Application state.
pub struct App {
    client: PlatformClient,
    /// Threads of the current project.
    pub threads: Vec<Thread>,
    /// Selected index in `threads`.
    pub selected_thread: Option<usize>,
    /// Assistants available for new threads.
    pub assistants: Vec<Assistant>,
    /// What the chat view points at.
    pub route: Route,
    /// Thread and assistant of `route`.
    pub resolved: Resolved,
    /// Committed messages of the active thread.
    pub store: MessageStore,
    /// Local drafts.
    pub editor: MessageEditor,
    /// In-flight generation.
    pub stream: StreamController,
    /// Run id of the last finished generation, for feedback.
    pub last_run_id: Option<RunId>,
    /// Selected index in the rendered messages.
    pub selected_message: Option<usize>,
    /// Latest credit counter.
    pub credits: Option<ThreadInfo>,
    /// Current input buffer.
    pub input: String,
    /// Cursor position in input, in characters.
    pub cursor_position: usize,
    /// Which panel has focus.
    pub focus: Focus,
    /// Current input mode.
    pub input_mode: InputMode,
    /// Whether keys are commands instead of text.
    pub command_mode: bool,
    /// Lines scrolled up from the bottom of the chat.
    pub chat_scroll: usize,
    /// Ease `chat_scroll` back to the bottom on each tick.
    follow_bottom: bool,
    /// Status message to display.
    pub status_message: Option<String>,
    /// Error message to display.
    pub error_message: Option<String>,
    /// Last background refresh error.
    pub refresh_error: Option<String>,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Animation frame counter for loading indicators.
    pub animation_frame: usize,
    /// Saved chat input when entering a dialog mode.
    saved_chat_input: Option<(String, usize)>,
}

impl App {
    /// Create a new application; stream updates arrive on the returned receiver.
    #[must_use]
    pub fn new(client: PlatformClient) -> (Self, mpsc::Receiver<StreamUpdate>) {
        let (stream, updates) = StreamController::new(client.clone());
        let app = Self {
            client,
            threads: Vec::new(),
            selected_thread: None,
            assistants: Vec::new(),
            route: Route::Home,
            resolved: Resolved::default(),
            store: MessageStore::new(),
            editor: MessageEditor::new(None),
            stream,
            last_run_id: None,
            selected_message: None,
            credits: None,
            input: String::new(),
            cursor_position: 0,
            focus: Focus::Chat,
            input_mode: InputMode::Normal,
            command_mode: false,
            chat_scroll: 0,
            follow_bottom: false,
            status_message: None,
            error_message: None,
            refresh_error: None,
            should_quit: false,
            animation_frame: 0,
            saved_chat_input: None,
        };
        (app, updates)
    }

    /// The API client.
    #[must_use]
    pub fn client(&self) -> &PlatformClient {
        &self.client
    }

    /// Move focus to the other column.
    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Threads => Focus::Chat,
            Focus::Chat => Focus::Threads,
        };
    }

    /// Enter a dialog mode, saving the current chat input.
    pub fn enter_dialog_mode(&mut self, mode: InputMode) {
        self.saved_chat_input = Some((std::mem::take(&mut self.input), self.cursor_position));
        self.cursor_position = 0;
        self.input_mode = mode;
    }

    /// Exit dialog mode, restoring the saved chat input.
    pub fn exit_dialog_mode(&mut self) {
        self.input_mode = InputMode::Normal;
        if let Some((input, cursor)) = self.saved_chat_input.take() {
            self.input = input;
            self.cursor_position = cursor;
        } else {
            self.clear_input();
        }
    }

    /// Advance animations (call on each render).
    pub fn tick_animation(&mut self) {
        self.animation_frame = self.animation_frame.wrapping_add(1);
        if self.follow_bottom {
            self.chat_scroll /= 2;
            self.follow_bottom = self.chat_scroll > 0;
        }
    }

    /// Current spinner character.
    #[must_use]
    pub fn spinner_char(&self) -> &'static str {
        const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        SPINNER[self.animation_frame % SPINNER.len()]
    }

    /// Backend URL for display.
    #[must_use]
    pub fn backend_url(&self) -> &str {
        self.client.base_url()
    }

    /// Selected project name, if any.
    #[must_use]
    pub fn project_name(&self) -> Option<String> {
        self.client.session().project_name()
    }

    /// Set the status message (also clears any error).
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.error_message = None;
    }

    /// Set the error message.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
    }

    /// Show an API failure, with a login hint where relevant.
    pub fn set_api_error(&mut self, context: &str, error: &ApiError) {
        if error.kind.needs_login() {
            self.set_error(format!("{context}: {} (run `epsimo login`)", error.message));
        } else {
            self.set_error(format!("{context}: {}", error.message));
        }
    }

    /// Clear the error message.
    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    // =========================================================================
    // Derived view state
    // =========================================================================

    /// Messages to display: committed, streamed and drafts combined.
    #[must_use]
    pub fn rendered_messages(&self) -> Vec<Message> {
        self.store.rendered(self.stream.state(), &self.editor)
    }

    /// Status of the current generation.
    #[must_use]
    pub fn stream_status(&self) -> StreamStatus {
        self.stream.state().status
    }

    /// Whether "continue conversation" is offered.
    #[must_use]
    pub fn can_continue(&self) -> bool {
        self.store.can_continue(self.stream_status(), &self.editor)
    }

    /// Active thread id.
    #[must_use]
    pub fn thread_id(&self) -> Option<&ThreadId> {
        match &self.route {
            Route::Thread(id) => Some(id),
            _ => None,
        }
    }

    /// Check if the UI needs high-frequency redraws.
    #[must_use]
    pub fn needs_immediate_redraw(&self) -> bool {
        self.stream.is_inflight() || self.follow_bottom
    }

    /// Re-evaluate scrolling after the rendered messages changed.
    pub fn sync_scroll(&mut self) {
        let count = self.rendered_messages().len();
        match self.store.observe_rendered(count) {
            ScrollBehavior::Instant => {
                self.chat_scroll = 0;
                self.follow_bottom = false;
            }
            ScrollBehavior::Smooth => self.follow_bottom = self.chat_scroll > 0,
        }
        if let Some(i) = self.selected_message {
            if i >= count {
                self.selected_message = count.checked_sub(1);
            }
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Move selection up in the thread list.
    pub fn select_prev_thread(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.selected_thread = Some(match self.selected_thread {
            Some(0) | None => self.threads.len() - 1,
            Some(i) => i - 1,
        });
    }

    /// Move selection down in the thread list.
    pub fn select_next_thread(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.selected_thread = Some(match self.selected_thread {
            Some(i) if i + 1 < self.threads.len() => i + 1,
            _ => 0,
        });
    }

    /// The highlighted thread.
    #[must_use]
    pub fn selected_thread(&self) -> Option<&Thread> {
        self.selected_thread.and_then(|i| self.threads.get(i))
    }

    /// Move the message cursor towards older messages.
    pub fn select_prev_message(&mut self) {
        let count = self.rendered_messages().len();
        if count == 0 {
            return;
        }
        self.selected_message = Some(match self.selected_message {
            Some(i) => i.saturating_sub(1),
            None => count - 1,
        });
    }

    /// Move the message cursor towards newer messages; past the last one clears it.
    pub fn select_next_message(&mut self) {
        let count = self.rendered_messages().len();
        self.selected_message = match self.selected_message {
            Some(i) if i + 1 < count => Some(i + 1),
            _ => None,
        };
    }

    /// The message under the cursor.
    #[must_use]
    pub fn selected_message(&self) -> Option<Message> {
        self.selected_message
            .and_then(|i| self.rendered_messages().into_iter().nth(i))
    }

    /// Scroll chat up (view older messages).
    pub fn scroll_chat_up(&mut self, amount: usize) {
        self.chat_scroll = self.chat_scroll.saturating_add(amount);
        self.follow_bottom = false;
    }

    /// Scroll chat down (view newer messages).
    pub fn scroll_chat_down(&mut self, amount: usize) {
        self.chat_scroll = self.chat_scroll.saturating_sub(amount);
    }

    // =========================================================================
    // Input Handling
    // =========================================================================

    fn byte_index(&self, chars: usize) -> usize {
        self.input
            .char_indices()
            .nth(chars)
            .map_or(self.input.len(), |(i, _)| i)
    }

    /// Insert a character at the cursor position.
    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor_position);
        self.input.insert(at, c);
        self.cursor_position += 1;
    }

    /// Delete the character before the cursor.
    pub fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let at = self.byte_index(self.cursor_position);
            self.input.remove(at);
        }
    }

    /// Delete the character at the cursor.
    pub fn delete_char_forward(&mut self) {
        if self.cursor_position < self.input.chars().count() {
            let at = self.byte_index(self.cursor_position);
            self.input.remove(at);
        }
    }

    /// Delete the word before the cursor.
    pub fn delete_word(&mut self) {
        while self.cursor_position > 0 {
            self.delete_char();
            let prev = self.input.chars().nth(self.cursor_position.wrapping_sub(1));
            if self.cursor_position == 0 || prev == Some(' ') {
                break;
            }
        }
    }

    /// Move cursor left.
    pub fn move_cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    /// Move cursor right.
    pub fn move_cursor_right(&mut self) {
        if self.cursor_position < self.input.chars().count() {
            self.cursor_position += 1;
        }
    }

    /// Move cursor to the start.
    pub fn move_cursor_start(&mut self) {
        self.cursor_position = 0;
    }

    /// Move cursor to the end.
    pub fn move_cursor_end(&mut self) {
        self.cursor_position = self.input.chars().count();
    }

    /// Clear the input.
    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor_position = 0;
    }

    /// Replace the input with `text`, cursor at the end.
    pub fn set_input(&mut self, text: String) {
        self.cursor_position = text.chars().count();
        self.input = text;
    }

    /// Take the current input (clears it).
    pub fn take_input(&mut self) -> String {
        self.cursor_position = 0;
        std::mem::take(&mut self.input)
    }

    // =========================================================================
    // API Operations
    // =========================================================================

    /// Refresh the thread list.
    ///
    /// # Errors
    ///
    /// Returns the API error if the list could not be fetched.
    pub async fn refresh_threads(&mut self) -> ApiResult<()> {
        self.threads = self.client.list_threads().await?;

        if let Some(i) = self.selected_thread {
            if i >= self.threads.len() {
                self.selected_thread = self.threads.len().checked_sub(1);
            }
        }
        if self.selected_thread.is_none() && !self.threads.is_empty() {
            self.selected_thread = Some(0);
        }
        Ok(())
    }

    /// Refresh the assistant list.
    ///
    /// # Errors
    ///
    /// Returns the API error if the list could not be fetched.
    pub async fn refresh_assistants(&mut self) -> ApiResult<()> {
        self.assistants = self.client.list_assistants().await?;
        Ok(())
    }

    /// Apply a credit poll result.
    pub fn handle_credits(&mut self, result: ApiResult<ThreadInfo>) {
        match result {
            Ok(info) => {
                self.credits = Some(info);
                self.refresh_error = None;
            }
            Err(e) => self.refresh_error = Some(format!("Credits: {}", e.message)),
        }
    }

    /// Point the chat view at `route` and load it.
    pub async fn open_route(&mut self, route: Route) {
        self.stream.reset();
        self.store.clear();
        self.selected_message = None;
        self.last_run_id = None;
        self.route = route;
        let thread_id = self.thread_id().cloned();
        self.editor.set_thread(thread_id);

        match resolver::resolve(&self.client, &self.route).await {
            Ok(resolved) => self.resolved = resolved,
            Err(e) => {
                self.resolved = Resolved::default();
                self.set_api_error("Failed to open chat", &e);
                return;
            }
        }
        if let Some(i) = self
            .thread_id()
            .and_then(|id| self.threads.iter().position(|t| &t.thread_id == id))
        {
            self.selected_thread = Some(i);
        }
        if let Err(e) = self.reload_messages().await {
            self.set_api_error("Failed to load messages", &e);
        }
    }

    /// Open the highlighted thread.
    pub async fn open_selected_thread(&mut self) {
        let Some(thread) = self.selected_thread() else {
            return;
        };
        let route = Route::Thread(thread.thread_id.clone());
        if route != self.route {
            self.open_route(route).await;
        }
    }

    /// Re-fetch the active thread's state.
    ///
    /// # Errors
    ///
    /// Returns the API error if the state could not be fetched.
    pub async fn reload_messages(&mut self) -> ApiResult<()> {
        let Some(thread_id) = self.thread_id().cloned() else {
            self.store.load(epsimo_core::ThreadState::default());
            self.sync_scroll();
            return Ok(());
        };
        let state = self.client.thread_state(&thread_id).await?;
        self.store.load(state);
        self.sync_scroll();
        Ok(())
    }

    /// Create a thread with the current (or first) assistant and open it.
    ///
    /// # Errors
    ///
    /// Returns the API error if the thread could not be created.
    pub async fn create_thread(&mut self, name: &str) -> ApiResult<ThreadId> {
        let Some(assistant_id) = self
            .resolved
            .assistant
            .as_ref()
            .or_else(|| self.assistants.first())
            .map(|a| a.assistant_id.clone())
        else {
            return Err(ApiError::new(
                epsimo_core::ErrorKind::Rejected,
                "no assistant available, create one first",
            ));
        };

        let thread = self.client.create_thread(name, &assistant_id).await?;
        let thread_id = thread.thread_id.clone();
        self.set_status(format!("Created thread: {}", thread.name));
        if let Err(e) = self.refresh_threads().await {
            tracing::warn!(error = %e, "Failed to refresh threads after create");
        }
        self.open_route(Route::Thread(thread_id.clone())).await;
        Ok(thread_id)
    }

    // =========================================================================
    // Streaming
    // =========================================================================

    /// Send `text` as a new user message, creating a thread first if needed.
    pub async fn send_message(&mut self, text: String) {
        let current = self.thread_id().cloned();
        let thread_id = match current {
            Some(id) => id,
            None => match self.create_thread(&thread_name(&text)).await {
                Ok(id) => id,
                Err(e) => {
                    self.set_api_error("Failed to start thread", &e);
                    return;
                }
            },
        };
        self.last_run_id = None;
        self.stream.start(Some(Message::human(text)), thread_id);
        self.set_status("Assistant responding... (Esc to stop)");
        self.sync_scroll();
    }

    /// Resume generation on the active thread without new input.
    pub fn continue_conversation(&mut self) {
        if !self.can_continue() {
            return;
        }
        let current = self.thread_id().cloned();
        if let Some(thread_id) = current {
            self.last_run_id = None;
            self.stream.start(None, thread_id);
            self.set_status("Continuing... (Esc to stop)");
        }
    }

    /// Stop the in-flight generation and reload what the server kept.
    pub async fn stop_streaming(&mut self) {
        if !self.stream.is_inflight() {
            return;
        }
        self.stream.stop();
        self.last_run_id = self.stream.state().run_id.clone();
        match self.reload_messages().await {
            Ok(()) => {
                self.stream.reset();
                self.set_status("Stopped");
            }
            Err(e) => self.set_api_error("Failed to reload thread", &e),
        }
    }

    /// Apply an update of the stream task.
    ///
    /// Returns `true` if the UI should be redrawn.
    pub async fn handle_stream_update(&mut self, update: StreamUpdate) -> bool {
        let finished = self.stream.handle(update);
        if self.stream_status() == StreamStatus::Error {
            let detail = self.stream.state().error.clone().unwrap_or_default();
            tracing::debug!(detail = %detail, "Stream error shown");
            self.status_message = None;
        }
        if finished {
            self.last_run_id = self.stream.state().run_id.clone();
            match self.reload_messages().await {
                Ok(()) => {
                    self.stream.reset();
                    self.set_status("Complete");
                }
                Err(e) => self.set_api_error("Failed to reload thread", &e),
            }
            if let Err(e) = self.refresh_threads().await {
                tracing::warn!(error = %e, "Failed to refresh threads after run");
            }
        }
        self.sync_scroll();
        true
    }

    /// Score the last finished run.
    pub async fn send_feedback(&mut self, score: f64) {
        let Some(run_id) = self.last_run_id.clone() else {
            self.set_error("No finished run to rate");
            return;
        };
        match self.client.send_feedback(&run_id, score).await {
            Ok(()) => self.set_status("Feedback sent"),
            Err(e) => self.set_api_error("Failed to send feedback", &e),
        }
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Open the edit dialog for the selected message.
    pub fn begin_edit(&mut self) {
        if self.stream.is_inflight() {
            self.set_error("Wait for the response to finish before editing");
            return;
        }
        let Some(msg) = self.selected_message() else {
            self.set_error("Select a message with [ and ] first");
            return;
        };
        self.enter_dialog_mode(InputMode::EditingMessage(msg.id.clone()));
        self.set_input(msg.text());
    }

    /// Record the dialog text as a draft of message `id`.
    pub fn finish_edit(&mut self, id: &MessageId) {
        let text = self.take_input();
        if let Some(msg) = self.rendered_messages().into_iter().find(|m| &m.id == id) {
            self.editor.record_edits(msg.with_text(text));
            self.set_status(format!("{} unsaved edit(s), [s] to save", self.editor.len()));
        }
        self.exit_dialog_mode();
    }

    /// Drop the draft of the selected message.
    pub fn abandon_selected_edit(&mut self) {
        if let Some(msg) = self.selected_message() {
            self.editor.abandon_edits(Some(&msg.id));
            self.set_status("Edit discarded");
        }
    }

    /// Drop every draft.
    pub fn abandon_all_edits(&mut self) {
        self.editor.abandon_edits(None);
        self.set_status("All edits discarded");
    }

    /// Commit the drafts and reload the thread on success.
    pub async fn commit_edits(&mut self) {
        let mut reload = false;
        let outcome = self.editor.commit_edits(&self.client, || reload = true).await;
        match outcome {
            Ok(CommitOutcome::Committed) => self.set_status("Edits saved"),
            Ok(CommitOutcome::NothingToCommit) => self.set_status("No edits to save"),
            Ok(CommitOutcome::NoThread) => self.set_error("No active thread"),
            Err(e) => self.set_api_error("Failed to save edits", &e),
        }
        if reload {
            if let Err(e) = self.reload_messages().await {
                self.set_api_error("Failed to reload thread", &e);
            }
        }
    }
}

/// Thread name derived from the first message.
fn thread_name(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() <= THREAD_NAME_LEN {
        line.to_string()
    } else {
        let cut: String = line.chars().take(THREAD_NAME_LEN - 1).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epsimo_client::{SessionContext, SessionState};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app(uri: &str) -> App {
        let session = SessionContext::in_memory(SessionState::fresh());
        session.set_token("T").unwrap();
        App::new(PlatformClient::new(uri, session)).0
    }

    async fn server_with_thread() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "thread_id": "t1", "name": "Chat", "assistant_id": "a1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/assistants/a1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "assistant_id": "a1", "name": "Helper"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/threads/t1/state"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [
                    {"id": "m1", "type": "human", "content": "hi"},
                    {"id": "m2", "type": "ai", "content": "hello"}
                ],
                "next": ["agent"]
            })))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn thread_name_is_first_line_truncated() {
        assert_eq!(thread_name("short\nsecond line"), "short");
        let long = "x".repeat(100);
        let name = thread_name(&long);
        assert_eq!(name.chars().count(), THREAD_NAME_LEN);
        assert!(name.ends_with('…'));
    }

    #[tokio::test]
    async fn input_editing_handles_multibyte_chars() {
        let mut app = app("http://127.0.0.1:9");
        for c in "héllo".chars() {
            app.insert_char(c);
        }
        app.move_cursor_left();
        app.delete_char();
        assert_eq!(app.input, "hélo");
        app.move_cursor_start();
        app.delete_char_forward();
        assert_eq!(app.input, "élo");
    }

    #[tokio::test]
    async fn opening_a_thread_loads_messages_and_continuation() {
        let server = server_with_thread().await;
        let mut app = app(&server.uri());

        app.open_route(Route::Thread(ThreadId::new("t1").unwrap()))
            .await;

        assert!(app.error_message.is_none());
        assert!(app.resolved.is_chat());
        assert_eq!(app.rendered_messages().len(), 2);
        assert!(app.can_continue());
    }

    #[tokio::test]
    async fn edit_then_abandon_restores_committed_text() {
        let server = server_with_thread().await;
        let mut app = app(&server.uri());
        app.open_route(Route::Thread(ThreadId::new("t1").unwrap()))
            .await;

        app.select_prev_message();
        app.begin_edit();
        assert_eq!(app.input, "hello");
        app.set_input("goodbye".to_string());
        let id = MessageId::new("m2").unwrap();
        app.finish_edit(&id);

        assert_eq!(app.rendered_messages()[1].text(), "goodbye");
        assert!(!app.can_continue());

        app.abandon_selected_edit();
        assert_eq!(app.rendered_messages()[1].text(), "hello");
        assert!(app.can_continue());
    }

    #[tokio::test]
    async fn commit_reloads_thread() {
        let server = server_with_thread().await;
        Mock::given(method("POST"))
            .and(path("/threads/t1/state"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let mut app = app(&server.uri());
        app.open_route(Route::Thread(ThreadId::new("t1").unwrap()))
            .await;
        let draft = app.rendered_messages()[0].with_text("hey");
        app.editor.record_edits(draft);

        app.commit_edits().await;

        assert!(app.editor.is_empty());
        assert_eq!(app.status_message.as_deref(), Some("Edits saved"));
        // Initial load plus the reload after commit.
        let state_gets = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.method.as_str() == "GET" && r.url.path() == "/threads/t1/state")
            .count();
        assert_eq!(state_gets, 2);
    }

    #[tokio::test]
    async fn finished_run_reloads_thread_and_keeps_run_id() {
        let server = server_with_thread().await;
        let body = concat!(
            "event: metadata\n",
            "data: {\"run_id\": \"r1\"}\n\n",
            "event: data\n",
            "data: [{\"id\": \"m4\", \"type\": \"ai\", \"content\": \"sure\"}]\n\n",
            "event: end\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/runs/stream"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let session = SessionContext::in_memory(SessionState::fresh());
        session.set_token("T").unwrap();
        let (mut app, mut updates) = App::new(PlatformClient::new(server.uri(), session));
        app.open_route(Route::Thread(ThreadId::new("t1").unwrap()))
            .await;

        app.send_message("more".to_string()).await;
        assert_eq!(app.stream_status(), StreamStatus::Inflight);
        while app.stream_status() != StreamStatus::Idle {
            let update = updates.recv().await.unwrap();
            app.handle_stream_update(update).await;
        }

        assert_eq!(app.last_run_id, Some(RunId::new("r1").unwrap()));
        assert_eq!(app.status_message.as_deref(), Some("Complete"));
        assert_eq!(app.rendered_messages().len(), 2);
    }
}
