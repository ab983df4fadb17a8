//! Domain types exchanged with the platform backend.
//!
//! Field names follow the backend's JSON. Messages keep any field this client
//! does not model in [`Message::metadata`] so that writing a message back
//! (e.g. when committing edits) does not drop server data.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{AssistantId, MessageId, ProjectId, ThreadId};

/// Author role of a chat message.
///
/// Message types this client does not know are kept verbatim in
/// [`Role::Other`] so they survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Message written by the user.
    #[serde(rename = "human")]
    Human,
    /// Complete assistant message.
    #[serde(rename = "ai")]
    Ai,
    /// Partial assistant message emitted while streaming.
    #[serde(rename = "AIMessageChunk")]
    AiChunk,
    /// System prompt.
    #[serde(rename = "system")]
    System,
    /// Tool invocation result.
    #[serde(rename = "tool")]
    Tool,
    /// Legacy function-call result.
    #[serde(rename = "function")]
    Function,
    /// Any other message type, e.g. `chat` or `ToolMessageChunk`.
    #[serde(untagged)]
    Other(String),
}

impl Role {
    /// Short label for display.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Human => "You",
            Self::Ai | Self::AiChunk => "Assistant",
            Self::System => "System",
            Self::Tool => "Tool",
            Self::Function => "Function",
            Self::Other(kind) => kind,
        }
    }

    /// Returns `true` for assistant-authored messages.
    #[must_use]
    pub const fn is_assistant(&self) -> bool {
        matches!(self, Self::Ai | Self::AiChunk)
    }
}

/// Content of a message: plain text or a list of structured parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text.
    Text(String),
    /// Structured parts (text blocks, tool-use blocks, ...).
    Parts(Vec<Value>),
}

impl MessageContent {
    /// Flatten the content into display text.
    ///
    /// Structured parts contribute their `text` field; parts without one are skipped.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    Value::String(s) => Some(s.as_str()),
                    other => other.get("text").and_then(Value::as_str),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message identity.
    pub id: MessageId,
    /// Author role (serialized as `type`).
    #[serde(rename = "type")]
    pub role: Role,
    /// Message body.
    #[serde(default)]
    pub content: MessageContent,
    /// Every other field sent by the server, preserved verbatim.
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, Value>,
}

impl Message {
    /// Compose a new user message with a freshly generated id.
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            role: Role::Human,
            content: MessageContent::Text(content.into()),
            metadata: serde_json::Map::new(),
        }
    }

    /// Return a copy of this message with its content replaced by `text`.
    #[must_use]
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            content: MessageContent::Text(text.into()),
            ..self.clone()
        }
    }

    /// Flattened display text.
    #[must_use]
    pub fn text(&self) -> String {
        self.content.text()
    }
}

/// Merge `incoming` into `current` by message id.
///
/// Messages whose id already exists are replaced in place; new ids are
/// appended in arrival order.
pub fn merge_by_id(current: &mut Vec<Message>, incoming: Vec<Message>) {
    for msg in incoming {
        match current.iter_mut().find(|m| m.id == msg.id) {
            Some(existing) => *existing = msg,
            None => current.push(msg),
        }
    }
}

/// A persisted conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    /// Thread identity.
    pub thread_id: ThreadId,
    /// Display name.
    pub name: String,
    /// Assistant used with this thread.
    #[serde(default)]
    pub assistant_id: Option<AssistantId>,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Server-side state of a thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadState {
    /// Committed messages, in order.
    #[serde(default)]
    pub values: Vec<Message>,
    /// Pending graph nodes; non-empty when the run can be continued.
    #[serde(default)]
    pub next: Vec<String>,
}

/// An assistant (bot) configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assistant {
    /// Assistant identity.
    pub assistant_id: AssistantId,
    /// Display name.
    pub name: String,
    /// Schema-defined configuration (model, tools, system prompt, ...).
    #[serde(default)]
    pub config: Value,
    /// Whether the assistant is shared publicly.
    #[serde(default)]
    pub public: bool,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Assistant {
    /// The assistant type configured under `configurable.type`, if any.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.config
            .pointer("/configurable/type")
            .and_then(Value::as_str)
    }
}

/// A project (workspace) owned by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project identity.
    pub project_id: ProjectId,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Third-party provider keys stored for the user.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiKeys {
    /// `OpenAI` key.
    pub openai_api_key: String,
    /// Anthropic key.
    pub anthropic_api_key: String,
    /// You.com key.
    pub ydc_api_key: String,
    /// Tavily key.
    pub tavili_api_key: String,
}

impl ApiKeys {
    /// Label/value pairs with values masked for display.
    #[must_use]
    pub fn masked(&self) -> [(&'static str, String); 4] {
        [
            ("OpenAI", mask(&self.openai_api_key)),
            ("Anthropic", mask(&self.anthropic_api_key)),
            ("You.com", mask(&self.ydc_api_key)),
            ("Tavily", mask(&self.tavili_api_key)),
        ]
    }
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeys")
            .field("openai_api_key", &mask(&self.openai_api_key))
            .field("anthropic_api_key", &mask(&self.anthropic_api_key))
            .field("ydc_api_key", &mask(&self.ydc_api_key))
            .field("tavili_api_key", &mask(&self.tavili_api_key))
            .finish()
    }
}

fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    match chars.len() {
        0 => "(not set)".to_string(),
        1..=8 => "*".repeat(chars.len()),
        n => {
            let tail: String = chars[n - 4..].iter().collect();
            format!("****{tail}")
        }
    }
}

/// Thread credit usage for the current user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadInfo {
    /// Threads consumed so far.
    pub thread_counter: u64,
    /// Threads purchased.
    pub thread_max: u64,
}

impl ThreadInfo {
    /// Threads still available.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.thread_max.saturating_sub(self.thread_counter)
    }
}

/// Payment checkout session created by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// URL the user must open to pay.
    pub url: String,
    /// Provider session id.
    #[serde(default)]
    pub id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn msg(id: &str, text: &str) -> Message {
        Message {
            id: MessageId::new(id).unwrap(),
            role: Role::Ai,
            content: MessageContent::Text(text.to_string()),
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn message_preserves_unknown_fields() {
        let raw = json!({
            "id": "m1",
            "type": "ai",
            "content": "hi",
            "example": false,
            "additional_kwargs": {"tool_calls": []}
        });
        let parsed: Message = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(parsed.role, Role::Ai);
        assert_eq!(parsed.metadata.get("example"), Some(&json!(false)));
        assert_eq!(serde_json::to_value(&parsed).unwrap(), raw);
    }

    #[test]
    fn structured_content_flattens_text_parts() {
        let content = MessageContent::Parts(vec![
            json!({"type": "text", "text": "first"}),
            json!({"type": "tool_use", "id": "x"}),
            json!("second"),
        ]);
        assert_eq!(content.text(), "first\nsecond");
    }

    #[test]
    fn chunk_role_parses() {
        let parsed: Message =
            serde_json::from_value(json!({"id": "c", "type": "AIMessageChunk", "content": ""}))
                .unwrap();
        assert!(parsed.role.is_assistant());
    }

    #[test]
    fn merge_replaces_in_place_and_appends() {
        let mut current = vec![msg("a", "1"), msg("b", "2")];
        merge_by_id(&mut current, vec![msg("b", "2!"), msg("c", "3")]);
        let texts: Vec<String> = current.iter().map(Message::text).collect();
        assert_eq!(texts, ["1", "2!", "3"]);
    }

    #[test]
    fn with_text_keeps_identity() {
        let original = msg("a", "old");
        let edited = original.with_text("new");
        assert_eq!(edited.id, original.id);
        assert_eq!(edited.role, original.role);
        assert_eq!(edited.text(), "new");
    }

    #[test]
    fn api_keys_use_camel_case() {
        let keys = ApiKeys {
            openai_api_key: "sk-1".into(),
            ..ApiKeys::default()
        };
        let value = serde_json::to_value(&keys).unwrap();
        assert_eq!(value["openaiApiKey"], "sk-1");
        assert_eq!(value["taviliApiKey"], "");
    }

    #[test]
    fn api_keys_debug_is_masked() {
        let keys = ApiKeys {
            openai_api_key: "sk-abcdefghijkl".into(),
            ..ApiKeys::default()
        };
        let debug = format!("{keys:?}");
        assert!(!debug.contains("abcdefgh"));
        assert!(debug.contains("****ijkl"));
    }

    #[test]
    fn thread_info_remaining_saturates() {
        let info = ThreadInfo {
            thread_counter: 12,
            thread_max: 10,
        };
        assert_eq!(info.remaining(), 0);
    }

    #[test]
    fn assistant_kind_reads_configurable_type() {
        let assistant: Assistant = serde_json::from_value(json!({
            "assistant_id": "a1",
            "name": "Researcher",
            "config": {"configurable": {"type": "agent"}},
            "public": true
        }))
        .unwrap();
        assert_eq!(assistant.kind(), Some("agent"));
    }

    #[test]
    fn unknown_message_type_round_trips() {
        let raw = json!({
            "values": [
                {"id": "m1", "type": "human", "content": "hi"},
                {"id": "m2", "type": "chat", "content": "x", "role": "critic"}
            ],
            "next": []
        });
        let state: ThreadState = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(state.values.len(), 2);
        assert_eq!(state.values[1].role, Role::Other("chat".to_string()));
        assert_eq!(state.values[1].role.as_str(), "chat");
        assert!(!state.values[1].role.is_assistant());
        assert_eq!(state.values[1].metadata.get("role"), Some(&json!("critic")));
        assert_eq!(serde_json::to_value(&state).unwrap(), raw);
    }

    #[test]
    fn known_types_do_not_fall_back() {
        let parsed: Message =
            serde_json::from_value(json!({"id": "m1", "type": "tool", "content": ""})).unwrap();
        assert_eq!(parsed.role, Role::Tool);
    }

    #[test]
    fn thread_timestamps_parse_with_offset() {
        let thread: Thread = serde_json::from_value(json!({
            "thread_id": "t1",
            "name": "Chat",
            "updated_at": "2024-05-01T12:30:00.123456+00:00"
        }))
        .unwrap();
        let at = thread.updated_at.unwrap();
        assert_eq!(at.format("%Y-%m-%d %H:%M").to_string(), "2024-05-01 12:30");
    }
}
