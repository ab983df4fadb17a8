//! Core types and utilities for the Epsimo agent platform client.
//!
//! This crate provides the foundational types shared by the API client and the
//! terminal front end:
//!
//! - **Identifiers**: Strongly-typed IDs for threads, assistants, projects, messages and runs
//! - **Domain types**: Messages, threads, assistants, projects and account data
//! - **Error types**: The typed failure taxonomy returned by every API call
//!
//! # Example
//!
//! ```
//! use epsimo_core::{Message, MessageId, Role};
//!
//! let msg = Message::human("hello");
//! assert_eq!(msg.role, Role::Human);
//!
//! let id = MessageId::new("msg-1").unwrap();
//! assert_eq!(id.as_str(), "msg-1");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod types;

pub use error::{ApiError, ApiResult, ErrorKind};
pub use ids::{AnonymousUserId, AssistantId, IdError, MessageId, ProjectId, RunId, ThreadId};
pub use types::{
    merge_by_id, ApiKeys, Assistant, CheckoutSession, Message, MessageContent, Project, Role, Thread,
    ThreadInfo, ThreadState,
};
