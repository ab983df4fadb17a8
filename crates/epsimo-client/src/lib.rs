//! HTTP client for the Epsimo agent platform.
//!
//! This crate provides:
//!
//! - [`PlatformClient`]: typed access to every backend endpoint
//! - [`SessionContext`]: the explicit, persisted session (token, anonymous id, project)
//! - Run streaming over server-sent events ([`RunEvent`])
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │  Front end       │────▶│  PlatformClient  │──── HTTPS ────▶ backend
//! │  (TUI / CLI)     │     └────────┬─────────┘
//! └──────────────────┘              │ reads token
//!                          ┌────────▼─────────┐
//!                          │  SessionContext  │
//!                          └────────┬─────────┘
//!                                   │ persists
//!                          ┌────────▼─────────┐
//!                          │  SessionStore    │
//!                          │  (session.json)  │
//!                          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use epsimo_client::{PlatformClient, SessionContext, SessionStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = SessionContext::open(SessionStore::in_config_dir()?)?;
//! let client = PlatformClient::new("http://localhost:8100", session);
//!
//! client.login("me@example.com", "secret").await?;
//! for thread in client.list_threads().await? {
//!     println!("{} {}", thread.thread_id, thread.name);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod claims;
pub mod client;
pub mod config;
pub mod session;
pub mod sse;

pub use claims::{ClaimsError, TokenClaims};
pub use client::{AssistantUpdate, PlatformClient, RunRequest};
pub use config::ClientConfig;
pub use session::{SessionContext, SessionError, SessionState, SessionStore};
pub use sse::{RunEvent, SseDecoder, SseFrame};
