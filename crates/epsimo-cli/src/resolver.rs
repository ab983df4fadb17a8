//! Resolution of the chat route into a thread and its assistant.

use std::fmt;

use epsimo_client::PlatformClient;
use epsimo_core::{ApiResult, Assistant, AssistantId, Thread, ThreadId};

/// What the chat view is pointed at.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Route {
    /// No thread or assistant selected.
    #[default]
    Home,
    /// An existing thread.
    Thread(ThreadId),
    /// An assistant, before any thread exists.
    Assistant(AssistantId),
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => write!(f, "home"),
            Self::Thread(id) => write!(f, "thread/{id}"),
            Self::Assistant(id) => write!(f, "assistant/{id}"),
        }
    }
}

/// The thread and assistant a route points to.
#[derive(Debug, Clone, Default)]
pub struct Resolved {
    /// Active thread, for thread routes.
    pub thread: Option<Thread>,
    /// Assistant configuration used by the thread or named by the route.
    pub assistant: Option<Assistant>,
}

impl Resolved {
    /// Whether there is enough to chat: a thread and its assistant.
    #[must_use]
    pub fn is_chat(&self) -> bool {
        self.thread.is_some() && self.assistant.is_some()
    }
}

/// Fetch what `route` points to.
///
/// A thread that names no assistant resolves with `assistant: None`.
///
/// # Errors
///
/// Returns the first API error encountered.
pub async fn resolve(client: &PlatformClient, route: &Route) -> ApiResult<Resolved> {
    match route {
        Route::Home => Ok(Resolved::default()),
        Route::Thread(thread_id) => {
            let thread = client.get_thread(thread_id).await?;
            let assistant = match &thread.assistant_id {
                Some(assistant_id) => Some(client.get_assistant(assistant_id).await?),
                None => None,
            };
            tracing::debug!(route = %route, has_assistant = assistant.is_some(), "Route resolved");
            Ok(Resolved {
                thread: Some(thread),
                assistant,
            })
        }
        Route::Assistant(assistant_id) => {
            let assistant = client.get_assistant(assistant_id).await?;
            Ok(Resolved {
                thread: None,
                assistant: Some(assistant),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epsimo_client::{SessionContext, SessionState};
    use epsimo_core::ErrorKind;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(uri: &str) -> PlatformClient {
        let session = SessionContext::in_memory(SessionState::fresh());
        session.set_token("T").unwrap();
        PlatformClient::new(uri, session)
    }

    async fn mock_get(server: &MockServer, at: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn home_resolves_nothing() {
        let server = MockServer::start().await;
        let resolved = resolve(&client(&server.uri()), &Route::Home).await.unwrap();
        assert!(resolved.thread.is_none());
        assert!(resolved.assistant.is_none());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn thread_route_fetches_thread_then_assistant() {
        let server = MockServer::start().await;
        mock_get(
            &server,
            "/threads/t1",
            json!({"thread_id": "t1", "name": "Chat", "assistant_id": "a1"}),
        )
        .await;
        mock_get(
            &server,
            "/assistants/a1",
            json!({"assistant_id": "a1", "name": "Helper", "config": {}, "public": false}),
        )
        .await;

        let route = Route::Thread(ThreadId::new("t1").unwrap());
        let resolved = resolve(&client(&server.uri()), &route).await.unwrap();
        assert!(resolved.is_chat());
        assert_eq!(resolved.assistant.unwrap().name, "Helper");
    }

    #[tokio::test]
    async fn assistant_route_has_no_thread() {
        let server = MockServer::start().await;
        mock_get(
            &server,
            "/assistants/a1",
            json!({"assistant_id": "a1", "name": "Helper"}),
        )
        .await;

        let route = Route::Assistant(AssistantId::new("a1").unwrap());
        let resolved = resolve(&client(&server.uri()), &route).await.unwrap();
        assert!(resolved.thread.is_none());
        assert!(!resolved.is_chat());
    }

    #[tokio::test]
    async fn missing_thread_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Thread not found"})))
            .mount(&server)
            .await;

        let route = Route::Thread(ThreadId::new("gone").unwrap());
        let err = resolve(&client(&server.uri()), &route).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn route_display() {
        assert_eq!(Route::Home.to_string(), "home");
        assert_eq!(
            Route::Thread(ThreadId::new("t1").unwrap()).to_string(),
            "thread/t1"
        );
    }
}
