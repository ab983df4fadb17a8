//! HTTP client for the platform REST API.
//!
//! Every operation returns an [`ApiResult`]; failures are logged here once and
//! classified by [`ErrorKind`] so callers can react (re-login on
//! `Unauthorized`, show "not found", ...). There is no retry and no
//! client-side timeout.

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use epsimo_core::{
    ApiError, ApiKeys, ApiResult, Assistant, AssistantId, CheckoutSession, ErrorKind, Message,
    Project, ProjectId, RunId, Thread, ThreadId, ThreadInfo, ThreadState,
};

use crate::session::SessionContext;
use crate::sse::{RunEvent, SseDecoder};

/// Name of the cookie carrying the anonymous user id.
const USER_ID_COOKIE: &str = "opengpts_user_id";

/// Request payload for email/password login.
#[derive(Debug, Clone, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Response carrying a (possibly project-scoped) session token.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    jwt_token: String,
}

/// FastAPI error body.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    detail: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ProjectPayload<'a> {
    name: &'a str,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct NewThreadPayload<'a> {
    name: &'a str,
    assistant_id: &'a AssistantId,
}

#[derive(Debug, Serialize)]
struct ThreadStatePayload<'a> {
    values: &'a [Message],
}

#[derive(Debug, Serialize)]
struct FeedbackPayload<'a> {
    run_id: &'a RunId,
    key: &'static str,
    score: f64,
}

#[derive(Debug, Serialize)]
struct CheckoutPayload {
    quantity: u32,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: f64,
}

/// Fields accepted when saving an assistant.
#[derive(Debug, Clone, Serialize)]
pub struct AssistantUpdate {
    /// Display name.
    pub name: String,
    /// Schema-defined configuration.
    pub config: serde_json::Value,
    /// Whether the assistant is shared publicly.
    pub public: bool,
}

impl From<&Assistant> for AssistantUpdate {
    fn from(assistant: &Assistant) -> Self {
        Self {
            name: assistant.name.clone(),
            config: assistant.config.clone(),
            public: assistant.public,
        }
    }
}

/// Body of `POST /runs/stream`.
#[derive(Debug, Clone, Serialize)]
pub struct RunRequest {
    /// Thread the run appends to.
    pub thread_id: ThreadId,
    /// New input messages; `None` continues the thread without new input.
    pub input: Option<Vec<Message>>,
}

/// Client for the platform REST API.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    http: Client,
    base_url: String,
    session: SessionContext,
}

impl PlatformClient {
    /// Create a new platform client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Backend base URL (e.g., "http://localhost:8100")
    /// * `session` - Session context supplying the bearer token
    pub fn new(base_url: impl Into<String>, session: SessionContext) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the session context.
    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Headers sent with every request.
    fn base_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(cookie) =
            HeaderValue::from_str(&format!("{USER_ID_COOKIE}={}", self.session.user_id()))
        {
            headers.insert(COOKIE, cookie);
        }
        headers
    }

    /// Build headers for authenticated requests.
    fn auth_headers(&self) -> ApiResult<HeaderMap> {
        let token = self.session.token().ok_or_else(ApiError::no_session)?;
        let mut headers = self.base_headers();
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ApiError::new(ErrorKind::NoSession, "session token is not a valid header"))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    /// Handle API error responses.
    async fn handle_error(response: Response) -> ApiError {
        let status = response.status().as_u16();
        let message = match response.json::<ErrorResponse>().await {
            Ok(ErrorResponse {
                detail: serde_json::Value::String(detail),
            }) => detail,
            Ok(ErrorResponse { detail }) => detail.to_string(),
            Err(_) => "Unknown error".to_string(),
        };
        ApiError::from_status(status, message)
    }

    /// Send a request and return the successful response.
    async fn send(&self, op: &'static str, request: RequestBuilder) -> ApiResult<Response> {
        let result = match request.send().await {
            Ok(response) if response.status().is_success() => Ok(response),
            Ok(response) => Err(Self::handle_error(response).await),
            Err(e) => Err(ApiError::network(e.to_string())),
        };
        if let Err(e) = &result {
            tracing::warn!(op, kind = ?e.kind, status = ?e.status, error = %e.message, "API request failed");
        }
        result
    }

    /// Send a request and decode its JSON body.
    async fn fetch<T: DeserializeOwned>(
        &self,
        op: &'static str,
        request: RequestBuilder,
    ) -> ApiResult<T> {
        let response = self.send(op, request).await?;
        response.json::<T>().await.map_err(|e| {
            tracing::warn!(op, error = %e, "Malformed API response");
            ApiError::malformed(e.to_string())
        })
    }

    fn authed_get(&self, path: &str) -> ApiResult<RequestBuilder> {
        Ok(self.http.get(self.url(path)).headers(self.auth_headers()?))
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Log in with email and password and store the returned token in the session.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown credentials, or any transport/decoding failure.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<()> {
        let request = self
            .http
            .post(self.url("/auth/login"))
            .headers(self.base_headers())
            .json(&LoginRequest { email, password });

        let body: TokenResponse = self.fetch("login", request).await?;
        self.store_token(body.jwt_token);
        tracing::info!("Logged in");
        Ok(())
    }

    /// Create a new account.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` if the account already exists.
    pub async fn signup(&self, email: &str, password: &str) -> ApiResult<()> {
        let request = self
            .http
            .post(self.url("/auth/signup"))
            .header(COOKIE, format!("{USER_ID_COOKIE}={}", self.session.user_id()))
            .form(&[("email", email), ("password", password)]);

        self.send("signup", request).await?;
        Ok(())
    }

    /// Store a token obtained out of band (e.g. from the Google sign-in callback).
    pub fn accept_token(&self, token: impl Into<String>) {
        self.store_token(token.into());
    }

    /// Clear the session token and project hint.
    pub fn logout(&self) {
        if let Err(e) = self.session.logout() {
            tracing::error!(error = %e, "Failed to persist logout");
        }
    }

    fn store_token(&self, token: String) {
        if let Err(e) = self.session.set_token(token) {
            tracing::error!(error = %e, "Failed to persist session token");
        }
    }

    /// Get thread credit usage.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn thread_info(&self) -> ApiResult<ThreadInfo> {
        let request = self.authed_get("/auth/thread-info")?;
        self.fetch("thread_info", request).await
    }

    // =========================================================================
    // API Keys
    // =========================================================================

    /// Get the stored provider keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn api_keys(&self) -> ApiResult<ApiKeys> {
        let request = self.authed_get("/chatbot_configuration/")?;
        self.fetch("api_keys", request).await
    }

    /// Replace the stored provider keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_api_keys(&self, keys: &ApiKeys) -> ApiResult<ApiKeys> {
        let request = self
            .http
            .post(self.url("/chatbot_configuration/"))
            .headers(self.auth_headers()?)
            .json(keys);
        self.fetch("update_api_keys", request).await
    }

    // =========================================================================
    // Projects
    // =========================================================================

    /// List the user's projects.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_projects(&self) -> ApiResult<Vec<Project>> {
        let request = self.authed_get("/projects/")?;
        self.fetch("list_projects", request).await
    }

    /// Create a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create_project(&self, name: &str, description: &str) -> ApiResult<Project> {
        let request = self
            .http
            .post(self.url("/projects/"))
            .headers(self.auth_headers()?)
            .json(&ProjectPayload { name, description });
        self.fetch("create_project", request).await
    }

    /// Rename or re-describe a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_project(
        &self,
        project_id: &ProjectId,
        name: &str,
        description: &str,
    ) -> ApiResult<()> {
        let request = self
            .http
            .put(self.url(&format!("/projects/{project_id}")))
            .headers(self.auth_headers()?)
            .json(&ProjectPayload { name, description });
        self.send("update_project", request).await?;
        Ok(())
    }

    /// Delete a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_project(&self, project_id: &ProjectId) -> ApiResult<()> {
        let request = self
            .http
            .delete(self.url(&format!("/projects/{project_id}")))
            .headers(self.auth_headers()?);
        self.send("delete_project", request).await?;
        Ok(())
    }

    /// Select a project: exchange the session token for one scoped to it and
    /// remember the project name.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the project does not exist.
    pub async fn select_project(&self, project_id: &ProjectId, project_name: &str) -> ApiResult<()> {
        let request = self.authed_get(&format!("/projects/{project_id}"))?;
        let body: TokenResponse = self.fetch("select_project", request).await?;
        if let Err(e) = self.session.set_project(body.jwt_token, project_name) {
            tracing::error!(error = %e, "Failed to persist project selection");
        }
        tracing::info!(project_id = %project_id, "Project selected");
        Ok(())
    }

    // =========================================================================
    // Assistants
    // =========================================================================

    /// List assistants visible to the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_assistants(&self) -> ApiResult<Vec<Assistant>> {
        let request = self.authed_get("/assistants/")?;
        self.fetch("list_assistants", request).await
    }

    /// Get one assistant.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the assistant does not exist.
    pub async fn get_assistant(&self, assistant_id: &AssistantId) -> ApiResult<Assistant> {
        let request = self.authed_get(&format!("/assistants/{assistant_id}"))?;
        self.fetch("get_assistant", request).await
    }

    /// Save an assistant's name, configuration and visibility.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_assistant(
        &self,
        assistant_id: &AssistantId,
        update: &AssistantUpdate,
    ) -> ApiResult<Assistant> {
        let request = self
            .http
            .put(self.url(&format!("/assistants/{assistant_id}")))
            .headers(self.auth_headers()?)
            .json(update);
        self.fetch("update_assistant", request).await
    }

    /// Delete an assistant.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_assistant(&self, assistant_id: &AssistantId) -> ApiResult<()> {
        let request = self
            .http
            .delete(self.url(&format!("/assistants/{assistant_id}")))
            .headers(self.auth_headers()?);
        self.send("delete_assistant", request).await?;
        Ok(())
    }

    /// Price per thread of the named agent type.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn agent_price(&self, agent_name: &str) -> ApiResult<f64> {
        let request = self
            .authed_get("/price/agent")?
            .query(&[("agent_name", agent_name)]);
        let body: PriceResponse = self.fetch("agent_price", request).await?;
        Ok(body.price)
    }

    // =========================================================================
    // Threads
    // =========================================================================

    /// List the user's threads.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_threads(&self) -> ApiResult<Vec<Thread>> {
        let request = self.authed_get("/threads/")?;
        self.fetch("list_threads", request).await
    }

    /// Start a new chat with an assistant.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create_thread(&self, name: &str, assistant_id: &AssistantId) -> ApiResult<Thread> {
        let request = self
            .http
            .post(self.url("/threads"))
            .headers(self.auth_headers()?)
            .json(&NewThreadPayload { name, assistant_id });
        self.fetch("create_thread", request).await
    }

    /// Get one thread.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the thread does not exist.
    pub async fn get_thread(&self, thread_id: &ThreadId) -> ApiResult<Thread> {
        let request = self.authed_get(&format!("/threads/{thread_id}"))?;
        self.fetch("get_thread", request).await
    }

    /// Get a thread's committed messages and continuation pointer.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn thread_state(&self, thread_id: &ThreadId) -> ApiResult<ThreadState> {
        let request = self.authed_get(&format!("/threads/{thread_id}/state"))?;
        self.fetch("thread_state", request).await
    }

    /// Replace a thread's persisted messages with `values`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_thread_state(&self, thread_id: &ThreadId, values: &[Message]) -> ApiResult<()> {
        let request = self
            .http
            .post(self.url(&format!("/threads/{thread_id}/state")))
            .headers(self.auth_headers()?)
            .json(&ThreadStatePayload { values });
        self.send("update_thread_state", request).await?;
        Ok(())
    }

    // =========================================================================
    // Runs
    // =========================================================================

    /// Record a user score for a run.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn send_feedback(&self, run_id: &RunId, score: f64) -> ApiResult<()> {
        let request = self
            .http
            .post(self.url("/runs/feedback"))
            .headers(self.auth_headers()?)
            .json(&FeedbackPayload {
                run_id,
                key: "user_score",
                score,
            });
        self.send("send_feedback", request).await?;
        Ok(())
    }

    /// Start a run and forward its events to `tx` until the stream ends.
    ///
    /// A final [`RunEvent::End`] is always sent when the server closes the
    /// stream normally, even if it sent no explicit `end` event.
    ///
    /// # Errors
    ///
    /// Returns an error if the run cannot be started or the connection drops.
    pub async fn stream_run(&self, run: &RunRequest, tx: mpsc::Sender<RunEvent>) -> ApiResult<()> {
        let request = self
            .http
            .post(self.url("/runs/stream"))
            .headers(self.auth_headers()?)
            .json(run);
        let response = self.send("stream_run", request).await?;

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut ended = false;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                tracing::warn!(error = %e, "Run stream interrupted");
                ApiError::network(e.to_string())
            })?;
            for frame in decoder.feed(&chunk) {
                ended |= forward_frame(&frame, &tx).await;
            }
        }
        if let Some(frame) = decoder.finish() {
            ended |= forward_frame(&frame, &tx).await;
        }
        if !ended {
            let _ = tx.send(RunEvent::End).await;
        }

        tracing::debug!(thread_id = %run.thread_id, "Run stream closed");
        Ok(())
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Create a payment checkout session for `quantity` thread credits.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create_checkout_session(&self, quantity: u32) -> ApiResult<CheckoutSession> {
        let request = self
            .http
            .post(self.url("/checkout/create-checkout-session"))
            .headers(self.auth_headers()?)
            .json(&CheckoutPayload { quantity });
        self.fetch("create_checkout_session", request).await
    }
}

/// Send the event carried by `frame`; returns `true` if it was `End`.
async fn forward_frame(frame: &crate::sse::SseFrame, tx: &mpsc::Sender<RunEvent>) -> bool {
    let event = match RunEvent::from_frame(frame) {
        Some(Ok(event)) => event,
        Some(Err(message)) => {
            tracing::debug!(event = %frame.event, error = %message, "Unreadable run event");
            RunEvent::Error(message)
        }
        None => return false,
    };
    let is_end = event == RunEvent::End;
    let _ = tx.send(event).await;
    is_end
}
