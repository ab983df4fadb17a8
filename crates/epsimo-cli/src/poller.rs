//! Periodic refresh of the thread credit counter.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use epsimo_client::PlatformClient;
use epsimo_core::{ApiResult, ThreadInfo};

/// Background task polling `GET /auth/thread-info`.
///
/// The task stops when [`CreditPoller::cancel`] is called or the poller is
/// dropped.
pub struct CreditPoller {
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl CreditPoller {
    /// Spawn the poller; the first refresh happens immediately.
    #[must_use]
    pub fn spawn(
        client: PlatformClient,
        interval: Duration,
        results: mpsc::Sender<ApiResult<ThreadInfo>>,
    ) -> Self {
        let (cancel, mut cancelled) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    changed = cancelled.changed() => {
                        if changed.is_err() || *cancelled.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if !client.session().is_logged_in() {
                            continue;
                        }
                        let result = client.thread_info().await;
                        if results.send(result).await.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Credit poller stopped");
        });

        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Stop polling and wait for the task to exit.
    pub async fn cancel(mut self) {
        let _ = self.cancel.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for CreditPoller {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epsimo_client::{SessionContext, SessionState};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_with_credits() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/thread-info"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"thread_counter": 2, "thread_max": 5})),
            )
            .mount(&server)
            .await;
        server
    }

    fn client(uri: &str, token: Option<&str>) -> PlatformClient {
        let session = SessionContext::in_memory(SessionState::fresh());
        if let Some(token) = token {
            session.set_token(token).unwrap();
        }
        PlatformClient::new(uri, session)
    }

    #[tokio::test]
    async fn publishes_results_until_cancelled() {
        let server = server_with_credits().await;
        let (tx, mut rx) = mpsc::channel(8);
        let poller = CreditPoller::spawn(
            client(&server.uri(), Some("T")),
            Duration::from_millis(20),
            tx,
        );

        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.remaining(), 3);
        assert!(rx.recv().await.unwrap().is_ok());

        poller.cancel().await;
        while rx.try_recv().is_ok() {}
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn logged_out_session_is_not_polled() {
        let server = server_with_credits().await;
        let (tx, mut rx) = mpsc::channel(8);
        let poller = CreditPoller::spawn(client(&server.uri(), None), Duration::from_millis(10), tx);

        tokio::time::sleep(Duration::from_millis(50)).await;
        poller.cancel().await;

        assert!(rx.recv().await.is_none());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
