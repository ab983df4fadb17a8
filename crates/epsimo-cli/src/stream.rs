//! Streaming session controller.
//!
//! One run at a time: [`StreamController::start`] spawns a task that drives
//! `POST /runs/stream` and forwards its events to the UI loop, tagged with a
//! generation number so events of a stopped run are ignored.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use epsimo_client::{PlatformClient, RunEvent, RunRequest};
use epsimo_core::{merge_by_id, ApiError, Message, RunId, ThreadId};

/// Status of the current generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamStatus {
    /// Nothing has been started.
    #[default]
    Idle,
    /// A run is producing output.
    Inflight,
    /// The run finished or was stopped.
    Done,
    /// The run failed.
    Error,
}

/// Transient state of one generation.
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    /// Current status.
    pub status: StreamStatus,
    /// Run id, once the server announced it.
    pub run_id: Option<RunId>,
    /// Messages produced so far, merged by id.
    pub messages: Vec<Message>,
    /// Failure detail when `status` is `Error`.
    pub error: Option<String>,
}

impl StreamState {
    /// A new inflight state seeded with the user's input.
    #[must_use]
    pub fn inflight(input: Option<Message>) -> Self {
        Self {
            status: StreamStatus::Inflight,
            run_id: None,
            messages: input.into_iter().collect(),
            error: None,
        }
    }

    /// Apply one run event.
    pub fn apply(&mut self, event: RunEvent) {
        match event {
            RunEvent::Metadata { run_id } => self.run_id = Some(run_id),
            RunEvent::Messages(messages) => merge_by_id(&mut self.messages, messages),
            RunEvent::Error(message) => self.fail(message),
            RunEvent::End => {
                if self.status == StreamStatus::Inflight {
                    self.status = StreamStatus::Done;
                }
            }
        }
    }

    fn fail(&mut self, message: String) {
        self.status = StreamStatus::Error;
        self.error = Some(message);
    }
}

/// What the stream task reports.
#[derive(Debug)]
pub enum StreamEvent {
    /// An event of the run.
    Run(RunEvent),
    /// The run could not be started or the connection dropped.
    Failed(ApiError),
}

/// A [`StreamEvent`] tagged with the generation that produced it.
#[derive(Debug)]
pub struct StreamUpdate {
    generation: u64,
    event: StreamEvent,
}

/// Drives one run at a time and tracks its [`StreamState`].
pub struct StreamController {
    client: PlatformClient,
    state: StreamState,
    generation: u64,
    task: Option<JoinHandle<()>>,
    updates: mpsc::Sender<StreamUpdate>,
}

impl StreamController {
    /// Create a controller; updates of started runs arrive on the returned receiver.
    #[must_use]
    pub fn new(client: PlatformClient) -> (Self, mpsc::Receiver<StreamUpdate>) {
        let (updates, rx) = mpsc::channel(128);
        let controller = Self {
            client,
            state: StreamState::default(),
            generation: 0,
            task: None,
            updates,
        };
        (controller, rx)
    }

    /// Current stream state.
    #[must_use]
    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Whether a run is in flight.
    #[must_use]
    pub fn is_inflight(&self) -> bool {
        self.state.status == StreamStatus::Inflight
    }

    /// Start a run on `thread_id`. `None` continues the thread without new input.
    ///
    /// A run already in flight is aborted first.
    pub fn start(&mut self, message: Option<Message>, thread_id: ThreadId) {
        self.abort_task();
        self.generation += 1;
        self.state = StreamState::inflight(message.clone());

        let request = RunRequest {
            thread_id,
            input: message.map(|m| vec![m]),
        };
        tracing::debug!(thread_id = %request.thread_id, continuation = request.input.is_none(), "Starting run");

        let client = self.client.clone();
        let out = self.updates.clone();
        let generation = self.generation;

        self.task = Some(tokio::spawn(async move {
            let (tx, mut rx) = mpsc::channel::<RunEvent>(64);
            let run = async { client.stream_run(&request, tx).await };
            let forward = async {
                while let Some(event) = rx.recv().await {
                    let update = StreamUpdate {
                        generation,
                        event: StreamEvent::Run(event),
                    };
                    if out.send(update).await.is_err() {
                        break;
                    }
                }
            };
            let (result, ()) = tokio::join!(run, forward);
            if let Err(e) = result {
                let _ = out
                    .send(StreamUpdate {
                        generation,
                        event: StreamEvent::Failed(e),
                    })
                    .await;
            }
        }));
    }

    /// Abort the in-flight run and mark the stream done.
    pub fn stop(&mut self) {
        if self.abort_task() {
            tracing::debug!("Run stopped");
        }
        self.generation += 1;
        if self.state.status == StreamStatus::Inflight {
            self.state.status = StreamStatus::Done;
        }
    }

    /// Forget the last run (after its messages were reloaded from the thread).
    pub fn reset(&mut self) {
        self.abort_task();
        self.generation += 1;
        self.state = StreamState::default();
    }

    /// Apply an update from the stream task.
    ///
    /// Returns `true` if this update finished the run successfully.
    pub fn handle(&mut self, update: StreamUpdate) -> bool {
        if update.generation != self.generation {
            return false;
        }
        let was_inflight = self.is_inflight();
        match update.event {
            StreamEvent::Run(event) => self.state.apply(event),
            StreamEvent::Failed(e) => self.state.fail(e.message),
        }
        if self.state.status == StreamStatus::Error && was_inflight {
            tracing::warn!(error = ?self.state.error, "Run failed");
        }
        was_inflight && self.state.status == StreamStatus::Done
    }

    fn abort_task(&mut self) -> bool {
        match self.task.take() {
            Some(task) if !task.is_finished() => {
                task.abort();
                true
            }
            _ => false,
        }
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        self.abort_task();
    }
}
