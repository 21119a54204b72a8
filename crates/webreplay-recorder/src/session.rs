//! Async recording session.
//!
//! Owns a [`Recorder`] on its own task. Commands and events arrive over an
//! mpsc channel and are processed strictly in arrival order; between them the
//! task sleeps until the recorder's next debounce deadline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use webreplay_protocols::Step;
use webreplay_selectors::ElementTree;

use crate::error::RecorderError;
use crate::event::RecorderEvent;
use crate::recorder::Recorder;
use crate::state::RecorderState;

const COMMAND_BUFFER: usize = 256;

enum Command {
    Start(i64),
    Pause,
    Resume,
    Event(Arc<ElementTree>, RecorderEvent),
    Stop(oneshot::Sender<Vec<Step>>),
    State(oneshot::Sender<RecorderState>),
    Steps(oneshot::Sender<Vec<Step>>),
}

/// Spawns recording sessions.
pub struct RecordingSession;

impl RecordingSession {
    /// Move `recorder` onto a new task. The task ends when every handle is dropped.
    pub fn spawn(recorder: Recorder) -> (SessionHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(run(recorder, rx));
        (SessionHandle { tx }, task)
    }
}

/// Cloneable handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    async fn send(&self, command: Command) -> Result<(), RecorderError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| RecorderError::SessionClosed)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RecorderError> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| RecorderError::SessionClosed)
    }

    pub async fn start(&self, now: i64) -> Result<(), RecorderError> {
        self.send(Command::Start(now)).await
    }

    pub async fn pause(&self) -> Result<(), RecorderError> {
        self.send(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<(), RecorderError> {
        self.send(Command::Resume).await
    }

    /// Queue an event captured on `tree`.
    pub async fn event(
        &self,
        tree: Arc<ElementTree>,
        event: RecorderEvent,
    ) -> Result<(), RecorderError> {
        self.send(Command::Event(tree, event)).await
    }

    pub async fn stop(&self) -> Result<Vec<Step>, RecorderError> {
        self.request(Command::Stop).await
    }

    pub async fn state(&self) -> Result<RecorderState, RecorderError> {
        self.request(Command::State).await
    }

    /// Steps recorded so far, without stopping.
    pub async fn steps(&self) -> Result<Vec<Step>, RecorderError> {
        self.request(Command::Steps).await
    }
}

/// Maps event timestamps onto the tokio clock.
#[derive(Clone, Copy)]
struct Clock {
    timestamp: i64,
    at: Instant,
}

impl Clock {
    fn now(&self) -> i64 {
        self.timestamp + self.at.elapsed().as_millis() as i64
    }

    fn instant_for(&self, timestamp: i64) -> Instant {
        self.at + Duration::from_millis((timestamp - self.timestamp).max(0) as u64)
    }
}

async fn run(mut recorder: Recorder, mut rx: mpsc::Receiver<Command>) {
    let mut clock: Option<Clock> = None;

    loop {
        let wake = recorder
            .next_deadline()
            .zip(clock)
            .map(|(deadline, clock)| clock.instant_for(deadline));

        let command = match wake {
            Some(wake) => tokio::select! {
                command = rx.recv() => command,
                _ = tokio::time::sleep_until(wake) => {
                    if let Some(clock) = clock {
                        recorder.tick(clock.now());
                    }
                    continue;
                }
            },
            None => rx.recv().await,
        };
        let Some(command) = command else {
            break;
        };

        match command {
            Command::Start(now) => {
                clock = Some(Clock {
                    timestamp: now,
                    at: Instant::now(),
                });
                recorder.start(now);
            }
            Command::Pause => recorder.pause(),
            Command::Resume => recorder.resume(),
            Command::Event(tree, event) => {
                clock = Some(Clock {
                    timestamp: event.timestamp,
                    at: Instant::now(),
                });
                if let Err(e) = recorder.handle(&tree, &event) {
                    warn!(event = event.name(), "Failed to record event: {}", e);
                }
            }
            Command::Stop(reply) => {
                let _ = reply.send(recorder.stop());
            }
            Command::State(reply) => {
                let _ = reply.send(recorder.state());
            }
            Command::Steps(reply) => {
                let _ = reply.send(recorder.steps().to_vec());
            }
        }
    }

    debug!("Recording session closed");
}
