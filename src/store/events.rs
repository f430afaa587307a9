use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// Observable phase of an asynchronous store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pending,
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOp {
    Login,
    Register,
    Logout,
    ClearError,
    UpdateProfile,
    ChangePassword,
    Restore,
    /// Forced reset after the backend stopped accepting the credential.
    Evict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryOp {
    List,
    Create,
    Update,
    Remove,
    ClearError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// Transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Escalation {
    /// The credential was rejected; the entry-point layer should send the
    /// user to the login page, remembering where they were.
    Unauthorized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Session { op: SessionOp, phase: Phase, error: Option<String> },
    Directory { op: DirectoryOp, phase: Phase, error: Option<String> },
    Notice(Notice),
    Escalation { escalation: Escalation },
}

/// Publish/subscribe hub shared by the stores and the client adapter.
/// Events are published at the moment a phase is applied, so subscribers see
/// them in completion order. Publishing with no subscribers is not an error.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self { Self::new(256) }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> { self.tx.subscribe() }

    pub fn publish(&self, event: Event) {
        trace!(target: "bus", ?event, "publish");
        let _ = self.tx.send(event);
    }

    pub fn notify<S: Into<String>>(&self, level: NoticeLevel, message: S) {
        self.publish(Event::Notice(Notice { level, message: message.into() }));
    }

    pub fn escalate(&self, escalation: Escalation) {
        self.publish(Event::Escalation { escalation });
    }
}

/// Drain whatever is queued on a receiver without waiting.
/// Lagged receivers skip the dropped events and keep going.
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(ev) => out.push(ev),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    out
}
