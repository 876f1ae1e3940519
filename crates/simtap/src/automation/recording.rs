use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

use super::backend::Point;

/// What a recorded tap knew about its target, kept for code generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementSummary {
    pub element_type: String,
    pub label: Option<String>,
}

/// Kind-specific payload of a recorded action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionRecord {
    Tap {
        element: Option<ElementSummary>,
        at: Point,
    },
    TypeText {
        text: String,
    },
    Swipe {
        from: Point,
        to: Point,
    },
    Wait {
        seconds: f64,
    },
    Screenshot {
        path: PathBuf,
    },
}

/// Immutable log entry, appended only after the underlying dispatch
/// succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedAction {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: ActionRecord,
}

impl RecordedAction {
    pub fn now(record: ActionRecord) -> Self {
        Self { at: Utc::now(), record }
    }
}

/// One recording, process-lifetime only. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationSession {
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub bundle_id: Option<String>,
    pub actions: Vec<RecordedAction>,
    pub screenshots: Vec<PathBuf>,
}

impl AutomationSession {
    fn new(bundle_id: Option<String>) -> Self {
        Self {
            started_at: Utc::now(),
            stopped_at: None,
            bundle_id,
            actions: Vec::new(),
            screenshots: Vec::new(),
        }
    }
}

/// At most one active recording per recorder. Owned by the orchestration
/// layer and passed into the dispatcher; recording is opt-in and additive,
/// never required for dispatch to function.
#[derive(Default)]
pub struct Recorder {
    active: Mutex<Option<AutomationSession>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new recording. An unfinished session is discarded without
    /// warning; the number of actions it held is returned for information.
    pub fn start(&self, bundle_id: Option<String>) -> usize {
        let mut guard = self.active.lock().unwrap();
        let discarded = guard.as_ref().map(|s| s.actions.len()).unwrap_or(0);
        if discarded > 0 {
            tracing::debug!(discarded, "discarding unfinished recording session");
        }
        *guard = Some(AutomationSession::new(bundle_id));
        discarded
    }

    /// End the recording and hand the session back. `None` when nothing was
    /// active; never an error.
    pub fn stop(&self) -> Option<AutomationSession> {
        let mut guard = self.active.lock().unwrap();
        guard.take().map(|mut session| {
            session.stopped_at = Some(Utc::now());
            session
        })
    }

    pub fn is_recording(&self) -> bool {
        self.active.lock().unwrap().is_some()
    }

    /// Append an action to the active session. No-op when nothing is active.
    pub(crate) fn record(&self, action: RecordedAction) {
        let mut guard = self.active.lock().unwrap();
        if let Some(session) = guard.as_mut() {
            if let ActionRecord::Screenshot { path } = &action.record {
                session.screenshots.push(path.clone());
            }
            session.actions.push(action);
        }
    }

    pub fn action_count(&self) -> usize {
        self.active
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.actions.len())
            .unwrap_or(0)
    }
}
