//! Cancelable scheduled work owned by a single session
//!
//! Every timer and background call the controller starts is parked in a
//! [`TaskRegistry`] slot keyed by [`TaskKind`]. Exit paths call
//! [`TaskRegistry::cancel`] or [`TaskRegistry::cancel_all`] instead of
//! tracking raw handles. Results that still arrive are matched against the
//! [`Generation`] they were issued under.

use std::collections::HashMap;
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::trace;

/// Session generation; bumped on every state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Generation(u64);

impl Generation {
    /// First generation of a session
    pub const fn initial() -> Self {
        Self(0)
    }

    /// The generation following this one
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Raw counter value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

/// Kinds of scheduled work a session can own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// 2 Hz quality polling timer
    QualityLoop,
    /// In-flight frame-quality call
    QualityCheck,
    /// 1 Hz capture countdown
    Countdown,
    /// Automatic return to capturing after a failure
    Retry,
}

impl TaskKind {
    /// Task name for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::QualityLoop => "quality_loop",
            TaskKind::QualityCheck => "quality_check",
            TaskKind::Countdown => "countdown",
            TaskKind::Retry => "retry",
        }
    }
}

/// One cancelable slot per [`TaskKind`]
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<TaskKind, JoinHandle<()>>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `future` into the `kind` slot, cancelling whatever was there
    pub fn spawn<F>(&mut self, kind: TaskKind, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel(kind);
        trace!(task = kind.as_str(), "spawning task");
        self.tasks.insert(kind, tokio::spawn(future));
    }

    /// Cancel the task in `kind`'s slot. Safe to call on an empty slot.
    pub fn cancel(&mut self, kind: TaskKind) -> bool {
        match self.tasks.remove(&kind) {
            Some(handle) => {
                let was_running = !handle.is_finished();
                handle.abort();
                if was_running {
                    trace!(task = kind.as_str(), "cancelled task");
                }
                was_running
            }
            None => false,
        }
    }

    /// Cancel every registered task
    pub fn cancel_all(&mut self) {
        let kinds: Vec<TaskKind> = self.tasks.keys().copied().collect();
        for kind in kinds {
            self.cancel(kind);
        }
    }

    /// Whether a task of this kind is registered and still running
    pub fn is_active(&self, kind: TaskKind) -> bool {
        self.tasks
            .get(&kind)
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Number of running tasks
    pub fn active_count(&self) -> usize {
        self.tasks.values().filter(|h| !h.is_finished()).count()
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}
