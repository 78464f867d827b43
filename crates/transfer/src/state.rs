use std::fmt;
use std::sync::{PoisonError, RwLock};
use std::time::Instant;

use crate::TransferError;

/// Lifecycle of one upload attempt.
///
/// Retrying is not a status of its own; it is a flag carried while
/// `Transferring` (or `Initiating`/`Completing`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadStatus {
    Idle,
    Initiating,
    Transferring,
    Completing,
    Succeeded,
    Failed,
    Cancelled,
}

impl UploadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Whether `self -> next` is a legal move.
    pub fn can_transition_to(self, next: UploadStatus) -> bool {
        use UploadStatus::*;
        match (self, next) {
            (Idle, Initiating)
            | (Initiating, Transferring)
            | (Transferring, Completing)
            | (Completing, Succeeded) => true,
            // Idle -> Failed covers metadata rejected before any request.
            (Idle | Initiating | Transferring | Completing, Failed) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initiating => "initiating",
            Self::Transferring => "transferring",
            Self::Completing => "completing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of an [`AttemptState`].
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub status: UploadStatus,
    pub overall_progress: f64,
    pub retry_count: u32,
    pub retrying: bool,
    pub last_error: Option<String>,
}

/// Mutable state of one upload attempt, shared between the driver and
/// observers.
#[derive(Debug)]
pub struct AttemptState {
    inner: RwLock<StateInner>,
}

#[derive(Debug)]
struct StateInner {
    status: UploadStatus,
    overall_progress: f64,
    retry_count: u32,
    /// Steps currently waiting out a backoff delay.
    backing_off: u32,
    last_error: Option<String>,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

impl Default for AttemptState {
    fn default() -> Self {
        Self::new()
    }
}

impl AttemptState {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StateInner {
                status: UploadStatus::Idle,
                overall_progress: 0.0,
                retry_count: 0,
                backing_off: 0,
                last_error: None,
                started_at: None,
                finished_at: None,
            }),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StateInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StateInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves to `next`, rejecting backward or out-of-order moves.
    pub fn advance(&self, next: UploadStatus) -> Result<(), TransferError> {
        let mut s = self.write();
        if !s.status.can_transition_to(next) {
            return Err(TransferError::InvalidTransition {
                from: s.status,
                to: next,
            });
        }
        let now = Instant::now();
        if s.status == UploadStatus::Idle {
            s.started_at = Some(now);
        }
        if next.is_terminal() {
            s.finished_at = Some(now);
            s.backing_off = 0;
        }
        if next == UploadStatus::Succeeded {
            s.overall_progress = 100.0;
        }
        s.status = next;
        Ok(())
    }

    /// Marks the attempt failed with `err`.
    pub fn fail(&self, err: &str) -> Result<(), TransferError> {
        self.advance(UploadStatus::Failed)?;
        self.write().last_error = Some(err.to_string());
        Ok(())
    }

    /// Marks the attempt cancelled. A no-op once terminal.
    pub fn cancel(&self) {
        let _ = self.advance(UploadStatus::Cancelled);
    }

    /// Records the displayed overall progress, clamped to `[0, 100]`.
    pub fn set_progress(&self, percent: f64) {
        let mut s = self.write();
        if !s.status.is_terminal() {
            s.overall_progress = percent.clamp(0.0, 100.0);
        }
    }

    /// Counts one retry and marks its step as backing off. Returns the new
    /// count.
    pub fn record_retry(&self) -> u32 {
        let mut s = self.write();
        s.retry_count += 1;
        s.backing_off += 1;
        s.retry_count
    }

    /// A step finished its backoff and started its next attempt.
    ///
    /// The retrying flag stays up while any other step is still waiting.
    pub fn retry_resumed(&self) {
        let mut s = self.write();
        s.backing_off = s.backing_off.saturating_sub(1);
    }

    pub fn status(&self) -> UploadStatus {
        self.read().status
    }

    pub fn retry_count(&self) -> u32 {
        self.read().retry_count
    }

    pub fn is_active(&self) -> bool {
        !self.read().status.is_terminal()
    }

    /// Time from leaving `Idle` until reaching a terminal state (or now).
    pub fn elapsed(&self) -> Option<std::time::Duration> {
        let s = self.read();
        let start = s.started_at?;
        Some(s.finished_at.unwrap_or_else(Instant::now) - start)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let s = self.read();
        StateSnapshot {
            status: s.status,
            overall_progress: s.overall_progress,
            retry_count: s.retry_count,
            retrying: s.backing_off > 0,
            last_error: s.last_error.clone(),
        }
    }
}
