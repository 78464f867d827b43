//! Upload orchestrator: drives one attempt through its states.
//!
//! Validates the request, opens the backend session, transfers the bytes,
//! finalizes the resource, and reports state changes, progress and retries
//! on an event channel.

use std::sync::{Arc, Mutex, PoisonError};

use coachlib_protocol::messages::UploadedResource;
use coachlib_transfer::{
    AttemptState, FileSource, StateSnapshot, TransferError, UploadStatus, validate_metadata,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backend::UploadBackend;
use crate::completion::{CompletionNotifier, PendingFinalize};
use crate::error::UploadError;
use crate::planner::UploadPlanner;
use crate::retry::{RetryEvent, RetryStep};
use crate::scheduler::ChunkScheduler;
use crate::transporter::Transporter;
use crate::types::{
    UploadConfig, UploadEvent, UploadFailure, UploadObserver, UploadOutcome, UploadRequest,
};

/// Smallest change in displayed progress worth an event.
const PROGRESS_STEP: f64 = 0.1;

/// Runs one upload attempt.
///
/// An orchestrator is good for a single [`run`](Self::run); a new attempt
/// needs a new orchestrator.
pub struct UploadOrchestrator {
    backend: Arc<dyn UploadBackend>,
    transporter: Arc<dyn Transporter>,
    config: UploadConfig,
    state: Arc<AttemptState>,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
}

impl UploadOrchestrator {
    pub fn new(
        backend: Arc<dyn UploadBackend>,
        transporter: Arc<dyn Transporter>,
        config: UploadConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            backend,
            transporter,
            config,
            state: Arc::new(AttemptState::new()),
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    ///
    /// Events are dropped rather than awaited when the receiver falls
    /// behind.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Returns the cancellation token for this attempt.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.snapshot()
    }

    /// Runs the attempt to a terminal state.
    pub async fn run(&self, request: UploadRequest) -> UploadOutcome {
        let sink = Arc::new(EventSink::new(self.events_tx.clone(), self.state.clone()));

        let result = match self.drive(&request, &sink).await {
            Ok(resource) => self
                .transition(&sink, UploadStatus::Succeeded)
                .map(|()| resource),
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(resource) => {
                info!(
                    url = %resource.url,
                    elapsed_ms = self.elapsed_ms(),
                    "upload succeeded"
                );
                UploadOutcome::Succeeded(resource)
            }
            Err(e) if e.is_cancelled() || self.cancel.is_cancelled() => {
                self.state.cancel();
                sink.emit(UploadEvent::StateChanged(self.state.status()));
                info!(elapsed_ms = self.elapsed_ms(), "upload cancelled");
                UploadOutcome::Cancelled
            }
            Err(e) => {
                let failure = UploadFailure {
                    error: e,
                    retries: self.state.retry_count(),
                };
                let message = failure.to_string();
                if let Err(state_err) = self.state.fail(&message) {
                    warn!(error = %state_err, "attempt already finished");
                }
                sink.emit(UploadEvent::StateChanged(self.state.status()));
                error!(error = %message, "upload failed");
                UploadOutcome::Failed(failure)
            }
        };

        sink.emit(UploadEvent::Finished(outcome.summary()));
        outcome
    }

    /// Resubmits the finalize call of a failed attempt. No bytes are
    /// transferred and the attempt's state is left as it is.
    pub async fn retry_finalize(
        &self,
        pending: PendingFinalize,
    ) -> Result<UploadedResource, UploadError> {
        let notifier = CompletionNotifier::new(&*self.backend, self.config.retry, None);
        notifier.retry_finalize(pending, &self.cancel).await
    }

    async fn drive(
        &self,
        request: &UploadRequest,
        sink: &Arc<EventSink>,
    ) -> Result<UploadedResource, UploadError> {
        validate_metadata(
            request.file.is_some(),
            &request.metadata.title,
            &request.metadata.description,
        )?;
        let Some(path) = request.file.as_deref() else {
            return Err(TransferError::MissingFields(vec!["File selection"]).into());
        };
        let source = FileSource::open(path, request.mime_type.as_deref()).await?;

        self.transition(sink, UploadStatus::Initiating)?;
        let planner = UploadPlanner::new(
            &*self.backend,
            self.config.retry,
            Some(&**sink as &dyn UploadObserver),
        );
        let session = planner
            .plan(&source, request.category, &self.cancel)
            .await?;

        self.transition(sink, UploadStatus::Transferring)?;
        let observer: Arc<dyn UploadObserver> = sink.clone();
        let scheduler = ChunkScheduler::new(
            &*self.backend,
            &*self.transporter,
            self.config.retry,
            self.config.scheduler,
            self.config.timeouts,
            observer,
        );
        let parts = scheduler.run(&session, &source, &self.cancel).await?;

        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        self.transition(sink, UploadStatus::Completing)?;
        let pending = PendingFinalize::prepare(&session, parts, &request.metadata)?;
        let notifier = CompletionNotifier::new(
            &*self.backend,
            self.config.retry,
            Some(&**sink as &dyn UploadObserver),
        );
        notifier.finalize(pending, &self.cancel).await
    }

    fn transition(&self, sink: &EventSink, next: UploadStatus) -> Result<(), UploadError> {
        self.state.advance(next)?;
        debug!(status = %next, "upload state changed");
        sink.emit(UploadEvent::StateChanged(next));
        Ok(())
    }

    fn elapsed_ms(&self) -> u64 {
        self.state.elapsed().map(|d| d.as_millis() as u64).unwrap_or(0)
    }
}

/// Turns engine notifications into [`UploadEvent`]s and keeps the attempt
/// state current.
struct EventSink {
    tx: mpsc::Sender<UploadEvent>,
    state: Arc<AttemptState>,
    last_progress: Mutex<Option<f64>>,
}

impl EventSink {
    fn new(tx: mpsc::Sender<UploadEvent>, state: Arc<AttemptState>) -> Self {
        Self {
            tx,
            state,
            last_progress: Mutex::new(None),
        }
    }

    fn emit(&self, event: UploadEvent) {
        if let Err(mpsc::error::TrySendError::Full(event)) = self.tx.try_send(event) {
            debug!(?event, "event receiver lagging; event dropped");
        }
    }
}

impl UploadObserver for EventSink {
    fn on_retry(&self, event: &RetryEvent) {
        let count = self.state.record_retry();
        info!(
            step = %event.step,
            attempt = event.attempt,
            max_retries = event.max_retries,
            retries_so_far = count,
            "retrying {}/{}",
            event.attempt,
            event.max_retries
        );
        self.emit(UploadEvent::Retrying {
            step: event.step,
            attempt: event.attempt,
            max_retries: event.max_retries,
            delay: event.delay,
        });
    }

    fn on_progress(&self, percent: f64) {
        self.state.set_progress(percent);
        let changed = {
            let mut last = self
                .last_progress
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let changed = match *last {
                None => true,
                Some(prev) if percent >= 100.0 => prev < 100.0,
                Some(prev) => (percent - prev).abs() >= PROGRESS_STEP,
            };
            if changed {
                *last = Some(percent);
            }
            changed
        };
        if changed {
            self.emit(UploadEvent::Progress { percent });
        }
    }

    fn on_retry_resumed(&self, step: RetryStep) {
        self.state.retry_resumed();
        debug!(step = %step, "retry attempt started");
    }

    fn on_part_completed(&self, part_number: u32) {
        self.emit(UploadEvent::PartCompleted { part_number });
    }
}
