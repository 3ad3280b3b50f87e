//! Flush coroutine state machine and control handle
//!
//! The original stack-switching control flow is modeled as an explicit
//! suspend/resume state machine: a coroutine is a tokio task parked on a
//! resume gate, and every suspension point is an `await` on that gate.
//! Switching happens only at those points; resumption is always
//! scheduler-driven.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use contracts::FlushOutcome;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use crate::metrics::DestinationMetrics;
use crate::protocol::CompletionEvent;

/// Lifecycle of one flush coroutine.
///
/// Created -> Running -> Suspended (0..n times) -> Running -> Reported.
/// The terminal Destroyed state is the removal of the arena record itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CoroState {
    /// Exists but has never been resumed
    Created = 0,
    /// Callback is executing
    Running = 1,
    /// Parked on an I/O wait, resumable by the scheduler
    Suspended = 2,
    /// Outcome reported, waiting for the scheduler to consume and destroy
    Reported = 3,
}

impl CoroState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Suspended,
            _ => Self::Reported,
        }
    }
}

/// State shared between the engine's arena record and the coroutine task.
#[derive(Debug)]
pub(crate) struct CoroShared {
    state: AtomicU8,
    resume: Notify,
}

impl CoroShared {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(CoroState::Created as u8),
            resume: Notify::new(),
        }
    }

    pub(crate) fn state(&self) -> CoroState {
        CoroState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: CoroState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Signal the resume gate. A permit is stored if the task has not
    /// parked yet, so a resume racing ahead of the suspension is not lost.
    pub(crate) fn resume(&self) {
        self.resume.notify_one();
    }

    pub(crate) async fn wait_resume(&self) {
        self.resume.notified().await;
    }
}

/// Handle given to a destination callback for its suspension points and its
/// single outcome report.
///
/// Captured at creation time and owned by the coroutine alone; nothing is
/// staged in thread-local or process-wide slots.
pub struct FlushControl {
    task_id: u16,
    coroutine_id: u8,
    destination: String,
    records: u64,
    bytes: u64,
    shared: Arc<CoroShared>,
    notify_tx: mpsc::Sender<u64>,
    metrics: Arc<DestinationMetrics>,
    reported: AtomicBool,
}

impl FlushControl {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        task_id: u16,
        coroutine_id: u8,
        destination: String,
        records: u64,
        bytes: u64,
        shared: Arc<CoroShared>,
        notify_tx: mpsc::Sender<u64>,
        metrics: Arc<DestinationMetrics>,
    ) -> Self {
        Self {
            task_id,
            coroutine_id,
            destination,
            records,
            bytes,
            shared,
            notify_tx,
            metrics,
            reported: AtomicBool::new(false),
        }
    }

    /// Park until the scheduler observes I/O readiness and resumes this
    /// coroutine.
    pub async fn suspend(&self) {
        self.shared.set_state(CoroState::Suspended);
        self.shared.wait_resume().await;
        self.shared.set_state(CoroState::Running);
    }

    /// Report the outcome of this flush to the scheduler.
    ///
    /// Packs the completion word and writes it to the destination's
    /// notification channel without blocking. A failed write is logged and
    /// the event dropped: a lost completion stalls this one flush's
    /// bookkeeping instead of blocking the engine. A second report is
    /// ignored.
    pub fn report(&self, outcome: FlushOutcome) {
        if self.reported.swap(true, Ordering::SeqCst) {
            warn!(
                destination = %self.destination,
                task_id = self.task_id,
                coroutine_id = self.coroutine_id,
                "duplicate outcome report ignored"
            );
            return;
        }

        self.shared.set_state(CoroState::Reported);

        let word = CompletionEvent::new(self.task_id, self.coroutine_id, outcome).encode();
        if let Err(e) = self.notify_tx.try_send(word) {
            self.metrics.inc_dropped_event();
            metrics::counter!(
                "delivery_completion_dropped_total",
                "destination" => self.destination.clone()
            )
            .increment(1);
            warn!(
                destination = %self.destination,
                task_id = self.task_id,
                coroutine_id = self.coroutine_id,
                error = %e,
                "completion notification dropped"
            );
        }

        match outcome {
            FlushOutcome::Ok => {
                self.metrics.add_ok(self.records, self.bytes);
                metrics::counter!(
                    "delivery_ok_records_total",
                    "destination" => self.destination.clone()
                )
                .increment(self.records);
                metrics::counter!(
                    "delivery_ok_bytes_total",
                    "destination" => self.destination.clone()
                )
                .increment(self.bytes);
            }
            FlushOutcome::Error => {
                self.metrics.inc_error();
                metrics::counter!(
                    "delivery_error_total",
                    "destination" => self.destination.clone()
                )
                .increment(1);
            }
            // Retry accounting lives in the scheduler, which also decides
            // whether a retry is re-scheduled or abandoned.
            FlushOutcome::Retry => {}
        }

        debug!(
            destination = %self.destination,
            task_id = self.task_id,
            coroutine_id = self.coroutine_id,
            outcome = %outcome,
            "flush outcome reported"
        );
    }
}
