//! FlushEngine - one coroutine per in-flight destination flush
//!
//! The engine owns an arena of coroutine records indexed by integer key;
//! the per-destination active-flush registry and each task's collection
//! hold key sets into it. All engine state is mutated only through
//! `&mut self` methods invoked from the owning scheduler context, so no
//! locking happens inside one engine instance. Coroutine tasks communicate
//! inward only through their captured context and outward only through the
//! notification channel.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use contracts::{Batch, BatchMeta, EncodedBatch, EngineConfig};
use document::{DocumentBuilder, Evaluation, PatternSet};
use slab::Slab;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::coroutine::{CoroShared, CoroState, FlushControl};
use crate::destination::{Destination, DestinationHandle, DestinationId, FlushRequest};
use crate::error::DispatchError;
use crate::metrics::{DestinationMetrics, MetricsSnapshot};
use crate::protocol::CompletionEvent;

/// One batch delivery: a set of flush coroutines over one shared buffer.
#[derive(Debug)]
struct FlushTask {
    meta: BatchMeta,
    /// Arena keys of owned coroutines
    coroutines: Vec<usize>,
    /// Coroutines not yet destroyed
    outstanding: usize,
    /// One past the highest assigned coroutine id; u16 so exhaustion of the
    /// 8-bit id space is detectable instead of silently wrapping
    next_coroutine_id: u16,
}

/// Arena record for one in-flight flush coroutine.
///
/// The record outlives the callback: it is released only by `destroy`,
/// after the scheduler has consumed the reported outcome.
struct CoroRecord {
    task_id: u16,
    coroutine_id: u8,
    destination: DestinationId,
    shared: Arc<CoroShared>,
    join: JoinHandle<()>,
    consumed: bool,
}

/// The flush coroutine engine.
pub struct FlushEngine {
    config: EngineConfig,
    destinations: Vec<DestinationHandle>,
    coroutines: Slab<CoroRecord>,
    tasks: HashMap<u16, FlushTask>,
    /// (task id, coroutine id) -> arena key
    lookup: HashMap<(u16, u8), usize>,
    next_task_id: u16,
}

impl FlushEngine {
    pub fn new(config: EngineConfig) -> Self {
        let coroutine_capacity = config.coroutine_capacity;
        Self {
            config,
            destinations: Vec::new(),
            coroutines: Slab::with_capacity(coroutine_capacity),
            tasks: HashMap::new(),
            lookup: HashMap::new(),
            next_task_id: 0,
        }
    }

    /// Register a destination and wire its notification channel.
    ///
    /// The returned receiver is the scheduler's end of the channel; words
    /// on it decode via [`FlushEngine::consume`]. Ordering is guaranteed
    /// only among writes from this one destination.
    pub fn register_destination(
        &mut self,
        destination: Arc<dyn Destination>,
    ) -> (DestinationId, mpsc::Receiver<u64>) {
        let (notify_tx, notify_rx) = mpsc::channel(self.config.notification_capacity);
        let id = DestinationId(self.destinations.len());
        let name = destination.name().to_string();
        self.destinations.push(DestinationHandle {
            name: name.clone(),
            destination,
            notify_tx,
            metrics: Arc::new(DestinationMetrics::new()),
            active: Default::default(),
        });
        info!(destination = %name, id = id.0, "destination registered");
        (id, notify_rx)
    }

    /// Encode a batch into one shared buffer, pruning each record when a
    /// pattern set is supplied. Records the patterns leave untouched are
    /// serialized as-is; pruned ones are spliced in from the rebuilt
    /// buffer.
    fn encode_batch(&self, batch: &Batch, prune: Option<&PatternSet>) -> EncodedBatch {
        let mut builder = DocumentBuilder::with_capacity(256);
        for record in &batch.records {
            match prune.map(|set| set.evaluate(record)) {
                Some(Evaluation::Pruned(buf)) => builder.write_raw(&buf),
                _ => builder.write_value(record),
            }
        }
        EncodedBatch::new(&batch.tag, batch.records.len(), Bytes::from(builder.into_bytes()))
    }

    /// Dispatch one batch to a set of destinations.
    ///
    /// Creates the flush task and one coroutine per destination. No
    /// coroutine runs until the scheduler resumes it.
    pub fn dispatch(
        &mut self,
        batch: &Batch,
        destinations: &[DestinationId],
        prune: Option<&PatternSet>,
    ) -> Result<u16, DispatchError> {
        for dest in destinations {
            if dest.0 >= self.destinations.len() {
                return Err(DispatchError::UnknownDestination { id: dest.0 });
            }
        }

        let encoded = self.encode_batch(batch, prune);
        let task_id = self.allocate_task_id()?;
        self.tasks.insert(
            task_id,
            FlushTask {
                meta: encoded.meta.clone(),
                coroutines: Vec::with_capacity(destinations.len()),
                outstanding: 0,
                next_coroutine_id: 0,
            },
        );

        for dest in destinations {
            self.create_flush(task_id, *dest, &encoded)?;
        }

        debug!(
            task_id,
            records = encoded.meta.records,
            bytes = encoded.meta.bytes,
            destinations = destinations.len(),
            "batch dispatched"
        );
        Ok(task_id)
    }

    /// Allocate a task id not held by any live task.
    ///
    /// The counter wraps, so after 65536 dispatches an id comes around again
    /// while its previous task may still be in flight; handing it out twice
    /// would replace the live task's bookkeeping and orphan its arena
    /// records. Skip occupied ids instead.
    fn allocate_task_id(&mut self) -> Result<u16, DispatchError> {
        for _ in 0..=u16::MAX {
            let id = self.next_task_id;
            self.next_task_id = self.next_task_id.wrapping_add(1);
            if !self.tasks.contains_key(&id) {
                return Ok(id);
            }
        }
        Err(DispatchError::exhausted("all task ids are in flight"))
    }

    /// Create one flush coroutine under `task_id` for `dest`.
    ///
    /// Allocates the arena record, registers it in the destination's
    /// active-flush set and the task's collection, and spawns the callback
    /// task parked on its resume gate with an explicit context captured at
    /// creation time.
    fn create_flush(
        &mut self,
        task_id: u16,
        dest: DestinationId,
        encoded: &EncodedBatch,
    ) -> Result<u8, DispatchError> {
        let handle = self
            .destinations
            .get(dest.0)
            .ok_or(DispatchError::UnknownDestination { id: dest.0 })?;
        let destination = Arc::clone(&handle.destination);
        let dest_name = handle.name.clone();
        let notify_tx = handle.notify_tx.clone();
        let dest_metrics = Arc::clone(&handle.metrics);

        let task = self
            .tasks
            .get_mut(&task_id)
            .ok_or(DispatchError::UnknownCoroutine {
                task_id,
                coroutine_id: 0,
            })?;
        let coroutine_id = u8::try_from(task.next_coroutine_id)
            .map_err(|_| DispatchError::exhausted(format!("task {task_id} coroutine ids")))?;
        task.next_coroutine_id += 1;

        let shared = Arc::new(CoroShared::new());
        let control = FlushControl::new(
            task_id,
            coroutine_id,
            dest_name.clone(),
            encoded.meta.records as u64,
            encoded.meta.bytes as u64,
            Arc::clone(&shared),
            notify_tx,
            dest_metrics,
        );

        let gate = Arc::clone(&shared);
        let buffer = encoded.buffer.clone();
        let meta = encoded.meta.clone();
        let join = tokio::spawn(async move {
            // Parked until the scheduler's first explicit resume.
            gate.wait_resume().await;
            gate.set_state(CoroState::Running);
            let req = FlushRequest {
                buffer: &buffer,
                tag: &meta.tag,
                meta: &meta,
            };
            destination.flush(req, &control).await;
            // Terminal yield: the arena record stays registered until the
            // scheduler consumes the outcome and destroys the coroutine.
        });

        let key = self.coroutines.insert(CoroRecord {
            task_id,
            coroutine_id,
            destination: dest,
            shared,
            join,
            consumed: false,
        });
        task.coroutines.push(key);
        task.outstanding += 1;
        self.destinations[dest.0].active.insert(key);
        self.lookup.insert((task_id, coroutine_id), key);

        trace!(
            destination = %dest_name,
            task_id,
            coroutine_id,
            "flush coroutine created"
        );
        Ok(coroutine_id)
    }

    /// Resume a coroutine: first run after creation, or wake from an I/O
    /// suspension.
    pub fn resume(&mut self, task_id: u16, coroutine_id: u8) -> Result<(), DispatchError> {
        let key = self.key_of(task_id, coroutine_id)?;
        let record = &self.coroutines[key];
        // A resume while Running would bank a permit and void the callback's
        // next suspension; only parked coroutines are resumable.
        match record.shared.state() {
            CoroState::Created | CoroState::Suspended => {}
            state => {
                return Err(DispatchError::invalid_state(
                    task_id,
                    coroutine_id,
                    format!("not resumable from state {state:?}"),
                ));
            }
        }
        record.shared.resume();
        trace!(task_id, coroutine_id, "coroutine resumed");
        Ok(())
    }

    /// Decode a completion word read off a notification channel and mark
    /// the coroutine's outcome as consumed.
    pub fn consume(&mut self, word: u64) -> Result<CompletionEvent, DispatchError> {
        let event = CompletionEvent::decode(word)?;
        let key = self.key_of(event.task_id, event.coroutine_id)?;
        self.coroutines[key].consumed = true;
        debug!(
            task_id = event.task_id,
            coroutine_id = event.coroutine_id,
            outcome = %event.outcome,
            "completion consumed"
        );
        Ok(event)
    }

    /// Destroy a coroutine whose outcome has been consumed.
    ///
    /// Unregisters it from the destination registry and its task, releases
    /// the arena record, and removes the task once its last coroutine is
    /// gone.
    pub fn destroy(&mut self, task_id: u16, coroutine_id: u8) -> Result<(), DispatchError> {
        let key = self.key_of(task_id, coroutine_id)?;
        if !self.coroutines[key].consumed {
            return Err(DispatchError::invalid_state(
                task_id,
                coroutine_id,
                "outcome not consumed yet",
            ));
        }

        self.lookup.remove(&(task_id, coroutine_id));
        let record = self.coroutines.remove(key);
        self.destinations[record.destination.0].active.remove(&key);

        if let Some(task) = self.tasks.get_mut(&task_id) {
            task.coroutines.retain(|k| *k != key);
            task.outstanding -= 1;
            if task.outstanding == 0 {
                let task = self.tasks.remove(&task_id);
                debug!(
                    task_id,
                    records = task.map(|t| t.meta.records).unwrap_or(0),
                    "flush task complete"
                );
            }
        }
        Ok(())
    }

    /// Tear down every in-flight coroutine without waiting for outcomes.
    ///
    /// Only bookkeeping is unlinked; resources a callback opened (sockets,
    /// file handles) are not released here.
    pub fn shutdown(&mut self) {
        let in_flight = self.coroutines.len();
        for record in self.coroutines.drain() {
            if record.shared.state() != CoroState::Reported {
                warn!(
                    task_id = record.task_id,
                    coroutine_id = record.coroutine_id,
                    "destroying unreported flush coroutine at shutdown"
                );
            }
            record.join.abort();
        }
        for handle in &mut self.destinations {
            handle.active.clear();
        }
        self.tasks.clear();
        self.lookup.clear();
        info!(in_flight, "flush engine shut down");
    }

    /// Metrics handle for one destination.
    pub fn metrics(&self, dest: DestinationId) -> Option<Arc<DestinationMetrics>> {
        self.destinations.get(dest.0).map(|h| Arc::clone(&h.metrics))
    }

    /// Snapshot of every destination's counters.
    pub fn metrics_snapshot(&self) -> Vec<(String, MetricsSnapshot)> {
        self.destinations
            .iter()
            .map(|h| (h.name.clone(), h.metrics.snapshot()))
            .collect()
    }

    /// Current state of a coroutine, if it exists.
    pub fn coroutine_state(&self, task_id: u16, coroutine_id: u8) -> Option<CoroState> {
        let key = *self.lookup.get(&(task_id, coroutine_id))?;
        Some(self.coroutines[key].shared.state())
    }

    /// Number of in-flight coroutines registered for a destination.
    pub fn active_flush_count(&self, dest: DestinationId) -> usize {
        self.destinations
            .get(dest.0)
            .map(|h| h.active.len())
            .unwrap_or(0)
    }

    /// Coroutines a task is still waiting on.
    pub fn outstanding(&self, task_id: u16) -> Option<usize> {
        self.tasks.get(&task_id).map(|t| t.outstanding)
    }

    /// Live flush tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Live coroutines across all tasks.
    pub fn in_flight(&self) -> usize {
        self.coroutines.len()
    }

    fn key_of(&self, task_id: u16, coroutine_id: u8) -> Result<usize, DispatchError> {
        self.lookup
            .get(&(task_id, coroutine_id))
            .copied()
            .ok_or(DispatchError::UnknownCoroutine {
                task_id,
                coroutine_id,
            })
    }
}
