//! # Integration Tests
//!
//! End-to-end tests over the public crate surfaces.
//!
//! Covers:
//! - Contract type snapshots
//! - Full delivery pipeline without real network destinations
//! - Scheduler-side metrics aggregation

#[cfg(test)]
mod contract_tests {
    use contracts::{EngineConfig, FlushOutcome, StructuredValue};

    #[test]
    fn test_contracts_compile() {
        let _ = StructuredValue::Nil;
        let _ = FlushOutcome::Ok;
        let config = EngineConfig::default();
        assert!(config.notification_capacity > 0);
    }

    #[test]
    fn test_outcome_codes_frozen() {
        // wire codes are a cross-process contract
        assert_eq!(FlushOutcome::Error.code(), 0);
        assert_eq!(FlushOutcome::Ok.code(), 1);
        assert_eq!(FlushOutcome::Retry.code(), 2);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use contracts::{Batch, EngineConfig, FlushOutcome, StructuredValue};
    use dispatch::{Destination, FlushControl, FlushEngine, FlushRequest};
    use document::PatternSet;
    use observability::DeliveryAggregator;

    /// Destination that captures every buffer it is asked to deliver.
    struct CapturingDestination {
        name: String,
        outcome: FlushOutcome,
        delivered: Mutex<Vec<Vec<u8>>>,
        flushes: AtomicU64,
    }

    impl CapturingDestination {
        fn new(name: &str, outcome: FlushOutcome) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                outcome,
                delivered: Mutex::new(Vec::new()),
                flushes: AtomicU64::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl Destination for CapturingDestination {
        fn name(&self) -> &str {
            &self.name
        }

        async fn flush(&self, req: FlushRequest<'_>, ctrl: &FlushControl) {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            // one suspension, as a network destination waiting on a socket
            ctrl.suspend().await;
            self.delivered.lock().unwrap().push(req.buffer.to_vec());
            ctrl.report(self.outcome);
        }
    }

    fn decode_records(buf: &[u8]) -> Vec<rmpv::Value> {
        let mut rd = buf;
        let mut records = Vec::new();
        while !rd.is_empty() {
            records.push(rmpv::decode::read_value(&mut rd).unwrap());
        }
        records
    }

    fn log_batch() -> Batch {
        Batch::new(
            "app.access",
            vec![
                StructuredValue::map(vec![
                    ("msg", StructuredValue::str("GET /")),
                    ("status", StructuredValue::Int(200)),
                    (
                        "auth",
                        StructuredValue::map(vec![("token", StructuredValue::str("s3cr3t"))]),
                    ),
                ]),
                StructuredValue::map(vec![
                    ("msg", StructuredValue::str("GET /health")),
                    ("status", StructuredValue::Int(204)),
                ]),
            ],
        )
    }

    /// Full pipeline: batch -> prune -> fan out to two destinations ->
    /// resume until both suspensions clear -> consume completions out of
    /// order -> destroy -> verify buffers and aggregated totals.
    #[tokio::test]
    async fn test_e2e_delivery_pipeline() {
        let mut engine = FlushEngine::new(EngineConfig::default());
        let ok_dest = CapturingDestination::new("stdout", FlushOutcome::Ok);
        let err_dest = CapturingDestination::new("http", FlushOutcome::Error);
        let (ok_id, mut ok_rx) = engine.register_destination(ok_dest.clone());
        let (err_id, mut err_rx) = engine.register_destination(err_dest.clone());

        let patterns = PatternSet::compile(&["auth.token"]).unwrap();
        let batch = log_batch();
        let task_id = engine
            .dispatch(&batch, &[ok_id, err_id], Some(&patterns))
            .unwrap();
        assert_eq!(engine.outstanding(task_id), Some(2));

        // first resume starts each coroutine; it parks once on its
        // simulated socket wait, so resume again after the state settles
        for coroutine_id in [0u8, 1u8] {
            engine.resume(task_id, coroutine_id).unwrap();
        }
        for coroutine_id in [0u8, 1u8] {
            loop {
                match engine.coroutine_state(task_id, coroutine_id) {
                    Some(dispatch::CoroState::Suspended) => break,
                    _ => tokio::time::sleep(tokio::time::Duration::from_millis(2)).await,
                }
            }
            engine.resume(task_id, coroutine_id).unwrap();
        }

        // consume in whatever order completions land
        let mut aggregator = DeliveryAggregator::new();
        let names = ["stdout", "http"];
        for word in [err_rx.recv().await.unwrap(), ok_rx.recv().await.unwrap()] {
            let event = engine.consume(word).unwrap();
            let name = names[event.coroutine_id as usize];
            aggregator.update(
                name,
                event.outcome,
                &contracts::BatchMeta {
                    tag: batch.tag.clone(),
                    records: batch.records.len(),
                    bytes: 0,
                },
            );
            engine.destroy(event.task_id, event.coroutine_id).unwrap();
        }
        assert_eq!(engine.task_count(), 0);
        assert_eq!(engine.in_flight(), 0);

        // both destinations saw the same pruned buffer
        let ok_buffers = ok_dest.delivered.lock().unwrap();
        let err_buffers = err_dest.delivered.lock().unwrap();
        assert_eq!(ok_buffers.len(), 1);
        assert_eq!(ok_buffers[0], err_buffers[0]);

        let records = decode_records(&ok_buffers[0]);
        assert_eq!(records.len(), 2);
        let first = records[0].as_map().unwrap();
        // auth survives but its token is gone
        let auth = &first
            .iter()
            .find(|(k, _)| k.as_str() == Some("auth"))
            .unwrap()
            .1;
        assert!(auth.as_map().unwrap().is_empty());
        assert!(first.iter().any(|(k, _)| k.as_str() == Some("msg")));

        // engine counters and scheduler-side aggregation agree
        let metrics = engine.metrics(ok_id).unwrap();
        assert_eq!(metrics.ok_records(), 2);
        assert_eq!(engine.metrics(err_id).unwrap().error_count(), 1);

        let summary = aggregator.summary();
        let output = format!("{summary}");
        assert!(output.contains("stdout: ok=1 (2 records"));
        assert!(output.contains("http: ok=0"));
    }

    /// Without a pattern set, records pass through byte-identical to a
    /// plain encoding.
    #[tokio::test]
    async fn test_e2e_no_prune_passthrough() {
        let mut engine = FlushEngine::new(EngineConfig::default());
        let dest = CapturingDestination::new("stdout", FlushOutcome::Ok);
        let (id, mut rx) = engine.register_destination(dest.clone());

        let batch = log_batch();
        let task_id = engine.dispatch(&batch, &[id], None).unwrap();
        engine.resume(task_id, 0).unwrap();
        loop {
            if engine.coroutine_state(task_id, 0) == Some(dispatch::CoroState::Suspended) {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(2)).await;
        }
        engine.resume(task_id, 0).unwrap();

        let word = rx.recv().await.unwrap();
        engine.consume(word).unwrap();
        engine.destroy(task_id, 0).unwrap();

        let buffers = dest.delivered.lock().unwrap();
        let records = decode_records(&buffers[0]);
        assert_eq!(records.len(), 2);
        let first = records[0].as_map().unwrap();
        assert_eq!(first.len(), 3);
        let auth = &first[2].1;
        assert_eq!(auth.as_map().unwrap().len(), 1);
    }

    /// Several independent batches in flight at once keep their tasks and
    /// coroutines separate.
    #[tokio::test]
    async fn test_e2e_concurrent_batches() {
        let mut engine = FlushEngine::new(EngineConfig::default());
        let dest = CapturingDestination::new("stdout", FlushOutcome::Ok);
        let (id, mut rx) = engine.register_destination(dest.clone());

        let mut task_ids = Vec::new();
        for _ in 0..4 {
            task_ids.push(engine.dispatch(&log_batch(), &[id], None).unwrap());
        }
        assert_eq!(engine.task_count(), 4);
        assert_eq!(engine.active_flush_count(id), 4);

        for task_id in &task_ids {
            engine.resume(*task_id, 0).unwrap();
        }
        for task_id in &task_ids {
            loop {
                if engine.coroutine_state(*task_id, 0) == Some(dispatch::CoroState::Suspended) {
                    break;
                }
                tokio::time::sleep(tokio::time::Duration::from_millis(2)).await;
            }
            engine.resume(*task_id, 0).unwrap();
        }

        for _ in 0..4 {
            let word = rx.recv().await.unwrap();
            let event = engine.consume(word).unwrap();
            engine.destroy(event.task_id, event.coroutine_id).unwrap();
        }

        assert_eq!(engine.task_count(), 0);
        assert_eq!(dest.flushes.load(Ordering::SeqCst), 4);
        assert_eq!(engine.metrics(id).unwrap().ok_records(), 8);
    }
}
