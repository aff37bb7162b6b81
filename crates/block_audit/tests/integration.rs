//! Integration tests: both pipelines driven through an in-memory ledger.

use async_trait::async_trait;
use block_audit::chain::{BlockRecord, BlockSelector, BlockSource, ClientError};
use block_audit::fetch::{
    verify_artifact_checksum, ChecksumStatus, FetchConfig, FetchError, Fetcher, ProgressTracker,
};
use block_audit::verify::{
    ResultStore, VerificationEngine, VerificationProgress, VerificationSummary, VerifyError,
    FETCH_FAILED,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

fn load_fixture(path: &str) -> String {
    let full = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../testdata")
        .join(path);
    std::fs::read_to_string(&full).unwrap_or_else(|e| panic!("read {}: {}", full.display(), e))
}

fn fixture_blocks() -> Vec<Value> {
    let v: Value = serde_json::from_str(&load_fixture("blocks_1_3.json")).unwrap();
    v["blocks"].as_array().unwrap().clone()
}

#[derive(Default)]
struct MockLedger {
    blocks: HashMap<u64, Value>,
    missing: HashSet<u64>,
    /// Remaining failures before a block starts answering.
    flaky: Mutex<HashMap<u64, u32>>,
    calls: Mutex<Vec<u64>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockLedger {
    fn with_blocks(blocks: impl IntoIterator<Item = Value>) -> Self {
        let blocks = blocks
            .into_iter()
            .map(|b| (b["block_num"].as_u64().unwrap(), b))
            .collect();
        Self {
            blocks,
            ..Default::default()
        }
    }

    fn calls_for(&self, n: u64) -> usize {
        self.calls.lock().unwrap().iter().filter(|&&c| c == n).count()
    }
}

#[async_trait]
impl BlockSource for MockLedger {
    async fn fetch(&self, selector: BlockSelector) -> Result<BlockRecord, ClientError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        let n = match &selector {
            BlockSelector::Number(n) => *n,
            BlockSelector::Id(id) => self
                .blocks
                .iter()
                .find(|(_, b)| b["id"] == json!(id))
                .map(|(n, _)| *n)
                .ok_or_else(|| ClientError::unavailable(&selector, "unknown id"))?,
        };
        self.calls.lock().unwrap().push(n);
        if self.missing.contains(&n) {
            return Err(ClientError::unavailable(&selector, "status 500"));
        }
        {
            let mut flaky = self.flaky.lock().unwrap();
            if let Some(left) = flaky.get_mut(&n) {
                if *left > 0 {
                    *left -= 1;
                    return Err(ClientError::unavailable(&selector, "connection reset"));
                }
            }
        }
        let raw = self
            .blocks
            .get(&n)
            .cloned()
            .ok_or_else(|| ClientError::unavailable(&selector, "unknown block"))?;
        BlockRecord::from_value(raw).map_err(|e| ClientError::unavailable(&selector, e))
    }
}

fn fetch_config(dir: &Path) -> FetchConfig {
    FetchConfig {
        output_dir: dir.to_path_buf(),
        probe_block: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn fetch_range_saves_every_block_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = MockLedger::with_blocks(fixture_blocks());
    let tracker = Arc::new(ProgressTracker::new());
    let fetcher = Fetcher::new(fetch_config(dir.path()), Arc::clone(&tracker));

    let outcome = fetcher.run(&ledger, 1, 3).await.unwrap();
    assert_eq!(outcome.processed, 3);
    assert_eq!(outcome.total, 3);
    assert!(!outcome.retried);

    let artifact = outcome.artifact.unwrap();
    assert_eq!(artifact.path, dir.path().join("blocks_1_3.json"));
    let saved: Value = serde_json::from_slice(&std::fs::read(&artifact.path).unwrap()).unwrap();
    let numbers: Vec<u64> = saved["blocks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["block_num"].as_u64().unwrap())
        .collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(saved["blocks"][0]["ref_block_prefix"], json!(1000));
    assert_eq!(
        verify_artifact_checksum(&artifact.path).unwrap(),
        ChecksumStatus::Match
    );

    let p = tracker.snapshot();
    assert_eq!(p.processed_count, 3);
    assert_eq!(p.total_count, 3);
    assert!(!p.is_processing);
    assert!(!p.has_error);
    assert_eq!(p.current_block_number, None);
}

#[tokio::test(start_paused = true)]
async fn fetch_retries_with_capped_backoff() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = MockLedger::with_blocks(fixture_blocks());
    ledger.flaky.lock().unwrap().insert(2, 5);
    let tracker = Arc::new(ProgressTracker::new());
    let fetcher = Fetcher::new(fetch_config(dir.path()), Arc::clone(&tracker));

    let started = tokio::time::Instant::now();
    let outcome = fetcher.run(&ledger, 2, 3).await.unwrap();
    let waited = started.elapsed();

    // 500 + 1000 + 1500 + 2000 + 2000
    assert!(waited >= Duration::from_millis(7000), "{:?}", waited);
    assert!(waited < Duration::from_millis(8000), "{:?}", waited);
    assert_eq!(ledger.calls_for(2), 6);
    assert!(outcome.retried);
    assert_eq!(outcome.processed, 2);

    let p = tracker.snapshot();
    assert!(!p.has_error);
    assert!(!p.is_processing);
}

#[tokio::test]
async fn fetch_validation_failure_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = MockLedger::with_blocks(fixture_blocks());
    ledger.missing.insert(1);
    let tracker = Arc::new(ProgressTracker::new());
    let config = FetchConfig {
        output_dir: dir.path().join("out"),
        probe_block: 1,
        ..Default::default()
    };
    let fetcher = Fetcher::new(config, Arc::clone(&tracker));

    let err = fetcher.run(&ledger, 2, 3).await.unwrap_err();
    assert!(matches!(err, FetchError::Validation(_)));
    assert!(!dir.path().join("out").exists());
    assert_eq!(ledger.calls_for(2), 0);

    let p = tracker.snapshot();
    assert!(p.has_error);
    assert!(!p.is_processing);
    assert_eq!(p.current_block_number, None);
}

#[tokio::test(start_paused = true)]
async fn fetch_stops_when_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = MockLedger::with_blocks(fixture_blocks());
    ledger.missing.insert(2);
    let tracker = Arc::new(ProgressTracker::new());
    let fetcher = Fetcher::new(fetch_config(dir.path()), Arc::clone(&tracker));

    let cancel = fetcher.cancellation();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        cancel.cancel();
    });
    let err = fetcher.run(&ledger, 1, 3).await.unwrap_err();
    assert!(matches!(err, FetchError::Interrupted { block: 2 }));
    assert!(!dir.path().join("blocks_1_3.json").exists());

    let p = tracker.snapshot();
    assert_eq!(p.processed_count, 1);
    assert!(p.has_error);
    assert!(!p.is_processing);
    assert_eq!(p.current_block_number, None);
}

#[tokio::test]
async fn fetcher_runs_again_after_a_cancelled_run() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = MockLedger::with_blocks(fixture_blocks());
    let tracker = Arc::new(ProgressTracker::new());
    let fetcher = Fetcher::new(fetch_config(dir.path()), Arc::clone(&tracker));

    fetcher.cancellation().cancel();
    let err = fetcher.run(&ledger, 1, 2).await.unwrap_err();
    assert!(matches!(err, FetchError::Interrupted { block: 1 }));
    assert!(!fetcher.cancellation().is_cancelled());

    let outcome = fetcher.run(&ledger, 1, 2).await.unwrap();
    assert_eq!(outcome.processed, 2);
    assert!(outcome.artifact.is_some());
    let p = tracker.snapshot();
    assert!(!p.has_error);
    assert!(!p.is_processing);
}

#[tokio::test]
async fn fetch_rejects_bad_range() {
    let ledger = MockLedger::default();
    let fetcher = Fetcher::new(FetchConfig::default(), Arc::new(ProgressTracker::new()));
    assert!(matches!(
        fetcher.run(&ledger, 5, 4).await,
        Err(FetchError::InvalidRange { .. })
    ));
    assert!(matches!(
        fetcher.run(&ledger, 0, 4).await,
        Err(FetchError::InvalidRange { .. })
    ));
    assert!(ledger.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn verify_fixture_against_identical_chain() {
    let ledger = MockLedger::with_blocks(fixture_blocks());
    let store = ResultStore::new();
    let engine = VerificationEngine::new(Arc::clone(&store));

    let results = engine
        .run(&load_fixture("blocks_1_3.json"), &ledger)
        .await
        .unwrap();
    assert_eq!(results.len(), 3);
    for r in &results {
        assert!(r.is_clean(), "{:?}", r);
        assert_eq!(r.message, "verified");
        assert!(r.mismatch_fields.is_empty());
    }

    let p = store.progress();
    assert!(!p.is_verifying);
    assert_eq!(p.current_block_number, None);
    assert_eq!(p.verified_count, 3);
    assert_eq!(p.total_count, 3);
    assert_eq!(store.results(), results);
    assert!(VerificationSummary::from_results(&results).all_clean());
}

#[tokio::test]
async fn genesis_block_with_missing_block_zero() {
    let genesis = json!({"block_num": 1, "id": "A", "previous": "0".repeat(64)});
    let ledger = MockLedger::with_blocks([genesis.clone()]);
    let engine = VerificationEngine::new(ResultStore::new());

    let results = engine.run(&genesis.to_string(), &ledger).await.unwrap();
    let r = &results[0];
    assert!(r.is_local_continuous);
    assert!(r.is_chain_continuous);
    assert!(r.data_match);
    assert!(r.hash_match);
    assert_eq!(r.message, "verified");
    assert_eq!(ledger.calls_for(0), 1);
}

#[tokio::test]
async fn tampered_field_is_named() {
    let live = fixture_blocks();
    let mut local = live.clone();
    local[1]["producer"] = json!("mallory");
    let ledger = MockLedger::with_blocks(live);
    let engine = VerificationEngine::new(ResultStore::new());

    let results = engine
        .run(&Value::Array(local).to_string(), &ledger)
        .await
        .unwrap();
    let r = &results[1];
    assert!(!r.data_match);
    assert!(r.hash_match);
    assert_eq!(r.mismatch_fields, vec!["producer".to_string()]);
    assert_eq!(r.field_details[0].local, json!("mallory"));
    assert_eq!(r.field_details[0].chain, json!("eosio"));
    assert_eq!(r.message, "data mismatch, fields: producer");
    assert!(results[0].is_clean());
    assert!(results[2].is_clean());
}

#[tokio::test]
async fn differing_id_is_a_hash_mismatch_only() {
    let live = fixture_blocks();
    let mut local = live.clone();
    local[2]["id"] = json!("f".repeat(64));
    let ledger = MockLedger::with_blocks(live);
    let engine = VerificationEngine::new(ResultStore::new());

    let results = engine
        .run(&json!({ "blocks": local }).to_string(), &ledger)
        .await
        .unwrap();
    let r = &results[2];
    assert!(r.data_match);
    assert!(!r.hash_match);
    assert_eq!(r.local_hash, "f".repeat(64));
    assert_eq!(r.message, "hash mismatch");
    assert!(r.is_local_continuous);
    assert!(r.is_chain_continuous);
}

#[tokio::test]
async fn live_fetch_failure_does_not_abort_batch() {
    let mut ledger = MockLedger::with_blocks(fixture_blocks());
    ledger.missing.insert(2);
    let engine = VerificationEngine::new(ResultStore::new());

    let results = engine
        .run(&load_fixture("blocks_1_3.json"), &ledger)
        .await
        .unwrap();
    assert_eq!(results.len(), 3);

    let failed = &results[1];
    assert_eq!(failed.chain_hash, FETCH_FAILED);
    assert!(!failed.data_match);
    assert!(!failed.hash_match);
    assert!(!failed.is_chain_continuous);
    assert!(failed.is_local_continuous);
    assert!(failed.message.starts_with("verification failed"));

    // Block 3's live predecessor is the one that failed.
    assert!(!results[2].is_chain_continuous);
    assert!(results[2].data_match);

    let summary = VerificationSummary::from_results(&results);
    assert_eq!(summary.fetch_failures, 1);
    assert_eq!(summary.chain_breaks, 2);
    assert_eq!(summary.verified, 2);
    assert!(!summary.all_clean());
}

#[tokio::test]
async fn batch_not_starting_at_genesis() {
    let blocks: Vec<Value> = fixture_blocks().into_iter().skip(1).collect();
    let ledger = MockLedger::with_blocks(fixture_blocks());
    let engine = VerificationEngine::new(ResultStore::new());

    let results = engine
        .run(&Value::Array(blocks).to_string(), &ledger)
        .await
        .unwrap();
    assert!(!results[0].is_local_continuous);
    assert!(results[0].is_chain_continuous);
    assert!(results[1].is_local_continuous);
}

#[tokio::test]
async fn unsorted_batch_is_checked_positionally() {
    let mut blocks = fixture_blocks();
    blocks.swap(1, 2);
    let ledger = MockLedger::with_blocks(fixture_blocks());
    let engine = VerificationEngine::new(ResultStore::new());

    let results = engine
        .run(&Value::Array(blocks).to_string(), &ledger)
        .await
        .unwrap();
    let order: Vec<u64> = results.iter().map(|r| r.block_number).collect();
    assert_eq!(order, vec![1, 3, 2]);
    assert!(!results[1].is_local_continuous);
    assert!(!results[2].is_local_continuous);
    assert!(results.iter().all(|r| r.is_chain_continuous));
}

#[tokio::test]
async fn rerun_gives_identical_results() {
    let ledger = MockLedger::with_blocks(fixture_blocks());
    let engine = VerificationEngine::new(ResultStore::new());
    let content = load_fixture("blocks_1_3.json");

    let first = engine.run(&content, &ledger).await.unwrap();
    let second = engine.run(&content, &ledger).await.unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn bad_batch_leaves_no_results() {
    let ledger = MockLedger::with_blocks(fixture_blocks());
    let store = ResultStore::new();
    let engine = VerificationEngine::new(Arc::clone(&store));
    engine
        .run(&load_fixture("blocks_1_3.json"), &ledger)
        .await
        .unwrap();

    let err = engine.run(r#"{"foo": 1}"#, &ledger).await.unwrap_err();
    assert!(matches!(err, VerifyError::InvalidBatchFormat(_)));
    assert_eq!(store.progress(), VerificationProgress::default());
    assert!(store.results().is_empty());

    assert!(matches!(
        engine.run("[]", &ledger).await,
        Err(VerifyError::EmptyBatch)
    ));
    assert!(!store.is_verifying());
}

#[tokio::test]
async fn second_run_is_rejected_while_first_is_in_flight() {
    let gate = Arc::new(Semaphore::new(0));
    let ledger = Arc::new(MockLedger {
        gate: Some(Arc::clone(&gate)),
        ..MockLedger::with_blocks(fixture_blocks())
    });
    let store = ResultStore::new();
    let engine = VerificationEngine::new(Arc::clone(&store));
    let content = load_fixture("blocks_1_3.json");

    let handle = engine.start(content.clone(), Arc::clone(&ledger)).unwrap();
    // Block 1 and its (missing) predecessor.
    gate.add_permits(2);
    while store.progress().verified_count < 1 {
        tokio::task::yield_now().await;
    }

    assert!(matches!(
        engine.run(&content, ledger.as_ref()).await,
        Err(VerifyError::AlreadyRunning)
    ));
    assert!(matches!(
        engine.start(content.clone(), Arc::clone(&ledger)),
        Err(VerifyError::AlreadyRunning)
    ));
    let in_flight = store.progress();
    assert!(in_flight.is_verifying);
    assert_eq!(in_flight.verified_count, 1);
    assert_eq!(in_flight.current_block_number, Some(1));
    assert_eq!(store.results().len(), 1);

    gate.add_permits(100);
    let results = handle.await.unwrap().unwrap();
    assert_eq!(results.len(), 3);
    assert!(!store.is_verifying());
}
