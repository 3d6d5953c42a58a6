use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use ledgercast_ledger::{LedgerClient, MemoryLedger};
use ledgercast_viewer::{PlaybackSink, ReaderConfig, ReaderEvent, SinkError, TailingReader};

/// Sink that is always ready and records everything it receives.
#[derive(Default)]
struct CollectSink {
    received: Mutex<Vec<Vec<u8>>>,
}

impl CollectSink {
    async fn payloads(&self) -> Vec<Vec<u8>> {
        self.received.lock().await.clone()
    }
}

#[async_trait]
impl PlaybackSink for CollectSink {
    async fn ready(&self) {}

    async fn append(&self, payload: Vec<u8>) -> Result<(), SinkError> {
        self.received.lock().await.push(payload);
        Ok(())
    }
}

/// Sink that refuses the first `n` appends, then behaves like CollectSink.
struct FlakySink {
    refusals_left: AtomicUsize,
    inner: CollectSink,
}

impl FlakySink {
    fn refusing(n: usize) -> Self {
        Self {
            refusals_left: AtomicUsize::new(n),
            inner: CollectSink::default(),
        }
    }
}

#[async_trait]
impl PlaybackSink for FlakySink {
    async fn ready(&self) {}

    async fn append(&self, payload: Vec<u8>) -> Result<(), SinkError> {
        let left = self.refusals_left.load(Ordering::SeqCst);
        if left > 0 {
            self.refusals_left.store(left - 1, Ordering::SeqCst);
            return Err(SinkError::Busy);
        }
        self.inner.append(payload).await
    }
}

fn chunk_payload(index: u64) -> Vec<u8> {
    format!("chunk-{}", index).into_bytes()
}

async fn ledger_with_chunks(n: u64) -> MemoryLedger {
    let ledger = MemoryLedger::new();
    for i in 0..n {
        ledger.append(i, &chunk_payload(i)).await.unwrap();
    }
    ledger
}

fn fast_config(lookback: u64) -> ReaderConfig {
    ReaderConfig {
        stream: "TestStream".to_string(),
        poll_interval: Duration::from_millis(10),
        lookback,
    }
}

async fn wait_for<F, Fut>(what: &str, predicate: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if predicate().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

#[tokio::test]
async fn catch_up_starts_a_lookback_window_behind_the_tip() {
    let ledger = Arc::new(ledger_with_chunks(50).await);
    let sink = Arc::new(CollectSink::default());
    let reader = TailingReader::new(ledger, sink.clone(), fast_config(10));

    assert!(reader.start());
    wait_for("cursor to reach the tip", || async {
        reader.cursor().await == Some(49)
    })
    .await;
    reader.stop();

    let payloads = sink.payloads().await;
    assert_eq!(payloads.len(), 10, "exactly the lookback window is replayed");
    assert_eq!(payloads[0], chunk_payload(40), "first read index is latest - lookback");
    assert_eq!(payloads[9], chunk_payload(49));
}

#[tokio::test]
async fn unreadable_index_is_skipped_permanently() {
    let ledger = Arc::new(ledger_with_chunks(15).await);
    // One failing cycle is enough: the cursor passes 12 and never returns.
    ledger.fail_reads_at(12, 1).await;

    let sink = Arc::new(CollectSink::default());
    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let reader =
        TailingReader::new(ledger, sink.clone(), fast_config(100)).with_events(events_tx);

    assert!(reader.start());
    wait_for("cursor to reach the tip", || async {
        reader.cursor().await == Some(14)
    })
    .await;
    reader.stop();

    let payloads = sink.payloads().await;
    assert_eq!(payloads.len(), 14, "all chunks but the skipped one arrive");
    assert!(payloads.contains(&chunk_payload(11)));
    assert!(payloads.contains(&chunk_payload(13)), "chunk after the gap still arrives");
    assert!(!payloads.contains(&chunk_payload(12)), "skipped chunk never reaches the sink");
    assert_eq!(reader.skipped().await, vec![12]);

    let mut saw_skip = false;
    while let Ok(event) = events_rx.try_recv() {
        if let ReaderEvent::Skipped { index, .. } = event {
            assert_eq!(index, 12);
            saw_skip = true;
        }
    }
    assert!(saw_skip, "skip must be surfaced as an event");
}

#[tokio::test]
async fn sink_refusal_retries_without_advancing_the_cursor() {
    let ledger = Arc::new(ledger_with_chunks(3).await);
    let sink = Arc::new(FlakySink::refusing(1));
    let reader = TailingReader::new(ledger, sink.clone(), fast_config(100));

    assert!(reader.start());
    wait_for("all chunks to be delivered", || async {
        reader.cursor().await == Some(2)
    })
    .await;
    reader.stop();

    // Nothing skipped, nothing lost, order preserved.
    assert!(reader.skipped().await.is_empty());
    let payloads = sink.inner.payloads().await;
    assert_eq!(
        payloads,
        vec![chunk_payload(0), chunk_payload(1), chunk_payload(2)]
    );
}

#[tokio::test]
async fn reader_tails_chunks_committed_after_start() {
    let ledger = Arc::new(MemoryLedger::new());
    let sink = Arc::new(CollectSink::default());
    let reader = TailingReader::new(ledger.clone(), sink.clone(), fast_config(10));

    assert!(reader.start());
    tokio::time::sleep(Duration::from_millis(30)).await;

    for i in 0..3 {
        ledger.append(i, &chunk_payload(i)).await.unwrap();
    }
    wait_for("late chunks to arrive", || async {
        sink.payloads().await.len() == 3
    })
    .await;
    reader.stop();

    assert_eq!(
        sink.payloads().await,
        vec![chunk_payload(0), chunk_payload(1), chunk_payload(2)]
    );
}

#[tokio::test]
async fn second_start_is_a_no_op_while_polling() {
    let ledger = Arc::new(ledger_with_chunks(5).await);
    let sink = Arc::new(CollectSink::default());
    let reader = TailingReader::new(ledger, sink.clone(), fast_config(100));

    assert!(reader.start());
    assert!(!reader.start(), "overlapping polling cycles must be refused");

    wait_for("chunks to arrive", || async {
        reader.cursor().await == Some(4)
    })
    .await;
    reader.stop();

    // A single polling loop delivered each chunk exactly once.
    assert_eq!(sink.payloads().await.len(), 5);
}

#[tokio::test]
async fn backpressured_channel_sink_drains_in_order() {
    use ledgercast_viewer::ChannelSink;

    let ledger = Arc::new(ledger_with_chunks(8).await);
    let (sink, mut rx) = ChannelSink::new(2);
    let reader = TailingReader::new(ledger, Arc::new(sink), fast_config(100));
    assert!(reader.start());

    // Consume slowly; the bounded channel backpressures the reader.
    let mut received = Vec::new();
    while received.len() < 8 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(payload)) => received.push(payload),
            _ => break,
        }
    }
    reader.stop();

    let expected: Vec<Vec<u8>> = (0..8).map(chunk_payload).collect();
    assert_eq!(received, expected);
}
