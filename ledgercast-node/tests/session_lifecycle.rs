use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;

use ledgercast_ledger::{ChunkRecord, CommitReceipt, LedgerClient, LedgerError, MemoryLedger};
use ledgercast_node::{SessionConfig, SessionError, SessionEvent, SessionManager};

fn test_config(chunks_dir: &Path) -> SessionConfig {
    SessionConfig {
        rpc_url: "memory".to_string(),
        access_key: Some("test".to_string()),
        stream: "TestStream".to_string(),
        chunks_dir: Some(chunks_dir.to_path_buf()),
        pass_delay_ms: Some(5),
        scan_interval_ms: Some(20),
        ..Default::default()
    }
}

async fn next_matching<F>(
    rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
    what: &str,
    matches: F,
) -> SessionEvent
where
    F: Fn(&SessionEvent) -> bool,
{
    let deadline = Duration::from_secs(5);
    let fut = async {
        loop {
            match rx.recv().await {
                Some(event) if matches(&event) => return event,
                Some(_) => continue,
                None => panic!("event channel closed while waiting for {}", what),
            }
        }
    };
    timeout(deadline, fut)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", what))
}

#[tokio::test]
async fn session_commits_chunks_dropped_into_the_staging_dir() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(MemoryLedger::new());
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let manager = SessionManager::new(ledger.clone(), events_tx);

    manager
        .start_session(&test_config(dir.path()))
        .await
        .unwrap();
    assert!(manager.is_active().await);

    let chunk = dir.path().join("chunk_000.mp4");
    std::fs::write(&chunk, vec![0xCD; 1200]).unwrap();

    next_matching(&mut events_rx, "chunk detection", |e| {
        matches!(e, SessionEvent::ChunkDetected(_))
    })
    .await;
    let committed = next_matching(&mut events_rx, "chunk commit", |e| {
        matches!(e, SessionEvent::ChunkCommitted { .. })
    })
    .await;

    match committed {
        SessionEvent::ChunkCommitted { index, size, .. } => {
            assert_eq!(index, 0);
            assert_eq!(size, 1200);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(!chunk.exists(), "committed chunk is removed from disk");
    assert_eq!(ledger.latest_index().await.unwrap(), 1);

    assert!(manager.stop_session().await);
    assert!(!manager.is_active().await);
}

#[tokio::test]
async fn starting_twice_is_rejected_until_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(MemoryLedger::new());
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let manager = SessionManager::new(ledger, events_tx);
    let config = test_config(dir.path());

    manager.start_session(&config).await.unwrap();
    assert!(matches!(
        manager.start_session(&config).await,
        Err(SessionError::AlreadyActive)
    ));

    assert!(manager.stop_session().await);
    // Sequential sessions are fine.
    manager.start_session(&config).await.unwrap();
    assert!(manager.stop_session().await);
}

#[tokio::test]
async fn stop_without_a_session_reports_nothing_to_do() {
    let ledger = Arc::new(MemoryLedger::new());
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let manager = SessionManager::new(ledger, events_tx);
    assert!(!manager.stop_session().await);
}

#[tokio::test]
async fn stale_chunks_are_cleared_and_not_replayed() {
    let dir = tempfile::tempdir().unwrap();
    let stale = dir.path().join("chunk_999.mp4");
    std::fs::write(&stale, vec![0u8; 400]).unwrap();

    let ledger = Arc::new(MemoryLedger::new());
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let manager = SessionManager::new(ledger.clone(), events_tx);

    manager
        .start_session(&test_config(dir.path()))
        .await
        .unwrap();
    assert!(!stale.exists(), "stale segment must be removed at startup");

    // Nothing from the previous run reaches the ledger.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(ledger.latest_index().await.unwrap(), 0);
    manager.stop_session().await;
}

#[tokio::test]
async fn failed_chunk_is_surfaced_and_retained() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(MemoryLedger::new());
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let manager = SessionManager::new(ledger.clone(), events_tx);

    manager
        .start_session(&test_config(dir.path()))
        .await
        .unwrap();

    let oversized = dir.path().join("chunk_000.mp4");
    std::fs::write(&oversized, vec![0u8; 300 * 1024]).unwrap();

    let failed = next_matching(&mut events_rx, "chunk failure", |e| {
        matches!(e, SessionEvent::ChunkFailed { .. })
    })
    .await;
    match failed {
        SessionEvent::ChunkFailed { filename, reason } => {
            assert_eq!(filename, "chunk_000.mp4");
            assert!(reason.contains("too large"), "reason was: {}", reason);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(oversized.exists(), "failed chunk stays on disk");
    assert_eq!(ledger.append_calls(), 0, "validation failures never reach the ledger");
    manager.stop_session().await;
}

struct UnreachableLedger;

#[async_trait]
impl LedgerClient for UnreachableLedger {
    async fn append(&self, _sequence: u64, _payload: &[u8]) -> Result<CommitReceipt, LedgerError> {
        Err(LedgerError::Transport("connection refused".to_string()))
    }
    async fn latest_index(&self) -> Result<u64, LedgerError> {
        Err(LedgerError::Transport("connection refused".to_string()))
    }
    async fn read_at(&self, _index: u64) -> Result<ChunkRecord, LedgerError> {
        Err(LedgerError::Transport("connection refused".to_string()))
    }
    async fn writer_sequence(&self) -> Result<u64, LedgerError> {
        Err(LedgerError::Transport("connection refused".to_string()))
    }
}

#[tokio::test]
async fn unreachable_ledger_blocks_session_start() {
    let dir = tempfile::tempdir().unwrap();
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let manager = SessionManager::new(Arc::new(UnreachableLedger), events_tx);

    let result = manager.start_session(&test_config(dir.path())).await;
    assert!(matches!(result, Err(SessionError::Connectivity(_))));
    assert!(!manager.is_active().await);
}
