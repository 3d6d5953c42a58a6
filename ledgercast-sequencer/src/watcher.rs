//! Polling watcher for the chunk staging directory.
//!
//! The encoder writes segment files incrementally, so a file that merely
//! exists is not safe to submit. A file is reported only once it has
//! settled: non-empty and the same size across two consecutive scans.
//! Paths are emitted in name order within a scan, which matches the
//! encoder's sequential segment numbering.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Directory to scan. Exclusively owned by the producing session.
    pub dir: PathBuf,
    /// File extension of chunk files, without the dot.
    pub extension: String,
    /// Interval between directory scans.
    pub scan_interval: Duration,
}

impl WatcherConfig {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            extension: "mp4".to_string(),
            scan_interval: Duration::from_millis(250),
        }
    }
}

/// Handle to a background directory watcher.
pub struct ChunkWatcher {
    cancel: CancellationToken,
}

impl ChunkWatcher {
    /// Start scanning. Settled chunk paths are sent to `tx` in detection
    /// order; the watcher stops when the receiver is dropped or `stop` is
    /// called.
    pub fn spawn(config: WatcherConfig, tx: mpsc::UnboundedSender<PathBuf>) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            watch_loop(config, tx, token).await;
        });
        Self { cancel }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ChunkWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn watch_loop(
    config: WatcherConfig,
    tx: mpsc::UnboundedSender<PathBuf>,
    cancel: CancellationToken,
) {
    log::info!(
        "Watching {} for new .{} chunks",
        config.dir.display(),
        config.extension
    );
    let mut sizes: HashMap<PathBuf, u64> = HashMap::new();
    let mut emitted: HashSet<PathBuf> = HashSet::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(config.scan_interval) => {}
        }

        let entries = match scan_dir(&config).await {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Chunk directory scan failed: {}", e);
                continue;
            }
        };

        let seen: HashSet<PathBuf> = entries.iter().map(|(p, _)| p.clone()).collect();
        let mut settled: Vec<PathBuf> = Vec::new();
        for (path, size) in entries {
            if emitted.contains(&path) {
                continue;
            }
            let previous = sizes.insert(path.clone(), size);
            if size > 0 && previous == Some(size) {
                settled.push(path);
            }
        }

        // Forget files that were consumed or removed so a reused name is
        // treated as a new chunk.
        sizes.retain(|path, _| seen.contains(path));
        emitted.retain(|path| seen.contains(path));

        settled.sort();
        for path in settled {
            emitted.insert(path.clone());
            log::debug!("Detected settled chunk {}", path.display());
            if tx.send(path).is_err() {
                log::debug!("Chunk receiver dropped, watcher exiting");
                return;
            }
        }
    }
    log::debug!("Chunk watcher stopped");
}

async fn scan_dir(config: &WatcherConfig) -> std::io::Result<Vec<(PathBuf, u64)>> {
    let mut entries = Vec::new();
    let mut rd = tokio::fs::read_dir(&config.dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(config.extension.as_str()) {
            continue;
        }
        let meta = entry.metadata().await?;
        if meta.is_file() {
            entries.push((path, meta.len()));
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn test_config(dir: PathBuf) -> WatcherConfig {
        WatcherConfig {
            dir,
            extension: "mp4".to_string(),
            scan_interval: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn settled_file_is_emitted_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunk_000.mp4");
        std::fs::write(&path, vec![1u8; 1000]).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = ChunkWatcher::spawn(test_config(dir.path().to_path_buf()), tx);

        let detected = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("watcher should emit the settled file")
            .unwrap();
        assert_eq!(detected, path);

        // No duplicate emission on later scans.
        let again = timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(again.is_err(), "file must not be emitted twice");
        watcher.stop();
    }

    #[tokio::test]
    async fn empty_file_is_not_emitted_until_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunk_000.mp4");
        std::fs::write(&path, b"").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = ChunkWatcher::spawn(test_config(dir.path().to_path_buf()), tx);

        let nothing = timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(nothing.is_err(), "empty file must not be emitted");

        std::fs::write(&path, vec![1u8; 500]).unwrap();
        let detected = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("watcher should emit once the file has content")
            .unwrap();
        assert_eq!(detected, path);
        watcher.stop();
    }

    #[tokio::test]
    async fn non_matching_extension_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"not a chunk").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = ChunkWatcher::spawn(test_config(dir.path().to_path_buf()), tx);

        let nothing = timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(nothing.is_err());
        watcher.stop();
    }

    #[tokio::test]
    async fn files_in_one_scan_are_emitted_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["chunk_002.mp4", "chunk_000.mp4", "chunk_001.mp4"] {
            std::fs::write(dir.path().join(name), vec![1u8; 100]).unwrap();
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = ChunkWatcher::spawn(test_config(dir.path().to_path_buf()), tx);

        let mut names = Vec::new();
        for _ in 0..3 {
            let path = timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("expected three detections")
                .unwrap();
            names.push(path.file_name().unwrap().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["chunk_000.mp4", "chunk_001.mp4", "chunk_002.mp4"]);
        watcher.stop();
    }
}
