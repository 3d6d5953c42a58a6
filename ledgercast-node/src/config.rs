use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ledgercast_ledger::LedgerCredentials;

use crate::error::SessionError;

/// Session configuration, loaded from a JSON file.
///
/// Relative paths are resolved against the directory containing the
/// config file.
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct SessionConfig {
    /// Ledger JSON-RPC endpoint.
    pub rpc_url: String,
    /// Writer credential for the ledger endpoint.
    pub access_key: Option<String>,
    /// Stream identity chunks are published under.
    pub stream: String,
    /// Capture device passed to the encoder. When absent no encoder is
    /// spawned and the session only watches `chunks_dir` (bring your own
    /// segmenter).
    pub device: Option<String>,
    /// ffmpeg input format for the device, e.g. "v4l2" or "dshow".
    pub input_format: Option<String>,
    pub ffmpeg_path: Option<PathBuf>,
    /// Staging directory for segment files. Exclusively owned by the
    /// session while it runs.
    pub chunks_dir: Option<PathBuf>,
    pub segment_secs: Option<u64>,
    pub video_bitrate_kbps: Option<u32>,
    /// Delay between sequencer queue passes, in milliseconds.
    pub pass_delay_ms: Option<u64>,
    /// Watcher scan interval, in milliseconds.
    pub scan_interval_ms: Option<u64>,
    /// Viewer poll interval, in milliseconds.
    pub poll_interval_ms: Option<u64>,
    /// Viewer catch-up window, in chunks behind the tip.
    pub lookback: Option<u64>,
    pub log_level: Option<String>,
}

impl SessionConfig {
    pub fn from_filepath(path: &Path) -> Result<Self, SessionError> {
        let file = fs::File::open(path)
            .map_err(|e| SessionError::Config(format!("cannot open {}: {}", path.display(), e)))?;
        let mut config: SessionConfig = serde_json::from_reader(file)
            .map_err(|e| SessionError::Config(format!("cannot parse {}: {}", path.display(), e)))?;

        let config_dir = path.parent().unwrap_or_else(|| Path::new("."));
        if let Some(chunks_dir) = config.chunks_dir.take() {
            config.chunks_dir = Some(to_absolute_path(config_dir, &chunks_dir));
        }
        if let Some(ffmpeg_path) = config.ffmpeg_path.take() {
            config.ffmpeg_path = Some(to_absolute_path(config_dir, &ffmpeg_path));
        }
        Ok(config)
    }

    pub fn credentials(&self) -> Result<LedgerCredentials, SessionError> {
        let access_key = self
            .access_key
            .clone()
            .ok_or_else(|| SessionError::Config("access_key is required".to_string()))?;
        if self.rpc_url.is_empty() {
            return Err(SessionError::Config("rpc_url is required".to_string()));
        }
        if self.stream.is_empty() {
            return Err(SessionError::Config("stream is required".to_string()));
        }
        Ok(LedgerCredentials {
            rpc_url: self.rpc_url.clone(),
            access_key,
            stream: self.stream.clone(),
        })
    }

    pub fn chunks_dir(&self) -> PathBuf {
        self.chunks_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("chunks"))
    }

    pub fn ffmpeg_path(&self) -> PathBuf {
        self.ffmpeg_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("ffmpeg"))
    }

    pub fn input_format(&self) -> String {
        self.input_format
            .clone()
            .unwrap_or_else(|| "v4l2".to_string())
    }

    pub fn segment_secs(&self) -> u64 {
        self.segment_secs.unwrap_or(1)
    }

    pub fn video_bitrate_kbps(&self) -> u32 {
        self.video_bitrate_kbps.unwrap_or(500)
    }

    pub fn pass_delay(&self) -> Duration {
        Duration::from_millis(self.pass_delay_ms.unwrap_or(100))
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.unwrap_or(250))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(1000))
    }

    pub fn lookback(&self) -> u64 {
        self.lookback.unwrap_or(10)
    }
}

fn to_absolute_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
