//! Encoder subprocess management.
//!
//! The encoder is an external collaborator: ffmpeg capturing a device and
//! writing fragmented MP4 segments into the staging directory at a fixed
//! target duration. Its stderr is forwarded as session log events.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use crate::error::SessionError;
use crate::events::{EventSender, SessionEvent};

#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub ffmpeg_path: PathBuf,
    /// Capture input format, e.g. "v4l2" or "dshow".
    pub input_format: String,
    pub device: String,
    pub chunks_dir: PathBuf,
    pub segment_secs: u64,
    pub video_bitrate_kbps: u32,
}

/// ffmpeg arguments for low-latency segmented capture. Fragmented MP4
/// keeps each segment independently appendable at the playback sink.
pub fn ffmpeg_args(config: &EncoderConfig) -> Vec<String> {
    let bitrate = format!("{}k", config.video_bitrate_kbps);
    let bufsize = format!("{}k", config.video_bitrate_kbps * 2);
    vec![
        "-f".to_string(),
        config.input_format.clone(),
        "-rtbufsize".to_string(),
        "100M".to_string(),
        "-i".to_string(),
        config.device.clone(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "ultrafast".to_string(),
        "-tune".to_string(),
        "zerolatency".to_string(),
        "-profile:v".to_string(),
        "baseline".to_string(),
        "-level".to_string(),
        "3.0".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-b:v".to_string(),
        bitrate.clone(),
        "-maxrate".to_string(),
        bitrate,
        "-bufsize".to_string(),
        bufsize,
        "-g".to_string(),
        "30".to_string(),
        "-keyint_min".to_string(),
        "1".to_string(),
        "-sc_threshold".to_string(),
        "0".to_string(),
        "-flush_packets".to_string(),
        "1".to_string(),
        "-max_delay".to_string(),
        "0".to_string(),
        "-movflags".to_string(),
        "frag_keyframe+empty_moov+default_base_moof".to_string(),
        "-f".to_string(),
        "segment".to_string(),
        "-segment_time".to_string(),
        config.segment_secs.to_string(),
        "-reset_timestamps".to_string(),
        "1".to_string(),
        "-segment_format".to_string(),
        "mp4".to_string(),
        config
            .chunks_dir
            .join("chunk_%03d.mp4")
            .to_string_lossy()
            .to_string(),
    ]
}

/// A running encoder subprocess.
pub struct Encoder {
    child: Child,
}

impl Encoder {
    pub fn spawn(config: &EncoderConfig, events: EventSender) -> Result<Self, SessionError> {
        let args = ffmpeg_args(config);
        log::info!(
            "Spawning encoder: {} {}",
            config.ffmpeg_path.display(),
            args.join(" ")
        );

        let mut child = Command::new(&config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                SessionError::Encoder(format!(
                    "failed to spawn {}: {}",
                    config.ffmpeg_path.display(),
                    e
                ))
            })?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let _ = events.send(SessionEvent::Log(format!("ffmpeg: {}", line)));
                }
            });
        }

        Ok(Self { child })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the encoder to exit on its own.
    pub async fn wait(&mut self) -> std::io::Result<std::process::ExitStatus> {
        self.child.wait().await
    }

    /// Terminate the encoder and reap it.
    pub async fn stop(mut self) {
        if let Err(e) = self.child.start_kill() {
            log::warn!("Failed to signal encoder: {}", e);
        }
        match self.child.wait().await {
            Ok(status) => log::info!("Encoder stopped ({})", status),
            Err(e) => log::warn!("Failed to reap encoder: {}", e),
        }
    }
}
