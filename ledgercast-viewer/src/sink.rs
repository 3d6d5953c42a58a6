//! Playback sink boundary.
//!
//! The sink models a buffered media decoder: appends may be refused while
//! a previous append is still processing, and readiness is signalled
//! asynchronously.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Sink is busy")]
    Busy,

    #[error("Sink closed")]
    Closed,
}

#[async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Wait until the sink is ready to accept another payload.
    async fn ready(&self);

    /// Hand one payload to the sink. May fail with `Busy` if a previous
    /// append is still processing; the caller retries after `ready`.
    async fn append(&self, payload: Vec<u8>) -> Result<(), SinkError>;
}

/// Sink adapter backed by a bounded channel. The receiving half is the
/// decoder boundary; readiness means the channel has free capacity, so a
/// slow consumer backpressures the reader.
pub struct ChannelSink {
    tx: mpsc::Sender<Vec<u8>>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl PlaybackSink for ChannelSink {
    async fn ready(&self) {
        // A reservation proves free capacity; the slot itself is taken by
        // the append that follows. Returns immediately once the consumer
        // has drained room, or when the channel is closed (the append
        // will then surface `Closed`).
        if let Ok(permit) = self.tx.reserve().await {
            drop(permit);
        }
    }

    async fn append(&self, payload: Vec<u8>) -> Result<(), SinkError> {
        self.tx.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Busy,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_fails_busy_when_consumer_lags() {
        let (sink, mut rx) = ChannelSink::new(1);
        sink.append(vec![1]).await.unwrap();
        assert!(matches!(sink.append(vec![2]).await, Err(SinkError::Busy)));

        // Draining restores readiness.
        assert_eq!(rx.recv().await.unwrap(), vec![1]);
        sink.ready().await;
        sink.append(vec![2]).await.unwrap();
    }

    #[tokio::test]
    async fn append_fails_closed_when_consumer_is_gone() {
        let (sink, rx) = ChannelSink::new(1);
        drop(rx);
        sink.ready().await;
        assert!(matches!(sink.append(vec![1]).await, Err(SinkError::Closed)));
    }
}
