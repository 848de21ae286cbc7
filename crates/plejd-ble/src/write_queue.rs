//! Serialized outbound frame delivery
//!
//! Frames go out strictly one at a time in FIFO order. A write the node
//! reports as in progress is retried in place after a short backoff, so the
//! frames behind it never overtake it. Any other failure puts the frame back
//! at the head of the queue once and asks the supervisor to relink.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use plejd_core::OutboundFrame;
use tracing::{debug, warn};

use crate::config::LinkConfig;
use crate::error::TransportError;

/// How many times a frame is replayed after a hard write failure
pub const REPLAY_BUDGET: u8 = 1;

// ----------------------------------------------------------------------------
// Frame Sink
// ----------------------------------------------------------------------------

/// Destination for plaintext frames
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: &OutboundFrame) -> Result<(), TransportError>;
}

// ----------------------------------------------------------------------------
// Write Queue
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct PendingFrame {
    frame: OutboundFrame,
    replays_left: u8,
}

/// Result of one drain pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The queue ran empty after this many successful writes
    Drained(usize),
    /// A hard failure stopped the pass; the link must be re-established
    Relink {
        sent: usize,
        cause: TransportError,
        /// The failed frame, when its replay budget was already spent
        dropped: Option<OutboundFrame>,
    },
}

/// FIFO of frames awaiting delivery
#[derive(Debug)]
pub struct WriteQueue {
    pending: VecDeque<PendingFrame>,
    retry_delay: Duration,
    max_transient_retries: u32,
}

impl WriteQueue {
    pub fn new(retry_delay: Duration, max_transient_retries: u32) -> Self {
        Self {
            pending: VecDeque::new(),
            retry_delay,
            max_transient_retries,
        }
    }

    pub fn from_config(config: &LinkConfig) -> Self {
        Self::new(config.write_retry_delay(), config.max_transient_retries)
    }

    pub fn enqueue(&mut self, frame: OutboundFrame) {
        self.pending.push_back(PendingFrame {
            frame,
            replays_left: REPLAY_BUDGET,
        });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Write queued frames to `sink` until the queue is empty or a hard
    /// failure occurs
    pub async fn drain<S: FrameSink + ?Sized>(&mut self, sink: &mut S) -> DrainOutcome {
        let mut sent = 0;
        let mut attempts = 0u32;

        while let Some(head) = self.pending.front() {
            let frame = head.frame.clone();
            match sink.send(&frame).await {
                Ok(()) => {
                    self.pending.pop_front();
                    sent += 1;
                    attempts = 0;
                }
                Err(err) if err.is_transient() && attempts < self.max_transient_retries => {
                    attempts += 1;
                    debug!(
                        "Write of {} in progress, retrying in {:?} ({}/{})",
                        frame, self.retry_delay, attempts, self.max_transient_retries
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(cause) => {
                    return DrainOutcome::Relink {
                        sent,
                        dropped: self.requeue_failed(),
                        cause,
                    };
                }
            }
        }

        DrainOutcome::Drained(sent)
    }

    fn requeue_failed(&mut self) -> Option<OutboundFrame> {
        let mut failed = self.pending.pop_front()?;
        if failed.replays_left > 0 {
            failed.replays_left -= 1;
            self.pending.push_front(failed);
            None
        } else {
            warn!("Dropping frame {} after exhausting its replay", failed.frame);
            Some(failed.frame)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plejd_core::{encode, MeshCommand};

    /// Sink that replays a script of results, then succeeds
    struct ScriptedSink {
        script: VecDeque<Result<(), TransportError>>,
        written: Vec<Vec<u8>>,
    }

    impl ScriptedSink {
        fn new(script: Vec<Result<(), TransportError>>) -> Self {
            Self {
                script: script.into(),
                written: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl FrameSink for ScriptedSink {
        async fn send(&mut self, frame: &OutboundFrame) -> Result<(), TransportError> {
            let result = self.script.pop_front().unwrap_or(Ok(()));
            if result.is_ok() {
                self.written.push(frame.as_bytes().to_vec());
            }
            result
        }
    }

    fn frame(device: u8) -> OutboundFrame {
        encode(&MeshCommand::TurnOff { device })
    }

    fn queue() -> WriteQueue {
        WriteQueue::new(Duration::from_millis(1000), 10)
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_retry_preserves_order() {
        let mut queue = queue();
        for device in [1, 2, 3] {
            queue.enqueue(frame(device));
        }
        let mut sink = ScriptedSink::new(vec![Ok(()), Err(TransportError::InProgress)]);

        assert_eq!(queue.drain(&mut sink).await, DrainOutcome::Drained(3));
        let devices: Vec<u8> = sink.written.iter().map(|f| f[0]).collect();
        assert_eq!(devices, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_retry_waits_backoff() {
        let mut queue = queue();
        queue.enqueue(frame(1));
        let mut sink = ScriptedSink::new(vec![Err(TransportError::InProgress)]);

        let started = tokio::time::Instant::now();
        queue.drain(&mut sink).await;
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hard_failure_requeues_once() {
        let mut queue = queue();
        queue.enqueue(frame(1));
        queue.enqueue(frame(2));
        let io = TransportError::Io("Not connected".into());

        let mut sink = ScriptedSink::new(vec![Err(io.clone())]);
        let outcome = queue.drain(&mut sink).await;
        assert_eq!(
            outcome,
            DrainOutcome::Relink {
                sent: 0,
                cause: io.clone(),
                dropped: None
            }
        );
        assert_eq!(queue.len(), 2);

        let mut sink = ScriptedSink::new(vec![Err(io.clone())]);
        let outcome = queue.drain(&mut sink).await;
        assert_eq!(
            outcome,
            DrainOutcome::Relink {
                sent: 0,
                cause: io,
                dropped: Some(frame(1))
            }
        );
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_transient_retries_escalate() {
        let mut queue = WriteQueue::new(Duration::from_millis(10), 2);
        queue.enqueue(frame(1));
        let mut sink = ScriptedSink::new(vec![Err(TransportError::InProgress); 3]);

        match queue.drain(&mut sink).await {
            DrainOutcome::Relink { cause, dropped, .. } => {
                assert_eq!(cause, TransportError::InProgress);
                assert!(dropped.is_none());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(queue.len(), 1);
    }
}
