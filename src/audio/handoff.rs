// Bounded handoff between a device callback and the capture loop
//
// The callback side never blocks: chunks that do not fit are counted and
// dropped, and chunks produced while the reader is suspended are discarded.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::Duration;

use super::backend::SourceError;

enum Chunk {
    Data(Vec<u8>),
    Failed(String),
}

#[derive(Default)]
struct Gate {
    suspended: AtomicBool,
    dropped: AtomicU64,
}

/// Callback end of the handoff
#[derive(Clone)]
pub struct ChunkSender {
    tx: SyncSender<Chunk>,
    gate: Arc<Gate>,
}

/// Reader end of the handoff
pub struct ChunkReceiver {
    rx: Receiver<Chunk>,
    gate: Arc<Gate>,
    pending: VecDeque<u8>,
    failure: Option<String>,
}

/// Create a handoff holding at most `capacity` chunks
pub fn chunk_channel(capacity: usize) -> (ChunkSender, ChunkReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    let gate = Arc::new(Gate::default());
    (
        ChunkSender {
            tx,
            gate: Arc::clone(&gate),
        },
        ChunkReceiver {
            rx,
            gate,
            pending: VecDeque::new(),
            failure: None,
        },
    )
}

impl ChunkSender {
    /// Hand over captured bytes without blocking
    pub fn deliver(&self, bytes: Vec<u8>) {
        if self.gate.suspended.load(Ordering::SeqCst) {
            return;
        }
        if let Err(TrySendError::Full(_)) = self.tx.try_send(Chunk::Data(bytes)) {
            self.gate.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Report a device error to the reader
    pub fn fail(&self, message: String) {
        let _ = self.tx.try_send(Chunk::Failed(message));
    }
}

impl ChunkReceiver {
    /// Fill `buf` from queued chunks, waiting up to `timeout` for the first
    pub fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, SourceError> {
        if let Some(message) = self.failure.take() {
            return Err(SourceError::Device(message));
        }

        while self.pending.len() < buf.len() {
            let wait = if self.pending.is_empty() {
                timeout
            } else {
                Duration::ZERO
            };

            match self.rx.recv_timeout(wait) {
                Ok(Chunk::Data(bytes)) => self.pending.extend(bytes),
                Ok(Chunk::Failed(message)) => return Err(SourceError::Device(message)),
                Err(RecvTimeoutError::Timeout) if !self.pending.is_empty() => break,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(SourceError::Device("input device stalled".to_string()))
                }
                Err(RecvTimeoutError::Disconnected) if !self.pending.is_empty() => break,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(SourceError::Device("input stream closed".to_string()))
                }
            }
        }

        let n = self.pending.len().min(buf.len());
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    /// Stop accepting chunks, or resume with an empty queue
    pub fn suspend(&mut self, suspended: bool) {
        if suspended {
            self.gate.suspended.store(true, Ordering::SeqCst);
            self.pending.clear();
            return;
        }

        // Anything queued before the gate closed belongs to the paused span
        while let Ok(chunk) = self.rx.try_recv() {
            if let Chunk::Failed(message) = chunk {
                self.failure.get_or_insert(message);
            }
        }
        self.pending.clear();
        self.gate.suspended.store(false, Ordering::SeqCst);
    }

    /// Chunks discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.gate.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(20);

    #[test]
    fn test_full_queue_counts_dropped_chunks() {
        let (tx, mut rx) = chunk_channel(2);
        for i in 0..5u8 {
            tx.deliver(vec![i]);
        }
        assert_eq!(rx.dropped(), 3);

        let mut buf = [0u8; 8];
        assert_eq!(rx.read(&mut buf, WAIT).unwrap(), 2);
        assert_eq!(&buf[..2], &[0, 1]);
    }

    #[test]
    fn test_suspended_audio_never_reaches_reader() {
        let (tx, mut rx) = chunk_channel(8);
        tx.deliver(vec![1, 1]);

        rx.suspend(true);
        tx.deliver(vec![2, 2]);
        rx.suspend(false);
        tx.deliver(vec![3, 3]);

        let mut buf = [0u8; 8];
        let n = rx.read(&mut buf, WAIT).unwrap();
        assert_eq!(&buf[..n], &[3, 3]);
        assert_eq!(rx.dropped(), 0, "Suspended chunks are not counted as drops");
    }

    #[test]
    fn test_partial_read_keeps_remainder() {
        let (tx, mut rx) = chunk_channel(4);
        tx.deliver(vec![1, 2, 3, 4, 5]);

        let mut buf = [0u8; 3];
        assert_eq!(rx.read(&mut buf, WAIT).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(rx.read(&mut buf, WAIT).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
    }

    #[test]
    fn test_device_failure_survives_resume() {
        let (tx, mut rx) = chunk_channel(4);
        rx.suspend(true);
        tx.fail("unplugged".to_string());
        rx.suspend(false);

        let mut buf = [0u8; 4];
        assert!(matches!(
            rx.read(&mut buf, WAIT),
            Err(SourceError::Device(message)) if message == "unplugged"
        ));
    }

    #[test]
    fn test_stall_and_disconnect_are_device_errors() {
        let (tx, mut rx) = chunk_channel(4);
        let mut buf = [0u8; 4];
        assert!(matches!(rx.read(&mut buf, WAIT), Err(SourceError::Device(_))));

        drop(tx);
        assert!(matches!(rx.read(&mut buf, WAIT), Err(SourceError::Device(_))));
    }
}
