//! Background decoding stream.
//!
//! A dedicated reader thread owns the byte source and runs the blocking
//! decode loop, pushing events into a bounded channel. Consumers poll or
//! block on their own schedule, so a UI or logger is never coupled to
//! serial arrival timing. The channel is bounded: when the consumer falls
//! behind, the reader thread blocks rather than dropping samples.

use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TryRecvError, sync_channel};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::Sample;
use crate::decoder::{DecodeError, DecodeEvent, DecoderCounters, FrameDecoder};
use crate::protocol::{ChecksumMode, FrameFault};
use crate::source::ByteSource;

const CHANNEL_CAPACITY: usize = 32;

/// Event delivered across the thread boundary.
///
/// `Finished` and `Failed` are terminal: the reader thread exits after
/// sending one of them, and subsequent receives observe a closed channel.
#[derive(Debug)]
pub enum StreamEvent {
    Sample(Sample),
    Discarded(FrameFault),
    Finished(DecoderCounters),
    Failed(DecodeError),
}

/// Handle to a background decode loop.
pub struct SampleStream {
    rx: Receiver<StreamEvent>,
    handle: Option<JoinHandle<()>>,
}

impl SampleStream {
    /// Move `source` onto a reader thread and start decoding.
    ///
    /// To stop a live stream early, keep the source's cancel token before
    /// spawning and cancel it; the thread then delivers its terminal event
    /// and exits.
    pub fn spawn<S>(source: S, checksum: ChecksumMode) -> Self
    where
        S: ByteSource + Send + 'static,
    {
        let (tx, rx) = sync_channel(CHANNEL_CAPACITY);
        let handle = std::thread::spawn(move || decode_loop(source, checksum, tx));
        Self {
            rx,
            handle: Some(handle),
        }
    }

    /// Block until the next event. `None` once the stream has ended and all
    /// events were consumed.
    pub fn recv(&self) -> Option<StreamEvent> {
        self.rx.recv().ok()
    }

    /// Non-blocking poll; `None` when nothing is pending right now or the
    /// stream has ended.
    pub fn try_recv(&self) -> Option<StreamEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Block up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<StreamEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Wait for the reader thread to exit. Call after the terminal event,
    /// or after cancelling the source; joining a live uncancelled stream
    /// blocks until its transport ends.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn decode_loop<S: ByteSource>(source: S, checksum: ChecksumMode, tx: SyncSender<StreamEvent>) {
    let mut decoder = FrameDecoder::with_checksum(source, checksum);
    loop {
        let event = match decoder.next_event() {
            Ok(DecodeEvent::Sample(sample)) => StreamEvent::Sample(sample),
            Ok(DecodeEvent::Discarded(fault)) => StreamEvent::Discarded(fault),
            Ok(DecodeEvent::Finished) => {
                let _ = tx.send(StreamEvent::Finished(decoder.counters()));
                return;
            }
            Err(err) => {
                let _ = tx.send(StreamEvent::Failed(err));
                return;
            }
        };
        if tx.send(event).is_err() {
            // Receiver dropped; nobody is listening anymore.
            return;
        }
    }
}
