//! Audio sink nodes (consume audio, no outputs)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::node::AudioNode;

mod rtrb_sink;
pub use rtrb_sink::RtrbSink;

#[cfg(feature = "cpal_sink")]
mod cpal_sink;
#[cfg(feature = "cpal_sink")]
pub use cpal_sink::CpalSink;

/// Counters kept by an output sink, readable from any thread.
///
/// The writing side (`frames_written`, `dropped_blocks`) is updated while the
/// graph renders. The device side (`frames_played`, `underruns`) only moves
/// when a device callback drains the sink, so it stays 0 for a bare
/// [`RtrbSink`].
#[derive(Debug, Default)]
pub struct SinkStats {
    frames_written: AtomicU64,
    dropped_blocks: AtomicU64,
    frames_played: AtomicU64,
    underruns: AtomicU64,
}

impl SinkStats {
    /// Frames the graph handed to the sink and that fit in its buffer
    pub fn frames_written(&self) -> u64 {
        self.frames_written.load(Ordering::Relaxed)
    }

    /// Blocks dropped because the sink's buffer was full
    pub fn dropped_blocks(&self) -> u64 {
        self.dropped_blocks.load(Ordering::Relaxed)
    }

    /// Frames the device has played so far
    pub fn frames_played(&self) -> u64 {
        self.frames_played.load(Ordering::Relaxed)
    }

    /// Device callbacks that ran out of rendered audio and played silence
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}

/// A node that can terminate the mixer graph.
///
/// See [`GraphMixer::with_output`](crate::mixer::GraphMixer::with_output).
pub trait OutputSink: AudioNode<Message = ()> {
    /// Handle to this sink's counters; stays valid after the sink moves into the graph
    fn stats(&self) -> Arc<SinkStats>;
}
