//! Ring buffer sink for headless rendering and capture

use std::sync::atomic::Ordering;
use std::sync::Arc;

use dasp_graph::{Buffer, Input};
use rtrb::Producer;

use super::{OutputSink, SinkStats};
use crate::node::{AudioNode, ProcessContext};

/// A sink that pushes interleaved audio into an rtrb ring buffer
///
/// Used as the output of a headless [`GraphMixer`](crate::mixer::GraphMixer):
/// tests read the consumer end to inspect exactly what the mixer rendered,
/// and an application can hand the consumer to its own output thread.
///
/// Blocks that do not fit are dropped whole and counted in its [`SinkStats`].
pub struct RtrbSink {
    producer: Producer<f32>,
    channels: usize,
    stats: Arc<SinkStats>,
}

impl RtrbSink {
    /// Create a sink that writes interleaved samples to the given producer
    pub fn new(producer: Producer<f32>, channels: usize) -> Self {
        Self::with_stats(producer, channels, Arc::default())
    }

    pub(crate) fn with_stats(producer: Producer<f32>, channels: usize, stats: Arc<SinkStats>) -> Self {
        Self {
            producer,
            channels: channels.max(1),
            stats,
        }
    }

    /// Create a sink for stereo audio
    pub fn stereo(producer: Producer<f32>) -> Self {
        Self::new(producer, 2)
    }

    /// Interleave one block (a buffer per channel) into the ring buffer
    pub(crate) fn push_block(&mut self, buffers: &[Buffer]) {
        if buffers.is_empty() {
            return;
        }

        let buffer_len = buffers[0].len();
        let channels = self.channels;
        let Ok(chunk) = self.producer.write_chunk_uninit(buffer_len * channels) else {
            let dropped = self.stats.dropped_blocks.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::trace!(dropped, "rtrb sink full, dropping block");
            return;
        };

        let interleaved = (0..buffer_len).flat_map(|i| {
            (0..channels).map(move |ch| buffers[ch.min(buffers.len() - 1)][i])
        });
        chunk.fill_from_iter(interleaved);
        self.stats.frames_written.fetch_add(buffer_len as u64, Ordering::Relaxed);
    }
}

impl OutputSink for RtrbSink {
    fn stats(&self) -> Arc<SinkStats> {
        self.stats.clone()
    }
}

impl AudioNode for RtrbSink {
    type Message = ();

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        inputs: &[Input],
        _outputs: &mut [Buffer],
    ) {
        if let Some(input) = inputs.first() {
            self.push_block(input.buffers());
        }
    }

    #[inline]
    fn num_inputs(&self) -> usize { 1 }

    #[inline]
    fn num_outputs(&self) -> usize { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtrb::RingBuffer;

    #[test]
    fn interleaves_and_upmixes_mono_input() {
        let (tx, mut rx) = RingBuffer::new(256);
        let mut sink = RtrbSink::stereo(tx);
        let mut mono = Buffer::default();
        for (i, s) in mono.iter_mut().enumerate() {
            *s = i as f32;
        }
        sink.push_block(std::slice::from_ref(&mono));

        assert_eq!(rx.slots(), 128);
        assert_eq!(sink.stats().frames_written(), 64);
        assert_eq!(rx.pop().unwrap(), 0.0);
        assert_eq!(rx.pop().unwrap(), 0.0);
        assert_eq!(rx.pop().unwrap(), 1.0);
        assert_eq!(rx.pop().unwrap(), 1.0);
    }

    #[test]
    fn full_buffer_drops_whole_block() {
        let (tx, rx) = RingBuffer::new(100);
        let mut sink = RtrbSink::stereo(tx);
        sink.push_block(&[Buffer::default(), Buffer::default()]);
        assert_eq!(rx.slots(), 0);
        assert_eq!(sink.stats().dropped_blocks(), 1);
        assert_eq!(sink.stats().frames_written(), 0);
    }
}
