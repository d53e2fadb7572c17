//! CPAL audio output sink

use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfig};
use dasp_graph::{Buffer, Input};
use rtrb::{Consumer, RingBuffer};

use super::{OutputSink, RtrbSink, SinkStats};
use crate::error::{AudioError, AudioResult};
use crate::graph::BLOCK_SIZE;
use crate::mixer::LOOKAHEAD_BLOCKS;
use crate::node::{AudioNode, ProcessContext};

/// Seconds of audio the ring buffer holds at least
const MIN_BUFFER_SECS: f32 = 0.1;

/// A sink that outputs audio to a CPAL device
///
/// Rendered blocks go into a ring buffer that the device callback drains on
/// its own thread. That callback is the realtime side of the mixer: the graph
/// itself is rendered ahead of it by whoever calls
/// [`GraphMixer::pump`](crate::mixer::GraphMixer::pump).
///
/// Both sides count into one [`SinkStats`], which the mixer exposes through
/// [`GraphMixer::output_stats`](crate::mixer::GraphMixer::output_stats).
pub struct CpalSink {
    writer: RtrbSink,
}

impl CpalSink {
    /// Open a stream on `device` and return the sink feeding it.
    ///
    /// Blocks until the stream thread reports that the stream is playing.
    pub fn new(device: &cpal::Device, config: &SupportedStreamConfig) -> AudioResult<Self> {
        let channels = config.channels() as usize;
        let sample_format = config.sample_format();
        let stream_config = config.config();
        let sample_rate = stream_config.sample_rate.0;

        // room for the mixer's lookahead several times over, plus scheduling jitter
        let lookahead = 4 * LOOKAHEAD_BLOCKS as usize * BLOCK_SIZE * channels;
        let jitter = (sample_rate as f32 * MIN_BUFFER_SECS) as usize * channels;
        let buffer_size = lookahead.max(jitter).next_power_of_two();
        let (producer, consumer) = RingBuffer::<f32>::new(buffer_size);

        let stats = Arc::new(SinkStats::default());
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        // cpal::Stream is not Send, so it lives and dies on its own thread
        let device = device.clone();
        let stream_stats = stats.clone();
        std::thread::spawn(move || {
            let stream = match build_stream(&device, sample_format, &stream_config, consumer, stream_stats) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(e.to_string()));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            loop {
                std::thread::park();
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => return Err(AudioError::Stream(reason)),
            Err(_) => return Err(AudioError::Stream("stream thread exited".into())),
        }

        tracing::info!(sample_rate, channels, buffer_size, ?sample_format, "cpal output stream started");

        Ok(Self {
            writer: RtrbSink::with_stats(producer, channels, stats),
        })
    }
}

/// Pop one sample per slot, playing silence once the buffer runs dry
fn fill<T>(data: &mut [T], consumer: &mut Consumer<f32>, channels: usize, stats: &SinkStats, convert: impl Fn(f32) -> T) {
    let mut underrun = false;
    for sample in data.iter_mut() {
        let s = consumer.pop().unwrap_or_else(|_| {
            underrun = true;
            0.0
        });
        *sample = convert(s);
    }
    if underrun {
        stats.underruns.fetch_add(1, Ordering::Relaxed);
    }
    stats.frames_played.fetch_add((data.len() / channels.max(1)) as u64, Ordering::Relaxed);
}

fn build_stream(
    device: &cpal::Device,
    sample_format: SampleFormat,
    stream_config: &cpal::StreamConfig,
    mut consumer: Consumer<f32>,
    stats: Arc<SinkStats>,
) -> Result<cpal::Stream, String> {
    let channels = stream_config.channels as usize;
    let on_error = |err: cpal::StreamError| tracing::warn!("cpal stream error: {:?}", err);
    let stream = match sample_format {
        SampleFormat::F32 => device.build_output_stream(
            stream_config,
            move |data: &mut [f32], _| fill(data, &mut consumer, channels, &stats, |s| s),
            on_error,
            None,
        ),
        SampleFormat::I16 => device.build_output_stream(
            stream_config,
            move |data: &mut [i16], _| {
                fill(data, &mut consumer, channels, &stats, |s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            },
            on_error,
            None,
        ),
        SampleFormat::U16 => device.build_output_stream(
            stream_config,
            move |data: &mut [u16], _| {
                fill(data, &mut consumer, channels, &stats, |s| {
                    ((s.clamp(-1.0, 1.0) + 1.0) * 0.5 * u16::MAX as f32) as u16
                })
            },
            on_error,
            None,
        ),
        other => return Err(format!("unsupported sample format: {:?}", other)),
    };
    stream.map_err(|e| e.to_string())
}

impl AudioNode for CpalSink {
    type Message = ();

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        inputs: &[Input],
        _outputs: &mut [Buffer],
    ) {
        if let Some(input) = inputs.first() {
            self.writer.push_block(input.buffers());
        }
    }

    #[inline]
    fn num_inputs(&self) -> usize { 1 }

    #[inline]
    fn num_outputs(&self) -> usize { 0 }
}

impl OutputSink for CpalSink {
    fn stats(&self) -> Arc<SinkStats> {
        self.writer.stats()
    }
}
