//! Streaming Ogg Vorbis stem player.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use dasp_graph::{Buffer, Input};
use lewton::inside_ogg::OggStreamReader;

use super::{SourceMessage, Transport};
use crate::error::AudioError;
use crate::node::{AudioNode, ProcessContext};

/// Decodes an Ogg Vorbis file packet by packet while it plays.
///
/// Only a few packets of decoded audio are held at a time. Looping seeks the
/// reader back to granule 0 when the stream ends, so the loop point is seamless.
/// Decoding happens inside `process`, on whichever thread renders the graph.
pub struct OggStream {
    reader: OggStreamReader<BufReader<File>>,
    channels: usize,
    sample_rate: u32,
    out_channels: usize,
    /// Decoded interleaved frames not yet fully consumed
    queue: VecDeque<f32>,
    /// Fractional read position relative to the front of `queue`, in frames
    cursor: f64,
    ended: bool,
    transport: Transport,
}

impl OggStream {
    /// Open a file for streaming playback.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AudioError> {
        let path = path.as_ref();
        let decode_err = |reason: String| AudioError::Decode {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|e| decode_err(e.to_string()))?;
        let reader = OggStreamReader::new(BufReader::new(file)).map_err(|e| decode_err(format!("{:?}", e)))?;
        let channels = (reader.ident_hdr.audio_channels as usize).max(1);
        let sample_rate = reader.ident_hdr.audio_sample_rate;

        Ok(Self {
            reader,
            channels,
            sample_rate,
            out_channels: channels,
            queue: VecDeque::with_capacity(8192),
            cursor: 0.0,
            ended: false,
            transport: Transport::default(),
        })
    }

    /// Number of channels to render (builder pattern).
    pub fn with_output_channels(mut self, channels: usize) -> Self {
        self.out_channels = channels.max(1);
        self
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    fn queued_frames(&self) -> usize {
        self.queue.len() / self.channels
    }

    /// Decode until at least `frames` frames are queued or the stream ends
    fn fill(&mut self, frames: usize) {
        // an empty stream must not rewind forever
        let mut rewound = false;
        while self.queued_frames() < frames && !self.ended {
            match self.reader.read_dec_packet_itl() {
                Ok(Some(packet)) => {
                    rewound = false;
                    self.queue.extend(packet.into_iter().map(|s| s as f32 / 32768.0));
                }
                Ok(None) if self.transport.looping && !rewound => {
                    rewound = true;
                    if let Err(e) = self.reader.seek_absgp_pg(0) {
                        tracing::warn!("ogg stream: loop seek failed: {:?}", e);
                        self.ended = true;
                    }
                }
                Ok(None) => self.ended = true,
                Err(e) => {
                    tracing::warn!("ogg stream: decode error: {:?}", e);
                    self.ended = true;
                }
            }
        }
    }

    fn seek(&mut self, frame: u64) {
        self.queue.clear();
        self.cursor = 0.0;
        self.ended = false;
        if let Err(e) = self.reader.seek_absgp_pg(frame) {
            tracing::warn!("ogg stream: seek to {} failed: {:?}", frame, e);
            self.ended = true;
        }
    }

    /// Drop whole frames the cursor has moved past
    fn discard_consumed(&mut self) {
        let whole = (self.cursor as usize).min(self.queued_frames());
        if whole > 0 {
            self.queue.drain(..whole * self.channels);
            self.cursor -= whole as f64;
        }
    }

    #[inline]
    fn sample(&self, frame: usize, channel: usize) -> f32 {
        self.queue[frame * self.channels + channel % self.channels]
    }
}

impl AudioNode for OggStream {
    type Message = SourceMessage;

    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = SourceMessage>,
        _inputs: &[Input],
        outputs: &mut [Buffer],
    ) {
        for msg in messages {
            if let Some(target) = self.transport.apply(msg) {
                self.seek(target);
            }
        }

        if outputs.is_empty() {
            return;
        }

        let buffer_len = outputs[0].len();
        let out_channels = outputs.len();
        let step = self.transport.step(self.sample_rate, ctx.sample_rate);

        for i in 0..buffer_len {
            if !self.transport.audible_at(ctx.frame + i as u64) {
                outputs.iter_mut().for_each(|b| b[i] = 0.0);
                continue;
            }

            self.discard_consumed();
            self.fill(2);

            let queued = self.queued_frames();
            if queued == 0 {
                for buffer in outputs.iter_mut() {
                    buffer[i..].iter_mut().for_each(|s| *s = 0.0);
                }
                self.transport.playing = false;
                return;
            }

            let i0 = (self.cursor as usize).min(queued - 1);
            let i1 = (i0 + 1).min(queued - 1);
            let frac = (self.cursor - i0 as f64).clamp(0.0, 1.0) as f32;

            for (ch, buffer) in outputs.iter_mut().enumerate() {
                let a = self.sample(i0, ch);
                let b = self.sample(i1, ch);
                buffer[i] = (a + (b - a) * frac) * self.transport.channel_gain(ch, out_channels);
            }

            self.cursor += step;
        }
    }

    #[inline]
    fn num_inputs(&self) -> usize { 0 }

    #[inline]
    fn num_outputs(&self) -> usize {
        self.out_channels
    }
}
