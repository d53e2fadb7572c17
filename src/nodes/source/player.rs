//! Fully-buffered stem player.

use dasp_graph::{Buffer, Input};

use super::{SourceMessage, Transport};
use crate::node::{AudioNode, ProcessContext};

/// Plays pre-decoded audio samples.
///
/// The whole file lives in memory as interleaved f32 samples. Playback rate
/// (pitch) and the conversion from the file's sample rate to the graph's rate
/// are folded into one fractional read step with linear interpolation, so the
/// player can sit directly in the output graph.
///
/// A new player is stopped; send [`SourceMessage::Start`] or
/// [`SourceMessage::StartAt`] to begin.
pub struct SamplePlayer {
    samples: Vec<f32>,
    channels: usize,
    sample_rate: u32,
    out_channels: usize,
    /// Read position in source frames
    cursor: f64,
    transport: Transport,
}

impl SamplePlayer {
    /// Create a player from interleaved audio samples.
    ///
    /// - `samples` - Interleaved audio data (L, R, L, R, ... for stereo)
    /// - `channels` - Number of channels in the audio data
    /// - `sample_rate` - Sample rate of the audio data in Hz
    pub fn new(samples: Vec<f32>, channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        Self {
            samples,
            channels,
            sample_rate,
            out_channels: channels,
            cursor: 0.0,
            transport: Transport::default(),
        }
    }

    /// Number of channels to render (builder pattern).
    ///
    /// Mono sources are copied to every output channel; wider sources wrap.
    pub fn with_output_channels(mut self, channels: usize) -> Self {
        self.out_channels = channels.max(1);
        self
    }

    /// Enable or disable looping.
    pub fn set_looping(&mut self, looping: bool) {
        self.transport.looping = looping;
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
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    #[inline]
    pub fn position_secs(&self) -> f64 {
        self.cursor / self.sample_rate as f64
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.transport.playing
    }

    #[inline]
    fn sample(&self, frame: usize, channel: usize) -> f32 {
        self.samples[frame * self.channels + channel % self.channels]
    }
}

impl AudioNode for SamplePlayer {
    type Message = SourceMessage;

    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = SourceMessage>,
        _inputs: &[Input],
        outputs: &mut [Buffer],
    ) {
        let frames = self.frames();
        for msg in messages {
            if let Some(target) = self.transport.apply(msg) {
                self.cursor = (target as f64).min(frames as f64);
            }
        }

        if outputs.is_empty() {
            return;
        }

        let buffer_len = outputs[0].len();
        let out_channels = outputs.len();
        let step = self.transport.step(self.sample_rate, ctx.sample_rate);

        for i in 0..buffer_len {
            if frames == 0 || !self.transport.audible_at(ctx.frame + i as u64) {
                outputs.iter_mut().for_each(|b| b[i] = 0.0);
                continue;
            }

            if self.cursor >= frames as f64 {
                if self.transport.looping {
                    self.cursor %= frames as f64;
                } else {
                    for buffer in outputs.iter_mut() {
                        buffer[i..].iter_mut().for_each(|s| *s = 0.0);
                    }
                    self.transport.playing = false;
                    return;
                }
            }

            let i0 = self.cursor as usize;
            let frac = (self.cursor - i0 as f64) as f32;
            let i1 = if i0 + 1 < frames {
                i0 + 1
            } else if self.transport.looping {
                0
            } else {
                i0
            };

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

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(frame: u64) -> ProcessContext {
        ProcessContext { sample_rate: 48000, buffer_size: 64, frame }
    }

    fn render(player: &mut SamplePlayer, frame: u64, msgs: Vec<SourceMessage>) -> Vec<Buffer> {
        let mut out = vec![Buffer::default(), Buffer::default()];
        player.process(&ctx(frame), msgs.into_iter(), &[], &mut out);
        out
    }

    fn ramp(frames: usize) -> SamplePlayer {
        let samples = (0..frames).map(|i| i as f32 / frames as f32).collect();
        SamplePlayer::new(samples, 1, 48000).with_output_channels(2)
    }

    #[test]
    fn stopped_player_is_silent() {
        let mut p = ramp(256);
        let out = render(&mut p, 0, vec![]);
        assert!(out.iter().all(|b| b.iter().all(|s| *s == 0.0)));
    }

    #[test]
    fn scheduled_start_is_sample_accurate() {
        let mut p = ramp(256);
        let out = render(&mut p, 0, vec![SourceMessage::SetVolume(1.0), SourceMessage::StartAt(10)]);
        assert!(out[0][..10].iter().all(|s| *s == 0.0));
        // first audible sample is source frame 0, the next one frame 1
        assert_eq!(out[0][10], 0.0);
        assert!((out[0][11] - 1.0 / 256.0).abs() < 1e-6);
        assert_eq!(out[0][11], out[1][11]);
    }

    #[test]
    fn double_pitch_skips_every_other_frame() {
        let mut p = ramp(256);
        let out = render(&mut p, 0, vec![SourceMessage::SetPitch(2.0), SourceMessage::Start]);
        assert!((out[0][3] - 6.0 / 256.0).abs() < 1e-6);
    }

    #[test]
    fn looping_wraps_and_one_shot_stops() {
        let mut p = ramp(48);
        p.set_looping(true);
        let out = render(&mut p, 0, vec![SourceMessage::Start]);
        assert!((out[0][50] - 2.0 / 48.0).abs() < 1e-6);

        let mut q = ramp(48);
        let out = render(&mut q, 0, vec![SourceMessage::Start]);
        assert!(out[0][48..].iter().all(|s| *s == 0.0));
        assert!(!q.is_playing());
    }

    #[test]
    fn seek_moves_read_position() {
        let mut p = ramp(256);
        let out = render(&mut p, 0, vec![SourceMessage::Seek(128), SourceMessage::Start]);
        assert!((out[0][0] - 0.5).abs() < 1e-6);
    }
}
