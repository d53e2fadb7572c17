//! Low-pass / high-pass filter shared by every through-filter stem

use std::f64::consts::PI;

use dasp_graph::{Buffer, Input};
use serde::{Deserialize, Serialize};

use super::mixer::mix_into;
use crate::node::{AudioNode, ProcessContext};

/// Which half of the spectrum a [`Filter`] keeps
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    LowPass,
    HighPass,
}

/// Messages to control a [`Filter`]
#[derive(Clone, Copy, Debug)]
pub enum FilterMessage {
    /// Retune the cutoff in place; filter memory is kept so there is no click
    SetCutoff(f64),
}

/// Most channels a filter carries state for
const MAX_CHANNELS: usize = 8;

/// Two-pole (12dB/octave) state-variable filter section, one state pair per channel
#[derive(Clone, Copy, Default)]
struct SvfSection {
    ic1eq: [f32; MAX_CHANNELS],
    ic2eq: [f32; MAX_CHANNELS],
}

#[derive(Clone, Copy, Default)]
struct SvfCoefficients {
    k: f32,
    a1: f32,
    a2: f32,
    a3: f32,
}

impl SvfCoefficients {
    /// Butterworth-Q section for `cutoff` Hz
    fn new(cutoff: f64, sample_rate: u32) -> Self {
        let nyquist_guard = sample_rate as f64 * 0.49;
        let cutoff = cutoff.clamp(10.0, nyquist_guard.max(10.0));
        let g = (PI * cutoff / sample_rate.max(1) as f64).tan() as f32;
        let k = core::f32::consts::SQRT_2;
        let a1 = 1.0 / (1.0 + g * (g + k));
        let a2 = g * a1;
        let a3 = g * a2;
        Self { k, a1, a2, a3 }
    }
}

impl SvfSection {
    #[inline]
    fn tick(&mut self, c: &SvfCoefficients, ch: usize, x: f32, kind: FilterKind) -> f32 {
        let v3 = x - self.ic2eq[ch];
        let v1 = c.a1 * self.ic1eq[ch] + c.a2 * v3;
        let v2 = self.ic2eq[ch] + c.a2 * self.ic1eq[ch] + c.a3 * v3;
        self.ic1eq[ch] = 2.0 * v1 - self.ic1eq[ch];
        self.ic2eq[ch] = 2.0 * v2 - self.ic2eq[ch];
        match kind {
            FilterKind::LowPass => v2,
            FilterKind::HighPass => x - c.k * v1 - v2,
        }
    }
}

/// A cascaded state-variable filter.
///
/// `order` is the number of poles; every two poles add one 12dB/octave
/// section (odd orders round up). All inputs are summed before filtering,
/// so any number of stems can feed the same filter.
pub struct Filter {
    kind: FilterKind,
    cutoff: f64,
    order: u32,
    channels: usize,
    sections: Vec<SvfSection>,
    coeffs: SvfCoefficients,
    /// Sample rate the coefficients were computed for
    tuned_for: u32,
}

impl Filter {
    pub fn new(kind: FilterKind, cutoff: f64, order: u32, channels: usize) -> Self {
        let order = order.max(1);
        let sections = order.div_ceil(2) as usize;
        Self {
            kind,
            cutoff,
            order,
            channels: channels.clamp(1, MAX_CHANNELS),
            sections: vec![SvfSection::default(); sections],
            coeffs: SvfCoefficients::default(),
            tuned_for: 0,
        }
    }

    pub fn low_pass(cutoff: f64, order: u32, channels: usize) -> Self {
        Self::new(FilterKind::LowPass, cutoff, order, channels)
    }

    pub fn high_pass(cutoff: f64, order: u32, channels: usize) -> Self {
        Self::new(FilterKind::HighPass, cutoff, order, channels)
    }

    #[inline]
    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    #[inline]
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    #[inline]
    pub fn order(&self) -> u32 {
        self.order
    }

    /// Filter `buffers` in place, one buffer per channel
    fn filter_block(&mut self, sample_rate: u32, buffers: &mut [Buffer]) {
        if self.tuned_for != sample_rate {
            self.coeffs = SvfCoefficients::new(self.cutoff, sample_rate);
            self.tuned_for = sample_rate;
        }

        let kind = self.kind;
        let coeffs = self.coeffs;
        for (ch, buffer) in buffers.iter_mut().enumerate().take(self.channels) {
            for sample in buffer.iter_mut() {
                let mut x = *sample;
                for section in self.sections.iter_mut() {
                    x = section.tick(&coeffs, ch, x, kind);
                }
                *sample = x;
            }
        }
    }
}

impl AudioNode for Filter {
    type Message = FilterMessage;

    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = FilterMessage>,
        inputs: &[Input],
        outputs: &mut [Buffer],
    ) {
        for msg in messages {
            match msg {
                FilterMessage::SetCutoff(hz) if !(hz.is_finite() && hz > 0.0) => {}
                FilterMessage::SetCutoff(hz) => {
                    self.cutoff = hz;
                    self.tuned_for = 0;
                }
            }
        }

        mix_into(inputs, outputs);
        self.filter_block(ctx.sample_rate, outputs);
    }

    #[inline]
    fn num_inputs(&self) -> usize { usize::MAX }

    #[inline]
    fn num_outputs(&self) -> usize {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed a sine through the filter for `blocks` blocks, return the RMS of the last block
    fn rms_after(filter: &mut Filter, freq: f64, blocks: usize) -> f32 {
        let sr = 48000u32;
        let mut out = vec![Buffer::default()];
        let mut phase = 0.0f64;
        for _ in 0..blocks {
            for s in out[0].iter_mut() {
                *s = (phase * 2.0 * PI).sin() as f32;
                phase = (phase + freq / sr as f64) % 1.0;
            }
            filter.filter_block(sr, &mut out);
        }
        (out[0].iter().map(|s| s * s).sum::<f32>() / out[0].len() as f32).sqrt()
    }

    #[test]
    fn low_pass_keeps_lows_and_cuts_highs() {
        let mut lows = Filter::low_pass(1200.0, 4, 1);
        let mut highs = Filter::low_pass(1200.0, 4, 1);
        let pass = rms_after(&mut lows, 100.0, 400);
        let stop = rms_after(&mut highs, 12000.0, 400);
        assert!(pass > 0.6, "pass band rms {pass}");
        assert!(stop < 0.05, "stop band rms {stop}");
    }

    #[test]
    fn high_pass_blocks_dc() {
        let mut hpf = Filter::high_pass(20.0, 2, 1);
        let mut out = vec![Buffer::default()];
        for _ in 0..2000 {
            out[0].iter_mut().for_each(|s| *s = 1.0);
            hpf.filter_block(48000, &mut out);
        }
        assert!(out[0][63].abs() < 1e-3);
    }

    #[test]
    fn invalid_cutoff_message_is_ignored() {
        let mut lpf = Filter::low_pass(1200.0, 4, 1);
        let mut out = vec![Buffer::default()];
        let ctx = ProcessContext { sample_rate: 48000, buffer_size: 64, frame: 0 };
        let bad = [f64::NAN, f64::INFINITY, 0.0, -5.0].map(FilterMessage::SetCutoff);
        lpf.process(&ctx, bad.into_iter(), &[], &mut out);
        assert_eq!(lpf.cutoff(), 1200.0);

        let pass = rms_after(&mut lpf, 100.0, 400);
        assert!(pass.is_finite() && pass > 0.6, "pass band rms {pass}");
    }

    #[test]
    fn cutoff_message_retunes_in_place() {
        let mut lpf = Filter::low_pass(18000.0, 4, 1);
        let mut out = vec![Buffer::default()];
        let ctx = ProcessContext { sample_rate: 48000, buffer_size: 64, frame: 0 };
        lpf.process(&ctx, [FilterMessage::SetCutoff(1200.0)].into_iter(), &[], &mut out);
        assert_eq!(lpf.cutoff(), 1200.0);
        assert_eq!(lpf.order(), 4);
        assert_eq!(lpf.sections.len(), 2);
    }
}
