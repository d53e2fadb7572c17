//! Mixer effect - sums multiple inputs together

use dasp_graph::{Buffer, Input};
use crate::node::{AudioNode, ProcessContext};

/// A mixer that sums multiple inputs together
///
/// Each input is summed with equal weight. The output has `channels` channels.
/// If an input has fewer channels, it will be upmixed (mono→stereo copies to both).
/// If an input has more channels, extra channels are ignored.
///
/// The mixer is the graph's output endpoint: the filter chain and every
/// bypass-routed stem feed into it, and it feeds the sink.
pub struct Mixer {
    channels: usize,
}

impl Mixer {
    /// Create a new mixer with the specified number of output channels
    pub fn new(channels: usize) -> Self {
        Self { channels: channels.max(1) }
    }

    /// Create a stereo mixer
    pub fn stereo() -> Self {
        Self::new(2)
    }
}

/// Clear `output` and sum every input into it, upmixing mono inputs
pub(crate) fn mix_into(inputs: &[Input], output: &mut [Buffer]) {
    for buf in output.iter_mut() {
        buf.iter_mut().for_each(|s| *s = 0.0);
    }

    for input in inputs {
        let in_buffers = input.buffers();
        if in_buffers.is_empty() {
            continue;
        }

        for (out_ch, out_buf) in output.iter_mut().enumerate() {
            let in_buf = &in_buffers[out_ch.min(in_buffers.len() - 1)];
            for (out_sample, in_sample) in out_buf.iter_mut().zip(in_buf.iter()) {
                *out_sample += *in_sample;
            }
        }
    }
}

impl AudioNode for Mixer {
    type Message = ();

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        _messages: impl Iterator<Item = Self::Message>,
        inputs: &[Input],
        output: &mut [Buffer],
    ) {
        mix_into(inputs, output);
    }

    fn num_inputs(&self) -> usize {
        // Accept any number of inputs
        usize::MAX
    }

    fn num_outputs(&self) -> usize {
        self.channels
    }
}
