//! Core node trait and context types.

use dasp_graph::{Buffer, Input};

/// Information available during audio processing.
///
/// Passed to every [`AudioNode::process`] call. Besides the graph's sample rate
/// and block size it carries the absolute frame index of the first sample in the
/// block, which is what sample-accurate scheduled starts are measured against.
#[derive(Clone, Copy, Debug)]
pub struct ProcessContext {
    /// Sample rate of the graph in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,
    /// Number of samples per buffer (always 64, the dasp_graph block size)
    pub buffer_size: usize,
    /// Frame index of the first sample in this block
    pub frame: u64,
}

/// Unique identifier for a node within a graph.
///
/// Handed out by a [`MixerBackend`](crate::backend::MixerBackend) for every
/// source or filter it creates.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(pub(crate) u32);

/// The core trait for audio processing nodes.
///
/// Nodes can be:
/// - **Sources**: Generate audio (0 inputs, 1+ outputs) - stem players
/// - **Effects**: Process audio (1+ inputs, 1+ outputs) - filters, the endpoint mixer
/// - **Sinks**: Consume audio (1+ inputs, 0 outputs) - device outputs, capture buffers
///
/// # Message-Based Parameters
///
/// Instead of shared mutable state, nodes receive parameter updates via messages.
/// Handle them at the start of `process()`:
///
/// ```
/// use stem_director::{AudioNode, ProcessContext};
/// use dasp_graph::{Buffer, Input};
///
/// enum TrimMessage {
///     SetLevel(f32),
/// }
///
/// struct Trim {
///     level: f32,
/// }
///
/// impl AudioNode for Trim {
///     type Message = TrimMessage;
///
///     fn process(
///         &mut self,
///         _ctx: &ProcessContext,
///         messages: impl Iterator<Item = TrimMessage>,
///         inputs: &[Input],
///         outputs: &mut [Buffer],
///     ) {
///         for msg in messages {
///             match msg {
///                 TrimMessage::SetLevel(l) => self.level = l,
///             }
///         }
///
///         let Some(input) = inputs.first() else { return };
///         for (out, inp) in outputs.iter_mut().zip(input.buffers()) {
///             for (o, i) in out.iter_mut().zip(inp.iter()) {
///                 *o = *i * self.level;
///             }
///         }
///     }
///
///     fn num_inputs(&self) -> usize { 1 }
/// }
/// ```
pub trait AudioNode: Send + 'static {
    /// Message type for parameter updates.
    ///
    /// Use a custom enum for nodes with parameters, or `()` for nodes without.
    type Message: Send + 'static;

    /// Process one block of audio.
    ///
    /// Called once per audio block (64 samples). Implementations should:
    /// 1. Drain and handle all pending messages
    /// 2. Read from `inputs` (if any)
    /// 3. Write every sample of `outputs`
    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = Self::Message>,
        inputs: &[Input],
        outputs: &mut [Buffer],
    );

    /// Number of audio input channels (0 for sources).
    fn num_inputs(&self) -> usize { 0 }

    /// Number of audio output channels.
    fn num_outputs(&self) -> usize { 1 }
}
