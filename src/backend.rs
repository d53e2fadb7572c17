//! The capability interface the engine adapter drives.
//!
//! [`AudioEngine`](crate::engine::AudioEngine) never touches nodes or devices
//! directly; everything it needs from a mixer goes through [`MixerBackend`].
//! [`GraphMixer`](crate::mixer::GraphMixer) renders real audio,
//! [`MockMixer`](crate::mock::MockMixer) records calls for tests.

use std::path::Path;

use crate::error::AudioResult;
use crate::node::NodeId;
use crate::nodes::FilterKind;

/// Node graph, sources, scheduled starts and a frame clock.
///
/// Per-source setters take a [`NodeId`] returned from
/// [`load_source`](Self::load_source); ids that are unknown (already destroyed)
/// are ignored.
pub trait MixerBackend {
    /// Output sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Output channel count
    fn channels(&self) -> u16;

    /// Monotonic count of frames the mixer has rendered
    fn now_frames(&self) -> u64;

    /// The node everything finally mixes into
    fn endpoint(&self) -> NodeId;

    /// Create a filter node with no connections
    fn create_filter(&mut self, kind: FilterKind, cutoff_hz: f64, order: u32) -> AudioResult<NodeId>;

    /// Retune an existing filter in place, keeping its connections
    fn reinit_filter(&mut self, filter: NodeId, cutoff_hz: f64);

    /// Open a file as a stopped source with no connections.
    ///
    /// `stream` asks for decoding during playback instead of up front; a backend
    /// may fall back to buffering for formats it can only decode whole.
    fn load_source(&mut self, path: &Path, stream: bool) -> AudioResult<NodeId>;

    /// Remove a node and all its connections
    fn destroy(&mut self, node: NodeId);

    /// Route the output of `from` into `to`, replacing any existing route
    fn attach(&mut self, from: NodeId, to: NodeId);

    fn set_looping(&mut self, source: NodeId, looping: bool);

    fn seek_to_frame(&mut self, source: NodeId, frame: u64);

    /// Start `source` when the frame clock reaches `frame`
    fn schedule_start(&mut self, source: NodeId, frame: u64);

    fn start(&mut self, source: NodeId);

    fn stop(&mut self, source: NodeId);

    fn set_volume(&mut self, source: NodeId, volume: f32);

    fn set_pitch(&mut self, source: NodeId, pitch: f32);

    fn set_pan(&mut self, source: NodeId, pan: f32);
}
