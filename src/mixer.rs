//! GraphMixer - the node graph as a [`MixerBackend`]
//!
//! Owns one [`AudioGraph`] at the output sample rate: every loaded source and
//! filter is a node, the [`Mixer`] endpoint sums whatever is attached to it and
//! feeds the output sink (a device, a capture ring buffer, or nothing at all).

use std::path::Path;
use std::sync::Arc;

use hashbrown::HashMap;
use symphonium::SymphoniumLoader;

use crate::backend::MixerBackend;
use crate::error::{AudioError, AudioResult};
use crate::graph::{AudioGraph, NodeHandle, BLOCK_SIZE};
use crate::node::{AudioNode, NodeId};
use crate::nodes::{Filter, FilterKind, FilterMessage, Mixer, OutputSink, SamplePlayer, SinkStats, SourceMessage};

#[cfg(feature = "cpal_sink")]
use crate::device::CpalDevice;

/// Sample rate used when none is requested and there is no device to ask
pub const HEADLESS_SAMPLE_RATE: u32 = 48000;
/// Channel count used when none is requested and there is no device to ask
pub const HEADLESS_CHANNELS: u16 = 2;

/// Blocks rendered ahead of wall-clock time by [`GraphMixer::pump`]
pub const LOOKAHEAD_BLOCKS: u64 = 6;

/// Control messages a source can queue between two rendered blocks
const SOURCE_QUEUE: usize = 1024;

/// The production mixer backend.
///
/// Rendering is pull-based: nothing happens until [`process`](Self::process),
/// [`render_until`](Self::render_until) or [`pump`](Self::pump) is called. With a
/// [`CpalSink`](crate::nodes::CpalSink) attached, the device callback drains what
/// was rendered on its own thread.
pub struct GraphMixer {
    graph: AudioGraph,
    channels: u16,
    endpoint: NodeId,
    sink: Option<NodeId>,
    sink_stats: Option<Arc<SinkStats>>,

    sources: HashMap<NodeId, NodeHandle<SourceMessage>>,
    filters: HashMap<NodeId, NodeHandle<FilterMessage>>,

    /// Wall-clock seconds seen by `pump`
    elapsed: f64,
}

impl GraphMixer {
    /// Create a mixer with no output; the endpoint is the last node rendered.
    ///
    /// `0` for either argument picks the headless default (48 kHz, stereo).
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        let sample_rate = if sample_rate == 0 { HEADLESS_SAMPLE_RATE } else { sample_rate };
        let channels = if channels == 0 { HEADLESS_CHANNELS } else { channels };

        let mut graph = AudioGraph::new(sample_rate);
        let endpoint = graph.add(Mixer::new(channels as usize)).id();
        graph.set_terminal(endpoint);

        Self {
            graph,
            channels,
            endpoint,
            sink: None,
            sink_stats: None,
            sources: HashMap::new(),
            filters: HashMap::new(),
            elapsed: 0.0,
        }
    }

    /// Feed the endpoint into `sink`, replacing any previous output
    pub fn with_output<S: OutputSink>(mut self, sink: S) -> Self {
        if let Some(old) = self.sink.take() {
            self.graph.remove(old);
        }
        self.sink_stats = Some(sink.stats());
        let sink = self.graph.add(sink).id();
        self.graph.connect(self.endpoint, sink);
        self.graph.set_terminal(sink);
        self.sink = Some(sink);
        self
    }

    /// Open the system's default output device.
    ///
    /// `0` for either argument keeps the device's own setting.
    #[cfg(feature = "cpal_sink")]
    pub fn default_output(sample_rate: u32, channels: u16) -> AudioResult<Self> {
        let device = CpalDevice::default_output()
            .ok_or(AudioError::NoDevice)?
            .configure(sample_rate, channels);
        tracing::info!(
            device = device.name(),
            sample_rate = device.sample_rate(),
            channels = device.channels(),
            "opening output device"
        );
        let sink = device.create_sink()?;
        Ok(Self::new(device.sample_rate(), device.channels()).with_output(sink))
    }

    /// Counters of the attached output, `None` when rendering headless
    pub fn output_stats(&self) -> Option<&SinkStats> {
        self.sink_stats.as_deref()
    }

    /// Render one block and advance the frame clock
    pub fn process(&mut self) {
        self.graph.process();
    }

    /// Render blocks until the frame clock reaches `frame`
    pub fn render_until(&mut self, frame: u64) {
        while self.graph.frames_processed() < frame {
            self.graph.process();
        }
    }

    /// Advance by `elapsed` wall-clock seconds, staying a few blocks ahead.
    ///
    /// Called once per frame by a driver that has no audio callback of its own.
    pub fn pump(&mut self, elapsed: f64) {
        if elapsed.is_finite() && elapsed > 0.0 {
            self.elapsed += elapsed;
        }
        let wall_frames = (self.elapsed * self.graph.sample_rate() as f64) as u64;
        self.render_until(wall_frames + LOOKAHEAD_BLOCKS * BLOCK_SIZE as u64);
    }

    /// Number of sources currently in the graph
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    fn send_source(&mut self, source: NodeId, msg: SourceMessage) {
        let Some(handle) = self.sources.get_mut(&source) else {
            return;
        };
        if let Err(msg) = handle.send(msg) {
            tracing::warn!(?source, ?msg, "source control queue full, message dropped");
        }
    }

    fn add_source<N: AudioNode<Message = SourceMessage>>(&mut self, node: N) -> NodeId {
        let handle = self.graph.add_with_queue_size(node, SOURCE_QUEUE);
        let id = handle.id();
        self.sources.insert(id, handle);
        id
    }

    #[cfg(feature = "vorbis_src")]
    fn open_stream(&mut self, path: &Path) -> Option<AudioResult<NodeId>> {
        let is_ogg = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("ogg"));
        if !is_ogg {
            return None;
        }
        let channels = self.channels as usize;
        Some(
            crate::nodes::OggStream::open(path)
                .map(|node| self.add_source(node.with_output_channels(channels))),
        )
    }

    #[cfg(not(feature = "vorbis_src"))]
    fn open_stream(&mut self, _path: &Path) -> Option<AudioResult<NodeId>> {
        None
    }
}

impl MixerBackend for GraphMixer {
    fn sample_rate(&self) -> u32 {
        self.graph.sample_rate()
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn now_frames(&self) -> u64 {
        self.graph.frames_processed()
    }

    fn endpoint(&self) -> NodeId {
        self.endpoint
    }

    fn create_filter(&mut self, kind: FilterKind, cutoff_hz: f64, order: u32) -> AudioResult<NodeId> {
        if !(cutoff_hz.is_finite() && cutoff_hz > 0.0) {
            return Err(AudioError::FilterInit { kind, reason: format!("invalid cutoff {cutoff_hz} Hz") });
        }
        if order == 0 {
            return Err(AudioError::FilterInit { kind, reason: "order must be at least 1".into() });
        }

        let filter = Filter::new(kind, cutoff_hz, order, self.channels as usize);
        let handle = self.graph.add(filter);
        let id = handle.id();
        self.filters.insert(id, handle);
        Ok(id)
    }

    fn reinit_filter(&mut self, filter: NodeId, cutoff_hz: f64) {
        let Some(handle) = self.filters.get_mut(&filter) else {
            return;
        };
        if handle.send(FilterMessage::SetCutoff(cutoff_hz)).is_err() {
            tracing::warn!(?filter, cutoff_hz, "filter control queue full, retune dropped");
        }
    }

    fn load_source(&mut self, path: &Path, stream: bool) -> AudioResult<NodeId> {
        if stream {
            if let Some(opened) = self.open_stream(path) {
                return opened;
            }
        }

        let decoded = SymphoniumLoader::new()
            .load_f32(path, None)
            .map_err(|e| AudioError::Decode {
                path: path.to_path_buf(),
                reason: format!("{:?}", e),
            })?;
        let player = SamplePlayer::new(decoded.as_interleaved(), decoded.channels(), decoded.sample_rate)
            .with_output_channels(self.channels as usize);
        tracing::debug!(
            path = %path.display(),
            frames = player.frames(),
            sample_rate = player.sample_rate(),
            "decoded source"
        );
        Ok(self.add_source(player))
    }

    fn destroy(&mut self, node: NodeId) {
        self.sources.remove(&node);
        self.filters.remove(&node);
        self.graph.remove(node);
    }

    fn attach(&mut self, from: NodeId, to: NodeId) {
        self.graph.disconnect_outputs(from);
        if !self.graph.connect(from, to) {
            tracing::warn!(?from, ?to, "attach to unknown node ignored");
        }
    }

    fn set_looping(&mut self, source: NodeId, looping: bool) {
        self.send_source(source, SourceMessage::SetLooping(looping));
    }

    fn seek_to_frame(&mut self, source: NodeId, frame: u64) {
        self.send_source(source, SourceMessage::Seek(frame));
    }

    fn schedule_start(&mut self, source: NodeId, frame: u64) {
        self.send_source(source, SourceMessage::StartAt(frame));
    }

    fn start(&mut self, source: NodeId) {
        self.send_source(source, SourceMessage::Start);
    }

    fn stop(&mut self, source: NodeId) {
        self.send_source(source, SourceMessage::Stop);
    }

    fn set_volume(&mut self, source: NodeId, volume: f32) {
        self.send_source(source, SourceMessage::SetVolume(volume));
    }

    fn set_pitch(&mut self, source: NodeId, pitch: f32) {
        self.send_source(source, SourceMessage::SetPitch(pitch));
    }

    fn set_pan(&mut self, source: NodeId, pan: f32) {
        self.send_source(source, SourceMessage::SetPan(pan));
    }
}
