//! MockMixer - a deterministic [`MixerBackend`] that renders nothing
//!
//! Records what the engine asked for so tests can assert on it: per-node state,
//! a settable frame clock, call counters, and injected failures.

use std::path::{Path, PathBuf};

use hashbrown::{HashMap, HashSet};

use crate::backend::MixerBackend;
use crate::error::{AudioError, AudioResult};
use crate::node::NodeId;
use crate::nodes::FilterKind;

/// Recorded state of one fake source
#[derive(Clone, Debug, PartialEq)]
pub struct MockSource {
    pub path: PathBuf,
    pub streaming: bool,
    pub looping: bool,
    pub playing: bool,
    pub start_frame: Option<u64>,
    pub position: u64,
    pub volume: f32,
    pub pitch: f32,
    pub pan: f32,
}

/// Recorded state of one fake filter
#[derive(Clone, Debug, PartialEq)]
pub struct MockFilter {
    pub kind: FilterKind,
    pub cutoff: f64,
    pub order: u32,
    pub reinits: usize,
}

/// Counts of control calls, for checking that redundant calls are skipped
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub volume: usize,
    pub pitch: usize,
    pub pan: usize,
    pub attach: usize,
    pub destroy: usize,
}

/// A [`MixerBackend`] that keeps every request in memory.
///
/// Node ids are handed out in creation order starting at 1; the endpoint is 0.
pub struct MockMixer {
    sample_rate: u32,
    channels: u16,
    now: u64,
    next_id: u32,
    endpoint: NodeId,

    sources: HashMap<NodeId, MockSource>,
    filters: HashMap<NodeId, MockFilter>,
    routes: HashMap<NodeId, NodeId>,
    calls: CallCounts,

    fail_filter: Option<FilterKind>,
    unreadable: HashSet<PathBuf>,
}

impl MockMixer {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            now: 0,
            next_id: 1,
            endpoint: NodeId(0),
            sources: HashMap::new(),
            filters: HashMap::new(),
            routes: HashMap::new(),
            calls: CallCounts::default(),
            fail_filter: None,
            unreadable: HashSet::new(),
        }
    }

    fn next_node(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Make every `create_filter` of this kind fail
    pub fn fail_filter(mut self, kind: FilterKind) -> Self {
        self.fail_filter = Some(kind);
        self
    }

    /// Make `load_source` fail for this path
    pub fn unreadable(mut self, path: impl Into<PathBuf>) -> Self {
        self.unreadable.insert(path.into());
        self
    }

    pub fn set_now(&mut self, frame: u64) {
        self.now = frame;
    }

    pub fn advance(&mut self, frames: u64) {
        self.now += frames;
    }

    pub fn source(&self, id: NodeId) -> Option<&MockSource> {
        self.sources.get(&id)
    }

    pub fn filter(&self, id: NodeId) -> Option<&MockFilter> {
        self.filters.get(&id)
    }

    /// The source loaded from `path`, if it is still alive
    pub fn source_for(&self, path: impl AsRef<Path>) -> Option<&MockSource> {
        let path = path.as_ref();
        self.sources.values().find(|s| s.path == path)
    }

    /// Where a node's output is attached
    pub fn route_of(&self, id: NodeId) -> Option<NodeId> {
        self.routes.get(&id).copied()
    }

    pub fn live_sources(&self) -> usize {
        self.sources.len()
    }

    pub fn live_filters(&self) -> usize {
        self.filters.len()
    }

    pub fn calls(&self) -> CallCounts {
        self.calls
    }

    fn with_source(&mut self, id: NodeId, f: impl FnOnce(&mut MockSource)) {
        if let Some(source) = self.sources.get_mut(&id) {
            f(source);
        }
    }
}

impl MixerBackend for MockMixer {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn now_frames(&self) -> u64 {
        self.now
    }

    fn endpoint(&self) -> NodeId {
        self.endpoint
    }

    fn create_filter(&mut self, kind: FilterKind, cutoff_hz: f64, order: u32) -> AudioResult<NodeId> {
        if self.fail_filter == Some(kind) {
            return Err(AudioError::FilterInit { kind, reason: "injected failure".into() });
        }
        let id = self.next_node();
        self.filters.insert(id, MockFilter { kind, cutoff: cutoff_hz, order, reinits: 0 });
        Ok(id)
    }

    fn reinit_filter(&mut self, filter: NodeId, cutoff_hz: f64) {
        if let Some(f) = self.filters.get_mut(&filter) {
            f.cutoff = cutoff_hz;
            f.reinits += 1;
        }
    }

    fn load_source(&mut self, path: &Path, stream: bool) -> AudioResult<NodeId> {
        if self.unreadable.contains(path) {
            return Err(AudioError::Decode {
                path: path.to_path_buf(),
                reason: "injected failure".into(),
            });
        }
        let id = self.next_node();
        self.sources.insert(
            id,
            MockSource {
                path: path.to_path_buf(),
                streaming: stream,
                looping: false,
                playing: false,
                start_frame: None,
                position: 0,
                volume: 1.0,
                pitch: 1.0,
                pan: 0.0,
            },
        );
        Ok(id)
    }

    fn destroy(&mut self, node: NodeId) {
        self.calls.destroy += 1;
        self.sources.remove(&node);
        self.filters.remove(&node);
        self.routes.remove(&node);
        self.routes.retain(|_, to| *to != node);
    }

    fn attach(&mut self, from: NodeId, to: NodeId) {
        self.calls.attach += 1;
        self.routes.insert(from, to);
    }

    fn set_looping(&mut self, source: NodeId, looping: bool) {
        self.with_source(source, |s| s.looping = looping);
    }

    fn seek_to_frame(&mut self, source: NodeId, frame: u64) {
        self.with_source(source, |s| s.position = frame);
    }

    fn schedule_start(&mut self, source: NodeId, frame: u64) {
        self.with_source(source, |s| {
            s.playing = true;
            s.start_frame = Some(frame);
        });
    }

    fn start(&mut self, source: NodeId) {
        self.with_source(source, |s| {
            s.playing = true;
            s.start_frame = None;
        });
    }

    fn stop(&mut self, source: NodeId) {
        self.with_source(source, |s| s.playing = false);
    }

    fn set_volume(&mut self, source: NodeId, volume: f32) {
        self.calls.volume += 1;
        self.with_source(source, |s| s.volume = volume);
    }

    fn set_pitch(&mut self, source: NodeId, pitch: f32) {
        self.calls.pitch += 1;
        self.with_source(source, |s| s.pitch = pitch);
    }

    fn set_pan(&mut self, source: NodeId, pan: f32) {
        self.calls.pan += 1;
        self.with_source(source, |s| s.pan = pan);
    }
}
