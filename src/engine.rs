//! AudioEngine - named sounds over a mixer backend
//!
//! The engine owns the backend, a shared high-pass and low-pass filter wired in
//! series in front of the endpoint, and a table of loaded sounds keyed by name.
//! Sounds on [`Route::ThroughFilter`] feed the high-pass; [`Route::Bypass`]
//! sounds feed the endpoint directly. Every per-sound operation silently
//! ignores names that are not loaded.

use std::path::Path;

use hashbrown::HashMap;

use crate::backend::MixerBackend;
use crate::config::{EngineConfig, Route};
use crate::error::{AudioError, AudioResult};
use crate::mixer::GraphMixer;
use crate::node::NodeId;
use crate::nodes::{FilterKind, MIN_PITCH};

/// Cutoff of the shared high-pass at startup, in Hz
pub const HIGHPASS_START_HZ: f64 = 20.0;
/// Order of the shared high-pass filter
pub const HIGHPASS_ORDER: u32 = 2;

#[inline]
fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

/// A loaded sound
#[derive(Debug, Clone, Copy)]
struct Sound {
    node: NodeId,
    route: Route,
    /// Volume before the route gain is applied
    base_volume: f32,
}

/// The parts that only exist between `init` and `shutdown`
struct Live<M> {
    backend: M,
    highpass: NodeId,
    lowpass: NodeId,
}

/// Audio engine adapter over a [`MixerBackend`].
///
/// ```
/// use stem_director::{AudioEngine, EngineConfig, MockMixer, Route};
///
/// let mut engine = AudioEngine::init(MockMixer::new(48000, 2), &EngineConfig::default())?;
/// assert_eq!(engine.seconds_to_frames(0.5), 24000);
/// engine.set_route_gain(Route::Bypass, 0.5);
/// engine.shutdown();
/// # Ok::<(), stem_director::AudioError>(())
/// ```
pub struct AudioEngine<M: MixerBackend> {
    live: Option<Live<M>>,
    sounds: HashMap<String, Sound>,

    sample_rate: u32,
    channels: u16,
    route_gain: [f32; 2],
    lowpass_hz: f64,
    highpass_hz: f64,
    lowpass_order: u32,
}

impl AudioEngine<GraphMixer> {
    /// An engine rendering into a headless [`GraphMixer`] (no device).
    pub fn headless(config: &EngineConfig) -> AudioResult<Self> {
        Self::init(GraphMixer::new(config.sample_rate, config.channels), config)
    }

    /// An engine playing through the default output device.
    #[cfg(feature = "cpal_sink")]
    pub fn open(config: &EngineConfig) -> AudioResult<Self> {
        Self::init(GraphMixer::default_output(config.sample_rate, config.channels)?, config)
    }
}

impl<M: MixerBackend> AudioEngine<M> {
    /// Create both shared filters and wire high-pass → low-pass → endpoint.
    ///
    /// If a filter fails, whatever was created is destroyed and the backend dropped.
    pub fn init(mut backend: M, config: &EngineConfig) -> AudioResult<Self> {
        let sample_rate = backend.sample_rate();
        let channels = backend.channels();

        let highpass = backend.create_filter(FilterKind::HighPass, HIGHPASS_START_HZ, HIGHPASS_ORDER)?;
        let lowpass = match backend.create_filter(FilterKind::LowPass, config.lowpass_start_hz, config.lowpass_order) {
            Ok(id) => id,
            Err(e) => {
                backend.destroy(highpass);
                return Err(e);
            }
        };

        let endpoint = backend.endpoint();
        backend.attach(highpass, lowpass);
        backend.attach(lowpass, endpoint);

        tracing::info!(
            sample_rate,
            channels,
            lowpass_hz = config.lowpass_start_hz,
            lowpass_order = config.lowpass_order,
            "audio engine initialized"
        );

        Ok(Self {
            live: Some(Live { backend, highpass, lowpass }),
            sounds: HashMap::new(),
            sample_rate,
            channels,
            route_gain: [1.0, 1.0],
            lowpass_hz: config.lowpass_start_hz,
            highpass_hz: HIGHPASS_START_HZ,
            lowpass_order: config.lowpass_order,
        })
    }

    /// Destroy every sound, then the filters, then drop the backend. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(mut live) = self.live.take() else {
            return;
        };
        for (_, sound) in self.sounds.drain() {
            live.backend.stop(sound.node);
            live.backend.destroy(sound.node);
        }
        live.backend.destroy(live.lowpass);
        live.backend.destroy(live.highpass);
        tracing::info!("audio engine shut down");
    }

    pub fn is_running(&self) -> bool {
        self.live.is_some()
    }

    /// The backend, while the engine is running
    pub fn backend(&self) -> Option<&M> {
        self.live.as_ref().map(|l| &l.backend)
    }

    /// Mutable access to the backend, e.g. to render a [`GraphMixer`]
    pub fn backend_mut(&mut self) -> Option<&mut M> {
        self.live.as_mut().map(|l| &mut l.backend)
    }

    #[inline]
    fn effective_volume(&self, sound: &Sound) -> f32 {
        clamp01(sound.base_volume * self.route_gain[sound.route.index()])
    }

    /// Load `path` under `name`, replacing any sound already loaded there.
    ///
    /// On failure nothing is left under `name`.
    pub fn load_sound(
        &mut self,
        name: &str,
        path: impl AsRef<Path>,
        route: Route,
        initial_volume: f32,
        looping: bool,
        stream: bool,
    ) -> AudioResult<()> {
        let path = path.as_ref();
        let live = self.live.as_mut().ok_or(AudioError::EngineUnavailable)?;

        if let Some(old) = self.sounds.remove(name) {
            live.backend.stop(old.node);
            live.backend.destroy(old.node);
        }

        let node = match live.backend.load_source(path, stream) {
            Ok(node) => node,
            Err(e) => {
                tracing::warn!(name, path = %path.display(), "failed to load sound: {}", e);
                return Err(e);
            }
        };

        let sound = Sound {
            node,
            route,
            base_volume: clamp01(initial_volume),
        };
        let target = match route {
            Route::ThroughFilter => live.highpass,
            Route::Bypass => live.backend.endpoint(),
        };
        let volume = clamp01(sound.base_volume * self.route_gain[route.index()]);

        live.backend.set_looping(node, looping);
        live.backend.set_volume(node, volume);
        live.backend.attach(node, target);
        self.sounds.insert(name.to_owned(), sound);

        tracing::debug!(name, ?route, volume, looping, stream, "sound loaded");
        Ok(())
    }

    fn with_sound(&mut self, name: &str, f: impl FnOnce(&mut M, NodeId)) {
        if let (Some(live), Some(sound)) = (self.live.as_mut(), self.sounds.get(name)) {
            f(&mut live.backend, sound.node);
        }
    }

    pub fn start(&mut self, name: &str) {
        self.with_sound(name, |b, node| b.start(node));
    }

    pub fn stop(&mut self, name: &str) {
        self.with_sound(name, |b, node| b.stop(node));
    }

    /// Start every loaded sound at the same absolute frame
    pub fn start_all_synced_at(&mut self, start_frame: u64, seek_to_zero: bool) {
        let Some(live) = self.live.as_mut() else {
            return;
        };
        for sound in self.sounds.values() {
            if seek_to_zero {
                live.backend.seek_to_frame(sound.node, 0);
            }
            live.backend.schedule_start(sound.node, start_frame);
        }
        tracing::info!(start_frame, sounds = self.sounds.len(), "synced start scheduled");
    }

    /// Move a loaded sound to another route, reapplying its volume with that route's gain
    pub fn reroute(&mut self, name: &str, route: Route) {
        let Some(live) = self.live.as_mut() else {
            return;
        };
        let Some(sound) = self.sounds.get_mut(name) else {
            return;
        };
        sound.route = route;
        let target = match route {
            Route::ThroughFilter => live.highpass,
            Route::Bypass => live.backend.endpoint(),
        };
        let volume = clamp01(sound.base_volume * self.route_gain[route.index()]);
        live.backend.attach(sound.node, target);
        live.backend.set_volume(sound.node, volume);
    }

    /// Set the base volume (clamped to [0, 1]); the mixer gets base × route gain
    pub fn set_volume(&mut self, name: &str, volume: f32) {
        let Some(sound) = self.sounds.get_mut(name) else {
            return;
        };
        sound.base_volume = clamp01(volume);
        let sound = *sound;
        let volume = self.effective_volume(&sound);
        self.with_sound(name, |b, node| b.set_volume(node, volume));
        tracing::trace!(name, volume, "volume");
    }

    /// Playback rate of one sound, floored at [`MIN_PITCH`]
    pub fn set_pitch(&mut self, name: &str, pitch: f32) {
        let pitch = pitch.max(MIN_PITCH);
        self.with_sound(name, |b, node| b.set_pitch(node, pitch));
    }

    /// Stereo pan of one sound, clamped to [-1, 1]
    pub fn set_pan(&mut self, name: &str, pan: f32) {
        let pan = pan.clamp(-1.0, 1.0);
        self.with_sound(name, |b, node| b.set_pan(node, pan));
    }

    /// Set the pitch of every loaded sound except `except`
    pub fn set_all_pitch(&mut self, pitch: f32, except: Option<&str>) {
        let Some(live) = self.live.as_mut() else {
            return;
        };
        let pitch = pitch.max(MIN_PITCH);
        for (name, sound) in self.sounds.iter() {
            if except.is_some_and(|e| !e.is_empty() && e == name.as_str()) {
                continue;
            }
            live.backend.set_pitch(sound.node, pitch);
        }
        tracing::trace!(pitch, ?except, "pitch for all sounds");
    }

    /// Rescale every sound on `route` by a new gain (clamped to [0, 1])
    pub fn set_route_gain(&mut self, route: Route, gain: f32) {
        self.route_gain[route.index()] = clamp01(gain);
        let Some(live) = self.live.as_mut() else {
            return;
        };
        for sound in self.sounds.values().filter(|s| s.route == route) {
            let volume = clamp01(sound.base_volume * self.route_gain[route.index()]);
            live.backend.set_volume(sound.node, volume);
        }
    }

    /// Retune the shared low-pass in place
    pub fn set_lowpass_cutoff(&mut self, hz: f64) {
        if !(hz.is_finite() && hz > 0.0) {
            tracing::warn!(hz, "ignoring invalid lowpass cutoff");
            return;
        }
        let Some(live) = self.live.as_mut() else {
            return;
        };
        live.backend.reinit_filter(live.lowpass, hz);
        self.lowpass_hz = hz;
    }

    /// Retune the shared high-pass in place
    pub fn set_highpass_cutoff(&mut self, hz: f64) {
        if !(hz.is_finite() && hz > 0.0) {
            tracing::warn!(hz, "ignoring invalid highpass cutoff");
            return;
        }
        let Some(live) = self.live.as_mut() else {
            return;
        };
        live.backend.reinit_filter(live.highpass, hz);
        self.highpass_hz = hz;
    }

    /// The mixer's frame clock, 0 when not running
    pub fn now_frames(&self) -> u64 {
        self.backend().map_or(0, |b| b.now_frames())
    }

    /// `round(seconds × sample_rate)`, negative input gives 0
    pub fn seconds_to_frames(&self, seconds: f64) -> u64 {
        (seconds * self.sample_rate as f64).round().max(0.0) as u64
    }

    pub fn frames_to_seconds(&self, frames: u64) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        frames as f64 / self.sample_rate as f64
    }

    /// Sample rate captured at init
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn lowpass_cutoff(&self) -> f64 {
        self.lowpass_hz
    }

    pub fn highpass_cutoff(&self) -> f64 {
        self.highpass_hz
    }

    pub fn lowpass_order(&self) -> u32 {
        self.lowpass_order
    }

    pub fn route_gain(&self, route: Route) -> f32 {
        self.route_gain[route.index()]
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.sounds.contains_key(name)
    }

    /// Base volume of a sound, 0 when not loaded
    pub fn base_volume(&self, name: &str) -> f32 {
        self.sounds.get(name).map_or(0.0, |s| s.base_volume)
    }

    pub fn route(&self, name: &str) -> Option<Route> {
        self.sounds.get(name).map(|s| s.route)
    }

    /// The backend node playing a sound
    pub fn node(&self, name: &str) -> Option<NodeId> {
        self.sounds.get(name).map(|s| s.node)
    }

    pub fn sound_count(&self) -> usize {
        self.sounds.len()
    }
}

impl<M: MixerBackend> Drop for AudioEngine<M> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
