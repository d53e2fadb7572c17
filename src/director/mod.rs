//! The music director: moods, rage and stem fades on a musical grid.
//!
//! A [`MusicDirector`] owns one [`Stem`] per loaded track and turns high-level
//! requests (a new mood, a rage level, a single stem target) into fades that
//! start on beat or bar boundaries of the engine's frame clock. The frame
//! driver calls [`update`](MusicDirector::update) once per rendered frame and
//! reads the musical clock and stem volumes back with
//! [`readout`](MusicDirector::readout).
//!
//! The director holds no reference to the engine. Every call that needs audio
//! takes the [`AudioEngine`] it was initialized with, so a single owner can keep
//! both and tests can pair a director with a [`MockMixer`](crate::mock::MockMixer).

pub mod mood;
pub mod stem;
pub mod timing;

use hashbrown::HashMap;

use crate::backend::MixerBackend;
use crate::config::{DirectorSettings, StemDesc};
use crate::engine::AudioEngine;
use crate::error::DirectorError;

pub use mood::{MixProfile, MusicState};
pub use stem::{Fade, Stem};
pub use timing::MusicalGrid;

use mood::{BASS, DRUMS, LEAD, PERCUSSION, RAGE, SYNTH};

/// Low-pass cutoff with tunnel vision fully open
pub const LOWPASS_OPEN_HZ: f64 = 18000.0;
/// Low-pass cutoff with tunnel vision fully closed
pub const LOWPASS_CLOSED_HZ: f64 = 1200.0;
/// Exponent of the tunnel-vision cutoff curve
const TUNNEL_CURVE: f64 = 1.6;

/// Tunnel vision starts easing in above this factor...
const EASE_START: f32 = 0.60;
/// ...and is fully in over this much more
const EASE_SPAN: f32 = 0.35;

const PITCH_MIN: f32 = 1.00;
const PITCH_MAX: f32 = 1.10;
/// Per-second rate of the global pitch ramp
const PITCH_SMOOTHING: f64 = 4.0;
/// Smallest pitch change worth sending to the mixer
const PITCH_EPSILON: f32 = 1e-3;

const BREATH_MAX_VOLUME: f32 = 0.8;
const BREATH_FADE_MS: f32 = 200.0;
const BREATH_PITCH_BASE: f32 = 0.9;
const BREATH_PITCH_RANGE: f32 = 0.4;

/// Lifecycle of a [`MusicDirector`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Uninitialized,
    /// Initialized, stems may be loaded, not playing yet
    Idle,
    Running,
    Shutdown,
}

/// Everything the visualization reads each frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReadout {
    pub state: MusicState,
    pub rage: f32,
    pub beat_phase: f32,
    pub bar_phase: f32,
    pub drums: f32,
    pub bass: f32,
    pub percussion: f32,
    pub synth: f32,
    pub lead: f32,
}

/// Which grid line a scheduled change waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Now,
    Beat,
    Bar,
}

pub struct MusicDirector {
    settings: DirectorSettings,
    stems: HashMap<String, Stem>,
    phase: Phase,
    state: MusicState,
    rage: f32,
    target_pitch: f32,
    current_pitch: f32,
}

impl Default for MusicDirector {
    fn default() -> Self {
        Self::new(DirectorSettings::default())
    }
}

impl MusicDirector {
    pub fn new(settings: DirectorSettings) -> Self {
        Self {
            settings,
            stems: HashMap::new(),
            phase: Phase::Uninitialized,
            state: MusicState::Calm,
            rage: 0.0,
            target_pitch: PITCH_MIN,
            current_pitch: PITCH_MIN,
        }
    }

    /// Bind to a running engine and reset to Calm with no stems
    pub fn init<M: MixerBackend>(&mut self, engine: &AudioEngine<M>) -> Result<(), DirectorError> {
        if !engine.is_running() {
            return Err(DirectorError::EngineUnavailable);
        }
        self.stems.clear();
        self.state = MusicState::Calm;
        self.rage = 0.0;
        self.target_pitch = PITCH_MIN;
        self.current_pitch = PITCH_MIN;
        self.phase = Phase::Idle;
        tracing::info!(
            bpm = self.settings.bpm,
            numerator = self.settings.time_sig_numerator,
            denominator = self.settings.time_sig_denominator,
            "music director initialized"
        );
        Ok(())
    }

    /// Load every stem as a looping, streamed sound.
    ///
    /// Active stems start at full volume, the rest silent. Stops at the first
    /// stem that fails to load; the ones before it stay loaded.
    pub fn load_stems<M: MixerBackend>(
        &mut self,
        engine: &mut AudioEngine<M>,
        stems: &[StemDesc],
    ) -> Result<(), DirectorError> {
        match self.phase {
            Phase::Idle => {}
            Phase::Uninitialized => return Err(DirectorError::NotInitialized),
            other => return Err(DirectorError::InvalidPhase(other)),
        }
        if !engine.is_running() {
            return Err(DirectorError::EngineUnavailable);
        }

        self.stems.reserve(stems.len());
        for desc in stems {
            let volume = if desc.start_active { 1.0 } else { 0.0 };
            engine
                .load_sound(&desc.name, &desc.path, desc.route, volume, true, true)
                .map_err(|source| DirectorError::Load {
                    name: desc.name.clone(),
                    source,
                })?;
            self.stems.insert(desc.name.clone(), Stem::new(volume));
        }
        tracing::info!(count = stems.len(), "stems loaded");
        Ok(())
    }

    /// Start every stem sample-aligned after the configured delay and begin running.
    ///
    /// Returns the frame the stems start on.
    pub fn start_all_synced_looping<M: MixerBackend>(
        &mut self,
        engine: &mut AudioEngine<M>,
    ) -> Result<u64, DirectorError> {
        match self.phase {
            Phase::Idle | Phase::Running => {}
            Phase::Uninitialized => return Err(DirectorError::NotInitialized),
            Phase::Shutdown => return Err(DirectorError::InvalidPhase(Phase::Shutdown)),
        }
        if !engine.is_running() {
            return Err(DirectorError::EngineUnavailable);
        }
        if self.stems.is_empty() {
            return Err(DirectorError::NoStems);
        }

        let start = engine.now_frames() + engine.seconds_to_frames(self.settings.initial_start_delay_sec as f64);
        engine.start_all_synced_at(start, true);
        self.phase = Phase::Running;
        self.apply_volumes_immediate(engine);
        tracing::info!(start_frame = start, stems = self.stems.len(), "stems started");
        Ok(start)
    }

    /// Drop all stems and stop running. Idempotent.
    pub fn shutdown(&mut self) {
        if self.phase != Phase::Shutdown {
            tracing::info!("music director shut down");
        }
        self.stems.clear();
        self.phase = Phase::Shutdown;
    }

    /// Advance fades and the global pitch ramp by `dt` seconds
    pub fn update<M: MixerBackend>(&mut self, engine: &mut AudioEngine<M>, dt: f64) {
        if self.phase != Phase::Running || !dt.is_finite() {
            return;
        }
        self.tick_fades(engine, dt);

        let a = (dt * PITCH_SMOOTHING).clamp(0.0, 1.0);
        let prev = self.current_pitch;
        self.current_pitch = ((1.0 - a) * self.current_pitch as f64 + a * self.target_pitch as f64) as f32;
        if (self.current_pitch - prev).abs() > PITCH_EPSILON {
            engine.set_all_pitch(self.current_pitch, Some(RAGE));
            tracing::trace!(pitch = self.current_pitch, "global pitch");
        }
    }

    /// Fade `name` to `target` over `fade_ms`, starting after `delay_sec`.
    ///
    /// Overwrites whatever fade the stem had. Unknown names are ignored.
    pub fn schedule_volume(&mut self, name: &str, target: f32, delay_sec: f64, fade_ms: f32) {
        if let Some(stem) = self.stems.get_mut(name) {
            stem.schedule(target, delay_sec, fade_ms as f64 / 1000.0);
        }
    }

    /// Advance every stem's fade by `dt` seconds and push changed volumes
    pub fn tick_fades<M: MixerBackend>(&mut self, engine: &mut AudioEngine<M>, dt: f64) {
        for (name, stem) in self.stems.iter_mut() {
            if let Some(volume) = stem.tick(dt) {
                engine.set_volume(name, volume);
            }
        }
    }

    /// Snap every stem to its target and push it, skipping any fade
    pub fn apply_volumes_immediate<M: MixerBackend>(&mut self, engine: &mut AudioEngine<M>) {
        for (name, stem) in self.stems.iter_mut() {
            engine.set_volume(name, stem.settle());
        }
    }

    /// Seconds from now until the next grid line
    fn delay_until<M: MixerBackend>(&self, engine: &AudioEngine<M>, align: Align) -> f64 {
        let now = engine.now_frames();
        let grid = self.grid(engine);
        let when = match align {
            Align::Now => now,
            Align::Beat => grid.next_beat_boundary(now),
            Align::Bar => grid.next_bar_boundary(now),
        };
        if when > now {
            engine.frames_to_seconds(when - now)
        } else {
            0.0
        }
    }

    /// Switch mood and fade the five mood stems to its profile
    pub fn set_state<M: MixerBackend>(
        &mut self,
        engine: &AudioEngine<M>,
        state: MusicState,
        align_to_next_bar: bool,
        fade_ms: f32,
    ) {
        if self.phase != Phase::Running {
            return;
        }
        self.state = state;
        self.apply_state_profile(engine, state, align_to_next_bar, fade_ms);
        tracing::debug!(%state, align_to_next_bar, fade_ms, "state");
    }

    fn apply_state_profile<M: MixerBackend>(
        &mut self,
        engine: &AudioEngine<M>,
        state: MusicState,
        align_to_next_bar: bool,
        fade_ms: f32,
    ) {
        let align = if align_to_next_bar { Align::Bar } else { Align::Now };
        let delay = self.delay_until(engine, align);
        for (name, volume) in state.profile().entries() {
            self.schedule_volume(name, volume, delay, fade_ms);
        }
    }

    /// Raise bass, percussion and lead towards `rage`; never lowers them.
    ///
    /// Each stem is only rescheduled when its new level is above its current
    /// target. Lowering is left to [`set_state`](Self::set_state).
    pub fn apply_rage_shaping<M: MixerBackend>(
        &mut self,
        engine: &AudioEngine<M>,
        rage: f32,
        align_to_beat: bool,
        fade_ms: f32,
    ) {
        if self.phase != Phase::Running || !rage.is_finite() {
            return;
        }
        let rage = rage.clamp(0.0, 1.0);
        let shaped = [
            (BASS, rage),
            (PERCUSSION, rage),
            (LEAD, (rage as f64).powf(1.2) as f32),
        ];
        let align = if align_to_beat { Align::Beat } else { Align::Now };

        for (name, level) in shaped {
            if level > 0.0 && self.stem_target(name) < level {
                let delay = self.delay_until(engine, align);
                self.schedule_volume(name, level, delay, fade_ms);
            }
        }
    }

    /// Close the low-pass, ease in the breath stem and raise the target pitch.
    ///
    /// `factor` is clamped to [0, 1]. The cutoff changes immediately. The breath
    /// stem (if loaded) always fades over 200 ms with no alignment, so
    /// `align_to_beat` and `fade_ms` do not affect the result.
    pub fn set_tunnel_vision<M: MixerBackend>(
        &mut self,
        engine: &mut AudioEngine<M>,
        factor: f32,
        align_to_beat: bool,
        fade_ms: f32,
    ) {
        if self.phase != Phase::Running || !factor.is_finite() {
            return;
        }
        let factor = factor.clamp(0.0, 1.0);
        let cutoff = LOWPASS_OPEN_HZ - (LOWPASS_OPEN_HZ - LOWPASS_CLOSED_HZ) * (factor as f64).powf(TUNNEL_CURVE);
        engine.set_lowpass_cutoff(cutoff);

        let x = ((factor - EASE_START) / EASE_SPAN).clamp(0.0, 1.0);
        let ease = x * x * (3.0 - 2.0 * x);

        if self.stems.contains_key(RAGE) {
            self.schedule_volume(RAGE, ease * BREATH_MAX_VOLUME, 0.0, BREATH_FADE_MS);
            engine.set_pitch(RAGE, BREATH_PITCH_BASE + BREATH_PITCH_RANGE * ease);
        }

        self.target_pitch = PITCH_MIN + (PITCH_MAX - PITCH_MIN) * ease;
        tracing::trace!(factor, cutoff, ease, align_to_beat, fade_ms, "tunnel vision");
    }

    /// Set the rage level (clamped to [0, 1]) and apply its tunnel vision
    pub fn set_rage<M: MixerBackend>(
        &mut self,
        engine: &mut AudioEngine<M>,
        rage: f32,
        align_to_next_beat: bool,
        fade_ms: f32,
    ) {
        // clamp lets NaN through, and a NaN cutoff would poison the filter state
        if self.phase != Phase::Running || !rage.is_finite() {
            return;
        }
        self.rage = rage.clamp(0.0, 1.0);
        self.set_tunnel_vision(engine, self.rage, align_to_next_beat, fade_ms);
        tracing::debug!(rage = self.rage, "rage");
    }

    /// Fade one stem to `volume`, optionally from the next beat
    pub fn set_stem_target_volume<M: MixerBackend>(
        &mut self,
        engine: &AudioEngine<M>,
        name: &str,
        volume: f32,
        align_to_beat: bool,
        fade_ms: f32,
    ) {
        if self.phase != Phase::Running || !self.stems.contains_key(name) {
            return;
        }
        let align = if align_to_beat { Align::Beat } else { Align::Now };
        let delay = self.delay_until(engine, align);
        self.schedule_volume(name, volume, delay, fade_ms);
    }

    /// Beat and bar lengths at the engine's sample rate
    pub fn grid<M: MixerBackend>(&self, engine: &AudioEngine<M>) -> MusicalGrid {
        MusicalGrid::new(self.settings.bpm, self.settings.time_sig_numerator, engine.sample_rate())
    }

    /// `(beat_phase, bar_phase)` at the engine's current frame, zeros if it is not running
    pub fn music_clock<M: MixerBackend>(&self, engine: &AudioEngine<M>) -> (f32, f32) {
        if !engine.is_running() {
            return (0.0, 0.0);
        }
        let now = engine.now_frames();
        let grid = self.grid(engine);
        (grid.beat_phase(now), grid.bar_phase(now))
    }

    pub fn readout<M: MixerBackend>(&self, engine: &AudioEngine<M>) -> FrameReadout {
        let (beat_phase, bar_phase) = self.music_clock(engine);
        FrameReadout {
            state: self.state,
            rage: self.rage,
            beat_phase,
            bar_phase,
            drums: self.stem_volume(DRUMS),
            bass: self.stem_volume(BASS),
            percussion: self.stem_volume(PERCUSSION),
            synth: self.stem_volume(SYNTH),
            lead: self.stem_volume(LEAD),
        }
    }

    pub fn bpm(&self) -> f32 {
        self.settings.bpm
    }

    /// Takes effect on the next alignment or clock read
    pub fn set_bpm(&mut self, bpm: f32) {
        self.settings.bpm = bpm;
    }

    pub fn settings(&self) -> &DirectorSettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> MusicState {
        self.state
    }

    pub fn rage(&self) -> f32 {
        self.rage
    }

    pub fn current_pitch(&self) -> f32 {
        self.current_pitch
    }

    pub fn target_pitch(&self) -> f32 {
        self.target_pitch
    }

    /// Current volume of a stem, 0 for unknown names
    pub fn stem_volume(&self, name: &str) -> f32 {
        self.stems.get(name).map_or(0.0, Stem::current)
    }

    /// Target volume of a stem, 0 for unknown names
    pub fn stem_target(&self, name: &str) -> f32 {
        self.stems.get(name).map_or(0.0, Stem::target)
    }

    pub fn stem(&self, name: &str) -> Option<&Stem> {
        self.stems.get(name)
    }

    pub fn stem_count(&self) -> usize {
        self.stems.len()
    }
}
