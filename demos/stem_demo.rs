//! Plays a stem session through the default output and walks it through every mood
//!
//! Run with: cargo run --example stem_demo --features cpal_sink -- [session.yaml]
//!
//! Without a manifest the built-in five-stem session is used, which expects
//! `audio/drums.flac`, `audio/bass.flac`, ... in the working directory.

use std::thread::sleep;
use std::time::{Duration, Instant};

use stem_director::{AudioEngine, CpalDevice, MusicDirector, MusicState, SessionManifest};

const FRAME: Duration = Duration::from_micros(16_667);
/// Length of one pass through the script, in seconds
const SCRIPT_LEN: f64 = 48.0;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let manifest = match std::env::args().nth(1) {
        Some(path) => SessionManifest::load(path)?,
        None => SessionManifest::demo(),
    };

    for device in CpalDevice::list_outputs() {
        tracing::info!(device = device.name(), "output device available");
    }

    let mut engine = AudioEngine::open(&manifest.engine)?;
    let mut director = MusicDirector::new(manifest.director.clone());
    director.init(&engine)?;
    director.load_stems(&mut engine, &manifest.stems)?;
    let start_frame = director.start_all_synced_looping(&mut engine)?;
    tracing::info!(start_frame, bpm = director.bpm(), "playing, Ctrl+C to stop");

    let started = Instant::now();
    let mut last = started;
    let mut script_pos = 0.0f64;
    let mut last_bar_phase = 0.0f32;

    loop {
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f64();
        last = now;

        if let Some(mixer) = engine.backend_mut() {
            mixer.pump(dt);
        }

        let prev = script_pos;
        script_pos = (script_pos + dt) % SCRIPT_LEN;
        let crossed = |t: f64| (prev < t && script_pos >= t) || (script_pos < prev && t == 0.0);

        if crossed(0.0) {
            director.set_state(&engine, MusicState::Calm, true, 2000.0);
            director.set_rage(&mut engine, 0.0, false, 0.0);
        }
        if crossed(8.0) {
            director.set_state(&engine, MusicState::Tense, true, 1500.0);
        }
        if crossed(16.0) {
            director.set_state(&engine, MusicState::Combat, true, 800.0);
        }
        if (20.0..28.0).contains(&script_pos) {
            let rage = ((script_pos - 20.0) / 8.0) as f32;
            director.set_rage(&mut engine, rage, true, 400.0);
            director.apply_rage_shaping(&engine, rage, true, 400.0);
        }
        if crossed(28.0) {
            director.set_state(&engine, MusicState::Overdrive, true, 400.0);
        }
        if crossed(40.0) {
            director.set_rage(&mut engine, 0.0, false, 0.0);
            director.set_state(&engine, MusicState::Tense, true, 3000.0);
        }

        director.update(&mut engine, dt);

        let readout = director.readout(&engine);
        if readout.bar_phase < last_bar_phase {
            tracing::info!(
                elapsed_s = started.elapsed().as_secs_f64(),
                state = %readout.state,
                rage = readout.rage,
                drums = readout.drums,
                bass = readout.bass,
                percussion = readout.percussion,
                synth = readout.synth,
                lead = readout.lead,
                lowpass_hz = engine.lowpass_cutoff().round(),
                "bar"
            );
        }
        last_bar_phase = readout.bar_phase;

        sleep(FRAME);
    }
}
