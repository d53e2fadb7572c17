//! End-to-end rendering through the real graph, captured with a ring buffer sink

use std::f32::consts::TAU;
use std::path::{Path, PathBuf};

use rtrb::{Consumer, RingBuffer};
use stem_director::nodes::RtrbSink;
use stem_director::{
    AudioEngine, AudioError, DirectorSettings, EngineConfig, GraphMixer, MusicDirector, Route, StemDesc,
};

const RATE: u32 = 48000;

fn write_tone(dir: &Path, name: &str, freq: f32, seconds: f32) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    let frames = (seconds * RATE as f32) as usize;
    for i in 0..frames {
        let s = 0.5 * (TAU * freq * i as f32 / RATE as f32).sin();
        writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
    path
}

fn capture_engine() -> (AudioEngine<GraphMixer>, Consumer<f32>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (tx, rx) = RingBuffer::new(1 << 18);
    let mixer = GraphMixer::new(RATE, 2).with_output(RtrbSink::stereo(tx));
    (AudioEngine::init(mixer, &EngineConfig::default()).unwrap(), rx)
}

fn drain(rx: &mut Consumer<f32>) -> Vec<f32> {
    let mut out = Vec::with_capacity(rx.slots());
    while let Ok(s) = rx.pop() {
        out.push(s);
    }
    out
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

fn render(engine: &mut AudioEngine<GraphMixer>, frame: u64) {
    engine.backend_mut().unwrap().render_until(frame);
}

#[test]
fn synced_start_is_silent_until_its_frame() {
    let dir = tempfile::tempdir().unwrap();
    let tone = write_tone(dir.path(), "tone.wav", 440.0, 1.0);
    let (mut engine, mut rx) = capture_engine();

    engine.load_sound("tone", &tone, Route::ThroughFilter, 1.0, true, false).unwrap();
    engine.start_all_synced_at(4800, true);

    render(&mut engine, 4800);
    let before = drain(&mut rx);
    assert_eq!(before.len(), 4800 * 2);
    assert!(before.iter().all(|s| *s == 0.0));

    render(&mut engine, 9600);
    let after = drain(&mut rx);
    assert!(rms(&after) > 0.1, "rms {}", rms(&after));
}

#[test]
fn closed_lowpass_only_affects_the_filtered_route() {
    let dir = tempfile::tempdir().unwrap();
    let tone = write_tone(dir.path(), "high.wav", 5000.0, 0.5);

    let mut measured = Vec::new();
    for route in [Route::ThroughFilter, Route::Bypass] {
        let (mut engine, mut rx) = capture_engine();
        engine.load_sound("tone", &tone, route, 1.0, true, false).unwrap();
        engine.set_lowpass_cutoff(200.0);
        engine.start("tone");

        render(&mut engine, 4800);
        drain(&mut rx);
        render(&mut engine, 14400);
        measured.push(rms(&drain(&mut rx)));
    }

    let (filtered, bypassed) = (measured[0], measured[1]);
    assert!(bypassed > 0.2, "bypass rms {bypassed}");
    assert!(filtered < 0.01, "filtered rms {filtered}");
}

#[test]
fn volume_scales_output() {
    let dir = tempfile::tempdir().unwrap();
    let tone = write_tone(dir.path(), "tone.wav", 440.0, 0.5);
    let (mut engine, mut rx) = capture_engine();

    engine.load_sound("tone", &tone, Route::Bypass, 1.0, true, false).unwrap();
    engine.start("tone");
    render(&mut engine, 9600);
    let full = rms(&drain(&mut rx));

    engine.set_volume("tone", 0.25);
    render(&mut engine, 19200);
    let quiet = rms(&drain(&mut rx));
    assert!((quiet / full - 0.25).abs() < 0.02, "{quiet} / {full}");
}

#[test]
fn undecodable_file_leaves_nothing_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.wav");
    std::fs::write(&broken, b"definitely not a wave file").unwrap();
    let (mut engine, _rx) = capture_engine();

    let err = engine.load_sound("broken", &broken, Route::ThroughFilter, 1.0, true, false);
    assert!(matches!(err, Err(AudioError::Decode { ref path, .. }) if *path == broken));
    assert!(!engine.is_loaded("broken"));
    assert_eq!(engine.backend().unwrap().source_count(), 0);
}

#[test]
fn director_fades_a_stem_in_on_the_graph() {
    let dir = tempfile::tempdir().unwrap();
    let drums = write_tone(dir.path(), "drums.wav", 220.0, 1.0);
    let bass = write_tone(dir.path(), "bass.wav", 110.0, 1.0);
    let (mut engine, mut rx) = capture_engine();

    let mut director = MusicDirector::new(DirectorSettings { bpm: 120.0, ..Default::default() });
    director.init(&engine).unwrap();
    director
        .load_stems(&mut engine, &[StemDesc::new("drums", &drums), StemDesc::new("bass", &bass)])
        .unwrap();
    let start = director.start_all_synced_looping(&mut engine).unwrap();
    assert_eq!(start, 4800);

    // every stem starts silent
    render(&mut engine, 9600);
    assert!(drain(&mut rx).iter().all(|s| *s == 0.0));

    director.set_stem_target_volume(&engine, "bass", 1.0, false, 0.0);
    director.update(&mut engine, 1.0 / 60.0);
    render(&mut engine, 19200);
    assert!(rms(&drain(&mut rx)) > 0.1);

    director.shutdown();
    engine.shutdown();
    assert!(!engine.is_running());
}
