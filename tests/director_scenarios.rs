use stem_director::director::mood::{BASS, DRUMS, LEAD, PERCUSSION, RAGE, SYNTH};
use stem_director::{
    AudioEngine, DirectorError, DirectorSettings, EngineConfig, MockMixer, MusicDirector, MusicState, Phase, Route,
    StemDesc,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn five_stems() -> Vec<StemDesc> {
    vec![
        StemDesc::new(DRUMS, "audio/drums.flac").active(),
        StemDesc::new(BASS, "audio/bass.flac"),
        StemDesc::new(PERCUSSION, "audio/percussion.flac"),
        StemDesc::new(SYNTH, "audio/synth.flac"),
        StemDesc::new(LEAD, "audio/synth_lead.flac"),
    ]
}

fn engine() -> AudioEngine<MockMixer> {
    AudioEngine::init(MockMixer::new(48000, 2), &EngineConfig::default()).unwrap()
}

fn started(bpm: f32, stems: &[StemDesc]) -> (MusicDirector, AudioEngine<MockMixer>) {
    init_tracing();
    let mut engine = engine();
    let mut director = MusicDirector::new(DirectorSettings { bpm, ..Default::default() });
    director.init(&engine).unwrap();
    director.load_stems(&mut engine, stems).unwrap();
    director.start_all_synced_looping(&mut engine).unwrap();
    (director, engine)
}

fn mixer_volume(engine: &AudioEngine<MockMixer>, name: &str) -> f32 {
    let node = engine.node(name).unwrap();
    engine.backend().unwrap().source(node).unwrap().volume
}

#[test]
fn combat_snaps_to_profile_at_110_bpm() {
    let (mut director, mut engine) = started(110.0, &five_stems());
    assert_eq!(director.stem_volume(DRUMS), 1.0);
    assert_eq!(director.stem_volume(BASS), 0.0);

    director.set_state(&engine, MusicState::Combat, false, 0.0);
    director.tick_fades(&mut engine, 1.0 / 60.0);

    let readout = director.readout(&engine);
    assert_eq!(readout.state, MusicState::Combat);
    assert_eq!(
        (readout.drums, readout.bass, readout.percussion, readout.synth, readout.lead),
        (0.9, 0.9, 0.7, 0.6, 0.7)
    );
    for name in [DRUMS, BASS, PERCUSSION, SYNTH, LEAD] {
        assert_eq!(mixer_volume(&engine, name), director.stem_volume(name));
    }
}

#[test]
fn every_profile_is_scheduled_exactly() {
    let (mut director, mut engine) = started(120.0, &five_stems());
    for state in MusicState::ALL {
        director.set_state(&engine, state, false, 250.0);
        let profile = state.profile();
        for (name, volume) in profile.entries() {
            assert_eq!(director.stem_target(name), volume, "{state} {name}");
        }
        director.update(&mut engine, 1.0);
        for (name, volume) in profile.entries() {
            assert_eq!(director.stem_volume(name), volume, "{state} {name}");
        }
    }
}

#[test]
fn synced_start_lands_after_initial_delay() {
    init_tracing();
    let mut engine = engine();
    engine.backend_mut().unwrap().set_now(1000);
    let mut director = MusicDirector::default();
    director.init(&engine).unwrap();
    director.load_stems(&mut engine, &five_stems()).unwrap();

    let start = director.start_all_synced_looping(&mut engine).unwrap();
    // 0.10 s at 48 kHz
    assert_eq!(start, 1000 + 4800);
    for name in [DRUMS, BASS, LEAD] {
        let node = engine.node(name).unwrap();
        let source = engine.backend().unwrap().source(node).unwrap();
        assert_eq!(source.start_frame, Some(start));
        assert!(source.looping && source.streaming);
    }
    assert_eq!(mixer_volume(&engine, DRUMS), 1.0);
    assert_eq!(mixer_volume(&engine, SYNTH), 0.0);
}

#[test]
fn rage_shaping_only_raises_targets() {
    let (mut director, engine) = started(120.0, &five_stems());
    director.apply_rage_shaping(&engine, 0.8, false, 500.0);
    assert_eq!(director.stem_target(BASS), 0.8);
    assert_eq!(director.stem_target(PERCUSSION), 0.8);
    let lead = 0.8f64.powf(1.2) as f32;
    assert!((director.stem_target(LEAD) - lead).abs() < 1e-6);

    director.apply_rage_shaping(&engine, 0.3, false, 500.0);
    assert_eq!(director.stem_target(BASS), 0.8);
    assert_eq!(director.stem_target(PERCUSSION), 0.8);
    assert!((director.stem_target(LEAD) - lead).abs() < 1e-6);

    // set_state is the way down, and the last call wins
    director.set_state(&engine, MusicState::Calm, false, 500.0);
    assert_eq!(director.stem_target(BASS), 0.6);
    director.apply_rage_shaping(&engine, 0.7, false, 500.0);
    assert_eq!(director.stem_target(BASS), 0.7);
    assert_eq!(director.stem_target(DRUMS), 0.6);
}

#[test]
fn rage_shaping_aligns_each_stem_to_the_beat() {
    let (mut director, mut engine) = started(120.0, &five_stems());
    engine.backend_mut().unwrap().set_now(30000);
    director.apply_rage_shaping(&engine, 1.0, true, 0.0);

    // next beat at 48000, 0.375 s away
    director.update(&mut engine, 0.3);
    assert_eq!(director.stem_volume(BASS), 0.0);
    director.update(&mut engine, 0.1);
    assert_eq!(director.stem_volume(BASS), 1.0);
    assert_eq!(director.stem_volume(PERCUSSION), 1.0);
    assert_eq!(director.stem_volume(LEAD), 1.0);
}

#[test]
fn bar_aligned_state_waits_for_the_bar() {
    let (mut director, mut engine) = started(120.0, &five_stems());
    engine.backend_mut().unwrap().set_now(48000);
    director.set_state(&engine, MusicState::Overdrive, true, 0.0);

    // one second to the bar at 96000
    for _ in 0..59 {
        director.update(&mut engine, 1.0 / 60.0);
    }
    assert_eq!(director.stem_volume(SYNTH), 0.0);
    director.update(&mut engine, 2.0 / 60.0);
    assert_eq!(director.stem_volume(SYNTH), 0.9);
}

#[test]
fn rage_drives_filter_and_pitch_ramp() {
    let (mut director, mut engine) = started(120.0, &five_stems());
    director.set_rage(&mut engine, 2.0, true, 300.0);
    assert_eq!(director.rage(), 1.0);
    assert!((engine.lowpass_cutoff() - 1200.0).abs() < 1e-9);

    for _ in 0..240 {
        director.update(&mut engine, 1.0 / 60.0);
    }
    assert!((director.current_pitch() - 1.1).abs() < 1e-3);
    // the last push lands within one smoothing step of the target
    let drums = engine.node(DRUMS).unwrap();
    let pushed = engine.backend().unwrap().source(drums).unwrap().pitch;
    assert!(pushed > 1.08 && pushed < 1.1);

    director.set_rage(&mut engine, -1.0, false, 0.0);
    assert_eq!(director.rage(), 0.0);
    assert_eq!(engine.lowpass_cutoff(), 18000.0);
    assert_eq!(director.target_pitch(), 1.0);
}

#[test]
fn settled_pitch_is_not_resent() {
    let (mut director, mut engine) = started(120.0, &five_stems());
    let before = engine.backend().unwrap().calls().pitch;
    for _ in 0..120 {
        director.update(&mut engine, 1.0 / 60.0);
    }
    assert_eq!(engine.backend().unwrap().calls().pitch, before);

    director.set_rage(&mut engine, 1.0, false, 0.0);
    director.update(&mut engine, 1.0 / 60.0);
    let after_one = engine.backend().unwrap().calls().pitch;
    assert!(after_one > before);

    // the ramp converges, then stops pushing
    for _ in 0..600 {
        director.update(&mut engine, 1.0 / 60.0);
    }
    let converged = engine.backend().unwrap().calls().pitch;
    for _ in 0..60 {
        director.update(&mut engine, 1.0 / 60.0);
    }
    assert_eq!(engine.backend().unwrap().calls().pitch, converged);
}

#[test]
fn breath_stem_bypasses_filter_and_global_pitch() {
    let mut stems = five_stems();
    stems.push(StemDesc::new(RAGE, "audio/rage_breath.ogg").route(Route::Bypass));
    let (mut director, mut engine) = started(120.0, &stems);
    assert_eq!(engine.route(RAGE), Some(Route::Bypass));

    director.set_rage(&mut engine, 0.95, false, 0.0);
    for _ in 0..30 {
        director.update(&mut engine, 1.0 / 60.0);
    }
    assert!((director.stem_volume(RAGE) - 0.8).abs() < 1e-6);
    let rage = engine.node(RAGE).unwrap();
    assert!((engine.backend().unwrap().source(rage).unwrap().pitch - 1.3).abs() < 1e-5);
}

#[test]
fn non_finite_rage_and_dt_are_ignored() {
    let mut stems = five_stems();
    stems.push(StemDesc::new(RAGE, "audio/rage_breath.ogg").route(Route::Bypass));
    let (mut director, mut engine) = started(120.0, &stems);
    director.set_rage(&mut engine, 0.8, false, 0.0);
    let cutoff = engine.lowpass_cutoff();
    let target = director.target_pitch();
    let breath = director.stem_target(RAGE);
    let bass = director.stem_target(BASS);
    assert!(target > 1.0 && breath > 0.0);

    for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
        director.set_rage(&mut engine, bad, false, 0.0);
        director.set_tunnel_vision(&mut engine, bad, false, 0.0);
        director.apply_rage_shaping(&engine, bad, false, 0.0);
    }
    assert_eq!(director.rage(), 0.8);
    assert_eq!(engine.lowpass_cutoff(), cutoff);
    assert_eq!(director.target_pitch(), target);
    assert_eq!(director.stem_target(RAGE), breath);
    assert_eq!(director.stem_target(BASS), bass);

    director.update(&mut engine, f64::NAN);
    assert_eq!(director.current_pitch(), 1.0);
    for _ in 0..240 {
        director.update(&mut engine, 1.0 / 60.0);
    }
    assert!((director.current_pitch() - target).abs() < 1e-3);
    let drums = engine.node(DRUMS).unwrap();
    assert!(engine.backend().unwrap().source(drums).unwrap().pitch.is_finite());

    // a later valid rage still takes effect
    director.set_rage(&mut engine, 1.0, false, 0.0);
    assert!((engine.lowpass_cutoff() - 1200.0).abs() < 1e-9);
}

#[test]
fn stem_target_volume_is_clamped_and_beat_aligned() {
    let (mut director, mut engine) = started(120.0, &five_stems());
    engine.backend_mut().unwrap().set_now(12000);
    director.set_stem_target_volume(&engine, SYNTH, 3.0, true, 0.0);
    assert_eq!(director.stem_target(SYNTH), 1.0);
    director.update(&mut engine, 0.2);
    assert_eq!(director.stem_volume(SYNTH), 0.0);
    director.update(&mut engine, 0.1);
    assert_eq!(director.stem_volume(SYNTH), 1.0);
}

#[test]
fn unknown_names_are_silent_no_ops() {
    let (mut director, mut engine) = started(120.0, &five_stems());
    let count = director.stem_count();
    let before: Vec<f32> = [DRUMS, BASS].iter().map(|n| director.stem_target(n)).collect();

    director.schedule_volume("nonexistent", 0.5, 0.0, 0.0);
    director.set_stem_target_volume(&engine, "nonexistent", 0.5, false, 0.0);
    engine.set_volume("nonexistent", 0.5);
    engine.set_pitch("nonexistent", 2.0);

    assert_eq!(director.stem_count(), count);
    assert_eq!(director.stem_volume("nonexistent"), 0.0);
    assert_eq!(director.stem_target("nonexistent"), 0.0);
    assert_eq!(engine.base_volume("nonexistent"), 0.0);
    let after: Vec<f32> = [DRUMS, BASS].iter().map(|n| director.stem_target(n)).collect();
    assert_eq!(before, after);
}

#[test]
fn degenerate_bpm_disables_alignment_and_clock() {
    let (mut director, mut engine) = started(120.0, &five_stems());
    director.set_bpm(0.0);
    assert_eq!(director.bpm(), 0.0);
    engine.backend_mut().unwrap().set_now(12345);

    assert_eq!(director.music_clock(&engine), (0.0, 0.0));
    director.set_state(&engine, MusicState::Tense, true, 0.0);
    director.update(&mut engine, 1.0 / 60.0);
    assert_eq!(director.stem_volume(BASS), 0.9);
}

#[test]
fn clock_wraps_every_bar() {
    let (director, mut engine) = started(120.0, &five_stems());
    engine.backend_mut().unwrap().set_now(96000);
    assert_eq!(director.music_clock(&engine), (0.0, 0.0));
    engine.backend_mut().unwrap().set_now(96000 + 24000 + 6000);
    assert_eq!(director.music_clock(&engine), (0.25, 0.3125));
}

#[test]
fn lifecycle_guards() {
    init_tracing();
    let mut engine = engine();
    let mut director = MusicDirector::default();
    assert_eq!(director.phase(), Phase::Uninitialized);
    assert!(matches!(
        director.load_stems(&mut engine, &five_stems()),
        Err(DirectorError::NotInitialized)
    ));

    director.init(&engine).unwrap();
    assert_eq!(director.phase(), Phase::Idle);
    assert!(matches!(director.start_all_synced_looping(&mut engine), Err(DirectorError::NoStems)));

    // nothing moves before running
    director.load_stems(&mut engine, &five_stems()).unwrap();
    director.set_state(&engine, MusicState::Overdrive, false, 0.0);
    director.update(&mut engine, 1.0);
    assert_eq!(director.state(), MusicState::Calm);
    assert_eq!(director.stem_volume(BASS), 0.0);

    director.start_all_synced_looping(&mut engine).unwrap();
    assert_eq!(director.phase(), Phase::Running);
    assert!(matches!(
        director.load_stems(&mut engine, &five_stems()),
        Err(DirectorError::InvalidPhase(Phase::Running))
    ));

    director.shutdown();
    director.shutdown();
    assert_eq!(director.phase(), Phase::Shutdown);
    assert_eq!(director.stem_count(), 0);
    director.update(&mut engine, 1.0);
    assert!(matches!(
        director.start_all_synced_looping(&mut engine),
        Err(DirectorError::InvalidPhase(Phase::Shutdown))
    ));
}

#[test]
fn init_needs_a_running_engine() {
    let mut engine = engine();
    engine.shutdown();
    let mut director = MusicDirector::default();
    assert!(matches!(director.init(&engine), Err(DirectorError::EngineUnavailable)));
}

#[test]
fn failed_stem_stops_loading() {
    init_tracing();
    let mut engine = AudioEngine::init(
        MockMixer::new(48000, 2).unreadable("audio/percussion.flac"),
        &EngineConfig::default(),
    )
    .unwrap();
    let mut director = MusicDirector::default();
    director.init(&engine).unwrap();

    let err = director.load_stems(&mut engine, &five_stems()).unwrap_err();
    assert!(matches!(err, DirectorError::Load { ref name, .. } if name == PERCUSSION));
    assert_eq!(director.stem_count(), 2);
    assert!(!engine.is_loaded(PERCUSSION));
    assert!(!engine.is_loaded(SYNTH));
}
