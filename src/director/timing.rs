//! Musical time on the mixer's frame clock

/// Beat and bar lengths in frames for one tempo, meter and sample rate.
///
/// Cheap to build; the director makes a fresh one for every query so tempo
/// changes apply immediately. A degenerate tempo (zero, negative, NaN, or so
/// slow that a bar does not fit in a `u64` of frames) or a zero sample rate
/// gives zero-length beats, in which case boundaries fall back to the input
/// frame and phases read 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MusicalGrid {
    frames_per_beat: u64,
    beats_per_bar: u32,
}

/// Round `frame` up to a multiple of `unit`; a frame already on a multiple is kept
#[inline]
fn ceil_to(frame: u64, unit: u64) -> u64 {
    if unit == 0 {
        return frame;
    }
    frame.div_ceil(unit).checked_mul(unit).unwrap_or(frame)
}

#[inline]
fn phase(frame: u64, unit: u64) -> f32 {
    if unit == 0 {
        return 0.0;
    }
    ((frame % unit) as f64 / unit as f64) as f32
}

impl MusicalGrid {
    pub fn new(bpm: f32, beats_per_bar: u32, sample_rate: u32) -> Self {
        let beat = if bpm.is_finite() && bpm > 0.0 {
            ((60.0 / bpm as f64) * sample_rate as f64).round()
        } else {
            0.0
        };
        // `as` saturates, so anything past u64 range would read as a real length
        let frames_per_beat = if beat < u64::MAX as f64 { beat as u64 } else { 0 };
        if frames_per_beat.checked_mul(beats_per_bar as u64).is_none() {
            return Self { frames_per_beat: 0, beats_per_bar };
        }
        Self { frames_per_beat, beats_per_bar }
    }

    #[inline]
    pub fn frames_per_beat(&self) -> u64 {
        self.frames_per_beat
    }

    #[inline]
    pub fn frames_per_bar(&self) -> u64 {
        self.frames_per_beat.saturating_mul(self.beats_per_bar as u64)
    }

    /// First beat boundary at or after `frame`
    pub fn next_beat_boundary(&self, frame: u64) -> u64 {
        ceil_to(frame, self.frames_per_beat())
    }

    /// First bar boundary at or after `frame`
    pub fn next_bar_boundary(&self, frame: u64) -> u64 {
        ceil_to(frame, self.frames_per_bar())
    }

    /// Position within the current beat, in [0, 1)
    pub fn beat_phase(&self, frame: u64) -> f32 {
        phase(frame, self.frames_per_beat())
    }

    /// Position within the current bar, in [0, 1)
    pub fn bar_phase(&self, frame: u64) -> f32 {
        phase(frame, self.frames_per_bar())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_at_120_bpm_48k() {
        let grid = MusicalGrid::new(120.0, 4, 48000);
        assert_eq!(grid.frames_per_beat(), 24000);
        assert_eq!(grid.frames_per_bar(), 96000);
    }

    #[test]
    fn frames_per_beat_rounds() {
        // 60 / 110 * 48000 = 26181.818...
        assert_eq!(MusicalGrid::new(110.0, 4, 48000).frames_per_beat(), 26182);
        // 60 / 110 * 44100 = 24054.545...
        assert_eq!(MusicalGrid::new(110.0, 3, 44100).frames_per_bar(), 24055 * 3);
    }

    #[test]
    fn boundaries_are_ceilings() {
        let grid = MusicalGrid::new(120.0, 4, 48000);
        assert_eq!(grid.next_beat_boundary(0), 0);
        assert_eq!(grid.next_beat_boundary(1), 24000);
        assert_eq!(grid.next_beat_boundary(24000), 24000);
        assert_eq!(grid.next_beat_boundary(24001), 48000);
        assert_eq!(grid.next_bar_boundary(24000), 96000);
        assert_eq!(grid.next_bar_boundary(192000), 192000);
    }

    #[test]
    fn clock_wraps_on_bar_boundary() {
        let grid = MusicalGrid::new(120.0, 4, 48000);
        assert_eq!(grid.beat_phase(96000), 0.0);
        assert_eq!(grid.bar_phase(96000), 0.0);
        assert_eq!(grid.beat_phase(12000), 0.5);
        assert_eq!(grid.bar_phase(120000), 0.25);
    }

    #[test]
    fn degenerate_tempo_disables_alignment() {
        for bpm in [0.0, -30.0, f32::NAN, f32::INFINITY] {
            let grid = MusicalGrid::new(bpm, 4, 48000);
            assert_eq!(grid.frames_per_beat(), 0);
            assert_eq!(grid.next_beat_boundary(12345), 12345);
            assert_eq!(grid.next_bar_boundary(12345), 12345);
            assert_eq!(grid.beat_phase(12345), 0.0);
            assert_eq!(grid.bar_phase(12345), 0.0);
        }
        assert_eq!(MusicalGrid::new(120.0, 4, 0).next_bar_boundary(7), 7);
    }

    #[test]
    fn tempo_too_slow_for_the_frame_counter_is_degenerate() {
        let glacial = MusicalGrid::new(1e-13, 4, 48000);
        assert_eq!(glacial.frames_per_beat(), 0);
        assert_eq!(glacial.frames_per_bar(), 0);
        assert_eq!(glacial.bar_phase(1000), 0.0);
        assert_eq!(glacial.next_bar_boundary(1000), 1000);

        // one beat fits, a bar of u32::MAX beats does not
        let wide = MusicalGrid::new(1e-6, u32::MAX, 48000);
        assert_eq!(wide.frames_per_bar(), 0);
        assert_eq!(wide.bar_phase(1000), 0.0);
        assert_eq!(wide.next_beat_boundary(1000), 1000);

        let huge_meter = MusicalGrid::new(120.0, u32::MAX, 48000);
        assert_eq!(huge_meter.frames_per_bar(), 24000 * u32::MAX as u64);
        assert_eq!(huge_meter.next_bar_boundary(1), 24000 * u32::MAX as u64);
    }

    #[test]
    fn boundary_past_the_end_of_the_counter_keeps_the_frame() {
        let grid = MusicalGrid::new(120.0, 4, 48000);
        assert_eq!(grid.next_beat_boundary(u64::MAX - 5), u64::MAX - 5);
        assert_eq!(grid.next_bar_boundary(u64::MAX), u64::MAX);
    }
}
