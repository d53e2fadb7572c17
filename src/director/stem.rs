//! Per-stem volume fades

/// Where a stem is in its current fade
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fade {
    /// At its target, nothing to do
    Settled,
    /// Waiting for a scheduled start, `remaining` seconds to go
    Pending { remaining: f64 },
    /// Moving towards the target, `elapsed` seconds in
    Fading { elapsed: f64 },
}

/// A named track's volume and the fade driving it.
///
/// Volumes stay in [0, 1]. A fade is linear from the volume the stem had when
/// it was scheduled to its target, and lands on the target exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct Stem {
    current: f32,
    start: f32,
    target: f32,
    /// Fade length in seconds; zero or less is an instant change
    duration: f64,
    fade: Fade,
}

impl Stem {
    pub fn new(volume: f32) -> Self {
        let volume = volume.clamp(0.0, 1.0);
        Self {
            current: volume,
            start: volume,
            target: volume,
            duration: 0.0,
            fade: Fade::Settled,
        }
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    #[inline]
    pub fn fade(&self) -> Fade {
        self.fade
    }

    /// Fade from the current volume to `target` over `duration` seconds,
    /// starting `delay` seconds from now. Replaces any fade in progress.
    pub fn schedule(&mut self, target: f32, delay: f64, duration: f64) {
        self.start = self.current;
        self.target = target.clamp(0.0, 1.0);
        self.duration = duration;
        self.fade = if delay > 0.0 {
            Fade::Pending { remaining: delay }
        } else {
            Fade::Fading { elapsed: 0.0 }
        };
    }

    /// Advance by `dt` seconds; returns the new volume when it should be pushed
    pub fn tick(&mut self, dt: f64) -> Option<f32> {
        let elapsed = match self.fade {
            Fade::Settled => return None,
            Fade::Pending { remaining } => {
                let remaining = remaining - dt;
                if remaining > 0.0 {
                    self.fade = Fade::Pending { remaining };
                    return None;
                }
                // the delay ran out during this tick; the fade itself starts from zero
                0.0
            }
            Fade::Fading { elapsed } => elapsed,
        };

        if self.duration <= 0.0 {
            return Some(self.settle());
        }

        if self.current == self.target {
            self.fade = Fade::Settled;
            return None;
        }

        let elapsed = elapsed + dt;
        let t = elapsed / self.duration;
        if t >= 1.0 {
            return Some(self.settle());
        }

        self.current = ((1.0 - t) * self.start as f64 + t * self.target as f64) as f32;
        self.fade = Fade::Fading { elapsed };
        Some(self.current)
    }

    /// Jump to the target and drop any fade
    pub fn settle(&mut self) -> f32 {
        self.current = self.target;
        self.start = self.target;
        self.fade = Fade::Settled;
        self.current
    }
}
