//! Moods and the stem mix each one calls for

use std::fmt;

use serde::{Deserialize, Serialize};

pub const DRUMS: &str = "drums";
pub const BASS: &str = "bass";
pub const PERCUSSION: &str = "percussion";
pub const SYNTH: &str = "synth";
pub const LEAD: &str = "lead";
/// Optional one-shot breath stem driven by tunnel vision
pub const RAGE: &str = "rage";

/// Discrete intensity level of the music, in increasing order.
///
/// Any state may follow any other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MusicState {
    #[default]
    Calm,
    Tense,
    Combat,
    Overdrive,
}

/// Target volumes of the five mood-driven stems
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixProfile {
    pub drums: f32,
    pub bass: f32,
    pub percussion: f32,
    pub synth: f32,
    pub lead: f32,
}

impl MixProfile {
    /// Stem names with their volumes, in the order they get scheduled
    pub fn entries(&self) -> [(&'static str, f32); 5] {
        [
            (PERCUSSION, self.percussion),
            (BASS, self.bass),
            (DRUMS, self.drums),
            (SYNTH, self.synth),
            (LEAD, self.lead),
        ]
    }
}

impl MusicState {
    pub const ALL: [MusicState; 4] = [
        MusicState::Calm,
        MusicState::Tense,
        MusicState::Combat,
        MusicState::Overdrive,
    ];

    /// Position in [`ALL`](Self::ALL), the value handed to shaders
    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            MusicState::Calm => "Calm",
            MusicState::Tense => "Tense",
            MusicState::Combat => "Combat",
            MusicState::Overdrive => "Overdrive",
        }
    }

    pub fn profile(self) -> MixProfile {
        let (drums, bass, percussion, synth, lead) = match self {
            MusicState::Calm => (0.6, 0.6, 0.0, 0.0, 0.0),
            MusicState::Tense => (0.9, 0.9, 0.0, 0.2, 0.0),
            MusicState::Combat => (0.9, 0.9, 0.7, 0.6, 0.7),
            MusicState::Overdrive => (1.0, 1.0, 1.0, 0.9, 1.0),
        };
        MixProfile { drums, bass, percussion, synth, lead }
    }
}

impl fmt::Display for MusicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
