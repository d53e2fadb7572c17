//! Audio source nodes (stem players with no audio inputs)

mod player;
#[cfg(feature = "vorbis_src")]
mod stream;

pub use player::SamplePlayer;
#[cfg(feature = "vorbis_src")]
pub use stream::OggStream;

/// Messages to control a stem source.
///
/// Both [`SamplePlayer`] and the streaming Ogg source understand the same set,
/// so a mixer can drive either without knowing which one it holds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SourceMessage {
    /// Start or resume playback immediately.
    Start,
    /// Start playback once the graph clock reaches the given frame.
    StartAt(u64),
    /// Stop playback, keeping the position.
    Stop,
    /// Move the read position to a source frame.
    Seek(u64),
    /// Linear volume, 0.0 to 1.0.
    SetVolume(f32),
    /// Playback rate multiplier (1.0 = original speed and pitch).
    SetPitch(f32),
    /// Stereo balance, -1.0 (left) to 1.0 (right).
    SetPan(f32),
    /// Enable or disable looping.
    SetLooping(bool),
}

/// Minimum playback rate; zero or negative rates would stall or reverse a source.
pub const MIN_PITCH: f32 = 0.01;

/// Playback state shared by every source implementation
#[derive(Clone, Debug)]
pub(crate) struct Transport {
    pub playing: bool,
    pub start_frame: Option<u64>,
    pub volume: f32,
    pub pitch: f32,
    pub pan: f32,
    pub looping: bool,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            playing: false,
            start_frame: None,
            volume: 1.0,
            pitch: 1.0,
            pan: 0.0,
            looping: false,
        }
    }
}

impl Transport {
    /// Apply a message; returns the seek target if the message was a seek
    pub fn apply(&mut self, msg: SourceMessage) -> Option<u64> {
        match msg {
            SourceMessage::Start => {
                self.playing = true;
                self.start_frame = None;
            }
            SourceMessage::StartAt(frame) => {
                self.playing = true;
                self.start_frame = Some(frame);
            }
            SourceMessage::Stop => self.playing = false,
            SourceMessage::Seek(frame) => return Some(frame),
            SourceMessage::SetVolume(v) => self.volume = v.clamp(0.0, 1.0),
            SourceMessage::SetPitch(p) => self.pitch = p.max(MIN_PITCH),
            SourceMessage::SetPan(p) => self.pan = p.clamp(-1.0, 1.0),
            SourceMessage::SetLooping(l) => self.looping = l,
        }
        None
    }

    /// Whether the source produces sound at the given absolute graph frame
    #[inline]
    pub fn audible_at(&self, frame: u64) -> bool {
        self.playing && self.start_frame.map_or(true, |start| frame >= start)
    }

    /// Source frames consumed per output frame
    #[inline]
    pub fn step(&self, source_rate: u32, output_rate: u32) -> f64 {
        if output_rate == 0 {
            return 0.0;
        }
        self.pitch as f64 * source_rate as f64 / output_rate as f64
    }

    /// Volume times balance gain for one output channel
    #[inline]
    pub fn channel_gain(&self, channel: usize, out_channels: usize) -> f32 {
        if out_channels < 2 {
            return self.volume;
        }
        let balance = match channel {
            0 if self.pan > 0.0 => 1.0 - self.pan,
            1 if self.pan < 0.0 => 1.0 + self.pan,
            _ => 1.0,
        };
        self.volume * balance
    }
}
