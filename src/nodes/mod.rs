//! Built-in audio nodes.
//!
//! Nodes are organized into three categories:
//!
//! ## Sources ([`source`])
//!
//! Stem players with no audio inputs:
//! - [`SamplePlayer`] - Play pre-decoded audio samples
//! - [`OggStream`] - Decode an Ogg Vorbis file while playing (requires `vorbis_src` feature)
//!
//! ## Effects ([`effect`])
//!
//! Process audio (inputs → outputs):
//! - [`Filter`] - Shared low-pass / high-pass filter
//! - [`Mixer`] - Sum multiple inputs together, the output endpoint
//!
//! ## Sinks ([`sink`])
//!
//! Consume audio with no audio outputs:
//! - [`CpalSink`] - Output to system audio device (requires `cpal_sink` feature)
//! - [`RtrbSink`] - Write to ring buffer (headless rendering, capture)
//!
//! # Message Types
//!
//! - [`SourceMessage`] - Transport and mix controls for every source
//! - [`FilterMessage`] - Retune a [`Filter`]
//!
//! Nodes without parameters (like [`Mixer`]) use `()` as their message type.

pub mod source;
pub mod effect;
pub mod sink;

pub use source::{SamplePlayer, SourceMessage, MIN_PITCH};
#[cfg(feature = "vorbis_src")]
pub use source::OggStream;
pub use effect::{Filter, FilterKind, FilterMessage, Mixer};
pub use sink::{OutputSink, RtrbSink, SinkStats};

#[cfg(feature = "cpal_sink")]
pub use sink::CpalSink;
