//! stem-director - beat-aligned stem mixing on a message-passing audio graph
//!
//! Design principles:
//! - The mixer is a node graph with a fixed sample rate and a sample-frame clock
//! - Nodes receive parameters via message ring buffers, not shared state
//! - Musical decisions (mood, rage, per-stem fades) are scheduled on beat and
//!   bar boundaries of that clock
//! - The director only talks to a [`MixerBackend`], so all of its timing logic
//!   runs against [`MockMixer`] without an audio device
//!
//! Layers, bottom up:
//! - [`nodes`] and the internal audio graph - sources, filters, sinks and the graph running them
//! - [`GraphMixer`] - the graph as a [`MixerBackend`]
//! - [`AudioEngine`] - named sounds, routes and the shared filter chain
//! - [`MusicDirector`] - moods, rage, fades and the musical clock
//!
//! ```
//! use stem_director::{AudioEngine, EngineConfig, MockMixer, MusicDirector, MusicState, StemDesc};
//!
//! let mut engine = AudioEngine::init(MockMixer::new(48000, 2), &EngineConfig::default())?;
//! let mut director = MusicDirector::default();
//! director.init(&engine)?;
//! director.load_stems(&mut engine, &[
//!     StemDesc::new("drums", "drums.flac").active(),
//!     StemDesc::new("bass", "bass.flac"),
//! ])?;
//! director.start_all_synced_looping(&mut engine)?;
//!
//! director.set_state(&engine, MusicState::Tense, false, 0.0);
//! director.update(&mut engine, 1.0 / 60.0);
//! assert_eq!(director.stem_volume("bass"), 0.9);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod graph;
mod node;

pub mod backend;
pub mod config;
#[cfg(feature = "cpal_sink")]
pub mod device;
pub mod director;
pub mod engine;
pub mod error;
pub mod mixer;
pub mod mock;
pub mod nodes;

pub use backend::MixerBackend;
pub use config::{DirectorSettings, EngineConfig, Route, SessionManifest, StemDesc};
#[cfg(feature = "cpal_sink")]
pub use device::CpalDevice;
pub use director::{FrameReadout, MusicDirector, MusicState, Phase};
pub use engine::AudioEngine;
pub use error::{AudioError, AudioResult, ConfigError, DirectorError};
pub use graph::BLOCK_SIZE;
pub use mixer::GraphMixer;
pub use mock::MockMixer;
pub use node::{AudioNode, NodeId, ProcessContext};
