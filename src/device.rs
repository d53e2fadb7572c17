//! CPAL device discovery and sink creation.
//!
//! This module provides [`CpalDevice`] for discovering and selecting audio output devices.
//!
//! # Example: List and Select a Device
//!
//! ```no_run
//! use stem_director::{CpalDevice, GraphMixer};
//!
//! // List all available output devices
//! let devices = CpalDevice::list_outputs();
//! for (i, device) in devices.iter().enumerate() {
//!     println!("[{}] {} ({} Hz, {} ch)",
//!         i, device.name(), device.sample_rate(), device.channels());
//! }
//!
//! // Use a specific device
//! let device = &devices[0];
//! let mixer = GraphMixer::new(device.sample_rate(), device.channels())
//!     .with_output(device.create_sink()?);
//! # Ok::<(), stem_director::AudioError>(())
//! ```

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::AudioResult;
use crate::nodes::CpalSink;

/// A discovered audio output device.
///
/// Use [`CpalDevice::default_output`] to get the system default, or
/// [`CpalDevice::list_outputs`] to enumerate all available devices.
pub struct CpalDevice {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
    name: String,
}

impl CpalDevice {
    fn from_device(device: cpal::Device) -> Option<Self> {
        let config = device.default_output_config().ok()?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());
        Some(Self { device, config, name })
    }

    /// Get the system's default output device.
    ///
    /// Returns `None` if no audio device is available.
    pub fn default_output() -> Option<Self> {
        let host = cpal::default_host();
        Self::from_device(host.default_output_device()?)
    }

    /// List all available audio output devices.
    ///
    /// Returns an empty list if no devices are found or if enumeration fails.
    pub fn list_outputs() -> Vec<Self> {
        let host = cpal::default_host();
        host.output_devices()
            .map(|devices| devices.filter_map(Self::from_device).collect())
            .unwrap_or_default()
    }

    /// Ask for a specific sample rate and channel count (0 keeps the device default).
    ///
    /// Falls back to the default config when the device supports no matching
    /// configuration.
    pub fn configure(mut self, sample_rate: u32, channels: u16) -> Self {
        let rate = if sample_rate == 0 { self.sample_rate() } else { sample_rate };
        let channels = if channels == 0 { self.channels() } else { channels };
        if rate == self.sample_rate() && channels == self.channels() {
            return self;
        }

        let format = self.config.sample_format();
        let matching = self.device.supported_output_configs().ok().and_then(|mut ranges| {
            ranges.find(|r| {
                r.channels() == channels
                    && r.sample_format() == format
                    && r.min_sample_rate().0 <= rate
                    && rate <= r.max_sample_rate().0
            })
        });

        match matching {
            Some(range) => self.config = range.with_sample_rate(cpal::SampleRate(rate)),
            None => tracing::warn!(
                device = %self.name,
                rate,
                channels,
                "no matching output config, using device default"
            ),
        }
        self
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the device's sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate().0
    }

    /// Get the number of output channels.
    pub fn channels(&self) -> u16 {
        self.config.channels()
    }

    /// Create a sink node that outputs audio to this device.
    ///
    /// Hand it to [`GraphMixer::with_output`](crate::mixer::GraphMixer::with_output).
    pub fn create_sink(&self) -> AudioResult<CpalSink> {
        CpalSink::new(&self.device, &self.config)
    }
}
