//! # Multi-Tap Delay — A Four-Tap Feedback Delay (AU/VST3/CLAP)
//!
//! A stereo delay with four read heads spread out behind a shared write
//! head, a feedback path that regenerates the tap sum, and one-pole
//! smoothing so that delay time, spread and mix can be swept without
//! clicks.
//!
//! The crate has two layers:
//!
//! - [`DelayEngine`] is the real-time core. It knows nothing about plugin
//!   formats: a host calls [`DelayEngine::prepare`] with a sample rate, then
//!   [`DelayEngine::process_block`] with stereo slices, and the engine polls
//!   its four parameters through a [`ParamSource`].
//! - [`MultiTapDelay`] is a thin nih-plug shell that exposes the engine as
//!   a CLAP/VST3 plugin (and AUv2 through clap-wrapper).
//!
//! ## Signal Flow
//!
//! ```text
//! Input ──┬───────────────────────────────────────── × (1 - mix) ──┐
//!         │                                                        │
//!         └──►(+)──► [ circular buffer ] ──► 4 taps ──► Σ weights  │
//!              ▲                                           │       │
//!              └─────────────── × feedback ◄───────────────┤       │
//!                                                          │       │
//!                                                          └ × mix►(+)──► Output
//! ```
//!
//! ## Persistence
//!
//! Inside a DAW, nih-plug saves and restores the four [`PluginParams`] by
//! their parameter IDs (`drywet`, `feedback`, `delaytime`, `spread`), so the
//! plugin shell needs no state code of its own. Those IDs are the same
//! attribute names the [`state`] module writes into its `MultiTapDelay`
//! container. That container is for hosts driving the engine with
//! [`DelayParams`] ([`DelayEngine::get_state`] / [`DelayEngine::set_state`]),
//! and for exporting the plugin's current settings with [`state::encode`].
//!
//! ## Using the engine directly
//!
//! ```
//! use std::sync::Arc;
//! use multitap_delay::{DelayEngine, DelayParams, ParamId, ParamStore, MAX_DELAY_TIME};
//!
//! let params = Arc::new(DelayParams::default());
//! let mut engine = DelayEngine::new(Arc::clone(&params));
//! engine.prepare(48_000.0, f64::from(MAX_DELAY_TIME)).unwrap();
//!
//! params.set_value(ParamId::DryWet, 0.3);
//!
//! let mut left = vec![0.0_f32; 512];
//! let mut right = vec![0.0_f32; 512];
//! engine.process_block(&mut [&mut left[..], &mut right[..]]).unwrap();
//! ```

pub mod dsp;
pub mod error;
pub mod params;
pub mod state;

use std::num::NonZeroU32;
use std::sync::Arc;

use nih_plug::prelude::*;

pub use dsp::engine::{DelayEngine, EngineConfig};
pub use dsp::smoother::Smoothing;
pub use error::{EngineError, StateError};
pub use params::{DelayParams, ParamId, ParamSource, ParamStore, PluginParams, MAX_DELAY_TIME};
pub use state::{DelayState, StateContainer, STATE_TAG};

/// The plugin shell.
///
/// Parameters live in an `Arc` shared with the host; the engine reads them
/// through the same `Arc` on the audio thread. Everything else (buffers,
/// heads, smoothers) is owned by the engine and only touched in
/// `initialize()`, `reset()` and `process()`, which the host never runs
/// concurrently.
///
/// Host sessions persist the parameters through nih-plug by ID. See the
/// crate-level notes on persistence for how this relates to the
/// [`StateContainer`] blob.
pub struct MultiTapDelay {
    params: Arc<PluginParams>,
    engine: DelayEngine<PluginParams>,
}

impl Default for MultiTapDelay {
    fn default() -> Self {
        let params = Arc::new(PluginParams::default());
        Self {
            engine: DelayEngine::new(Arc::clone(&params)),
            params,
        }
    }
}

impl MultiTapDelay {
    pub fn engine(&self) -> &DelayEngine<PluginParams> {
        &self.engine
    }
}

impl Plugin for MultiTapDelay {
    const NAME: &'static str = "Multi-Tap Delay";
    const VENDOR: &'static str = "Loveless Audio";
    const URL: &'static str = "";
    const EMAIL: &'static str = "steve.loveless@gmail.com";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    // The tap arithmetic is written for exactly two channels, so stereo is
    // the only layout offered.
    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[AudioIOLayout {
        main_input_channels: NonZeroU32::new(2),
        main_output_channels: NonZeroU32::new(2),
        aux_input_ports: &[],
        aux_output_ports: &[],
        names: PortNames::const_default(),
    }];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;

    // The engine polls parameters every sample, so sample-accurate
    // automation lands on the exact frame it was scheduled for.
    const SAMPLE_ACCURATE_AUTOMATION: bool = true;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    /// Allocate the circular buffers for the host's sample rate.
    ///
    /// Returning `false` tells the host this configuration can't be used.
    fn initialize(
        &mut self,
        _audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        let sample_rate = f64::from(buffer_config.sample_rate);
        match self.engine.prepare(sample_rate, f64::from(MAX_DELAY_TIME)) {
            Ok(()) => true,
            Err(err) => {
                nih_error!("failed to prepare multi-tap delay: {err}");
                false
            }
        }
    }

    /// Playback stopped: drop any echoes still in flight.
    fn reset(&mut self) {
        self.engine.reset();
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        if self.engine.process_block(buffer.as_slice()).is_err() {
            // Only reachable if the host ignored AUDIO_IO_LAYOUTS or skipped
            // initialize(). Logging here would allocate.
            return ProcessStatus::Error("multi-tap delay received an unusable buffer");
        }

        // Keep the host calling process() while echoes are still decaying.
        ProcessStatus::Tail(self.engine.tail_samples())
    }
}

impl ClapPlugin for MultiTapDelay {
    const CLAP_ID: &'static str = "com.loveless-audio.multitap-delay";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("A four-tap stereo feedback delay with tap spread");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Stereo,
        ClapFeature::Delay,
    ];
}

impl Vst3Plugin for MultiTapDelay {
    // `*b"..."` turns the 16-character ASCII literal into a `[u8; 16]`.
    const VST3_CLASS_ID: [u8; 16] = *b"LvlssMultiTapDly";

    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Delay];
}

nih_export_clap!(MultiTapDelay);
nih_export_vst3!(MultiTapDelay);

// AUv2 entry point for hosts that only load Audio Units.
clap_wrapper::export_auv2!();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_starts_unprepared() {
        let plugin = MultiTapDelay::default();
        assert!(!plugin.engine().is_prepared());
        assert_eq!(plugin.engine().buffer_len(), 0);
    }

    #[test]
    fn test_plugin_params_drive_engine() {
        let plugin = MultiTapDelay::default();
        let mut engine = DelayEngine::new(Arc::clone(&plugin.params));
        engine.prepare(44_100.0, f64::from(MAX_DELAY_TIME)).unwrap();

        let mut left = vec![0.25_f32; 64];
        let mut right = vec![-0.25_f32; 64];
        engine
            .process_block(&mut [&mut left[..], &mut right[..]])
            .unwrap();

        // Default mix is 0.5 and the 1 s delay has not come round yet.
        assert!(left.iter().all(|s| (*s - 0.125).abs() < 1e-6));
        assert!(right.iter().all(|s| (*s + 0.125).abs() < 1e-6));
    }

    #[test]
    fn test_host_ids_match_state_attributes() {
        let params = PluginParams::default();
        let ids: Vec<String> = params.param_map().into_iter().map(|(id, _, _)| id).collect();
        for id in ParamId::ALL {
            assert!(ids.iter().any(|host_id| host_id == id.attribute()));
        }
    }

    #[test]
    fn test_state_from_plugin_params() {
        let params = PluginParams::default();
        let blob = state::encode(&params).unwrap();
        let restored = DelayParams::default();
        assert_eq!(state::restore(&restored, &blob), 4);
        assert_eq!(restored.spread(), params.spread());
    }

    /// What nih-plug persists by ID and what the container carries are the
    /// same four values.
    #[test]
    fn test_plugin_params_export_matches_snapshot() {
        let plugin = MultiTapDelay::default();
        let snapshot = DelayState::capture(plugin.params.as_ref());
        assert_eq!(snapshot, DelayState::default());

        let blob = state::encode(plugin.params.as_ref()).unwrap();
        let container = state::decode(&blob).unwrap();
        for (id, _, _) in plugin.params.param_map() {
            let id = ParamId::from_attribute(&id).unwrap();
            assert_eq!(container.attribute(id), Some(f64::from(snapshot.get(id))));
        }
    }
}
