//! # Multi-Tap Delay Engine
//!
//! Four read heads trail a single write head through a pair of circular
//! buffers. Their outputs are weighted, summed, mixed with the dry input,
//! and fed back into the next write.
//!
//! ```text
//!                    ┌──────────── × feedback ◄──────────────┐
//!                    ▼                                       │
//! Input ──┬──────►( + )──► [ circular buffer ]               │
//!         │                  │    │    │    │                │
//!         │                 tap1 tap2 tap3 tap4              │
//!         │                 ×0.3 ×0.6 ×-0.2 ×0.1             │
//!         │                  └────┴──(+)──┘                  │
//!         │                           │ wet ─────────────────┘
//!         │                           ▼
//!         └── × (1 - mix) ──────────►( + )◄── × mix
//!                                     │
//!                                  Output
//! ```
//!
//! Tap positions, relative to the write head:
//!
//! ```text
//! tap1 = write_head - delay_in_samples
//! tap2 = tap1 + 2  * spread
//! tap3 = tap1 + 7  * spread
//! tap4 = tap1 + 11 * spread
//! ```
//!
//! The weights sum to 0.8, leaving headroom so four coincident taps
//! (spread = 0) do not build up faster than a single tap would.
//!
//! ## Real-time rules
//!
//! `process_block()` never allocates, locks or logs. Every precondition is
//! checked up front; once the loop starts, the block always completes.

use std::sync::Arc;

use nih_plug::{nih_debug_assert, nih_log};

use super::delay_line::{wrap_advance, StereoBuffer};
use super::smoother::{OnePoleSmoother, Smoothing};
use crate::error::{EngineError, StateError};
use crate::params::{ParamSource, ParamStore};
use crate::state;

/// Offset of each tap from the first, in units of `spread` samples.
pub const TAP_MULTIPLIERS: [f64; 4] = [0.0, 2.0, 7.0, 11.0];

/// Gain of each tap in the wet sum.
pub const TAP_WEIGHTS: [f32; 4] = [0.3, 0.6, -0.2, 0.1];

/// The engine processes exactly two channels.
pub const CHANNELS: usize = 2;

/// Construction-time choices that are not user parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineConfig {
    /// How fast delay time, dry/wet and spread chase their targets. The
    /// coefficient is derived from this at every `prepare()`, so a
    /// time-constant setting follows sample-rate changes.
    pub smoothing: Smoothing,
}

/// `process_block()` is only legal in `Prepared`. `prepare()` moves
/// `Unprepared` to `Prepared`, or re-initialises within `Prepared`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Lifecycle {
    Unprepared,
    Prepared {
        sample_rate: f64,
        max_delay_seconds: f64,
    },
}

/// The real-time multi-tap delay.
///
/// The engine polls its parameters from a shared [`ParamSource`] once per
/// sample and owns everything else: buffers, heads, smoothers and the
/// feedback carried between frames.
pub struct DelayEngine<P: ParamSource> {
    /// Parameters shared with the control thread. Only ever read here.
    params: Arc<P>,
    config: EngineConfig,
    lifecycle: Lifecycle,

    /// Left/right circular buffers and the shared write head.
    buffers: StereoBuffer,

    /// Smoothed delay time in seconds. Sweeping it moves all four read
    /// heads, so without smoothing every knob move would click.
    time: OnePoleSmoother,
    /// Smoothed dry/wet mix, 0 = dry only, 1 = wet only.
    dry_wet: OnePoleSmoother,
    /// Smoothed tap spread, in samples per unit of tap multiplier.
    spread: OnePoleSmoother,

    /// Last wet sample per channel, already scaled by feedback.
    feedback: [f32; CHANNELS],
}

impl<P: ParamSource> DelayEngine<P> {
    /// Create an unprepared engine with the default (per-sample α = 1e-4)
    /// smoothing. Call [`prepare`](Self::prepare) before processing.
    pub fn new(params: Arc<P>) -> Self {
        Self::with_config(params, EngineConfig::default())
    }

    /// Create an unprepared engine with explicit construction choices.
    ///
    /// Nothing is allocated until `prepare()`: the buffer length depends on
    /// the sample rate, which only the host knows.
    pub fn with_config(params: Arc<P>, config: EngineConfig) -> Self {
        Self {
            params,
            config,
            lifecycle: Lifecycle::Unprepared,
            buffers: StereoBuffer::default(),
            time: OnePoleSmoother::default(),
            dry_wet: OnePoleSmoother::default(),
            spread: OnePoleSmoother::default(),
            feedback: [0.0; CHANNELS],
        }
    }

    /// The shared parameter source the engine polls every sample.
    pub fn params(&self) -> &Arc<P> {
        &self.params
    }

    /// The construction-time configuration.
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// True once `prepare()` has succeeded at least once.
    pub fn is_prepared(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Prepared { .. })
    }

    /// The sample rate passed to the last successful `prepare()`, or
    /// `None` while unprepared.
    pub fn sample_rate(&self) -> Option<f64> {
        match self.lifecycle {
            Lifecycle::Prepared { sample_rate, .. } => Some(sample_rate),
            Lifecycle::Unprepared => None,
        }
    }

    /// Length of each channel's circular buffer, 0 before `prepare()`.
    pub fn buffer_len(&self) -> usize {
        self.buffers.len()
    }

    /// Read-only view of the circular buffers, mainly for inspection in
    /// tests and meters.
    pub fn buffers(&self) -> &StereoBuffer {
        &self.buffers
    }

    /// The per-channel sample that will be added to the next write:
    /// the last wet sample times the feedback amount.
    pub fn feedback_state(&self) -> [f32; CHANNELS] {
        self.feedback
    }

    /// Allocate (or re-zero) the buffers for `sample_rate` and
    /// `max_delay_seconds`, rewind the write head, and snap the smoothers
    /// to the current parameter values.
    ///
    /// Any delayed audio is discarded. Must not run concurrently with
    /// `process_block()`; the host stops processing first.
    pub fn prepare(
        &mut self,
        sample_rate: f64,
        max_delay_seconds: f64,
    ) -> Result<(), EngineError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(EngineError::InvalidSampleRate(sample_rate));
        }
        if !max_delay_seconds.is_finite() || max_delay_seconds <= 0.0 {
            return Err(EngineError::InvalidMaxDelay(max_delay_seconds));
        }

        let len = (sample_rate * max_delay_seconds).floor() as usize;
        if len == 0 {
            return Err(EngineError::EmptyBuffer {
                sample_rate,
                max_delay_seconds,
            });
        }

        self.buffers.allocate(len);
        self.feedback = [0.0; CHANNELS];

        let coefficient = self.config.smoothing.coefficient(sample_rate);
        for smoother in [&mut self.time, &mut self.dry_wet, &mut self.spread] {
            smoother.set_coefficient(coefficient);
        }
        self.time.reset(f64::from(self.params.delay_time()).min(max_delay_seconds));
        self.dry_wet.reset(f64::from(self.params.dry_wet()));
        self.spread.reset(f64::from(self.params.spread()));

        self.lifecycle = Lifecycle::Prepared {
            sample_rate,
            max_delay_seconds,
        };

        nih_log!(
            "multi-tap delay prepared: {sample_rate} Hz, {len} samples per channel, smoothing α = {coefficient}"
        );

        Ok(())
    }

    /// Silence the buffers and feedback path without reallocating. The
    /// smoothers keep their positions.
    pub fn reset(&mut self) {
        self.buffers.clear();
        self.feedback = [0.0; CHANNELS];
    }

    /// Process one stereo block in place.
    ///
    /// `channels` must hold exactly two slices of equal length (left,
    /// right), which is what nih-plug's `Buffer::as_slice()` yields for a
    /// stereo layout. An empty block is a no-op.
    pub fn process_block(&mut self, channels: &mut [&mut [f32]]) -> Result<(), EngineError> {
        if !self.is_prepared() {
            return Err(EngineError::Unprepared);
        }

        let actual = channels.len();
        let [left, right] = channels else {
            return Err(EngineError::ChannelCount {
                expected: CHANNELS,
                actual,
            });
        };

        if left.len() != right.len() {
            return Err(EngineError::ChannelLengthMismatch {
                left: left.len(),
                right: right.len(),
            });
        }

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            (*l, *r) = self.next_frame(*l, *r);
        }

        Ok(())
    }

    /// Process a single frame.
    pub fn process_frame(&mut self, left: f32, right: f32) -> Result<(f32, f32), EngineError> {
        if !self.is_prepared() {
            return Err(EngineError::Unprepared);
        }
        Ok(self.next_frame(left, right))
    }

    /// How many samples the feedback tail needs to fall below -60 dB,
    /// for reporting to the host. Zero before `prepare()`.
    pub fn tail_samples(&self) -> u32 {
        let Lifecycle::Prepared { sample_rate, .. } = self.lifecycle else {
            return 0;
        };

        let delay_samples = self.time.current() * sample_rate;
        let loop_gain = f64::from(TAP_WEIGHTS.iter().sum::<f32>() * self.params.feedback());

        let samples = if loop_gain > 0.001 {
            let repeats = -3.0 / loop_gain.log10(); // log10(0.001) = -3
            repeats * delay_samples
        } else {
            delay_samples
        };

        samples.min(f64::from(u32::MAX)) as u32
    }

    /// One frame of the algorithm. Only called once the engine is prepared.
    #[inline]
    fn next_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        let Lifecycle::Prepared {
            sample_rate,
            max_delay_seconds,
        } = self.lifecycle
        else {
            return (left, right);
        };

        // ═══════════════════════════════════════════════════════
        // THE MULTI-TAP ALGORITHM — 6 steps per frame
        // ═══════════════════════════════════════════════════════

        // Step 1: SMOOTH the controls that move the read heads or the mix.
        //
        // Delay time, dry/wet and spread each close a fraction α of the gap
        // to their raw target. The delay-time target is also held inside
        // the buffer that `prepare()` actually allocated.
        //
        // Feedback is NOT smoothed: it only scales the next write, so a
        // jump in feedback changes loudness of later repeats but never
        // causes a discontinuity in the current output.
        let time_target = f64::from(self.params.delay_time()).min(max_delay_seconds);
        let time = self.time.next(time_target);
        let dry_wet = self.dry_wet.next(f64::from(self.params.dry_wet())) as f32;
        let spread = self.spread.next(f64::from(self.params.spread()));
        let feedback = self.params.feedback();

        // Seconds → samples. Usually fractional, hence interpolated reads.
        let delay_in_samples = sample_rate * time;

        // Step 2: WRITE input plus last frame's feedback at the write head.
        //
        // Left and right are independent: nothing crosses between channels.
        let write_head = self.buffers.write_head();
        self.buffers.write(left + self.feedback[0], right + self.feedback[1]);

        // Step 3: READ the four taps.
        //
        // The first tap sits `delay_in_samples` behind the write head; the
        // others move 2, 7 and 11 spreads closer to it. Each position goes
        // through `wrap_advance`, which folds it into the ring and nudges it
        // one step forward to account for the write we just did.
        let len = self.buffers.len();
        let first_tap = write_head as f64 - delay_in_samples;

        let mut wet_left = 0.0;
        let mut wet_right = 0.0;
        for (multiplier, weight) in TAP_MULTIPLIERS.into_iter().zip(TAP_WEIGHTS) {
            let position = wrap_advance(first_tap + multiplier * spread, len);
            nih_debug_assert!((0.0..len as f64).contains(&position));

            let (tap_left, tap_right) = self.buffers.read(position);
            wet_left += weight * tap_left;
            wet_right += weight * tap_right;
        }

        // Step 4: FEEDBACK. The weighted tap sum, scaled by the raw feedback
        // amount, is held until the next frame's write.
        self.feedback = [wet_left * feedback, wet_right * feedback];

        // Step 5: ADVANCE the write head, wrapping to 0 at the end.
        self.buffers.advance();

        // Step 6: MIX dry and wet as a linear crossfade.
        //
        //   dry_wet = 0 → output is exactly the input
        //   dry_wet = 1 → output is exactly the tap sum
        (
            (1.0 - dry_wet) * left + dry_wet * wet_left,
            (1.0 - dry_wet) * right + dry_wet * wet_right,
        )
    }

    /// Serialise the four raw parameter values. Engine internals are not
    /// included.
    pub fn get_state(&self) -> Result<Vec<u8>, StateError> {
        state::encode(self.params.as_ref())
    }
}

impl<P: ParamStore> DelayEngine<P> {
    /// Restore parameters from a blob produced by [`get_state`]. Returns
    /// the number of parameters applied; an unreadable or foreign blob
    /// applies none.
    ///
    /// [`get_state`]: DelayEngine::get_state
    pub fn set_state(&self, blob: &[u8]) -> usize {
        state::restore(self.params.as_ref(), blob)
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
