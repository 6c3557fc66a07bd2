//! # Plugin Parameters
//!
//! The delay has four user-facing parameters. The engine never owns them:
//! a control thread (host automation, a UI, a preset loader) writes them,
//! and the audio thread polls the current raw value once per sample.
//!
//! | Parameter  | Attribute   | Range                    | Default |
//! |------------|-------------|--------------------------|---------|
//! | Dry/Wet    | `drywet`    | 0 – 1                    | 0.5     |
//! | Feedback   | `feedback`  | 0 – 0.98                 | 0.5     |
//! | Delay Time | `delaytime` | 0.01 – [`MAX_DELAY_TIME`] s | 1.0  |
//! | Spread     | `spread`    | 0 – 2000                 | 5.0     |
//!
//! The attribute names double as nih-plug parameter IDs and as the keys of
//! the persisted state container, so they must never change once published.
//!
//! ## Threading
//!
//! Each parameter is a single atomic `f32`. Reads on the audio thread use
//! relaxed ordering: a stale or freshly-written value is equally fine,
//! because the engine smooths delay time, dry/wet and spread anyway. No lock
//! is ever taken on the audio path.

use std::sync::atomic::Ordering;

use atomic_float::AtomicF32;
use nih_plug::prelude::*;

/// Longest delay the effect supports, in seconds. Bounds both the Delay
/// Time parameter and the circular buffer length.
pub const MAX_DELAY_TIME: f32 = 2.0;

/// Identifies one of the four parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    DryWet,
    Feedback,
    DelayTime,
    Spread,
}

impl ParamId {
    pub const ALL: [ParamId; 4] = [
        ParamId::DryWet,
        ParamId::Feedback,
        ParamId::DelayTime,
        ParamId::Spread,
    ];

    /// Stable attribute name used for host IDs and persisted state.
    pub const fn attribute(self) -> &'static str {
        match self {
            ParamId::DryWet => "drywet",
            ParamId::Feedback => "feedback",
            ParamId::DelayTime => "delaytime",
            ParamId::Spread => "spread",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            ParamId::DryWet => "Dry Wet",
            ParamId::Feedback => "Feedback",
            ParamId::DelayTime => "Delay Time",
            ParamId::Spread => "Spread",
        }
    }

    pub const fn range(self) -> ParamRange {
        match self {
            ParamId::DryWet => ParamRange::new(0.0, 1.0, 0.5),
            // Capped below 1.0: at unity the recursive taps never decay.
            ParamId::Feedback => ParamRange::new(0.0, 0.98, 0.5),
            ParamId::DelayTime => ParamRange::new(0.01, MAX_DELAY_TIME, 1.0),
            ParamId::Spread => ParamRange::new(0.0, 2000.0, 5.0),
        }
    }

    pub fn from_attribute(name: &str) -> Option<ParamId> {
        ParamId::ALL.into_iter().find(|id| id.attribute() == name)
    }
}

/// Inclusive bounds and default for one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParamRange {
    pub const fn new(min: f32, max: f32, default: f32) -> Self {
        Self { min, max, default }
    }

    /// Clamp into range. Non-finite values are rejected rather than
    /// clamped, so NaN can never reach the audio path.
    pub fn clamp(&self, value: f32) -> Option<f32> {
        value.is_finite().then(|| value.clamp(self.min, self.max))
    }

    pub fn contains(&self, value: f32) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Read-only view of the current raw parameter values, polled by the
/// engine once per sample.
///
/// Implementations must be cheap and lock-free. Returned values are clamped
/// into range by the accessors, whatever the implementation stores.
pub trait ParamSource: Send + Sync {
    /// Current raw (unsmoothed) value of `id`.
    fn value(&self, id: ParamId) -> f32;

    /// [`value`](Self::value) clamped into range, falling back to the
    /// default if the stored value is not finite.
    fn clamped_value(&self, id: ParamId) -> f32 {
        clamped(self, id)
    }

    fn dry_wet(&self) -> f32 {
        self.clamped_value(ParamId::DryWet)
    }

    fn feedback(&self) -> f32 {
        self.clamped_value(ParamId::Feedback)
    }

    fn delay_time(&self) -> f32 {
        self.clamped_value(ParamId::DelayTime)
    }

    fn spread(&self) -> f32 {
        self.clamped_value(ParamId::Spread)
    }
}

fn clamped<P: ParamSource + ?Sized>(source: &P, id: ParamId) -> f32 {
    let range = id.range();
    range.clamp(source.value(id)).unwrap_or(range.default)
}

/// A [`ParamSource`] that can also be written, from any thread.
pub trait ParamStore: ParamSource {
    /// Store `value` clamped into range. Returns `false` (and leaves the
    /// current value alone) if `value` is not finite.
    fn set_value(&self, id: ParamId, value: f32) -> bool;
}

/// Lock-free parameter storage for hosts that do not bring their own
/// parameter system.
///
/// Share it as `Arc<DelayParams>` between the control thread and the
/// engine.
#[derive(Debug)]
pub struct DelayParams {
    dry_wet: AtomicF32,
    feedback: AtomicF32,
    delay_time: AtomicF32,
    spread: AtomicF32,
}

impl DelayParams {
    fn cell(&self, id: ParamId) -> &AtomicF32 {
        match id {
            ParamId::DryWet => &self.dry_wet,
            ParamId::Feedback => &self.feedback,
            ParamId::DelayTime => &self.delay_time,
            ParamId::Spread => &self.spread,
        }
    }
}

impl Default for DelayParams {
    fn default() -> Self {
        Self {
            dry_wet: AtomicF32::new(ParamId::DryWet.range().default),
            feedback: AtomicF32::new(ParamId::Feedback.range().default),
            delay_time: AtomicF32::new(ParamId::DelayTime.range().default),
            spread: AtomicF32::new(ParamId::Spread.range().default),
        }
    }
}

impl ParamSource for DelayParams {
    fn value(&self, id: ParamId) -> f32 {
        self.cell(id).load(Ordering::Relaxed)
    }
}

impl ParamStore for DelayParams {
    fn set_value(&self, id: ParamId, value: f32) -> bool {
        match id.range().clamp(value) {
            Some(clamped) => {
                self.cell(id).store(clamped, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }
}

/// Host-facing parameters, registered with the DAW through nih-plug.
///
/// No nih-plug smoother is attached to these `FloatParam`s. The engine
/// runs its own one-pole smoother on delay time, dry/wet and spread, and
/// feedback reacts immediately.
#[derive(Params)]
pub struct PluginParams {
    /// **Dry/Wet**: linear crossfade between the input and the tap sum.
    #[id = "drywet"]
    pub dry_wet: FloatParam,

    /// **Feedback**: how much of the tap sum is written back into the
    /// buffers. Capped at 98% for stability.
    #[id = "feedback"]
    pub feedback: FloatParam,

    /// **Delay Time**: position of the first tap, in seconds.
    #[id = "delaytime"]
    pub delay_time: FloatParam,

    /// **Spread**: how far the second, third and fourth taps move away
    /// from the first (2×, 7× and 11× this many samples).
    #[id = "spread"]
    pub spread: FloatParam,
}

fn float_param(id: ParamId) -> FloatParam {
    let range = id.range();
    FloatParam::new(
        id.display_name(),
        range.default,
        FloatRange::Linear {
            min: range.min,
            max: range.max,
        },
    )
}

impl Default for PluginParams {
    fn default() -> Self {
        Self {
            dry_wet: float_param(ParamId::DryWet)
                .with_unit("%")
                .with_value_to_string(formatters::v2s_f32_percentage(1))
                .with_string_to_value(formatters::s2v_f32_percentage()),

            feedback: float_param(ParamId::Feedback)
                .with_unit("%")
                .with_value_to_string(formatters::v2s_f32_percentage(1))
                .with_string_to_value(formatters::s2v_f32_percentage()),

            delay_time: float_param(ParamId::DelayTime)
                .with_unit(" s")
                // Millisecond resolution is plenty for a delay time.
                .with_step_size(0.001),

            spread: float_param(ParamId::Spread).with_step_size(0.1),
        }
    }
}

impl ParamSource for PluginParams {
    fn value(&self, id: ParamId) -> f32 {
        match id {
            ParamId::DryWet => self.dry_wet.value(),
            ParamId::Feedback => self.feedback.value(),
            ParamId::DelayTime => self.delay_time.value(),
            ParamId::Spread => self.spread.value(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
