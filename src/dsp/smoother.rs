//! # One-Pole Parameter Smoothing
//!
//! When a user moves the delay-time knob, the read heads must not jump to
//! their new position in one sample: that discontinuity is an audible
//! click. Instead every smoothed parameter chases its target with a
//! one-pole (exponential) pursuit:
//!
//! ```text
//! smoothed = smoothed - α * (smoothed - target)
//! ```
//!
//! Each sample closes a fixed fraction `α` of the remaining gap. The value
//! approaches the target monotonically and never overshoots it, because
//! `0 < α <= 1`.
//!
//! ## Choosing α
//!
//! [`Smoothing::PerSample`] applies a fixed α every sample. The default of
//! `1e-4` reproduces the classic behaviour of this effect exactly, which
//! means the smoothing time scales with the sample rate (about 0.23 s to
//! 90% at 44.1 kHz, about 0.1 s at 96 kHz).
//!
//! [`Smoothing::TimeConstant`] derives α from a time constant τ in seconds
//! so the audible glide is the same at every sample rate:
//!
//! ```text
//! α = 1 - e^(-1 / (τ * sample_rate))
//! ```

/// Fixed per-sample pursuit rate used by [`Smoothing::default`].
pub const DEFAULT_SMOOTHING_RATE: f64 = 1.0e-4;

/// How the smoothing coefficient is obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Smoothing {
    /// A fixed α applied every sample, independent of sample rate.
    PerSample(f64),
    /// A time constant in seconds, converted to α at `prepare()` time.
    TimeConstant(f64),
}

impl Default for Smoothing {
    fn default() -> Self {
        Self::PerSample(DEFAULT_SMOOTHING_RATE)
    }
}

impl Smoothing {
    /// The per-sample coefficient α for the given sample rate, always in
    /// `(0, 1]`. Degenerate inputs disable smoothing (α = 1).
    pub fn coefficient(&self, sample_rate: f64) -> f64 {
        let alpha = match *self {
            Self::PerSample(alpha) => alpha,
            Self::TimeConstant(tau) => {
                if tau <= 0.0 || sample_rate <= 0.0 {
                    1.0
                } else {
                    1.0 - (-1.0 / (tau * sample_rate)).exp()
                }
            }
        };

        if alpha.is_finite() && alpha > 0.0 {
            alpha.min(1.0)
        } else {
            1.0
        }
    }
}

/// Exponential pursuit of a target value.
///
/// The state is kept in `f64`: with α = 1e-4 the per-sample step is tiny,
/// and single precision would stall short of the target.
#[derive(Debug, Clone, Copy)]
pub struct OnePoleSmoother {
    current: f64,
    coefficient: f64,
}

impl OnePoleSmoother {
    /// A smoother resting at 0 that closes `coefficient` of the gap to
    /// its target each step.
    pub fn new(coefficient: f64) -> Self {
        Self {
            current: 0.0,
            coefficient,
        }
    }

    /// Change α without moving the current value.
    pub fn set_coefficient(&mut self, coefficient: f64) {
        self.coefficient = coefficient;
    }

    /// Jump straight to `value` with no glide.
    pub fn reset(&mut self, value: f64) {
        self.current = value;
    }

    /// The last smoothed value, without stepping.
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Step once towards `target` and return the new smoothed value.
    #[inline]
    pub fn next(&mut self, target: f64) -> f64 {
        self.current -= self.coefficient * (self.current - target);
        self.current
    }
}

impl Default for OnePoleSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_RATE)
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_settled_value_stays_exact() {
        let mut smoother = OnePoleSmoother::default();
        smoother.reset(0.5);

        for _ in 0..1000 {
            assert_eq!(smoother.next(0.5), 0.5);
        }
    }

    #[test]
    fn test_single_step_matches_formula() {
        let mut smoother = OnePoleSmoother::new(0.25);
        smoother.reset(1.0);

        // 1.0 - 0.25 * (1.0 - 0.0)
        assert_relative_eq!(smoother.next(0.0), 0.75);
        assert_relative_eq!(smoother.next(0.0), 0.5625);
    }

    /// Approaching from below must never pass the target.
    #[test]
    fn test_never_overshoots() {
        let mut smoother = OnePoleSmoother::new(0.01);
        smoother.reset(0.0);

        let mut previous = 0.0;
        for _ in 0..100_000 {
            let value = smoother.next(1.0);
            assert!(value <= 1.0, "overshot to {value}");
            assert!(value >= previous, "moved away from target");
            previous = value;
        }
        assert_relative_eq!(previous, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_default_rate_converges_in_about_a_second_at_48k() {
        let mut smoother = OnePoleSmoother::default();
        smoother.reset(0.0);

        for _ in 0..48_000 {
            smoother.next(1.0);
        }

        // (1 - 1e-4)^48000 ≈ e^-4.8 ≈ 0.0082 of the gap remains.
        assert_relative_eq!(smoother.current(), 1.0, epsilon = 0.01);
    }

    #[test]
    fn test_per_sample_coefficient_ignores_sample_rate() {
        let smoothing = Smoothing::default();
        assert_relative_eq!(smoothing.coefficient(44_100.0), 1.0e-4);
        assert_relative_eq!(smoothing.coefficient(96_000.0), 1.0e-4);
    }

    /// After τ seconds the gap should have shrunk to 1/e regardless of rate.
    #[test]
    fn test_time_constant_is_rate_independent() {
        for sample_rate in [44_100.0, 48_000.0, 96_000.0] {
            let alpha = Smoothing::TimeConstant(0.05).coefficient(sample_rate);
            let mut smoother = OnePoleSmoother::new(alpha);
            smoother.reset(0.0);

            let steps = (0.05 * sample_rate) as usize;
            for _ in 0..steps {
                smoother.next(1.0);
            }

            let remaining = 1.0 - smoother.current();
            assert_relative_eq!(remaining, (-1.0f64).exp(), epsilon = 1e-3);
        }
    }

    #[test]
    fn test_degenerate_coefficients_disable_smoothing() {
        assert_eq!(Smoothing::TimeConstant(0.0).coefficient(48_000.0), 1.0);
        assert_eq!(Smoothing::PerSample(f64::NAN).coefficient(48_000.0), 1.0);
        assert_eq!(Smoothing::PerSample(5.0).coefficient(48_000.0), 1.0);
    }
}
