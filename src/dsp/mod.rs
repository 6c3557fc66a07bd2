//! # DSP (Digital Signal Processing) Core
//!
//! Everything that runs on the audio thread:
//!
//! - **`delay_line`**: the per-channel circular buffers, the shared write
//!   head, and the read-head wrap and interpolation helpers.
//!
//! - **`smoother`**: one-pole exponential smoothing that turns abrupt
//!   parameter changes into click-free glides.
//!
//! - **`engine`**: the four-tap feedback delay that ties the two together.

pub mod delay_line;
pub mod engine;
pub mod smoother;
