//! Error types.
//!
//! Only caller mistakes surface as errors. Out-of-range parameters are
//! clamped and unreadable state blobs are ignored, so neither appears here.

use thiserror::Error;

/// Precondition violations on the engine's control and processing calls.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("engine used before prepare()")]
    Unprepared,
    #[error("sample rate must be finite and positive, got {0}")]
    InvalidSampleRate(f64),
    #[error("maximum delay must be finite and positive, got {0} s")]
    InvalidMaxDelay(f64),
    #[error("{sample_rate} Hz × {max_delay_seconds} s gives an empty delay buffer")]
    EmptyBuffer {
        sample_rate: f64,
        max_delay_seconds: f64,
    },
    #[error("expected {expected} channels, got {actual}")]
    ChannelCount { expected: usize, actual: usize },
    #[error("channel lengths differ: left {left}, right {right}")]
    ChannelLengthMismatch { left: usize, right: usize },
}

/// Failure to produce a state blob.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}
