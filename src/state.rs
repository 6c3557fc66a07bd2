//! # Persisted State
//!
//! Only the four human-set parameters are saved. Buffer contents, head
//! positions and smoother state are runtime-only and are rebuilt by
//! `prepare()`.
//!
//! The blob is a single tagged container with flat named attributes:
//!
//! ```text
//! {
//!   "tag": "MultiTapDelay",
//!   "attributes": { "delaytime": 1.0, "drywet": 0.5, "feedback": 0.5, "spread": 5.0 }
//! }
//! ```
//!
//! Restoring is forgiving. A blob that does not parse, or carries a
//! different tag, restores nothing. Unknown attributes are skipped, and
//! missing ones leave the current value in place.

use std::collections::BTreeMap;

use nih_plug::nih_warn;
use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::params::{ParamId, ParamSource, ParamStore};

/// Tag identifying a state blob written by this effect.
pub const STATE_TAG: &str = "MultiTapDelay";

/// Snapshot of the four persisted parameters, clamped into range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayState {
    pub drywet: f32,
    pub feedback: f32,
    pub delaytime: f32,
    pub spread: f32,
}

impl DelayState {
    pub fn capture<P: ParamSource + ?Sized>(params: &P) -> Self {
        Self {
            drywet: params.clamped_value(ParamId::DryWet),
            feedback: params.clamped_value(ParamId::Feedback),
            delaytime: params.clamped_value(ParamId::DelayTime),
            spread: params.clamped_value(ParamId::Spread),
        }
    }

    pub fn get(&self, id: ParamId) -> f32 {
        match id {
            ParamId::DryWet => self.drywet,
            ParamId::Feedback => self.feedback,
            ParamId::DelayTime => self.delaytime,
            ParamId::Spread => self.spread,
        }
    }
}

impl Default for DelayState {
    fn default() -> Self {
        Self {
            drywet: ParamId::DryWet.range().default,
            feedback: ParamId::Feedback.range().default,
            delaytime: ParamId::DelayTime.range().default,
            spread: ParamId::Spread.range().default,
        }
    }
}

impl From<DelayState> for StateContainer {
    fn from(state: DelayState) -> Self {
        let attributes = ParamId::ALL
            .into_iter()
            .map(|id| (id.attribute().to_owned(), f64::from(state.get(id))))
            .collect();

        Self {
            tag: STATE_TAG.to_owned(),
            attributes,
        }
    }
}

/// The tagged attribute container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateContainer {
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, f64>,
}

impl StateContainer {
    /// Capture the current raw parameter values, clamped into range.
    pub fn capture<P: ParamSource + ?Sized>(params: &P) -> Self {
        DelayState::capture(params).into()
    }

    pub fn attribute(&self, id: ParamId) -> Option<f64> {
        self.attributes.get(id.attribute()).copied()
    }

    /// The recognised attributes laid over `base`. Missing or non-finite
    /// attributes keep the `base` value; the rest are clamped.
    pub fn to_state(&self, base: DelayState) -> DelayState {
        let mut state = base;
        for id in ParamId::ALL {
            let Some(value) = self.attribute(id).and_then(|v| id.range().clamp(v as f32)) else {
                continue;
            };
            match id {
                ParamId::DryWet => state.drywet = value,
                ParamId::Feedback => state.feedback = value,
                ParamId::DelayTime => state.delaytime = value,
                ParamId::Spread => state.spread = value,
            }
        }
        state
    }

    /// Write every recognised attribute into `params`. Returns how many
    /// parameters were updated.
    pub fn apply<P: ParamStore + ?Sized>(&self, params: &P) -> usize {
        let mut applied = 0;
        for id in ParamId::ALL {
            if let Some(value) = self.attribute(id) {
                if params.set_value(id, value as f32) {
                    applied += 1;
                }
            }
        }
        applied
    }
}

/// Serialise the current parameters into a state blob.
pub fn encode<P: ParamSource + ?Sized>(params: &P) -> Result<Vec<u8>, StateError> {
    Ok(serde_json::to_vec(&StateContainer::capture(params))?)
}

/// Parse a blob, returning `None` if it is unreadable or not ours.
pub fn decode(blob: &[u8]) -> Option<StateContainer> {
    let container: StateContainer = match serde_json::from_slice(blob) {
        Ok(container) => container,
        Err(err) => {
            nih_warn!("ignoring unreadable state blob: {err}");
            return None;
        }
    };

    if container.tag != STATE_TAG {
        nih_warn!("ignoring state blob tagged {:?}", container.tag);
        return None;
    }

    Some(container)
}

/// Restore parameters from a blob. Returns how many were applied; zero
/// means the current values stand untouched.
pub fn restore<P: ParamStore + ?Sized>(params: &P, blob: &[u8]) -> usize {
    decode(blob).map_or(0, |container| container.apply(params))
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::DelayParams;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn custom_params() -> DelayParams {
        let params = DelayParams::default();
        params.set_value(ParamId::DryWet, 0.8);
        params.set_value(ParamId::Feedback, 0.25);
        params.set_value(ParamId::DelayTime, 0.375);
        params.set_value(ParamId::Spread, 1234.5);
        params
    }

    #[test]
    fn test_round_trip_preserves_parameters() {
        let source = custom_params();
        let blob = encode(&source).unwrap();

        let target = DelayParams::default();
        assert_eq!(restore(&target, &blob), 4);

        for id in ParamId::ALL {
            assert_relative_eq!(target.value(id), source.value(id));
        }
    }

    #[test]
    fn test_blob_shape() {
        let blob = encode(&DelayParams::default()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&blob).unwrap();

        assert_eq!(value["tag"], "MultiTapDelay");
        assert_eq!(value["attributes"]["drywet"], 0.5);
        assert_eq!(value["attributes"]["spread"], 5.0);
    }

    #[test]
    fn test_foreign_tag_is_ignored() {
        let params = custom_params();
        let blob = serde_json::to_vec(&json!({
            "tag": "SomethingElse",
            "attributes": { "drywet": 0.0, "feedback": 0.0 }
        }))
        .unwrap();

        assert_eq!(restore(&params, &blob), 0);
        assert_relative_eq!(params.dry_wet(), 0.8);
        assert_relative_eq!(params.feedback(), 0.25);
    }

    #[test]
    fn test_garbage_is_ignored() {
        let params = custom_params();

        assert_eq!(restore(&params, b"\x00\x01not json"), 0);
        assert_eq!(restore(&params, b""), 0);
        assert_eq!(restore(&params, br#"{"attributes": {}}"#), 0);
        assert_relative_eq!(params.spread(), 1234.5);
    }

    #[test]
    fn test_missing_and_unknown_attributes() {
        let params = custom_params();
        let blob = serde_json::to_vec(&json!({
            "tag": "MultiTapDelay",
            "attributes": { "feedback": 0.9, "wobble": 3.0 }
        }))
        .unwrap();

        assert_eq!(restore(&params, &blob), 1);
        assert_relative_eq!(params.feedback(), 0.9);
        assert_relative_eq!(params.dry_wet(), 0.8);
        assert_relative_eq!(params.delay_time(), 0.375);
    }

    #[test]
    fn test_out_of_range_attributes_are_clamped() {
        let params = DelayParams::default();
        let blob = serde_json::to_vec(&json!({
            "tag": "MultiTapDelay",
            "attributes": { "feedback": 4.0, "delaytime": -1.0 }
        }))
        .unwrap();

        assert_eq!(restore(&params, &blob), 2);
        assert_relative_eq!(params.feedback(), 0.98);
        assert_relative_eq!(params.delay_time(), 0.01);
    }

    #[test]
    fn test_snapshot_clamps_foreign_values() {
        struct Wild;
        impl ParamSource for Wild {
            fn value(&self, id: ParamId) -> f32 {
                match id {
                    ParamId::DryWet => f32::NAN,
                    ParamId::Feedback => 3.0,
                    ParamId::DelayTime => 0.25,
                    ParamId::Spread => -8.0,
                }
            }
        }

        let state = DelayState::capture(&Wild);
        assert_eq!(
            state,
            DelayState {
                drywet: 0.5,
                feedback: 0.98,
                delaytime: 0.25,
                spread: 0.0,
            }
        );

        let container = StateContainer::capture(&Wild);
        assert_eq!(container, StateContainer::from(state));
        assert_eq!(container.attribute(ParamId::DryWet), Some(0.5));
    }

    #[test]
    fn test_container_to_state_keeps_base_for_missing_values() {
        let container: StateContainer = serde_json::from_value(json!({
            "tag": "MultiTapDelay",
            "attributes": { "spread": 5000.0, "delaytime": 0.5 }
        }))
        .unwrap();

        let state = container.to_state(DelayState::default());
        assert_eq!(state.spread, 2000.0);
        assert_eq!(state.delaytime, 0.5);
        assert_eq!(state.drywet, 0.5);
        assert_eq!(state.feedback, 0.5);
    }

    #[test]
    fn test_container_without_attributes_restores_nothing() {
        let params = custom_params();
        assert_eq!(restore(&params, br#"{"tag": "MultiTapDelay"}"#), 0);
        assert_relative_eq!(params.dry_wet(), 0.8);
    }
}
