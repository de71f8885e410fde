//! Decoder configuration.
//!
//! A fixed, `serde`-serializable struct rather than a dynamic key/value
//! bag, following `rf-pitch::PitchConfig` / `rf-ml::InferenceConfig`.

use serde::{Deserialize, Serialize};

/// Options accepted by [`crate::decode::output_to_notes_poly`] (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Peak value required in the inferred onset matrix to accept an onset.
    pub onset_thresh: f32,
    /// Below-threshold frames count toward ending a note.
    pub frame_thresh: f32,
    /// Notes with `duration_frames <= min_note_len` are discarded.
    pub min_note_len: usize,
    /// Augment the onset matrix with a frame-energy difference estimate.
    pub infer_onsets: bool,
    /// Optional upper frequency bound in Hz; `None` is unconstrained.
    pub max_freq: Option<f64>,
    /// Optional lower frequency bound in Hz; `None` is unconstrained.
    pub min_freq: Option<f64>,
    /// Run the melodia-trick continuation pass over residual energy.
    pub melodia_trick: bool,
    /// Consecutive below-threshold frames tolerated before a note ends.
    pub energy_tolerance: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            onset_thresh: 0.5,
            frame_thresh: 0.3,
            min_note_len: 5,
            infer_onsets: true,
            max_freq: None,
            min_freq: None,
            melodia_trick: true,
            energy_tolerance: 11,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let opts = DecodeOptions::default();
        assert_eq!(opts.onset_thresh, 0.5);
        assert_eq!(opts.frame_thresh, 0.3);
        assert_eq!(opts.min_note_len, 5);
        assert!(opts.infer_onsets);
        assert_eq!(opts.max_freq, None);
        assert_eq!(opts.min_freq, None);
        assert!(opts.melodia_trick);
        assert_eq!(opts.energy_tolerance, 11);
    }

    #[test]
    fn roundtrips_through_json() {
        let opts = DecodeOptions {
            onset_thresh: 0.25,
            ..Default::default()
        };
        let json = serde_json::to_string(&opts).unwrap();
        let back: DecodeOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(opts, back);
    }
}
