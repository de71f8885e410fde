//! Normative constants shared by every stage of the pipeline.
//!
//! These values are fixed by the upstream model's training configuration and
//! must not be tuned; changing any of them silently breaks parity with the
//! reference note lists used to validate this crate.

/// Audio sample rate the model was trained against. Inputs at any other
/// rate are rejected at the boundary (see [`crate::error::NoteCoreError`]).
pub const AUDIO_SAMPLE_RATE: u32 = 22050;

/// Hop length (in samples) of the model's internal STFT.
pub const FFT_HOP: u32 = 256;

/// Output frame rate of the model, in frames per second of audio.
pub const ANNOTATIONS_FPS: u32 = AUDIO_SAMPLE_RATE / FFT_HOP;

/// Length of one analysis window, in seconds.
pub const AUDIO_WINDOW_LENGTH_SECONDS: f64 = 2.0;

/// Length of one analysis window, in samples.
pub const AUDIO_N_SAMPLES: usize =
    (AUDIO_SAMPLE_RATE as usize) * 2 - FFT_HOP as usize;

/// Number of model-output rows considered overlap guard frames at each edge
/// of a window.
pub const N_OVERLAPPING_FRAMES: usize = 30;

/// Same quantity expressed in input samples.
pub const OVERLAP_LENGTH_FRAMES: usize = N_OVERLAPPING_FRAMES * FFT_HOP as usize;

/// Half of [`N_OVERLAPPING_FRAMES`], in model-output *rows*: the number of
/// rows the inference driver strips from each edge of a window's raw output
/// (spec.md §4.2 step 3). Not a sample count — see [`LEFT_PAD_SAMPLES`] for
/// the framer's left-pad, which is a different unit of the same overlap.
pub const N_OVERLAP_OVER_2: usize = N_OVERLAPPING_FRAMES / 2;

/// Half of [`OVERLAP_LENGTH_FRAMES`], in input *samples*: the left-pad the
/// framer applies before windowing (spec.md §4.1). Distinct from
/// [`N_OVERLAP_OVER_2`], which is the same overlap expressed in
/// model-output rows.
pub const LEFT_PAD_SAMPLES: usize = OVERLAP_LENGTH_FRAMES / 2;

/// Stride, in samples, between the start of consecutive analysis windows.
pub const HOP_SIZE: usize = AUDIO_N_SAMPLES - OVERLAP_LENGTH_FRAMES;

/// MIDI pitch of frequency-bin index 0 (A0).
pub const MIDI_OFFSET: i32 = 21;

/// Highest valid frequency-bin index (88-key piano range, 0-based).
pub const MAX_FREQ_IDX: usize = 87;

/// Number of piano-key pitch columns in the frames/onsets matrices.
pub const N_FREQ_BINS_NOTES: usize = 88;

/// Fractional-pitch resolution of the contours matrix: 3 bins per semitone.
pub const CONTOURS_BINS_PER_SEMITONE: usize = 3;

/// Column count of the contours matrix.
pub const N_FREQ_BINS_CONTOURS: usize = N_FREQ_BINS_NOTES * CONTOURS_BINS_PER_SEMITONE;

/// Base frequency of contour bin 0, in Hz (A0).
pub const ANNOTATIONS_BASE_FREQUENCY: f64 = 27.5;

/// Number of model-output rows produced per analysis window, including the
/// overlap guard frames the driver later strips. `ceil(AUDIO_N_SAMPLES /
/// FFT_HOP)`.
pub const ANNOT_N_FRAMES: usize =
    (AUDIO_N_SAMPLES + FFT_HOP as usize - 1) / FFT_HOP as usize;

/// `spec.md`'s calibration constant: corrects for the per-window overlap
/// trim when mapping model frame indices back to wall-clock seconds. The
/// trailing `0.0018` is an undocumented additive correction in the
/// reference pipeline and must be preserved verbatim — see the Open
/// Question recorded in DESIGN.md.
pub fn window_offset() -> f64 {
    (FFT_HOP as f64 / AUDIO_SAMPLE_RATE as f64)
        * (ANNOT_N_FRAMES as f64 - AUDIO_N_SAMPLES as f64 / FFT_HOP as f64)
        + 0.0018
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_match_spec() {
        assert_eq!(AUDIO_SAMPLE_RATE, 22050);
        assert_eq!(ANNOTATIONS_FPS, 86);
        assert_eq!(AUDIO_N_SAMPLES, 43844);
        assert_eq!(OVERLAP_LENGTH_FRAMES, 7680);
        assert_eq!(HOP_SIZE, 36164);
        assert_eq!(N_FREQ_BINS_CONTOURS, 264);
        assert_eq!(ANNOT_N_FRAMES, 172);
    }

    #[test]
    fn overlap_length_is_even() {
        assert_eq!(OVERLAP_LENGTH_FRAMES % 2, 0);
    }
}
