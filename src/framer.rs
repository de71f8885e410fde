//! Windowing stage: slices a mono sample buffer into fixed-length,
//! overlapping analysis windows suitable for the model.

use ndarray::Array3;

use crate::constants::{
    AUDIO_N_SAMPLES, AUDIO_SAMPLE_RATE, HOP_SIZE, LEFT_PAD_SAMPLES, OVERLAP_LENGTH_FRAMES,
};
use crate::error::{NoteCoreError, NoteCoreResult};

/// Windowed audio ready for the inference driver, plus the original sample
/// count so downstream stages can trim back to the un-padded timeline.
pub struct FramedAudio {
    /// Shape `(num_windows, AUDIO_N_SAMPLES, 1)`.
    pub windows: Array3<f32>,
    /// Length of the audio buffer before padding/windowing.
    pub original_len: usize,
}

/// Slice `samples` (mono, `sample_rate` Hz) into overlapping analysis
/// windows (spec.md §4.1).
///
/// Rejects any sample rate other than [`crate::constants::AUDIO_SAMPLE_RATE`]
/// or a channel count other than 1.
pub fn frame_audio(
    samples: &[f32],
    sample_rate: u32,
    channels: usize,
) -> NoteCoreResult<FramedAudio> {
    if OVERLAP_LENGTH_FRAMES % 2 != 0 {
        return Err(NoteCoreError::InvalidConstant(format!(
            "OVERLAP_LENGTH_FRAMES must be even, got {OVERLAP_LENGTH_FRAMES}"
        )));
    }
    if sample_rate != AUDIO_SAMPLE_RATE {
        return Err(NoteCoreError::InvalidSampleRate {
            expected: AUDIO_SAMPLE_RATE,
            got: sample_rate,
        });
    }
    if channels != 1 {
        return Err(NoteCoreError::InvalidChannelCount { got: channels });
    }

    let original_len = samples.len();

    let mut padded = Vec::with_capacity(LEFT_PAD_SAMPLES + original_len);
    padded.resize(LEFT_PAD_SAMPLES, 0.0f32);
    padded.extend_from_slice(samples);

    let num_windows = if padded.len() <= AUDIO_N_SAMPLES {
        1
    } else {
        1 + ((padded.len() - AUDIO_N_SAMPLES) + HOP_SIZE - 1) / HOP_SIZE
    };

    let total_needed = AUDIO_N_SAMPLES + (num_windows - 1) * HOP_SIZE;
    padded.resize(total_needed, 0.0f32);

    log::debug!(
        "framed {} samples into {} window(s) of {} samples",
        original_len,
        num_windows,
        AUDIO_N_SAMPLES
    );

    let mut windows = Array3::<f32>::zeros((num_windows, AUDIO_N_SAMPLES, 1));
    for w in 0..num_windows {
        let start = w * HOP_SIZE;
        let slice = &padded[start..start + AUDIO_N_SAMPLES];
        for (i, &s) in slice.iter().enumerate() {
            windows[[w, i, 0]] = s;
        }
    }

    Ok(FramedAudio {
        windows,
        original_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_sample_rate() {
        let err = frame_audio(&[0.0; 100], 44100, 1).unwrap_err();
        assert!(matches!(err, NoteCoreError::InvalidSampleRate { .. }));
    }

    #[test]
    fn rejects_non_mono() {
        let err = frame_audio(&[0.0; 100], AUDIO_SAMPLE_RATE, 2).unwrap_err();
        assert!(matches!(err, NoteCoreError::InvalidChannelCount { .. }));
    }

    #[test]
    fn single_window_for_short_audio() {
        let samples = vec![0.5f32; 1000];
        let framed = frame_audio(&samples, AUDIO_SAMPLE_RATE, 1).unwrap();
        assert_eq!(framed.windows.shape(), &[1, AUDIO_N_SAMPLES, 1]);
        assert_eq!(framed.original_len, 1000);
        // Left pad is zero, then the real samples follow.
        for i in 0..LEFT_PAD_SAMPLES {
            assert_eq!(framed.windows[[0, i, 0]], 0.0);
        }
        assert_eq!(framed.windows[[0, LEFT_PAD_SAMPLES, 0]], 0.5);
    }

    #[test]
    fn empty_audio_produces_one_silent_window() {
        let framed = frame_audio(&[], AUDIO_SAMPLE_RATE, 1).unwrap();
        assert_eq!(framed.windows.shape()[0], 1);
        assert_eq!(framed.original_len, 0);
        assert!(framed.windows.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn multiple_windows_for_long_audio() {
        // Chosen so that, after the framer's own left-pad, the padded
        // buffer lands just past one window's worth of samples: exactly
        // two windows are needed to cover it.
        let samples = vec![0.1f32; AUDIO_N_SAMPLES - LEFT_PAD_SAMPLES + 10];
        let framed = frame_audio(&samples, AUDIO_SAMPLE_RATE, 1).unwrap();
        assert_eq!(framed.windows.shape()[0], 2);
    }

    #[test]
    fn three_windows_when_padded_length_spans_two_hops() {
        let samples = vec![0.1f32; AUDIO_N_SAMPLES + HOP_SIZE + 10];
        let framed = frame_audio(&samples, AUDIO_SAMPLE_RATE, 1).unwrap();
        assert_eq!(framed.windows.shape()[0], 3);
    }
}
