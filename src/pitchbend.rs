//! Fractional-pitch refinement: for each decoded note, reads a window of
//! the contours matrix around the note's nominal bin and picks per-frame
//! pitch-bend offsets (spec.md §4.4).

use ndarray::{s, Array1, Array2};

use crate::constants::{
    ANNOTATIONS_BASE_FREQUENCY, CONTOURS_BINS_PER_SEMITONE, N_FREQ_BINS_CONTOURS,
};
use crate::decode::NoteEventFrames;
use crate::numeric::{arg_max, gaussian, midi_to_hz};

const WINDOW_RADIUS: i64 = 25;
const GAUSSIAN_LEN: usize = 51;
const GAUSSIAN_STD: f64 = 5.0;

/// Nominal contour-bin index for a MIDI pitch (spec.md §4.4, unit-tested
/// value: `midi_pitch_to_contour_bin(69) == 144`).
pub fn midi_pitch_to_contour_bin(pitch_midi: i32) -> i64 {
    let hz = midi_to_hz(pitch_midi as f64);
    ((CONTOURS_BINS_PER_SEMITONE as f64 * 12.0) * (hz / ANNOTATIONS_BASE_FREQUENCY).log2()).round()
        as i64
}

/// Computes the per-frame pitch-bend sequence for one note. Returns a
/// vector of length `note.duration_frames`.
pub fn refine_pitch_bends(note: &NoteEventFrames, contours: &Array2<f32>) -> Vec<i32> {
    let freq_idx_contours = midi_pitch_to_contour_bin(note.pitch_midi);

    let freq_start = (freq_idx_contours - WINDOW_RADIUS).max(0);
    let freq_end = (freq_idx_contours + WINDOW_RADIUS + 1).min(N_FREQ_BINS_CONTOURS as i64);
    let freq_start = freq_start as usize;
    let freq_end = freq_end.max(freq_start as i64) as usize;

    let left_clip = (WINDOW_RADIUS - freq_idx_contours).max(0) as usize;
    let window_len = freq_end - freq_start;

    let full_gaussian: Array1<f64> = gaussian(GAUSSIAN_LEN, GAUSSIAN_STD);
    let gaussian_slice = full_gaussian.slice(s![left_clip..left_clip + window_len]).to_owned();

    let pb_shift = WINDOW_RADIUS - (WINDOW_RADIUS - freq_idx_contours).max(0);

    let mut bends = Vec::with_capacity(note.duration_frames);
    for frame in note.start_frame..note.start_frame + note.duration_frames {
        let row = contours.slice(s![frame, freq_start..freq_end]);
        let weighted: Array1<f32> = (0..window_len)
            .map(|i| row[i] * gaussian_slice[i] as f32)
            .collect();
        let idx = arg_max(weighted.view()).unwrap_or(0) as i64;
        bends.push((idx - pb_shift) as i32);
    }
    bends
}
