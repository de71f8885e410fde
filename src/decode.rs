//! The note decoder: frequency constraint, onset inference, peak picking,
//! per-onset note extension, and the melodia-trick continuation pass
//! (spec.md §4.3). This is the algorithmic heart of the crate and must
//! reproduce the reference pipeline exactly, not merely approximately.

use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

use crate::config::DecodeOptions;
use crate::constants::MAX_FREQ_IDX;
use crate::error::{NoteCoreError, NoteCoreResult};
use crate::numeric::{arg_rel_max, global_max, hz_to_midi};

/// A decoded note expressed in frame indices (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEventFrames {
    pub start_frame: usize,
    pub duration_frames: usize,
    pub pitch_midi: i32,
    pub amplitude: f32,
    pub pitch_bends: Option<Vec<i32>>,
}

/// Zero all frequency columns outside `[min_freq, max_freq)` in `frames`
/// and `onsets`, in place (spec.md §4.3.1). Mutating the caller's matrices
/// is part of the contract; callers that still need the originals must
/// clone beforehand (spec.md §5).
pub fn constrain_frequency(
    frames: &mut Array2<f32>,
    onsets: &mut Array2<f32>,
    max_freq: Option<f64>,
    min_freq: Option<f64>,
) {
    if let Some(max_freq) = max_freq {
        let max_freq_idx = (hz_to_midi(max_freq).round() as i64) - crate::constants::MIDI_OFFSET;
        let max_freq_idx = max_freq_idx.max(0) as usize;
        zero_columns_from(frames, max_freq_idx);
        zero_columns_from(onsets, max_freq_idx);
    }
    if let Some(min_freq) = min_freq {
        let min_freq_idx = (hz_to_midi(min_freq).round() as i64) - crate::constants::MIDI_OFFSET;
        let min_freq_idx = min_freq_idx.max(0) as usize;
        zero_columns_before(frames, min_freq_idx);
        zero_columns_before(onsets, min_freq_idx);
    }
}

fn zero_columns_from(a: &mut Array2<f32>, from_col: usize) {
    let cols = a.shape()[1];
    if from_col >= cols {
        return;
    }
    a.slice_mut(s![.., from_col..]).fill(0.0);
}

fn zero_columns_before(a: &mut Array2<f32>, before_col: usize) {
    let cols = a.shape()[1];
    let end = before_col.min(cols);
    a.slice_mut(s![.., 0..end]).fill(0.0);
}

/// Computes the augmented onset matrix (spec.md §4.3.2).
pub fn infer_onsets(frames: &Array2<f32>, onsets: &Array2<f32>) -> Array2<f32> {
    let (rows, cols) = frames.dim();
    let diff = |n: usize| -> Array2<f32> {
        let mut shifted = Array2::<f32>::zeros((rows, cols));
        if n < rows {
            shifted
                .slice_mut(s![n.., ..])
                .assign(&frames.slice(s![..rows - n, ..]));
        }
        frames - &shifted
    };

    let diff1 = diff(1);
    let diff2 = diff(2);

    let mut combined = Array2::<f32>::zeros((rows, cols));
    for ((r, c), v) in combined.indexed_iter_mut() {
        let m = diff1[[r, c]].min(diff2[[r, c]]);
        *v = m.max(0.0);
    }

    let n_diff = 2.min(rows);
    combined.slice_mut(s![0..n_diff, ..]).fill(0.0);

    let onsets_max = global_max(onsets.view());
    let combined_max = global_max(combined.view());
    if combined_max > 0.0 {
        let scale = onsets_max / combined_max;
        combined.mapv_inplace(|v| v * scale);
    }

    let mut inferred = Array2::<f32>::zeros((rows, cols));
    for ((r, c), v) in inferred.indexed_iter_mut() {
        *v = combined[[r, c]].max(onsets[[r, c]]);
    }
    inferred
}

/// Peak-picks `inferred_onsets` and returns `(row, col)` coordinates whose
/// peak value exceeds `onset_thresh`, reversed so higher-row onsets are
/// processed first (spec.md §4.3.3).
fn pick_onsets(inferred_onsets: &Array2<f32>, onset_thresh: f32) -> Vec<(usize, usize)> {
    let peak_mask = arg_rel_max(inferred_onsets.view(), 1);
    let mut coords = Vec::new();
    for ((r, c), &is_peak) in peak_mask.indexed_iter() {
        if is_peak && inferred_onsets[[r, c]] > onset_thresh {
            coords.push((r, c));
        }
    }
    coords.reverse();
    coords
}

/// Scans forward from `start + 1`, counting consecutive below-threshold
/// frames, stopping at `t - 1` frames or `tolerance` consecutive misses.
/// Returns the raw loop-exit index and the run length at exit.
fn scan_forward(
    remaining: &Array2<f32>,
    start: usize,
    freq_idx: usize,
    frame_thresh: f32,
    tolerance: usize,
    t: usize,
) -> (usize, usize) {
    let mut i = start + 1;
    let mut k = 0usize;
    while i < t.saturating_sub(1) && k < tolerance {
        if remaining[[i, freq_idx]] < frame_thresh {
            k += 1;
        } else {
            k = 0;
        }
        i += 1;
    }
    (i, k)
}

/// Symmetric backward scan for the melodia pass, in signed arithmetic so an
/// out-of-range result can be detected rather than wrapping.
fn scan_backward(
    remaining: &Array2<f32>,
    start: usize,
    freq_idx: usize,
    frame_thresh: f32,
    tolerance: usize,
) -> (i64, usize) {
    let mut i = start as i64 - 1;
    let mut k = 0usize;
    while i > 0 && k < tolerance {
        if remaining[[i as usize, freq_idx]] < frame_thresh {
            k += 1;
        } else {
            k = 0;
        }
        i -= 1;
    }
    (i, k)
}

fn zero_claimed_column(remaining: &mut Array2<f32>, start: usize, end: usize, freq_idx: usize) {
    let end = end.min(remaining.shape()[0]);
    if start >= end {
        return;
    }
    remaining.slice_mut(s![start..end, freq_idx]).fill(0.0);
    if freq_idx < MAX_FREQ_IDX {
        remaining
            .slice_mut(s![start..end, freq_idx + 1])
            .fill(0.0);
    }
    if freq_idx > 0 {
        remaining
            .slice_mut(s![start..end, freq_idx - 1])
            .fill(0.0);
    }
}

/// Per-onset note extension (spec.md §4.3.4).
fn extend_from_onsets(
    frames: &Array2<f32>,
    remaining: &mut Array2<f32>,
    onsets: &[(usize, usize)],
    frame_thresh: f32,
    min_note_len: usize,
    energy_tolerance: usize,
    t: usize,
) -> Vec<NoteEventFrames> {
    let mut notes = Vec::new();
    for &(start_row, freq_idx) in onsets {
        if t == 0 || start_row >= t - 1 {
            continue;
        }
        let (i, k) = scan_forward(remaining, start_row, freq_idx, frame_thresh, energy_tolerance, t);
        let end = i - k;
        if end <= start_row || end - start_row <= min_note_len {
            continue;
        }
        zero_claimed_column(remaining, start_row, end, freq_idx);
        let amplitude = mean_column(frames, start_row, end, freq_idx);
        notes.push(NoteEventFrames {
            start_frame: start_row,
            duration_frames: end - start_row,
            pitch_midi: freq_idx as i32 + crate::constants::MIDI_OFFSET,
            amplitude,
            pitch_bends: None,
        });
    }
    notes
}

fn mean_column(frames: &Array2<f32>, start: usize, end: usize, freq_idx: usize) -> f32 {
    if end <= start {
        return 0.0;
    }
    let slice = frames.slice(s![start..end, freq_idx]);
    slice.iter().sum::<f32>() / slice.len() as f32
}

/// The melodia-trick continuation pass over residual energy
/// (spec.md §4.3.5).
fn melodia_trick(
    frames: &Array2<f32>,
    remaining: &mut Array2<f32>,
    frame_thresh: f32,
    min_note_len: usize,
    energy_tolerance: usize,
    t: usize,
) -> NoteCoreResult<Vec<NoteEventFrames>> {
    let mut notes = Vec::new();
    loop {
        let max_val = global_max(remaining.view());
        if max_val <= frame_thresh {
            break;
        }

        let (i_mid, freq_idx) = {
            // First occurrence wins on ties, matching arg_max's contract.
            let mut best_idx = 0usize;
            let mut best_val = f32::NEG_INFINITY;
            for (idx, &v) in remaining.iter().enumerate() {
                if v > best_val {
                    best_val = v;
                    best_idx = idx;
                }
            }
            let cols = remaining.shape()[1];
            (best_idx / cols, best_idx % cols)
        };
        remaining[[i_mid, freq_idx]] = 0.0;

        let (i_fwd, k_fwd) =
            scan_forward(remaining, i_mid, freq_idx, frame_thresh, energy_tolerance, t);
        let i_end = i_fwd as i64 - 1 - k_fwd as i64;

        let (i_back, k_back) = scan_backward(remaining, i_mid, freq_idx, frame_thresh, energy_tolerance);
        let i_start = i_back + 1 + k_back as i64;

        if i_start < 0 {
            return Err(NoteCoreError::InvariantViolation(format!(
                "melodia backward pass produced iStart={i_start} < 0"
            )));
        }
        if i_end >= t as i64 {
            return Err(NoteCoreError::InvariantViolation(format!(
                "melodia forward pass produced iEnd={i_end} >= T={t}"
            )));
        }
        let i_start = i_start as usize;
        let i_end = i_end as usize;

        zero_claimed_column(remaining, i_start, i_end, freq_idx);

        if i_end <= i_start || i_end - i_start <= min_note_len {
            continue;
        }

        let amplitude = mean_column(frames, i_start, i_end, freq_idx);
        notes.push(NoteEventFrames {
            start_frame: i_start,
            duration_frames: i_end - i_start,
            pitch_midi: freq_idx as i32 + crate::constants::MIDI_OFFSET,
            amplitude,
            pitch_bends: None,
        });
    }
    Ok(notes)
}

/// Decodes `frames`/`onsets` into a polyphonic list of note events
/// (spec.md §4.3, the `outputToNotesPoly` entry point).
///
/// `frames` and `onsets` are mutated in place by the frequency-constraint
/// step; clone them first if the caller still needs the originals.
pub fn output_to_notes_poly(
    frames: &mut Array2<f32>,
    onsets: &mut Array2<f32>,
    options: &DecodeOptions,
) -> NoteCoreResult<Vec<NoteEventFrames>> {
    constrain_frequency(frames, onsets, options.max_freq, options.min_freq);

    let inferred = if options.infer_onsets {
        infer_onsets(frames, onsets)
    } else {
        onsets.clone()
    };

    let onset_coords = pick_onsets(&inferred, options.onset_thresh);
    log::debug!("picked {} onset candidates", onset_coords.len());

    let t = frames.shape()[0];
    let mut remaining = frames.clone();

    let mut notes = extend_from_onsets(
        frames,
        &mut remaining,
        &onset_coords,
        options.frame_thresh,
        options.min_note_len,
        options.energy_tolerance,
        t,
    );

    if options.melodia_trick {
        let extra = melodia_trick(
            frames,
            &mut remaining,
            options.frame_thresh,
            options.min_note_len,
            options.energy_tolerance,
            t,
        )?;
        notes.extend(extra);
    }

    log::info!("decoded {} notes", notes.len());
    Ok(notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn single_column_run(t: usize, cols: usize, col: usize, start: usize, len: usize, value: f32) -> Array2<f32> {
        let mut a = Array2::<f32>::zeros((t, cols));
        for r in start..start + len {
            a[[r, col]] = value;
        }
        a
    }

    #[test]
    fn constrain_frequency_is_idempotent() {
        let mut frames = Array2::<f32>::from_elem((10, 88), 1.0);
        let mut onsets = Array2::<f32>::from_elem((10, 88), 1.0);
        constrain_frequency(&mut frames, &mut onsets, Some(880.0), Some(55.0));
        let once_frames = frames.clone();
        let once_onsets = onsets.clone();
        constrain_frequency(&mut frames, &mut onsets, Some(880.0), Some(55.0));
        assert_eq!(frames, once_frames);
        assert_eq!(onsets, once_onsets);
    }

    #[test]
    fn melodia_trick_reconstructs_single_column_run() {
        let t = 40;
        let frames = single_column_run(t, 5, 2, 10, 20, 0.9);
        let mut onsets = Array2::<f32>::zeros((t, 5));
        // no explicit onset peak: forces reliance on the melodia pass
        onsets.fill(0.0);
        let mut frames_mut = frames.clone();

        let opts = DecodeOptions {
            onset_thresh: 2.0, // impossible to exceed -> no onset-driven notes
            infer_onsets: false,
            melodia_trick: true,
            min_note_len: 1,
            frame_thresh: 0.5,
            energy_tolerance: 3,
            ..Default::default()
        };
        let notes = output_to_notes_poly(&mut frames_mut, &mut onsets, &opts).unwrap();
        // The melodia pass's forward/backward scans are intentionally
        // asymmetric (spec.md §4.3.5: iEnd = i-1-k vs iStart = i+1+k), so
        // the recovered span need not exactly match the input run's
        // boundaries — only that the whole run collapses into one note.
        assert_eq!(notes.len(), 1);
        assert!(notes[0].start_frame <= 10);
        assert!(notes[0].start_frame + notes[0].duration_frames >= 25);
        assert_eq!(notes[0].pitch_midi, 2 + crate::constants::MIDI_OFFSET);
    }

    #[test]
    fn notes_never_shorter_than_min_note_len() {
        let t = 20;
        let frames = single_column_run(t, 3, 1, 5, 2, 0.9);
        let mut onsets = Array2::<f32>::zeros((t, 3));
        let mut frames_mut = frames.clone();
        let opts = DecodeOptions {
            infer_onsets: false,
            melodia_trick: true,
            min_note_len: 5,
            frame_thresh: 0.5,
            ..Default::default()
        };
        let notes = output_to_notes_poly(&mut frames_mut, &mut onsets, &opts).unwrap();
        for n in &notes {
            assert!(n.duration_frames > opts.min_note_len);
        }
    }

    #[test]
    fn pitch_range_is_piano_range() {
        let t = 10;
        let frames = single_column_run(t, 88, 40, 0, 8, 0.9);
        let mut onsets = Array2::<f32>::zeros((t, 88));
        let mut frames_mut = frames.clone();
        let opts = DecodeOptions {
            infer_onsets: false,
            min_note_len: 1,
            frame_thresh: 0.5,
            ..Default::default()
        };
        let notes = output_to_notes_poly(&mut frames_mut, &mut onsets, &opts).unwrap();
        for n in &notes {
            assert!(n.pitch_midi >= 21 && n.pitch_midi <= 108);
        }
    }
}
