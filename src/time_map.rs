//! Frame-index to wall-clock-seconds conversion (spec.md §4.5).

use crate::constants::{window_offset, ANNOT_N_FRAMES, AUDIO_SAMPLE_RATE, FFT_HOP};
use crate::decode::NoteEventFrames;

/// A decoded note expressed in seconds, ready for the caller or the MIDI
/// emitter (spec.md §3).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NoteEventTime {
    pub start_time_seconds: f64,
    pub duration_seconds: f64,
    pub pitch_midi: i32,
    pub amplitude: f32,
    pub pitch_bends: Option<Vec<i32>>,
}

/// `f * FFT_HOP / AUDIO_SAMPLE_RATE - WINDOW_OFFSET * floor(f / ANNOT_N_FRAMES)`.
pub fn model_frame_to_time(frame: usize) -> f64 {
    let f = frame as f64;
    f * FFT_HOP as f64 / AUDIO_SAMPLE_RATE as f64
        - window_offset() * (frame / ANNOT_N_FRAMES) as f64
}

/// Converts one frame-indexed note into a time-indexed note.
pub fn note_to_time(note: &NoteEventFrames) -> NoteEventTime {
    let start = model_frame_to_time(note.start_frame);
    let end = model_frame_to_time(note.start_frame + note.duration_frames);
    NoteEventTime {
        start_time_seconds: start,
        duration_seconds: end - start,
        pitch_midi: note.pitch_midi,
        amplitude: note.amplitude,
        pitch_bends: note.pitch_bends.clone(),
    }
}
