//! Note-decoding core of an automatic music transcription pipeline.
//!
//! Given three dense time-frequency activation matrices produced by an
//! upstream neural model (per-frame sustain energy, onset likelihood, and
//! fractional-pitch contours), this crate turns them into discrete musical
//! note events and serialises those events into a standard MIDI byte
//! stream. The model itself is treated as an opaque collaborator behind
//! [`inference::InferenceEngine`]; the numeric core — windowing, peak
//! picking, note tracking, the "melodia trick" continuation pass, and
//! pitch-bend refinement — is what this crate actually owns.

pub mod aligner;
pub mod config;
pub mod constants;
pub mod decode;
pub mod error;
pub mod framer;
pub mod inference;
pub mod midi_emit;
pub mod numeric;
pub mod pipeline;
pub mod pitchbend;
pub mod time_map;

pub use config::DecodeOptions;
pub use decode::{constrain_frequency, output_to_notes_poly, NoteEventFrames};
pub use error::{NoteCoreError, NoteCoreResult};
pub use framer::{frame_audio, FramedAudio};
pub use inference::{run_driver, Chunk, InferenceEngine, MockInferenceEngine, ModelOutput, TractInferenceEngine};
pub use midi_emit::{build_midi, MidiBuilder, StandardMidiBuilder};
pub use pipeline::{notes_to_midi, transcribe, transcribe_with_builder};
pub use pitchbend::refine_pitch_bends;
pub use time_map::{model_frame_to_time, note_to_time, NoteEventTime};
