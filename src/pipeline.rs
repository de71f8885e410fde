//! Top-level entry point wiring every stage together: frame the audio,
//! drive it through the model, align the chunks, decode notes, refine
//! pitch bends, map to wall-clock time, and emit MIDI.

use ndarray::Array2;

use crate::aligner::{align_chunks, AlignedOutput};
use crate::config::DecodeOptions;
use crate::decode::output_to_notes_poly;
use crate::error::NoteCoreResult;
use crate::framer::frame_audio;
use crate::inference::{run_driver, Chunk, InferenceEngine};
use crate::midi_emit::{build_midi, MidiBuilder, StandardMidiBuilder};
use crate::pitchbend::refine_pitch_bends;
use crate::time_map::{note_to_time, NoteEventTime};

/// Runs the full pipeline over one buffer of mono, 22050 Hz audio and
/// returns both the decoded note events and a standard MIDI byte stream.
///
/// This is an `async fn` because [`run_driver`] yields between inference
/// calls; callers without their own executor can drive it with a minimal
/// current-thread `tokio` runtime.
pub async fn transcribe(
    samples: &[f32],
    sample_rate: u32,
    engine: &dyn InferenceEngine,
    options: &DecodeOptions,
) -> NoteCoreResult<(Vec<NoteEventTime>, Vec<u8>)> {
    transcribe_with_builder(samples, sample_rate, engine, options, &StandardMidiBuilder).await
}

/// Same as [`transcribe`] but with an explicit [`MidiBuilder`], for callers
/// that want to swap in a different MIDI serialisation strategy.
pub async fn transcribe_with_builder(
    samples: &[f32],
    sample_rate: u32,
    engine: &dyn InferenceEngine,
    options: &DecodeOptions,
    midi_builder: &dyn MidiBuilder,
) -> NoteCoreResult<(Vec<NoteEventTime>, Vec<u8>)> {
    let framed = frame_audio(samples, sample_rate, 1)?;

    let mut chunks: Vec<Chunk> = Vec::new();
    run_driver(&framed, engine, |chunk| chunks.push(chunk)).await?;

    let AlignedOutput {
        mut frames,
        mut onsets,
        contours,
    } = align_chunks(&chunks)?;

    let note_frames = output_to_notes_poly(&mut frames, &mut onsets, options)?;
    log::info!("transcribed {} note(s) from {} sample(s)", note_frames.len(), samples.len());

    let notes: Vec<NoteEventTime> = note_frames
        .into_iter()
        .map(|mut note| {
            if note.pitch_bends.is_none() {
                note.pitch_bends = Some(refine_pitch_bends(&note, &contours));
            }
            note_to_time(&note)
        })
        .collect();

    let midi = midi_builder.build(&notes)?;
    Ok((notes, midi))
}

/// Convenience wrapper matching the plain [`build_midi`] free function, for
/// callers that already have [`NoteEventTime`]s from elsewhere (e.g.
/// deserialised from storage) and just want MIDI bytes.
pub fn notes_to_midi(notes: &[NoteEventTime]) -> NoteCoreResult<Vec<u8>> {
    build_midi(notes)
}
