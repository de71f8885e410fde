//! Serialises decoded note events into a standard MIDI byte stream
//! (spec.md §4.6).
//!
//! Grounded on the `midly`-based writer in the MIDI-export reference file:
//! absolute-tick events are collected into a flat list, sorted by tick (ties
//! broken by a priority so note-offs land before note-ons at the same tick),
//! then converted to the delta-tick `TrackEvent`s `midly::Smf` expects.

use midly::num::{u15, u24, u28, u4, u7};
use midly::{Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

use crate::error::{NoteCoreError, NoteCoreResult};
use crate::time_map::NoteEventTime;

/// Pulses (ticks) per quarter note used for every emitted file (spec.md §4.6).
pub const PPQ: u16 = 480;

/// Fixed tempo assumption: 120 BPM, i.e. 500000 microseconds per quarter
/// note. Tempo/beat inference is an explicit non-goal, so every emitted
/// file declares this single, constant tempo.
const MICROS_PER_QUARTER: u32 = 500_000;

/// General MIDI program number for "acoustic grand piano".
const ACOUSTIC_GRAND_PIANO: u8 = 0;

/// Contour-bin pitch-bend units per semitone (spec.md §4.4): each bend unit
/// is one third of a semitone.
const BEND_UNITS_PER_SEMITONE: f64 = 3.0;

/// Assumed total pitch-bend wheel range, in semitones, used to scale
/// contour-bin offsets into the 14-bit MIDI pitch-bend value range. Not
/// exercised by any golden scenario; recorded as an open-question decision
/// in DESIGN.md.
const PITCH_BEND_RANGE_SEMITONES: f64 = 2.0;

/// Collaborator abstraction over MIDI byte-stream assembly, so the decoder
/// and pipeline never depend on `midly` directly (spec.md §2, "MidiBuilder
/// collaborator").
pub trait MidiBuilder {
    fn build(&self, notes: &[NoteEventTime]) -> NoteCoreResult<Vec<u8>>;
}

/// Default [`MidiBuilder`] backed by the `midly` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardMidiBuilder;

impl MidiBuilder for StandardMidiBuilder {
    fn build(&self, notes: &[NoteEventTime]) -> NoteCoreResult<Vec<u8>> {
        build_midi(notes)
    }
}

/// One absolute-tick MIDI event awaiting delta-conversion.
struct AbsEvent {
    tick: u64,
    /// Lower sorts first among events sharing a tick; used to order
    /// note-offs before note-ons and both before pitch-bends at the same
    /// instant.
    priority: u8,
    kind: TrackEventKind<'static>,
}

fn seconds_to_ticks(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    let ticks = seconds * (1_000_000.0 / MICROS_PER_QUARTER as f64) * PPQ as f64;
    ticks.round() as u64
}

/// `velocity` is a normalised real in `[0, 1]`; byte-level MIDI velocity is
/// the nearest byte value on the 0-127 scale (truncating, matching the
/// reference pipeline's behaviour, not rounding).
fn velocity_byte(amplitude: f32) -> u8 {
    let clamped = amplitude.clamp(0.0, 1.0);
    (clamped * 127.0) as u8
}

/// Converts a contour-bin pitch-bend offset into a signed 14-bit MIDI
/// pitch-bend value, assuming a symmetric `PITCH_BEND_RANGE_SEMITONES`
/// wheel range. `0x2000` (8192) is the wheel's centre.
fn bend_to_pitch_wheel(bend_units: i32) -> i16 {
    let semitones = bend_units as f64 / BEND_UNITS_PER_SEMITONE;
    let fraction = (semitones / PITCH_BEND_RANGE_SEMITONES).clamp(-1.0, 1.0);
    (fraction * 8192.0).round() as i16
}

fn to_delta_track(mut abs_events: Vec<AbsEvent>) -> Vec<TrackEvent<'static>> {
    abs_events.sort_by(|a, b| a.tick.cmp(&b.tick).then_with(|| a.priority.cmp(&b.priority)));

    let mut out = Vec::with_capacity(abs_events.len() + 1);
    let mut cursor = 0u64;
    for event in abs_events {
        let delta = event.tick.saturating_sub(cursor).min(0x0FFF_FFFF);
        out.push(TrackEvent {
            delta: u28::new(delta as u32),
            kind: event.kind,
        });
        cursor = event.tick;
    }
    out.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    out
}

const PRIORITY_NOTE_OFF: u8 = 0;
const PRIORITY_NOTE_ON: u8 = 1;
const PRIORITY_BEND: u8 = 2;

/// Builds the single-track standard MIDI file described by `notes`
/// (spec.md §4.6): one "acoustic grand piano" track at ppq=480, a fixed
/// 120 BPM tempo meta event, a note-on/note-off pair per note, and a
/// pitch-bend event per entry in each note's bend curve.
pub fn build_midi(notes: &[NoteEventTime]) -> NoteCoreResult<Vec<u8>> {
    let channel = u4::new(0);

    let mut events = Vec::with_capacity(notes.len() * 2 + 2);
    events.push(AbsEvent {
        tick: 0,
        priority: PRIORITY_NOTE_OFF,
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(MICROS_PER_QUARTER))),
    });
    events.push(AbsEvent {
        tick: 0,
        priority: PRIORITY_NOTE_OFF,
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: u7::new(ACOUSTIC_GRAND_PIANO),
            },
        },
    });

    for note in notes {
        if !(21..=108).contains(&note.pitch_midi) {
            return Err(NoteCoreError::MidiError(format!(
                "pitch {} out of the 88-key MIDI range",
                note.pitch_midi
            )));
        }
        let key = u7::new(note.pitch_midi as u8);
        let vel = u7::new(velocity_byte(note.amplitude));

        let on_tick = seconds_to_ticks(note.start_time_seconds);
        let off_tick = seconds_to_ticks(note.start_time_seconds + note.duration_seconds);

        events.push(AbsEvent {
            tick: on_tick,
            priority: PRIORITY_NOTE_ON,
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn { key, vel },
            },
        });
        events.push(AbsEvent {
            tick: off_tick,
            priority: PRIORITY_NOTE_OFF,
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key,
                    vel: u7::new(0),
                },
            },
        });

        if let Some(bends) = &note.pitch_bends {
            let n = bends.len();
            for (i, bend) in bends.iter().enumerate() {
                let t = note.start_time_seconds + (i as f64) * note.duration_seconds / n as f64;
                let tick = seconds_to_ticks(t);
                let wheel = bend_to_pitch_wheel(*bend);
                let value = (wheel as i32 + 8192).clamp(0, 0x3FFF) as u16;
                events.push(AbsEvent {
                    tick,
                    priority: PRIORITY_BEND,
                    kind: TrackEventKind::Midi {
                        channel,
                        message: MidiMessage::PitchBend {
                            bend: midly::PitchBend(midly::num::u14::new(value)),
                        },
                    },
                });
            }
        }
    }

    let track = to_delta_track(events);

    let smf = Smf {
        header: Header {
            format: midly::Format::SingleTrack,
            timing: Timing::Metrical(u15::new(PPQ)),
        },
        tracks: vec![track],
    };

    let mut buffer = Vec::new();
    smf.write_std(&mut buffer)
        .map_err(|e| NoteCoreError::MidiError(e.to_string()))?;
    Ok(buffer)
}
