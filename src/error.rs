//! Error types for the note-decoding core.

use thiserror::Error;

/// Errors raised by any stage of the transcription pipeline.
#[derive(Error, Debug)]
pub enum NoteCoreError {
    /// Input sample rate did not match [`crate::constants::AUDIO_SAMPLE_RATE`].
    #[error("invalid sample rate: expected {expected}, got {got}")]
    InvalidSampleRate { expected: u32, got: u32 },

    /// Input audio was not mono.
    #[error("invalid channel count: expected 1 (mono), got {got}")]
    InvalidChannelCount { got: usize },

    /// A structural constant failed its own sanity check (e.g. an odd
    /// overlap length). Indicates a build-time configuration bug, not bad
    /// input data.
    #[error("invalid configuration constant: {0}")]
    InvalidConstant(String),

    /// The inference collaborator failed.
    #[error("model inference failed: {0}")]
    ModelError(String),

    /// The three model outputs did not agree on shape.
    #[error("shape mismatch between model outputs: {0}")]
    ShapeMismatch(String),

    /// A melodia-trick forward/backward pass produced an out-of-range
    /// frame index. This is a bug in the decoder, not a data problem.
    #[error("note decoder invariant violated: {0}")]
    InvariantViolation(String),

    /// Failure while assembling the output MIDI byte stream.
    #[error("midi assembly failed: {0}")]
    MidiError(String),

    /// Wrapped I/O error (model file loading, etc).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias used throughout the crate.
pub type NoteCoreResult<T> = Result<T, NoteCoreError>;
