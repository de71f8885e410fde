//! The opaque neural `Model` collaborator and the driver that walks
//! windowed audio through it.
//!
//! Grounded on `rf-ml::inference::InferenceEngine`: a trait abstraction over
//! the actual runtime (here `tract-onnx`, the pure-Rust backend `rf-ml`
//! prefers) so the decoder never depends on a concrete graph runtime
//! (spec.md §9, "Tensor-runtime coupling").

use std::path::Path;

use ndarray::{s, Array2, ArrayView3};

use crate::constants::{ANNOT_N_FRAMES, ANNOTATIONS_FPS, AUDIO_SAMPLE_RATE, N_OVERLAP_OVER_2};
use crate::error::{NoteCoreError, NoteCoreResult};
use crate::framer::FramedAudio;

/// The three same-shape output tensors the model produces for one window,
/// with the leading batch dimension already squeezed away.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    /// Shape `(ANNOT_N_FRAMES, 88)`.
    pub frames: Array2<f32>,
    /// Shape `(ANNOT_N_FRAMES, 88)`.
    pub onsets: Array2<f32>,
    /// Shape `(ANNOT_N_FRAMES, 264)`.
    pub contours: Array2<f32>,
}

/// Abstraction over the neural inference backend. Implementations must
/// return the three outputs bound to the fixed tensor names `Identity_1`
/// (frames), `Identity_2` (onsets), `Identity` (contours) — see spec.md §6.
pub trait InferenceEngine: Send + Sync {
    /// Run the model on one batched window of shape `(1, AUDIO_N_SAMPLES, 1)`.
    fn execute(&self, window: ArrayView3<f32>) -> NoteCoreResult<ModelOutput>;
}

/// Pure-Rust ONNX backend, mirroring `rf_ml::inference::InferenceEngine`'s
/// `tract` code path (no GPU execution provider plumbing needed here: the
/// note decoder never runs in real time).
pub struct TractInferenceEngine {
    model: tract_onnx::prelude::SimplePlan<
        tract_onnx::prelude::TypedFact,
        Box<dyn tract_onnx::prelude::TypedOp>,
        tract_onnx::prelude::Graph<tract_onnx::prelude::TypedFact, Box<dyn tract_onnx::prelude::TypedOp>>,
    >,
}

impl TractInferenceEngine {
    /// Load an ONNX graph from `path`, binding its three named outputs.
    pub fn load<P: AsRef<Path>>(path: P) -> NoteCoreResult<Self> {
        use tract_onnx::prelude::*;

        let path = path.as_ref();
        if !path.exists() {
            return Err(NoteCoreError::ModelError(format!(
                "model not found: {}",
                path.display()
            )));
        }

        let mut inference_model = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| NoteCoreError::ModelError(e.to_string()))?;

        // Bind the fixed output names (spec.md §6) in (frames, onsets,
        // contours) order regardless of the graph's declaration order.
        let frames_outlet = inference_model
            .node_by_name("Identity_1")
            .map_err(|e| NoteCoreError::ModelError(e.to_string()))?
            .id;
        let onsets_outlet = inference_model
            .node_by_name("Identity_2")
            .map_err(|e| NoteCoreError::ModelError(e.to_string()))?
            .id;
        let contours_outlet = inference_model
            .node_by_name("Identity")
            .map_err(|e| NoteCoreError::ModelError(e.to_string()))?
            .id;
        inference_model
            .set_output_outlets(&[
                OutletId::new(frames_outlet, 0),
                OutletId::new(onsets_outlet, 0),
                OutletId::new(contours_outlet, 0),
            ])
            .map_err(|e| NoteCoreError::ModelError(e.to_string()))?;

        let model = inference_model
            .into_optimized()
            .map_err(|e| NoteCoreError::ModelError(e.to_string()))?
            .into_runnable()
            .map_err(|e| NoteCoreError::ModelError(e.to_string()))?;

        log::info!("loaded note-decoding model from {}", path.display());

        Ok(Self { model })
    }
}

impl InferenceEngine for TractInferenceEngine {
    fn execute(&self, window: ArrayView3<f32>) -> NoteCoreResult<ModelOutput> {
        use tract_onnx::prelude::*;

        let tensor: Tensor = window.to_owned().into_dyn().into();
        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .map_err(|e| NoteCoreError::ModelError(e.to_string()))?;

        if outputs.len() != 3 {
            return Err(NoteCoreError::ShapeMismatch(format!(
                "expected 3 model outputs, got {}",
                outputs.len()
            )));
        }

        let to_array2 = |t: &Tensor| -> NoteCoreResult<Array2<f32>> {
            let view = t
                .to_array_view::<f32>()
                .map_err(|e| NoteCoreError::ShapeMismatch(e.to_string()))?;
            let squeezed = view
                .to_owned()
                .into_dimensionality::<ndarray::Ix3>()
                .map_err(|e| NoteCoreError::ShapeMismatch(e.to_string()))?;
            Ok(squeezed.index_axis(ndarray::Axis(0), 0).to_owned())
        };

        Ok(ModelOutput {
            frames: to_array2(&outputs[0])?,
            onsets: to_array2(&outputs[1])?,
            contours: to_array2(&outputs[2])?,
        })
    }
}

/// In-memory stand-in for the model, used by tests and by callers driving
/// the pipeline without a real ONNX graph.
pub struct MockInferenceEngine {
    frames: Array2<f32>,
    onsets: Array2<f32>,
    contours: Array2<f32>,
}

impl MockInferenceEngine {
    /// Every window produces the same fixed output (useful for pure
    /// unit-testing of the driver's windowing/trimming logic).
    pub fn constant(frames: Array2<f32>, onsets: Array2<f32>, contours: Array2<f32>) -> Self {
        Self {
            frames,
            onsets,
            contours,
        }
    }
}

impl InferenceEngine for MockInferenceEngine {
    fn execute(&self, _window: ArrayView3<f32>) -> NoteCoreResult<ModelOutput> {
        Ok(ModelOutput {
            frames: self.frames.clone(),
            onsets: self.onsets.clone(),
            contours: self.contours.clone(),
        })
    }
}

/// One aligned row-chunk delivered by the driver to its sink, together with
/// the fraction of total progress completed so far.
pub struct Chunk {
    pub frames: Array2<f32>,
    pub onsets: Array2<f32>,
    pub contours: Array2<f32>,
    pub progress: f32,
}

/// Strips the leading/trailing overlap guard rows from one window's raw
/// model output (spec.md §4.2 step 3).
fn unwrap_overlap(out: &ModelOutput) -> ModelOutput {
    let kept_rows = ANNOT_N_FRAMES - 2 * N_OVERLAP_OVER_2;
    let slice = s![N_OVERLAP_OVER_2..N_OVERLAP_OVER_2 + kept_rows, ..];
    ModelOutput {
        frames: out.frames.slice(slice).to_owned(),
        onsets: out.onsets.slice(slice).to_owned(),
        contours: out.contours.slice(slice).to_owned(),
    }
}

/// Walks every window produced by [`crate::framer::frame_audio`] through
/// `engine`, unwraps overlap, trims to the original audio length, and
/// invokes `sink` once per (possibly truncated) chunk, strictly in window
/// order (spec.md §4.2, §5).
///
/// The two `yield_now` points below stand in for the cooperative
/// suspension points named in spec.md §5 (awaiting model output, awaiting
/// tensor→host materialisation); `engine.execute` itself is synchronous
/// here because every bundled `InferenceEngine` implementation is.
pub async fn run_driver<F>(
    framed: &FramedAudio,
    engine: &dyn InferenceEngine,
    mut sink: F,
) -> NoteCoreResult<()>
where
    F: FnMut(Chunk),
{
    let num_windows = framed.windows.shape()[0];
    let n_output_frames_original =
        (framed.original_len as u64 * ANNOTATIONS_FPS as u64 / AUDIO_SAMPLE_RATE as u64) as usize;

    let mut calculated_frames = 0usize;

    for i in 0..num_windows {
        let progress = i as f32 / num_windows.max(1) as f32;
        log::trace!("driver progress {progress:.3} (window {i}/{num_windows})");

        tokio::task::yield_now().await;
        let window = framed.windows.slice(s![i..i + 1, .., ..]);
        let raw = engine.execute(window)?;

        tokio::task::yield_now().await;
        let unwrapped = unwrap_overlap(&raw);

        if calculated_frames >= n_output_frames_original {
            // Cap already reached; later windows are silently ignored.
            continue;
        }

        let chunk_rows = unwrapped.frames.shape()[0];
        let remaining = n_output_frames_original - calculated_frames;
        let take = chunk_rows.min(remaining);

        let truncated = ModelOutput {
            frames: unwrapped.frames.slice(s![0..take, ..]).to_owned(),
            onsets: unwrapped.onsets.slice(s![0..take, ..]).to_owned(),
            contours: unwrapped.contours.slice(s![0..take, ..]).to_owned(),
        };
        calculated_frames += take;

        sink(Chunk {
            frames: truncated.frames,
            onsets: truncated.onsets,
            contours: truncated.contours,
            progress,
        });
    }

    // The per-window progress above reports i/W, so the final window only
    // ever reaches (W-1)/W; spec.md §4.2 requires a terminal 1.0 report
    // regardless of how many windows were skipped once the frame cap was
    // reached. This carries no rows, so the aligner's empty-chunk filter
    // drops it without affecting decoded output.
    sink(Chunk {
        frames: Array2::zeros((0, crate::constants::N_FREQ_BINS_NOTES)),
        onsets: Array2::zeros((0, crate::constants::N_FREQ_BINS_NOTES)),
        contours: Array2::zeros((0, crate::constants::N_FREQ_BINS_CONTOURS)),
        progress: 1.0,
    });

    log::debug!(
        "driver complete: {calculated_frames}/{n_output_frames_original} output frames collected"
    );
    Ok(())
}
