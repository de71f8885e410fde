//! Concatenates the row-chunks the driver delivers into the three aligned
//! matrices the decoder operates on (spec.md §2 component 3).
//!
//! The driver already truncates each chunk so the running total never
//! exceeds `nOutputFramesOriginal`; this stage only needs to stack them.

use ndarray::{concatenate, Array2, Axis};

use crate::error::{NoteCoreError, NoteCoreResult};
use crate::inference::Chunk;

/// The three time-aligned matrices handed to [`crate::decode`].
pub struct AlignedOutput {
    pub frames: Array2<f32>,
    pub onsets: Array2<f32>,
    pub contours: Array2<f32>,
}

/// Stack every chunk's rows in delivery order.
pub fn align_chunks(chunks: &[Chunk]) -> NoteCoreResult<AlignedOutput> {
    if chunks.is_empty() {
        return Ok(AlignedOutput {
            frames: Array2::zeros((0, 0)),
            onsets: Array2::zeros((0, 0)),
            contours: Array2::zeros((0, 0)),
        });
    }

    let non_empty: Vec<&Chunk> = chunks.iter().filter(|c| c.frames.shape()[0] > 0).collect();
    if non_empty.is_empty() {
        let cols_f = chunks[0].frames.shape()[1];
        let cols_o = chunks[0].onsets.shape()[1];
        let cols_c = chunks[0].contours.shape()[1];
        return Ok(AlignedOutput {
            frames: Array2::zeros((0, cols_f)),
            onsets: Array2::zeros((0, cols_o)),
            contours: Array2::zeros((0, cols_c)),
        });
    }

    let frame_views: Vec<_> = non_empty.iter().map(|c| c.frames.view()).collect();
    let onset_views: Vec<_> = non_empty.iter().map(|c| c.onsets.view()).collect();
    let contour_views: Vec<_> = non_empty.iter().map(|c| c.contours.view()).collect();

    let frames = concatenate(Axis(0), &frame_views)
        .map_err(|e| NoteCoreError::ShapeMismatch(e.to_string()))?;
    let onsets = concatenate(Axis(0), &onset_views)
        .map_err(|e| NoteCoreError::ShapeMismatch(e.to_string()))?;
    let contours = concatenate(Axis(0), &contour_views)
        .map_err(|e| NoteCoreError::ShapeMismatch(e.to_string()))?;

    if frames.shape()[0] != onsets.shape()[0] || frames.shape()[0] != contours.shape()[0] {
        return Err(NoteCoreError::ShapeMismatch(
            "frames/onsets/contours row counts diverged after alignment".into(),
        ));
    }

    Ok(AlignedOutput {
        frames,
        onsets,
        contours,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn chunk(rows: usize, progress: f32) -> Chunk {
        Chunk {
            frames: Array2::from_elem((rows, 4), 1.0),
            onsets: Array2::from_elem((rows, 4), 1.0),
            contours: Array2::from_elem((rows, 12), 1.0),
            progress,
        }
    }

    #[test]
    fn concatenates_in_order() {
        let chunks = vec![chunk(2, 0.0), chunk(3, 0.5)];
        let aligned = align_chunks(&chunks).unwrap();
        assert_eq!(aligned.frames.shape(), &[5, 4]);
        assert_eq!(aligned.contours.shape(), &[5, 12]);
    }

    #[test]
    fn empty_chunk_list_is_empty_output() {
        let aligned = align_chunks(&[]).unwrap();
        assert_eq!(aligned.frames.shape(), &[0, 0]);
    }

    #[test]
    fn all_zero_row_chunks_stay_empty() {
        let chunks = vec![chunk(0, 0.0), chunk(0, 1.0)];
        let aligned = align_chunks(&chunks).unwrap();
        assert_eq!(aligned.frames.shape(), &[0, 4]);
    }
}
