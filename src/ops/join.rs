//! Spectral superposition: the inverse of decompose.

use ndarray::{s, Array3, Zip};
use rustfft::num_complex::Complex32;

use crate::error::{Result, SpectralError};
use crate::spectral::SpectralTensor;

/// Sums `parts` bin for bin and frame for frame.
///
/// Every part must be compatible with the first. Differing frame counts
/// fail when `strict`; otherwise shorter parts are padded with silent
/// frames at the tail. The result's `original_frames` is the largest of
/// the inputs.
pub fn join(parts: &[SpectralTensor], strict: bool) -> Result<SpectralTensor> {
    let (first, rest) = parts
        .split_first()
        .ok_or_else(|| SpectralError::parameter("inputs", "at least one tensor is required"))?;

    for (i, part) in rest.iter().enumerate() {
        first.check_compatible(part).map_err(|e| match e {
            SpectralError::Compatibility { message } => {
                SpectralError::compatibility(format!("input {} is incompatible with input 0: {}", i + 1, message))
            }
            other => other,
        })?;
    }

    let max_frames = parts.iter().map(|p| p.frames()).max().unwrap_or(0);
    let min_frames = parts.iter().map(|p| p.frames()).min().unwrap_or(0);
    if max_frames != min_frames {
        if strict {
            return Err(SpectralError::compatibility(format!(
                "frame count mismatch ({}-{} frames); join non-strictly to pad shorter inputs with silence",
                min_frames, max_frames
            )));
        }
        log::warn!(
            "Frame counts differ ({}-{}); padding shorter inputs with silence",
            min_frames, max_frames
        );
    }

    let mut acc = Array3::<Complex32>::zeros((first.channels(), max_frames, first.bins()));
    for part in parts {
        Zip::from(acc.slice_mut(s![.., ..part.frames(), ..]))
            .and(part.data())
            .for_each(|a, &b| *a += b);
    }

    let original_frames = parts.iter().map(|p| p.original_frames()).max().unwrap_or(0);
    log::debug!("Joined {} tensors into {} frames", parts.len(), max_frames);
    first.with_data_and_length(acc, original_frames)
}
