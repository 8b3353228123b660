//! Time stretch by resampling the frame axis.
//!
//! Frames are linearly interpolated per bin on their complex values with no
//! phase correction, so large factors sound phasey. Downstream tools rely
//! on this exact transform.

use ndarray::{s, Array3};
use rustfft::num_complex::Complex32;

use crate::error::{Result, SpectralError};
use crate::spectral::SpectralTensor;

/// Resamples `data` (`[channel, frame, bin]`) to `new_frames` frames.
///
/// Source and destination frames are spread evenly over the same span, so
/// the first and last frames map onto each other.
pub fn resample_frames(data: &Array3<Complex32>, new_frames: usize) -> Array3<Complex32> {
    let (channels, frames, bins) = data.dim();
    let mut out = Array3::<Complex32>::zeros((channels, new_frames, bins));
    if frames == 0 || new_frames == 0 {
        return out;
    }

    let step = if new_frames > 1 {
        (frames - 1) as f64 / (new_frames - 1) as f64
    } else {
        0.0
    };

    for i in 0..new_frames {
        let pos = i as f64 * step;
        let lo = (pos.floor() as usize).min(frames - 1);
        let hi = (lo + 1).min(frames - 1);
        let frac = (pos - lo as f64) as f32;

        for ch in 0..channels {
            let mut dst = out.slice_mut(s![ch, i, ..]);
            if frac == 0.0 || lo == hi {
                dst.assign(&data.slice(s![ch, lo, ..]));
            } else {
                let from = data.slice(s![ch, lo, ..]);
                let to = data.slice(s![ch, hi, ..]);
                for ((d, &x), &y) in dst.iter_mut().zip(from.iter()).zip(to.iter()) {
                    *d = x + (y - x) * frac;
                }
            }
        }
    }
    out
}

/// Stretches `tensor` by `factor` (>1 slower, <1 faster) without changing pitch.
///
/// The result has `round(frames * factor)` frames (at least one) and its
/// `original_frames` is scaled by the same factor.
pub fn stretch(tensor: &SpectralTensor, factor: f64) -> Result<SpectralTensor> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(SpectralError::parameter(
            "factor",
            format!("stretch factor must be positive, got {}", factor),
        ));
    }

    let frames = tensor.frames();
    let new_frames = if frames == 0 {
        0
    } else {
        ((frames as f64 * factor).round() as usize).max(1)
    };
    let new_original = (tensor.original_frames() as f64 * factor).round() as usize;

    log::debug!("Stretch x{}: {} -> {} frames", factor, frames, new_frames);

    let data = resample_frames(tensor.data(), new_frames);
    tensor.with_data_and_length(data, new_original)
}
