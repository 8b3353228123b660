//! Pitch shift by remapping frequency bins.

use ndarray::{s, Array3};
use rustfft::num_complex::Complex32;

use crate::error::{Result, SpectralError};
use crate::spectral::SpectralTensor;

/// Parses a transpose amount: `"12"`, `"-3.5"`, or cents with a `c`
/// suffix (`"100c"` == 1 semitone).
pub fn parse_semitones(value: &str) -> Result<f64> {
    let s = value.trim();
    let (number, scale) = match s.strip_suffix('c') {
        Some(cents) => (cents, 0.01),
        None => (s, 1.0),
    };
    number
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v * scale)
        .ok_or_else(|| SpectralError::parameter("semitones", format!("invalid transpose amount '{}'", value)))
}

/// Frequency ratio for a shift of `semitones`.
pub fn semitone_ratio(semitones: f64) -> f64 {
    2.0f64.powf(semitones / 12.0)
}

/// Shifts every bin `k` to the bin nearest `k * 2^(semitones / 12)`.
///
/// Targets beyond Nyquist are dropped, destination bins nothing lands on
/// stay zero, and sources that land on the same bin are summed. Frames and
/// phases are left as they are.
pub fn transpose(tensor: &SpectralTensor, semitones: f64) -> Result<SpectralTensor> {
    if !semitones.is_finite() {
        return Err(SpectralError::parameter(
            "semitones",
            format!("transpose amount must be finite, got {}", semitones),
        ));
    }

    let ratio = semitone_ratio(semitones);
    let bins = tensor.bins();
    let mapping: Vec<(usize, usize)> = (0..bins)
        .filter_map(|src| {
            let target = (src as f64 * ratio).round();
            (target < bins as f64).then_some((src, target as usize))
        })
        .collect();

    log::debug!(
        "Transpose {:+} st (ratio {:.4}): {}/{} bins kept",
        semitones, ratio, mapping.len(), bins
    );

    let (channels, frames, _) = tensor.data().dim();
    let source = tensor.data();
    let mut data = Array3::<Complex32>::zeros((channels, frames, bins));
    for ch in 0..channels {
        for frame in 0..frames {
            let src = source.slice(s![ch, frame, ..]);
            let mut dst = data.slice_mut(s![ch, frame, ..]);
            for &(from, to) in &mapping {
                dst[to] += src[from];
            }
        }
    }

    tensor.with_data(data)
}
