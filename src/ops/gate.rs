//! Spectral gate.

use rustfft::num_complex::Complex32;

use crate::error::{Result, SpectralError};
use crate::spectral::SpectralTensor;

/// Zeroes every bin whose magnitude is below `threshold_db` relative to the
/// tensor's own peak magnitude (0 dB == peak). Bins exactly at the
/// threshold are kept.
pub fn gate(tensor: &SpectralTensor, threshold_db: f64) -> Result<SpectralTensor> {
    if !threshold_db.is_finite() || threshold_db > 0.0 {
        return Err(SpectralError::parameter(
            "threshold",
            format!("gate threshold must be a finite dB value <= 0, got {}", threshold_db),
        ));
    }

    let peak = tensor.peak_magnitude();
    let linear = (peak as f64 * 10f64.powf(threshold_db / 20.0)) as f32;
    log::debug!("Gate at {} dB: peak {:.6}, linear threshold {:.6}", threshold_db, peak, linear);

    let data = tensor
        .data()
        .mapv(|c| if c.norm() < linear { Complex32::new(0.0, 0.0) } else { c });
    tensor.with_data(data)
}

/// Number of bins with a non-zero value.
pub fn count_nonzero(tensor: &SpectralTensor) -> usize {
    tensor.data().iter().filter(|c| c.re != 0.0 || c.im != 0.0).count()
}
