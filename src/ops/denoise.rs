//! Spectral subtraction noise reduction.

use std::ops::Range;

use ndarray::{s, Axis};
use rustfft::num_complex::Complex32;

use crate::error::{Result, SpectralError};
use crate::spectral::SpectralTensor;

/// Frame range used to estimate the noise profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseRegion {
    pub start_frame: usize,
    pub end_frame: usize,
}

impl NoiseRegion {
    /// Maps a `[start, end)` interval in seconds onto frames of `tensor`.
    ///
    /// Frame indices are `round(t * sample_rate / hop_length)`, clamped so
    /// the region always covers at least one existing frame.
    pub fn from_seconds(tensor: &SpectralTensor, start: f64, end: f64) -> Result<Self> {
        if !start.is_finite() || start < 0.0 {
            return Err(SpectralError::parameter("noise_start", format!("invalid start time {}", start)));
        }
        if !end.is_finite() || end <= start {
            return Err(SpectralError::parameter(
                "noise_end",
                format!("noise end {} must be after noise start {}", end, start),
            ));
        }
        if tensor.frames() == 0 {
            return Err(SpectralError::parameter("noise_start", "tensor has no frames"));
        }

        let frames_per_second = tensor.sample_rate() as f64 / tensor.hop_length() as f64;
        let to_frame = |t: f64| (t * frames_per_second).round() as usize;

        let start_frame = to_frame(start).min(tensor.frames() - 1);
        let end_frame = to_frame(end).min(tensor.frames()).max(start_frame + 1);
        Ok(Self { start_frame, end_frame })
    }

    fn range(&self, frames: usize) -> Result<Range<usize>> {
        if self.start_frame >= self.end_frame || self.end_frame > frames {
            return Err(SpectralError::parameter(
                "noise_region",
                format!("frames {}..{} outside 0..{}", self.start_frame, self.end_frame, frames),
            ));
        }
        Ok(self.start_frame..self.end_frame)
    }
}

/// Mean magnitude per bin over the region, averaged across channels too.
pub fn noise_profile(tensor: &SpectralTensor, region: NoiseRegion) -> Result<Vec<f32>> {
    let range = region.range(tensor.frames())?;
    let noise = tensor.data().slice(s![.., range, ..]);
    let count = (noise.dim().0 * noise.dim().1) as f64;

    let mut profile = vec![0.0f64; tensor.bins()];
    for lane in noise.lanes(Axis(2)) {
        for (acc, c) in profile.iter_mut().zip(lane.iter()) {
            *acc += c.norm() as f64;
        }
    }
    Ok(profile.into_iter().map(|v| (v / count) as f32).collect())
}

/// Subtracts `oversubtract * profile` from every frame's magnitude, floored
/// at zero, keeping each bin's phase.
pub fn denoise(tensor: &SpectralTensor, region: NoiseRegion, oversubtract: f32) -> Result<SpectralTensor> {
    if !oversubtract.is_finite() || oversubtract < 0.0 {
        return Err(SpectralError::parameter(
            "oversubtract",
            format!("must be a non-negative number, got {}", oversubtract),
        ));
    }

    let profile = noise_profile(tensor, region)?;
    log::debug!(
        "Denoise: noise frames {}..{}, oversubtract {}",
        region.start_frame, region.end_frame, oversubtract
    );

    let mut data = tensor.data().clone();
    for mut lane in data.lanes_mut(Axis(2)) {
        for (c, &noise) in lane.iter_mut().zip(profile.iter()) {
            let magnitude = (c.norm() - oversubtract * noise).max(0.0);
            *c = Complex32::from_polar(magnitude, c.arg());
        }
    }
    tensor.with_data(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::{StftParams, WindowKind};
    use ndarray::Array3;

    const SR: u32 = 16000;
    const HOP: usize = 512;

    fn tensor_from(values: Array3<Complex32>) -> SpectralTensor {
        let (_, frames, bins) = values.dim();
        let params = StftParams::new((bins - 1) * 2, HOP.min((bins - 1) * 2), WindowKind::Hann);
        SpectralTensor::new(SR, params, frames * HOP, values).unwrap()
    }

    fn mean_magnitude(t: &SpectralTensor) -> f32 {
        t.data().iter().map(|c| c.norm()).sum::<f32>() / t.data().len() as f32
    }

    fn region_frames(t: &SpectralTensor, start: usize, end: usize) -> NoiseRegion {
        NoiseRegion::from_seconds(t, start as f64 * HOP as f64 / SR as f64, end as f64 * HOP as f64 / SR as f64)
            .unwrap()
    }

    #[test]
    fn test_region_mapping() {
        let t = tensor_from(Array3::from_elem((1, 20, 1025), Complex32::new(0.1, 0.0)));
        let r = region_frames(&t, 0, 5);
        assert_eq!((r.start_frame, r.end_frame), (0, 5));

        // past the end clamps to the last frame
        let r = NoiseRegion::from_seconds(&t, 100.0, 200.0).unwrap();
        assert_eq!((r.start_frame, r.end_frame), (19, 20));

        assert!(NoiseRegion::from_seconds(&t, 0.5, 0.5).is_err());
        assert!(NoiseRegion::from_seconds(&t, -1.0, 0.5).is_err());
    }

    #[test]
    fn test_uniform_noise_removed() {
        let t = tensor_from(Array3::from_elem((1, 20, 1025), Complex32::new(0.1, 0.0)));
        let region = region_frames(&t, 0, 5);
        let result = denoise(&t, region, 1.0).unwrap();
        assert!(mean_magnitude(&result) < 0.01);
    }

    #[test]
    fn test_signal_above_noise_preserved() {
        let mut values = Array3::<Complex32>::zeros((1, 30, 1025));
        values.slice_mut(s![.., ..5, ..]).fill(Complex32::new(0.1, 0.0));
        values.slice_mut(s![.., 5.., ..]).fill(Complex32::new(0.0, 1.0));
        let t = tensor_from(values);

        let result = denoise(&t, region_frames(&t, 0, 5), 1.0).unwrap();
        let signal = result.data().slice(s![.., 5.., ..]);
        for c in signal.iter() {
            assert!((c.norm() - 0.9).abs() < 1e-5);
            // phase kept
            assert!((c.arg() - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
        }
    }

    #[test]
    fn test_oversubtract_more_aggressive() {
        let t = tensor_from(Array3::from_shape_fn((1, 20, 257), |(_, f, b)| {
            Complex32::new(0.3 + 0.01 * f as f32, 0.002 * b as f32)
        }));
        let region = region_frames(&t, 0, 5);
        let mild = denoise(&t, region, 1.0).unwrap();
        let strong = denoise(&t, region, 2.0).unwrap();
        assert!(mean_magnitude(&strong) <= mean_magnitude(&mild));
    }

    #[test]
    fn test_magnitude_never_negative() {
        let t = tensor_from(Array3::from_shape_fn((2, 10, 65), |(c, f, b)| {
            Complex32::new(0.05 * (c + 1) as f32, -0.01 * ((f + b) % 7) as f32)
        }));
        let region = region_frames(&t, 0, 5);
        for factor in [0.0, 0.5, 1.0, 5.0, 100.0] {
            let result = denoise(&t, region, factor).unwrap();
            assert!(result.data().iter().all(|c| c.norm() >= 0.0 && c.norm().is_finite()));
        }
        assert!(denoise(&t, region, -1.0).is_err());
    }

    #[test]
    fn test_profile_averages_channels() {
        let mut values = Array3::<Complex32>::zeros((2, 4, 5));
        values.slice_mut(s![0, .., ..]).fill(Complex32::new(1.0, 0.0));
        values.slice_mut(s![1, .., ..]).fill(Complex32::new(3.0, 0.0));
        let t = tensor_from(values);
        let profile = noise_profile(&t, NoiseRegion { start_frame: 0, end_frame: 4 }).unwrap();
        assert!(profile.iter().all(|&v| (v - 2.0).abs() < 1e-6));
    }
}
