//! Frame-aligned blend between two tensors.

use ndarray::s;

use super::stretch::resample_frames;
use crate::error::{Result, SpectralError};
use crate::spectral::SpectralTensor;

fn check_alpha(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(SpectralError::parameter(name, format!("blend weight must be in [0, 1], got {}", value)));
    }
    Ok(())
}

/// Blends `b` into `a` with a weight ramping linearly from `blend_start`
/// on the first frame to `blend_end` on the last.
///
/// `b` is first resampled along its frame axis to `a`'s frame count. Output
/// frame `i` is `(1 - alpha_i) * a[i] + alpha_i * b[i]`; metadata comes
/// from `a`.
pub fn morph(a: &SpectralTensor, b: &SpectralTensor, blend_start: f32, blend_end: f32) -> Result<SpectralTensor> {
    check_alpha("blend_start", blend_start)?;
    check_alpha("blend_end", blend_end)?;
    a.check_compatible(b)?;

    let frames = a.frames();
    let resampled = resample_frames(b.data(), frames);
    log::debug!(
        "Morph: {} frames (b resampled from {}), alpha {:.2} -> {:.2}",
        frames, b.frames(), blend_start, blend_end
    );

    let mut data = a.data().clone();
    for i in 0..frames {
        let alpha = if frames > 1 {
            blend_start + (blend_end - blend_start) * i as f32 / (frames - 1) as f32
        } else {
            blend_start
        };
        let src = resampled.slice(s![.., i, ..]);
        let mut dst = data.slice_mut(s![.., i, ..]);
        dst.zip_mut_with(&src, |x, &y| *x = *x * (1.0 - alpha) + y * alpha);
    }
    a.with_data(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::{Complex32, StftParams, WindowKind};
    use ndarray::Array3;

    fn filled(value: Complex32, frames: usize) -> SpectralTensor {
        let params = StftParams::new(512, 128, WindowKind::Hann);
        let data = Array3::from_elem((1, frames, params.bins()), value);
        SpectralTensor::new(16000, params, frames * 128, data).unwrap()
    }

    fn frame_mean(t: &SpectralTensor, frame: usize) -> f32 {
        let f = t.data().slice(s![0, frame, ..]);
        f.iter().map(|c| c.norm()).sum::<f32>() / f.len() as f32
    }

    #[test]
    fn test_zero_blend_is_first_input() {
        let a = filled(Complex32::new(1.0, 0.0), 20);
        let b = filled(Complex32::new(0.0, 0.0), 20);
        assert_eq!(morph(&a, &b, 0.0, 0.0).unwrap(), a);
    }

    #[test]
    fn test_full_blend_is_second_input() {
        let a = filled(Complex32::new(0.0, 0.0), 20);
        let b = filled(Complex32::new(0.0, 1.0), 20);
        let m = morph(&a, &b, 1.0, 1.0).unwrap();
        assert!(m.data().iter().all(|c| (c - Complex32::new(0.0, 1.0)).norm() < 1e-6));
    }

    #[test]
    fn test_crossfade_ramp() {
        let a = filled(Complex32::new(1.0, 0.0), 21);
        let b = filled(Complex32::new(0.0, 0.0), 21);
        let m = morph(&a, &b, 0.0, 1.0).unwrap();
        assert!((frame_mean(&m, 0) - 1.0).abs() < 1e-6);
        assert!((frame_mean(&m, 10) - 0.5).abs() < 1e-6);
        assert!(frame_mean(&m, 20) < 1e-6);
    }

    #[test]
    fn test_output_follows_first_input() {
        let a = filled(Complex32::new(1.0, 0.0), 20);
        let b = filled(Complex32::new(0.5, 0.0), 40);
        let m = morph(&a, &b, 0.0, 1.0).unwrap();
        assert_eq!(m.frames(), 20);
        assert_eq!(m.original_frames(), a.original_frames());
        assert!((frame_mean(&m, 19) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_incompatible_inputs() {
        let a = filled(Complex32::new(1.0, 0.0), 20);
        let params = StftParams::new(512, 256, WindowKind::Hann);
        let data = Array3::zeros((1, 20, params.bins()));
        let b = SpectralTensor::new(16000, params, 20 * 256, data).unwrap();
        assert!(matches!(morph(&a, &b, 0.0, 1.0), Err(SpectralError::Compatibility { .. })));
    }

    #[test]
    fn test_blend_range_checked() {
        let a = filled(Complex32::new(1.0, 0.0), 4);
        assert!(morph(&a, &a, -0.1, 1.0).is_err());
        assert!(morph(&a, &a, 0.0, 1.5).is_err());
        assert!(morph(&a, &a, f32::NAN, 1.0).is_err());
    }
}
