//! Forward / inverse short-time Fourier transform.
//!
//! Forward pads the waveform with `n_fft / 2` zeros on both ends, then adds
//! just enough zeros at the tail for an integer number of hops. Each frame is
//! windowed, transformed and scaled by `1 / sum(window)`; only the
//! non-negative half of the spectrum is kept.
//!
//! Inverse rebuilds the full spectrum by Hermitian symmetry, windows each
//! frame again and overlap-adds, dividing by the summed squared window so the
//! double windowing cancels. Output is trimmed to `original_frames` samples.

use std::sync::Arc;

use ndarray::{Array2, Array3, ArrayView2};
use rustfft::num_complex::{Complex, Complex32};
use rustfft::{Fft, FftPlanner};

use super::tensor::{SpectralTensor, StftParams};
use crate::error::{Result, SpectralError};

/// Overlap-add normalisation below this is treated as zero.
const NOLA_EPSILON: f64 = 1e-10;

/// Transform pair for one set of STFT parameters.
pub struct Stft {
    params: StftParams,
    window: Vec<f64>,
    window_sum: f64,
    fft: Arc<dyn Fft<f64>>,
    ifft: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for Stft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stft").field("params", &self.params).finish()
    }
}

impl Stft {
    pub fn new(params: StftParams) -> Result<Self> {
        params.validate()?;

        let window: Vec<f64> = params
            .window
            .coefficients(params.n_fft)
            .into_iter()
            .map(f64::from)
            .collect();
        check_nola(&window, params.hop_length)?;

        let window_sum: f64 = window.iter().sum();
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(params.n_fft);
        let ifft = planner.plan_fft_inverse(params.n_fft);

        Ok(Self {
            params,
            window,
            window_sum,
            fft,
            ifft,
        })
    }

    pub fn params(&self) -> StftParams {
        self.params
    }

    /// Number of frames the forward transform produces for `samples` input samples.
    pub fn frame_count(&self, samples: usize) -> usize {
        let n = self.params.n_fft;
        let hop = self.params.hop_length;
        let total = self.padded_length(samples);
        (total - n) / hop + 1
    }

    fn padded_length(&self, samples: usize) -> usize {
        let n = self.params.n_fft;
        let hop = self.params.hop_length;
        let total = (samples + 2 * (n / 2)).max(n);
        let excess = (total - n) % hop;
        if excess == 0 { total } else { total + hop - excess }
    }

    /// `samples` is laid out `(frames, channels)`.
    pub fn forward(&self, samples: ArrayView2<f32>, sample_rate: u32) -> Result<SpectralTensor> {
        let (length, channels) = samples.dim();
        if channels == 0 {
            return Err(SpectralError::parameter("channels", "waveform has no channels"));
        }

        let n = self.params.n_fft;
        let hop = self.params.hop_length;
        let half = n / 2;
        let bins = self.params.bins();
        let total = self.padded_length(length);
        let frames = self.frame_count(length);
        let scale = 1.0 / self.window_sum;

        log::debug!(
            "Forward STFT: {} samples x {} ch -> {} frames x {} bins",
            length, channels, frames, bins
        );

        let mut data = Array3::<Complex32>::zeros((channels, frames, bins));
        let mut padded = vec![0.0f64; total];
        let mut buffer = vec![Complex::new(0.0f64, 0.0); n];

        for ch in 0..channels {
            padded.iter_mut().for_each(|v| *v = 0.0);
            for (dst, &src) in padded[half..half + length].iter_mut().zip(samples.column(ch).iter()) {
                *dst = src as f64;
            }

            for frame in 0..frames {
                let start = frame * hop;
                for (i, slot) in buffer.iter_mut().enumerate() {
                    *slot = Complex::new(padded[start + i] * self.window[i], 0.0);
                }
                self.fft.process(&mut buffer);

                for (k, c) in buffer.iter().take(bins).enumerate() {
                    data[[ch, frame, k]] = Complex32::new((c.re * scale) as f32, (c.im * scale) as f32);
                }
            }
        }

        SpectralTensor::new(sample_rate, self.params, length, data)
    }

    /// Returns `(original_frames, channels)` samples. Values are not clipped.
    pub fn inverse(&self, tensor: &SpectralTensor) -> Result<Array2<f32>> {
        if tensor.params() != self.params {
            return Err(SpectralError::parameter(
                "params",
                format!("tensor uses {:?}, transform built for {:?}", tensor.params(), self.params),
            ));
        }

        let n = self.params.n_fft;
        let hop = self.params.hop_length;
        let half = n / 2;
        let bins = self.params.bins();
        let channels = tensor.channels();
        let frames = tensor.frames();
        let original = tensor.original_frames();

        let mut output = Array2::<f32>::zeros((original, channels));
        if frames == 0 {
            return Ok(output);
        }

        let out_len = n + (frames - 1) * hop;
        let mut norm = vec![0.0f64; out_len];
        for frame in 0..frames {
            let start = frame * hop;
            for (i, w) in self.window.iter().enumerate() {
                norm[start + i] += w * w;
            }
        }

        log::debug!(
            "Inverse STFT: {} frames x {} bins x {} ch -> {} samples",
            frames, bins, channels, original
        );

        let data = tensor.data();
        let ifft_scale = self.window_sum / n as f64;
        let mut acc = vec![0.0f64; out_len];
        let mut buffer = vec![Complex::new(0.0f64, 0.0); n];

        for ch in 0..channels {
            acc.iter_mut().for_each(|v| *v = 0.0);

            for frame in 0..frames {
                for k in 0..bins {
                    let c = data[[ch, frame, k]];
                    buffer[k] = Complex::new(c.re as f64, c.im as f64);
                }
                for k in bins..n {
                    buffer[k] = buffer[n - k].conj();
                }
                self.ifft.process(&mut buffer);

                let start = frame * hop;
                for (i, c) in buffer.iter().enumerate() {
                    acc[start + i] += c.re * ifft_scale * self.window[i];
                }
            }

            for (j, sample) in output.column_mut(ch).iter_mut().enumerate() {
                let pos = half + j;
                if pos < out_len && norm[pos] > NOLA_EPSILON {
                    *sample = (acc[pos] / norm[pos]) as f32;
                }
            }
        }

        Ok(output)
    }
}

/// Fails when the squared window does not overlap-add to a non-zero value
/// at every offset within a hop.
fn check_nola(window: &[f64], hop: usize) -> Result<()> {
    for offset in 0..hop {
        let sum: f64 = window.iter().skip(offset).step_by(hop).map(|w| w * w).sum();
        if sum <= NOLA_EPSILON {
            return Err(SpectralError::parameter(
                "hop_length",
                format!(
                    "hop {} leaves samples with zero window overlap for a {}-point window",
                    hop,
                    window.len()
                ),
            ));
        }
    }
    Ok(())
}

/// Waveform `(frames, channels)` to spectral tensor.
pub fn forward(samples: ArrayView2<f32>, sample_rate: u32, params: StftParams) -> Result<SpectralTensor> {
    Stft::new(params)?.forward(samples, sample_rate)
}

/// Spectral tensor back to a `(original_frames, channels)` waveform.
pub fn inverse(tensor: &SpectralTensor) -> Result<Array2<f32>> {
    Stft::new(tensor.params())?.inverse(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::window::WindowKind;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn max_abs_diff(a: &Array2<f32>, b: &Array2<f32>) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).fold(0.0, f32::max)
    }

    #[test]
    fn test_round_trip_mono() {
        let sr = 16000;
        let wave = sine(440.0, sr, 12345, 0.8);
        let samples = Array2::from_shape_vec((wave.len(), 1), wave).unwrap();

        let tensor = forward(samples.view(), sr, StftParams::default()).unwrap();
        assert_eq!(tensor.original_frames(), 12345);
        assert_eq!(tensor.bins(), 1025);

        let rebuilt = inverse(&tensor).unwrap();
        assert_eq!(rebuilt.dim(), samples.dim());
        assert!(max_abs_diff(&rebuilt, &samples) < 1e-5);
    }

    #[test]
    fn test_round_trip_every_window_and_hop() {
        let sr = 8000;
        let len = 3001;
        let mut samples = Array2::<f32>::zeros((len, 2));
        for (i, v) in sine(300.0, sr, len, 0.5).into_iter().enumerate() {
            samples[[i, 0]] = v;
        }
        for (i, v) in sine(1234.0, sr, len, 0.3).into_iter().enumerate() {
            samples[[i, 1]] = v + if i % 7 == 0 { 0.1 } else { -0.05 };
        }

        for window in WindowKind::ALL {
            for (n_fft, hop) in [(256, 64), (256, 128), (512, 100), (255, 51)] {
                let params = StftParams::new(n_fft, hop, window);
                let tensor = forward(samples.view(), sr, params).unwrap();
                let rebuilt = inverse(&tensor).unwrap();
                let err = max_abs_diff(&rebuilt, &samples);
                assert!(err < 1e-5, "{:?} n_fft={} hop={} err={}", window, n_fft, hop, err);
            }
        }
    }

    #[test]
    fn test_inverse_then_forward_reproduces_tensor() {
        let sr = 16000;
        let wave = sine(1000.0, sr, 4096, 0.5);
        let samples = Array2::from_shape_vec((wave.len(), 1), wave).unwrap();
        let params = StftParams::new(512, 128, WindowKind::Hann);

        let tensor = forward(samples.view(), sr, params).unwrap();
        let again = forward(inverse(&tensor).unwrap().view(), sr, params).unwrap();

        assert_eq!(again.data().dim(), tensor.data().dim());
        let err = tensor
            .data()
            .iter()
            .zip(again.data().iter())
            .map(|(a, b)| (a - b).norm())
            .fold(0.0f32, f32::max);
        assert!(err < 1e-5);
    }

    #[test]
    fn test_peak_bin_of_sine() {
        let sr = 16000;
        let wave = sine(440.0, sr, sr as usize, 0.8);
        let samples = Array2::from_shape_vec((wave.len(), 1), wave).unwrap();
        let tensor = forward(samples.view(), sr, StftParams::default()).unwrap();

        let mean = tensor.mean_magnitude_spectrum();
        let peak = mean
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        assert_eq!(peak, tensor.nearest_bin(440.0));
    }

    #[test]
    fn test_frame_count() {
        let stft = Stft::new(StftParams::new(2048, 512, WindowKind::Hann)).unwrap();
        // 16000 + 2048 = 18048 -> padded to 18432, (18432 - 2048) / 512 + 1
        assert_eq!(stft.frame_count(16000), 33);
        assert_eq!(stft.frame_count(0), 1);
    }

    #[test]
    fn test_rejects_invalid_hops() {
        assert!(Stft::new(StftParams::new(256, 512, WindowKind::Hann)).is_err());
        // Hann is zero at its first sample, so hop == n_fft has a gap
        assert!(Stft::new(StftParams::new(256, 256, WindowKind::Hann)).is_err());
        assert!(Stft::new(StftParams::new(256, 256, WindowKind::Boxcar)).is_ok());
    }

    #[test]
    fn test_empty_waveform() {
        let samples = Array2::<f32>::zeros((0, 1));
        let tensor = forward(samples.view(), 8000, StftParams::new(64, 16, WindowKind::Hann)).unwrap();
        assert_eq!(tensor.frames(), 1);
        assert_eq!(inverse(&tensor).unwrap().dim(), (0, 1));
    }
}
