//! Spectral tensor: a complex `[channel][frame][bin]` grid plus the STFT
//! metadata needed to invert it.

use ndarray::{Array3, Axis};
use rustfft::num_complex::Complex32;
use serde::{Deserialize, Serialize};

use super::window::WindowKind;
use crate::error::{Result, SpectralError};

/// STFT parameters shared by the forward and inverse transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StftParams {
    pub n_fft: usize,
    pub hop_length: usize,
    pub window: WindowKind,
}

impl Default for StftParams {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            window: WindowKind::Hann,
        }
    }
}

impl StftParams {
    pub fn new(n_fft: usize, hop_length: usize, window: WindowKind) -> Self {
        Self { n_fft, hop_length, window }
    }

    /// Number of stored (non-negative frequency) bins.
    pub fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_fft < 2 {
            return Err(SpectralError::parameter(
                "n_fft",
                format!("must be at least 2, got {}", self.n_fft),
            ));
        }
        if self.hop_length == 0 {
            return Err(SpectralError::parameter("hop_length", "must be greater than 0"));
        }
        if self.hop_length > self.n_fft {
            return Err(SpectralError::parameter(
                "hop_length",
                format!("{} exceeds n_fft {}", self.hop_length, self.n_fft),
            ));
        }
        Ok(())
    }
}

/// Immutable time-frequency grid. Operators build new tensors instead of
/// mutating this one.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralTensor {
    sample_rate: u32,
    params: StftParams,
    original_frames: usize,
    data: Array3<Complex32>,
}

impl SpectralTensor {
    /// `data` is indexed `[channel, frame, bin]`.
    pub fn new(
        sample_rate: u32,
        params: StftParams,
        original_frames: usize,
        data: Array3<Complex32>,
    ) -> Result<Self> {
        if sample_rate == 0 {
            return Err(SpectralError::parameter("sample_rate", "must be greater than 0"));
        }
        params.validate()?;

        let (channels, _, bins) = data.dim();
        if channels == 0 {
            return Err(SpectralError::parameter("channels", "must be greater than 0"));
        }
        if bins != params.bins() {
            return Err(SpectralError::parameter(
                "bins",
                format!("{} bins does not match n_fft {} (expected {})", bins, params.n_fft, params.bins()),
            ));
        }

        Ok(Self {
            sample_rate,
            params,
            original_frames,
            data,
        })
    }

    /// Same metadata, new grid.
    pub fn with_data(&self, data: Array3<Complex32>) -> Result<Self> {
        Self::new(self.sample_rate, self.params, self.original_frames, data)
    }

    /// Same STFT parameters, new grid and waveform length.
    pub fn with_data_and_length(&self, data: Array3<Complex32>, original_frames: usize) -> Result<Self> {
        Self::new(self.sample_rate, self.params, original_frames, data)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn params(&self) -> StftParams {
        self.params
    }

    pub fn n_fft(&self) -> usize {
        self.params.n_fft
    }

    pub fn hop_length(&self) -> usize {
        self.params.hop_length
    }

    pub fn window(&self) -> WindowKind {
        self.params.window
    }

    pub fn original_frames(&self) -> usize {
        self.original_frames
    }

    pub fn channels(&self) -> usize {
        self.data.dim().0
    }

    pub fn frames(&self) -> usize {
        self.data.dim().1
    }

    pub fn bins(&self) -> usize {
        self.data.dim().2
    }

    pub fn data(&self) -> &Array3<Complex32> {
        &self.data
    }

    pub fn into_data(self) -> Array3<Complex32> {
        self.data
    }

    /// Duration of the source waveform in seconds.
    pub fn duration(&self) -> f64 {
        self.original_frames as f64 / self.sample_rate as f64
    }

    pub fn nyquist(&self) -> f64 {
        self.sample_rate as f64 / 2.0
    }

    /// Center frequency of bin `k` in Hz.
    pub fn bin_frequency(&self, bin: usize) -> f64 {
        bin as f64 * self.sample_rate as f64 / self.params.n_fft as f64
    }

    /// Bin whose center frequency is nearest to `hz`, clamped to the stored range.
    pub fn nearest_bin(&self, hz: f64) -> usize {
        let k = (hz * self.params.n_fft as f64 / self.sample_rate as f64).round();
        if k <= 0.0 {
            0
        } else {
            (k as usize).min(self.bins() - 1)
        }
    }

    /// Largest bin magnitude anywhere in the grid.
    pub fn peak_magnitude(&self) -> f32 {
        self.data.iter().map(|c| c.norm()).fold(0.0f32, f32::max)
    }

    /// Magnitude per bin averaged over every channel and frame.
    pub fn mean_magnitude_spectrum(&self) -> Vec<f64> {
        let (channels, frames, bins) = self.data.dim();
        let count = (channels * frames) as f64;
        let mut acc = vec![0.0f64; bins];
        if count == 0.0 {
            return acc;
        }
        for lane in self.data.lanes(Axis(2)) {
            for (sum, c) in acc.iter_mut().zip(lane.iter()) {
                *sum += c.norm() as f64;
            }
        }
        acc.iter_mut().for_each(|v| *v /= count);
        acc
    }

    /// Fails unless `other` can be combined with `self` bin-for-bin.
    /// Frame counts are not compared.
    pub fn check_compatible(&self, other: &SpectralTensor) -> Result<()> {
        let mut mismatches = Vec::new();
        if self.sample_rate != other.sample_rate {
            mismatches.push(format!("sample_rate {} vs {}", self.sample_rate, other.sample_rate));
        }
        if self.params.n_fft != other.params.n_fft {
            mismatches.push(format!("n_fft {} vs {}", self.params.n_fft, other.params.n_fft));
        }
        if self.params.hop_length != other.params.hop_length {
            mismatches.push(format!("hop_length {} vs {}", self.params.hop_length, other.params.hop_length));
        }
        if self.params.window != other.params.window {
            mismatches.push(format!("window '{}' vs '{}'", self.params.window, other.params.window));
        }
        if self.channels() != other.channels() {
            mismatches.push(format!("channels {} vs {}", self.channels(), other.channels()));
        }

        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(SpectralError::compatibility(mismatches.join("; ")))
        }
    }
}
