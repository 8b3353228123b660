//! Decompose a tensor into per-fundamental components plus a remainder.
//!
//! Components are masked copies of the input; the remainder is the input
//! minus every component, so joining components and remainder gives the
//! input back bin for bin.

use ndarray::{Axis, Zip};
use rustfft::num_complex::Complex32;
use serde::{Deserialize, Serialize};

use super::peaks::find_peaks;
use crate::error::{Result, SpectralError};
use crate::spectral::SpectralTensor;

/// Relative tolerance for treating a peak as a harmonic of a lower fundamental.
const HARMONIC_TOLERANCE: f64 = 0.05;

/// Magnitudes are floored here before conversion to dB.
const MAGNITUDE_FLOOR: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecomposeOptions {
    /// Most fundamentals to keep, ranked by prominence.
    pub max_components: usize,
    /// Minimum peak prominence in dB on the time-averaged spectrum.
    pub prominence_db: f64,
    /// Attach integer-multiple harmonics to each fundamental.
    pub include_harmonics: bool,
    pub include_remainder: bool,
    /// Bins below this frequency are never fundamentals.
    pub min_freq: f64,
    /// Bins on each side of a fundamental/harmonic bin that belong to it.
    pub bin_window: usize,
    /// Highest harmonic number attached (1 == fundamental only).
    pub max_harmonics: usize,
}

impl Default for DecomposeOptions {
    fn default() -> Self {
        Self {
            max_components: 12,
            prominence_db: 15.0,
            include_harmonics: true,
            include_remainder: true,
            min_freq: 50.0,
            bin_window: 2,
            max_harmonics: 16,
        }
    }
}

impl DecomposeOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_components == 0 {
            return Err(SpectralError::parameter("max_components", "must be at least 1"));
        }
        if !self.prominence_db.is_finite() || self.prominence_db < 0.0 {
            return Err(SpectralError::parameter(
                "prominence",
                format!("must be a non-negative dB value, got {}", self.prominence_db),
            ));
        }
        if !self.min_freq.is_finite() || self.min_freq < 0.0 {
            return Err(SpectralError::parameter("min_freq", format!("invalid frequency {}", self.min_freq)));
        }
        if self.max_harmonics == 0 {
            return Err(SpectralError::parameter("max_harmonics", "must be at least 1"));
        }
        Ok(())
    }
}

/// A detected fundamental.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fundamental {
    /// Center frequency of the peak bin.
    pub frequency_hz: f64,
    pub bin: usize,
}

#[derive(Debug, Clone)]
pub struct Component {
    pub fundamental: Fundamental,
    pub tensor: SpectralTensor,
}

impl Component {
    pub fn file_name(&self, stem: &str) -> String {
        component_file_name(stem, self.fundamental.frequency_hz)
    }
}

#[derive(Debug, Clone)]
pub struct Decomposition {
    /// Ordered by ascending frequency.
    pub components: Vec<Component>,
    pub remainder: Option<SpectralTensor>,
}

impl Decomposition {
    /// Output file names paired with their tensors, remainder last.
    pub fn named(&self, stem: &str) -> Vec<(String, &SpectralTensor)> {
        let mut out: Vec<_> = self.components.iter().map(|c| (c.file_name(stem), &c.tensor)).collect();
        if let Some(rem) = &self.remainder {
            out.push((remainder_file_name(stem), rem));
        }
        out
    }

    pub fn into_tensors(self) -> Vec<SpectralTensor> {
        self.components
            .into_iter()
            .map(|c| c.tensor)
            .chain(self.remainder)
            .collect()
    }
}

/// `{stem}_{frequency:.1}hz.spx`
pub fn component_file_name(stem: &str, frequency_hz: f64) -> String {
    format!("{}_{:.1}hz.spx", stem, frequency_hz)
}

/// `{stem}_remainder.spx`
pub fn remainder_file_name(stem: &str) -> String {
    format!("{}_remainder.spx", stem)
}

/// What a decompose output file name says about its content.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentFile {
    Component { stem: String, frequency_hz: f64 },
    Remainder { stem: String },
}

impl ComponentFile {
    /// Recognises names produced by [`component_file_name`] and [`remainder_file_name`].
    pub fn parse(file_name: &str) -> Option<Self> {
        let base = file_name.strip_suffix(".spx")?;
        if let Some(stem) = base.strip_suffix("_remainder") {
            return Some(Self::Remainder { stem: stem.to_string() });
        }
        let (stem, freq) = base.strip_suffix("hz")?.rsplit_once('_')?;
        let frequency_hz = freq.parse::<f64>().ok().filter(|f| f.is_finite() && *f >= 0.0)?;
        Some(Self::Component { stem: stem.to_string(), frequency_hz })
    }
}

/// Finds the fundamentals of `tensor`, sorted by frequency.
///
/// Peaks of the time-averaged magnitude spectrum (in dB) are ranked by
/// prominence and the top `max_components` kept. A kept peak within 5% of
/// an integer multiple (>= 2) of a lower accepted one is its harmonic and
/// is dropped.
pub fn find_fundamentals(tensor: &SpectralTensor, options: &DecomposeOptions) -> Vec<Fundamental> {
    let db: Vec<f64> = tensor
        .mean_magnitude_spectrum()
        .into_iter()
        .enumerate()
        .map(|(k, m)| {
            if tensor.bin_frequency(k) < options.min_freq {
                f64::NEG_INFINITY
            } else {
                20.0 * m.max(MAGNITUDE_FLOOR).log10()
            }
        })
        .collect();

    let mut peaks = find_peaks(&db, options.prominence_db);
    peaks.sort_by(|a, b| b.prominence.total_cmp(&a.prominence));
    peaks.truncate(options.max_components);

    let mut candidates: Vec<Fundamental> = peaks
        .iter()
        .map(|p| Fundamental { frequency_hz: tensor.bin_frequency(p.index), bin: p.index })
        .collect();
    candidates.sort_by(|a, b| a.frequency_hz.total_cmp(&b.frequency_hz));

    let mut fundamentals: Vec<Fundamental> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let is_harmonic = fundamentals.iter().any(|f| {
            let multiple = (candidate.frequency_hz / f.frequency_hz).round();
            multiple >= 2.0
                && (candidate.frequency_hz / f.frequency_hz - multiple).abs() / multiple < HARMONIC_TOLERANCE
        });
        if !is_harmonic {
            fundamentals.push(candidate);
        }
    }
    fundamentals
}

/// Bins owned by `fundamental`: `bin_window` bins either side of the
/// fundamental and, with harmonics, of each multiple up to the top bin.
fn bin_mask(tensor: &SpectralTensor, fundamental: Fundamental, options: &DecomposeOptions) -> Vec<bool> {
    let bins = tensor.bins();
    let top = tensor.bin_frequency(bins - 1);
    let harmonics = if options.include_harmonics { options.max_harmonics } else { 1 };

    let mut mask = vec![false; bins];
    for n in 1..=harmonics {
        let target = n as f64 * fundamental.frequency_hz;
        if target > top {
            break;
        }
        let center = tensor.nearest_bin(target);
        let lo = center.saturating_sub(options.bin_window);
        let hi = center.saturating_add(options.bin_window).min(bins - 1);
        mask[lo..=hi].iter_mut().for_each(|m| *m = true);
    }
    mask
}

fn apply_mask(tensor: &SpectralTensor, mask: &[bool]) -> Result<SpectralTensor> {
    let mut data = tensor.data().clone();
    for mut lane in data.lanes_mut(Axis(2)) {
        for (c, &keep) in lane.iter_mut().zip(mask) {
            if !keep {
                *c = Complex32::new(0.0, 0.0);
            }
        }
    }
    tensor.with_data(data)
}

/// Splits `tensor` into one component per detected fundamental.
///
/// Masks never overlap: bins already claimed by a lower fundamental are
/// left out of later ones. Finding no fundamentals is not an error; the
/// result then has no components and the remainder is the whole input.
pub fn decompose(tensor: &SpectralTensor, options: &DecomposeOptions) -> Result<Decomposition> {
    options.validate()?;

    let fundamentals = find_fundamentals(tensor, options);
    if fundamentals.is_empty() {
        log::warn!("No peaks above {} dB prominence", options.prominence_db);
    }

    let mut claimed = vec![false; tensor.bins()];
    let mut components = Vec::with_capacity(fundamentals.len());
    for fundamental in fundamentals {
        let mut mask = bin_mask(tensor, fundamental, options);
        for (m, c) in mask.iter_mut().zip(claimed.iter_mut()) {
            *m &= !*c;
            *c |= *m;
        }

        let owned = mask.iter().filter(|&&m| m).count();
        log::info!("Component {:.2} Hz (bin {}, {} bins)", fundamental.frequency_hz, fundamental.bin, owned);
        components.push(Component { fundamental, tensor: apply_mask(tensor, &mask)? });
    }

    let remainder = if options.include_remainder {
        let mut data = tensor.data().clone();
        for component in &components {
            Zip::from(&mut data)
                .and(component.tensor.data())
                .for_each(|r, &c| *r -= c);
        }
        Some(tensor.with_data(data)?)
    } else {
        None
    };

    Ok(Decomposition { components, remainder })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::join::join;
    use crate::spectral::{forward, StftParams};
    use ndarray::Array2;

    const SR: u32 = 16000;

    fn chord(freqs: &[f64], seconds: f64) -> SpectralTensor {
        let len = (SR as f64 * seconds) as usize;
        let wave: Vec<f32> = (0..len)
            .map(|i| {
                let t = i as f64 / SR as f64;
                freqs
                    .iter()
                    .map(|f| 0.4 * (2.0 * std::f64::consts::PI * f * t).sin())
                    .sum::<f64>() as f32
            })
            .collect();
        let samples = Array2::from_shape_vec((len, 1), wave).unwrap();
        forward(samples.view(), SR, StftParams::new(2048, 512, Default::default())).unwrap()
    }

    #[test]
    fn test_two_tone_chord() {
        let t = chord(&[440.0, 554.0], 1.0);
        let d = decompose(&t, &DecomposeOptions::default()).unwrap();

        assert_eq!(d.components.len(), 2);
        assert_eq!(d.components[0].fundamental.bin, t.nearest_bin(440.0));
        assert_eq!(d.components[1].fundamental.bin, t.nearest_bin(554.0));
        assert!(d.remainder.is_some());
    }

    #[test]
    fn test_join_of_decompose_is_exact() {
        let t = chord(&[440.0, 554.0], 1.0);
        for include_harmonics in [true, false] {
            for bin_window in [0, 2, 6] {
                let options = DecomposeOptions { include_harmonics, bin_window, ..Default::default() };
                let parts = decompose(&t, &options).unwrap().into_tensors();
                let rebuilt = join(&parts, true).unwrap();
                assert_eq!(rebuilt.data(), t.data());
                assert_eq!(rebuilt.original_frames(), t.original_frames());
            }
        }
    }

    #[test]
    fn test_window_wider_than_spectrum() {
        let t = chord(&[440.0], 0.5);
        let options = DecomposeOptions { bin_window: usize::MAX, ..Default::default() };
        let d = decompose(&t, &options).unwrap();
        assert!(!d.components.is_empty());
        let rebuilt = join(&d.into_tensors(), true).unwrap();
        assert_eq!(rebuilt.data(), t.data());
    }

    #[test]
    fn test_masks_do_not_overlap() {
        let t = chord(&[440.0, 554.0], 1.0);
        let options = DecomposeOptions { bin_window: 40, ..Default::default() };
        let d = decompose(&t, &options).unwrap();
        let nonzero_bins = |t: &SpectralTensor| -> Vec<bool> {
            (0..t.bins()).map(|b| t.data().index_axis(Axis(2), b).iter().any(|c| c.norm() > 0.0)).collect()
        };
        let a = nonzero_bins(&d.components[0].tensor);
        let b = nonzero_bins(&d.components[1].tensor);
        assert!(a.iter().zip(&b).all(|(x, y)| !(*x && *y)));
    }

    #[test]
    fn test_no_peaks_yields_whole_remainder() {
        let params = StftParams::new(64, 16, Default::default());
        let data = ndarray::Array3::from_elem((1, 8, params.bins()), Complex32::new(0.25, 0.0));
        let t = SpectralTensor::new(SR, params, 128, data).unwrap();

        let d = decompose(&t, &DecomposeOptions::default()).unwrap();
        assert!(d.components.is_empty());
        assert_eq!(d.remainder.as_ref().unwrap(), &t);
    }

    #[test]
    fn test_harmonic_sieve() {
        // 220 Hz with a strong second partial at 440 Hz is one note
        let t = chord(&[220.0, 440.0], 1.0);
        let fundamentals = find_fundamentals(&t, &DecomposeOptions::default());
        assert_eq!(fundamentals.len(), 1);
        assert_eq!(fundamentals[0].bin, t.nearest_bin(220.0));
    }

    #[test]
    fn test_max_components() {
        let t = chord(&[300.0, 470.0, 710.0], 1.0);
        let options = DecomposeOptions { max_components: 2, ..Default::default() };
        assert_eq!(find_fundamentals(&t, &options).len(), 2);
    }

    #[test]
    fn test_without_remainder() {
        let t = chord(&[440.0], 0.5);
        let options = DecomposeOptions { include_remainder: false, ..Default::default() };
        let d = decompose(&t, &options).unwrap();
        assert!(d.remainder.is_none());
        assert_eq!(d.named("chord").len(), d.components.len());
    }

    #[test]
    fn test_file_names() {
        assert_eq!(component_file_name("chord", 437.5), "chord_437.5hz.spx");
        assert_eq!(component_file_name("chord", 554.6875), "chord_554.7hz.spx");
        assert_eq!(remainder_file_name("chord"), "chord_remainder.spx");

        assert_eq!(
            ComponentFile::parse("my_chord_437.5hz.spx"),
            Some(ComponentFile::Component { stem: "my_chord".into(), frequency_hz: 437.5 })
        );
        assert_eq!(
            ComponentFile::parse("chord_remainder.spx"),
            Some(ComponentFile::Remainder { stem: "chord".into() })
        );
        assert_eq!(ComponentFile::parse("chord.spx"), None);
        assert_eq!(ComponentFile::parse("chord_xhz.spx"), None);
    }

    #[test]
    fn test_invalid_options() {
        let t = chord(&[440.0], 0.25);
        let bad = DecomposeOptions { max_components: 0, ..Default::default() };
        assert!(decompose(&t, &bad).is_err());
        let bad = DecomposeOptions { prominence_db: -1.0, ..Default::default() };
        assert!(decompose(&t, &bad).is_err());
    }
}
