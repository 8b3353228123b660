//! Analysis window functions

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectralError};

/// Window applied on both the analysis and the synthesis path.
///
/// All windows are the periodic (DFT-even) form, which is what gives
/// constant overlap for the usual hop lengths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    #[default]
    Hann,
    Hamming,
    Blackman,
    Boxcar,
}

impl WindowKind {
    pub const ALL: [WindowKind; 4] = [
        WindowKind::Hann,
        WindowKind::Hamming,
        WindowKind::Blackman,
        WindowKind::Boxcar,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WindowKind::Hann => "hann",
            WindowKind::Hamming => "hamming",
            WindowKind::Blackman => "blackman",
            WindowKind::Boxcar => "boxcar",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.name() == name)
    }

    /// Window coefficients of length `size`.
    pub fn coefficients(&self, size: usize) -> Vec<f32> {
        let n = size as f64;
        (0..size)
            .map(|i| {
                let phase = 2.0 * PI * i as f64 / n;
                let w = match self {
                    WindowKind::Hann => 0.5 - 0.5 * phase.cos(),
                    WindowKind::Hamming => 0.54 - 0.46 * phase.cos(),
                    WindowKind::Blackman => 0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos(),
                    WindowKind::Boxcar => 1.0,
                };
                w as f32
            })
            .collect()
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WindowKind {
    type Err = SpectralError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s.trim()).ok_or_else(|| {
            SpectralError::parameter(
                "window",
                format!("unsupported window '{}' (expected hann, hamming, blackman or boxcar)", s),
            )
        })
    }
}
