//! Configuration management for the spectral tools

use crate::audio::AudioFormat;
use crate::error::{Result, SpectralError};
use crate::ops::DecomposeOptions;
use crate::spectral::{StftParams, Stft, WindowKind};
use crate::timespec::TimeSpec;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub verbose: bool,
    pub stft: StftParams,
    pub decompose: DecomposeOptions,
    pub denoise: DenoiseConfig,
    pub gate: GateConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseConfig {
    pub noise_start: TimeSpec,
    pub noise_end: TimeSpec,
    pub oversubtract: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Relative to the tensor's peak magnitude.
    pub threshold_db: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub wav_format: AudioFormat,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            noise_start: TimeSpec::Seconds(0.0),
            noise_end: TimeSpec::Seconds(0.5),
            oversubtract: 1.0,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self { threshold_db: -40.0 }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "spx", about = "Spectral audio toolkit", version)]
pub struct Args {
    #[arg(short = 'c', long = "config", global = true, help = "Config file path (TOML format)")]
    pub config_file: Option<PathBuf>,

    #[arg(short = 'v', long = "verbose", global = true, help = "Enable verbose output mode")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Paths are file names or `-` for stdin/stdout.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Convert a WAV file to spectral (.spx) form
    Spectralize {
        input: Option<String>,
        output: Option<String>,
        #[arg(long)]
        n_fft: Option<usize>,
        #[arg(long)]
        hop_length: Option<usize>,
        #[arg(long)]
        window: Option<WindowKind>,
    },
    /// Convert a .spx file back to WAV
    Resynth {
        input: Option<String>,
        output: Option<String>,
        #[arg(long, help = "int16 or float32")]
        format: Option<AudioFormat>,
    },
    /// Describe a .spx or WAV file
    Info {
        input: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Shift pitch by moving frequency bins
    Transpose {
        #[arg(allow_hyphen_values = true, help = "Semitones (12, -3.5) or cents with a 'c' suffix (100c)")]
        semitones: String,
        input: Option<String>,
        output: Option<String>,
    },
    /// Change duration without changing pitch
    Stretch {
        #[arg(allow_negative_numbers = true, help = "2.0 = half speed, 0.5 = double speed")]
        factor: f64,
        input: Option<String>,
        output: Option<String>,
    },
    /// Cross-fade from one .spx file into another
    Morph {
        input1: String,
        input2: String,
        #[arg(short, long)]
        output: Option<String>,
        #[arg(long, default_value_t = 0.0)]
        blend_start: f32,
        #[arg(long, default_value_t = 1.0)]
        blend_end: f32,
    },
    /// Spectral subtraction using a noise-only region
    Denoise {
        input: Option<String>,
        output: Option<String>,
        #[arg(long, allow_hyphen_values = true, help = "Seconds, percent (10%) or negative from the end")]
        noise_start: Option<TimeSpec>,
        #[arg(long, allow_hyphen_values = true)]
        noise_end: Option<TimeSpec>,
        #[arg(long)]
        oversubtract: Option<f32>,
    },
    /// Zero bins below a level relative to the peak
    Gate {
        input: Option<String>,
        output: Option<String>,
        #[arg(long, allow_negative_numbers = true, help = "dB relative to the peak magnitude")]
        threshold: Option<f64>,
    },
    /// Split a chord into per-note components and a remainder
    Decompose {
        input: Option<String>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long)]
        no_harmonics: bool,
        #[arg(long)]
        max_notes: Option<usize>,
        #[arg(long)]
        min_freq: Option<f64>,
        #[arg(long)]
        prominence: Option<f64>,
        #[arg(long)]
        bin_window: Option<usize>,
        #[arg(long)]
        max_harmonics: Option<usize>,
        #[arg(long)]
        no_remainder: bool,
    },
    /// Sum .spx files bin by bin
    Join {
        #[arg(required = true)]
        inputs: Vec<String>,
        #[arg(short, long)]
        output: String,
        #[arg(long, help = "Pad shorter inputs with silence instead of failing")]
        no_strict: bool,
    },
}

impl Config {
    /// Create config from command line arguments and config file
    pub fn from_args_and_config(args: &Args) -> Result<Self> {
        // First load config file (if provided)
        let mut config = if let Some(config_path) = &args.config_file {
            Self::from_file(config_path)?
        } else {
            Self::default()
        };

        // Command line arguments override config file settings
        config.verbose |= args.verbose;
        config.apply_command(&args.command);

        config.validate()?;

        Ok(config)
    }

    fn apply_command(&mut self, command: &Command) {
        match command {
            Command::Spectralize { n_fft, hop_length, window, .. } => {
                if let Some(n) = n_fft {
                    self.stft.n_fft = *n;
                }
                if let Some(h) = hop_length {
                    self.stft.hop_length = *h;
                }
                if let Some(w) = window {
                    self.stft.window = *w;
                }
            }
            Command::Resynth { format: Some(f), .. } => self.output.wav_format = *f,
            Command::Denoise { noise_start, noise_end, oversubtract, .. } => {
                if let Some(t) = noise_start {
                    self.denoise.noise_start = *t;
                }
                if let Some(t) = noise_end {
                    self.denoise.noise_end = *t;
                }
                if let Some(o) = oversubtract {
                    self.denoise.oversubtract = *o;
                }
            }
            Command::Gate { threshold: Some(t), .. } => self.gate.threshold_db = *t,
            Command::Decompose {
                no_harmonics,
                max_notes,
                min_freq,
                prominence,
                bin_window,
                max_harmonics,
                no_remainder,
                ..
            } => {
                let d = &mut self.decompose;
                d.include_harmonics &= !no_harmonics;
                d.include_remainder &= !no_remainder;
                d.max_components = max_notes.unwrap_or(d.max_components);
                d.min_freq = min_freq.unwrap_or(d.min_freq);
                d.prominence_db = prominence.unwrap_or(d.prominence_db);
                d.bin_window = bin_window.unwrap_or(d.bin_window);
                d.max_harmonics = max_harmonics.unwrap_or(d.max_harmonics);
            }
            _ => {}
        }
    }

    /// Load config from TOML config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SpectralError::config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| SpectralError::config(format!("Failed to parse config file: {}", e)))
    }

    /// Validate configuration parameter validity
    pub fn validate(&self) -> Result<()> {
        // Transform parameters, including overlap-add validity
        Stft::new(self.stft).map_err(|e| SpectralError::config(format!("[stft] {}", e)))?;

        self.decompose
            .validate()
            .map_err(|e| SpectralError::config(format!("[decompose] {}", e)))?;

        if !self.denoise.oversubtract.is_finite() || self.denoise.oversubtract < 0.0 {
            return Err(SpectralError::config("[denoise] oversubtract must be a non-negative number"));
        }

        if !self.gate.threshold_db.is_finite() || self.gate.threshold_db > 0.0 {
            return Err(SpectralError::config("[gate] threshold_db must be at or below 0 dB"));
        }

        Ok(())
    }

    /// Save config to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SpectralError::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SpectralError::config(format!("Failed to write config file: {}", e)))
    }
}
