//! WAV audio file processing

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use std::str::FromStr;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectralError};

/// Sample encoding used when writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Int16,
    #[default]
    Float32,
}

impl AudioFormat {
    pub fn name(&self) -> &'static str {
        match self {
            AudioFormat::Int16 => "int16",
            AudioFormat::Float32 => "float32",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "int16" | "pcm16" => Some(AudioFormat::Int16),
            "float32" | "float" => Some(AudioFormat::Float32),
            _ => None,
        }
    }

    pub fn bits_per_sample(&self) -> u16 {
        match self {
            AudioFormat::Int16 => 16,
            AudioFormat::Float32 => 32,
        }
    }

    pub fn to_sample_format(self) -> SampleFormat {
        match self {
            AudioFormat::Int16 => SampleFormat::Int,
            AudioFormat::Float32 => SampleFormat::Float,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AudioFormat {
    type Err = SpectralError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| {
            SpectralError::parameter("format", format!("unknown WAV format {:?} (expected int16 or float32)", s))
        })
    }
}

/// Decoded audio: samples shaped `(frames, channels)`.
#[derive(Debug, Clone, PartialEq)]
pub struct WavAudio {
    sample_rate: u32,
    samples: Array2<f32>,
}

impl WavAudio {
    pub fn new(sample_rate: u32, samples: Array2<f32>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(SpectralError::audio("Sample rate cannot be 0"));
        }
        if samples.ncols() == 0 || samples.ncols() > u16::MAX as usize {
            return Err(SpectralError::audio(format!("Unsupported channel count: {}", samples.ncols())));
        }
        Ok(Self { sample_rate, samples })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| SpectralError::audio(format!("Cannot open audio file {}: {}", path.display(), e)))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Reads integer PCM of any bit depth or 32-bit float, scaled to [-1, 1).
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = WavReader::new(reader)
            .map_err(|e| SpectralError::audio(format!("Cannot create WAV reader: {}", e)))?;
        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(SpectralError::audio("WAV file declares no channels"));
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => {
                if spec.bits_per_sample != 32 {
                    return Err(SpectralError::audio(format!(
                        "Unsupported float bit depth: {}",
                        spec.bits_per_sample
                    )));
                }
                reader
                    .samples::<f32>()
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| SpectralError::audio(format!("Failed to read sample: {}", e)))?
            }
            SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| SpectralError::audio(format!("Failed to read sample: {}", e)))?
            }
        };

        let channels = spec.channels as usize;
        let frames = interleaved.len() / channels;
        let samples = Array2::from_shape_vec((frames, channels), interleaved)
            .map_err(|e| SpectralError::audio(format!("Truncated sample data: {}", e)))?;

        log::debug!(
            "Read WAV: {} Hz, {} channels, {} frames, {}-bit {:?}",
            spec.sample_rate, channels, frames, spec.bits_per_sample, spec.sample_format
        );
        Self::new(spec.sample_rate, samples)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P, format: AudioFormat) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| SpectralError::audio(format!("Cannot create output directory: {}", e)))?;
        }
        let file = File::create(path)
            .map_err(|e| SpectralError::audio(format!("Cannot create output file {}: {}", path.display(), e)))?;
        self.write_to(BufWriter::new(file), format)
    }

    /// Writes a complete WAV stream. Samples are clamped to [-1, 1].
    pub fn write_to<W: Write + Seek>(&self, writer: W, format: AudioFormat) -> Result<()> {
        let spec = WavSpec {
            channels: self.channels(),
            sample_rate: self.sample_rate,
            bits_per_sample: format.bits_per_sample(),
            sample_format: format.to_sample_format(),
        };
        let mut writer = WavWriter::new(writer, spec)
            .map_err(|e| SpectralError::audio(format!("Cannot create WAV writer: {}", e)))?;

        for &sample in self.samples.iter() {
            let clamped = if sample.is_finite() { sample.clamp(-1.0, 1.0) } else { 0.0 };
            let written = match format {
                AudioFormat::Float32 => writer.write_sample(clamped),
                AudioFormat::Int16 => writer.write_sample((clamped * 32767.0).round() as i16),
            };
            written.map_err(|e| SpectralError::audio(format!("Failed to write sample: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| SpectralError::audio(format!("Failed to finalize WAV writing: {}", e)))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.samples.ncols() as u16
    }

    pub fn frames(&self) -> usize {
        self.samples.nrows()
    }

    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn samples(&self) -> &Array2<f32> {
        &self.samples
    }

    pub fn into_samples(self) -> Array2<f32> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::NamedTempFile;

    fn stereo_ramp(frames: usize) -> Array2<f32> {
        Array2::from_shape_fn((frames, 2), |(i, c)| {
            let v = i as f32 / frames as f32 - 0.5;
            if c == 0 { v } else { -v }
        })
    }

    #[test]
    fn test_audio_format() {
        assert_eq!(AudioFormat::Int16.name(), "int16");
        assert_eq!(AudioFormat::Float32.bits_per_sample(), 32);
        assert_eq!(AudioFormat::from_name("FLOAT32"), Some(AudioFormat::Float32));
        assert_eq!(AudioFormat::from_name("mp3"), None);
        assert_eq!(AudioFormat::default(), AudioFormat::Float32);
    }

    #[test]
    fn test_invalid_audio() {
        assert!(WavAudio::new(0, Array2::zeros((4, 1))).is_err());
        assert!(WavAudio::new(16000, Array2::zeros((4, 0))).is_err());
    }

    #[test]
    fn test_float_roundtrip() {
        let audio = WavAudio::new(22050, stereo_ramp(100)).unwrap();
        let temp_file = NamedTempFile::new().unwrap();
        audio.save_to_file(temp_file.path(), AudioFormat::Float32).unwrap();

        let loaded = WavAudio::from_file(temp_file.path()).unwrap();
        assert_eq!(loaded, audio);
        assert_eq!(loaded.channels(), 2);
        assert!((loaded.duration() - 100.0 / 22050.0).abs() < 1e-12);
    }

    #[test]
    fn test_int16_roundtrip() {
        let audio = WavAudio::new(16000, stereo_ramp(64)).unwrap();
        let mut buf = Cursor::new(Vec::new());
        audio.write_to(&mut buf, AudioFormat::Int16).unwrap();

        let loaded = WavAudio::from_reader(Cursor::new(buf.into_inner())).unwrap();
        for (a, b) in loaded.samples().iter().zip(audio.samples().iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_clamped_on_write() {
        let samples = Array2::from_shape_vec((3, 1), vec![2.0, -3.0, 0.25]).unwrap();
        let audio = WavAudio::new(8000, samples).unwrap();
        let mut buf = Cursor::new(Vec::new());
        audio.write_to(&mut buf, AudioFormat::Float32).unwrap();

        let loaded = WavAudio::from_reader(Cursor::new(buf.into_inner())).unwrap();
        assert_eq!(loaded.samples().as_slice().unwrap(), &[1.0, -1.0, 0.25]);
    }

    #[test]
    fn test_reads_24_bit_pcm() {
        let spec = WavSpec { channels: 1, sample_rate: 48000, bits_per_sample: 24, sample_format: SampleFormat::Int };
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut buf, spec).unwrap();
            for v in [0i32, 1 << 22, -(1 << 23)] {
                writer.write_sample(v).unwrap();
            }
            writer.finalize().unwrap();
        }
        let loaded = WavAudio::from_reader(Cursor::new(buf.into_inner())).unwrap();
        assert_eq!(loaded.samples().column(0).to_vec(), vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            WavAudio::from_reader(Cursor::new(b"not a wav file".to_vec())),
            Err(SpectralError::Audio { .. })
        ));
    }
}
