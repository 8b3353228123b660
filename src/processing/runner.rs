//! Tool runner: wires endpoints, config and operators together for each subcommand.

use std::path::Path;
use std::time::Instant;

use serde_json::json;

use super::endpoint::Endpoint;
use crate::audio::WavAudio;
use crate::config::{Command, Config};
use crate::error::{Result, SpectralError};
use crate::ops::{self, ComponentFile, NoiseRegion};
use crate::spectral::{codec, SpectralTensor, Stft, MAGIC};

#[derive(Debug, Clone)]
pub struct ToolRunner {
    config: Config,
}

impl ToolRunner {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&self, command: &Command) -> Result<()> {
        let start = Instant::now();
        match command {
            Command::Spectralize { input, output, .. } => self.spectralize(input.as_deref(), output.as_deref()),
            Command::Resynth { input, output, .. } => self.resynth(input.as_deref(), output.as_deref()),
            Command::Info { input, json } => self.info(input.as_deref(), *json),
            Command::Transpose { semitones, input, output } => {
                self.transpose(semitones, input.as_deref(), output.as_deref())
            }
            Command::Stretch { factor, input, output } => self.stretch(*factor, input.as_deref(), output.as_deref()),
            Command::Morph { input1, input2, output, blend_start, blend_end } => {
                self.morph(input1, input2, output.as_deref(), *blend_start, *blend_end)
            }
            Command::Denoise { input, output, .. } => self.denoise(input.as_deref(), output.as_deref()),
            Command::Gate { input, output, .. } => self.gate(input.as_deref(), output.as_deref()),
            Command::Decompose { input, output_dir, .. } => self.decompose(input.as_deref(), output_dir.as_deref()),
            Command::Join { inputs, output, no_strict } => self.join(inputs, output, !no_strict),
        }?;
        log::debug!("Finished in {:.2}s", start.elapsed().as_secs_f64());
        Ok(())
    }

    pub fn spectralize(&self, input: Option<&str>, output: Option<&str>) -> Result<()> {
        let input = Endpoint::input(input)?;
        let output = Endpoint::output(output)?;

        let audio = input.read_audio()?;
        let stft = Stft::new(self.config.stft)?;
        let tensor = stft.forward(audio.samples().view(), audio.sample_rate())?;
        output.write_tensor(&tensor)?;

        log::info!(
            "Wrote {}ch spectral: {} frames x {} bins ({:.3}s) -> {}",
            tensor.channels(), tensor.frames(), tensor.bins(), tensor.duration(), output
        );
        Ok(())
    }

    pub fn resynth(&self, input: Option<&str>, output: Option<&str>) -> Result<()> {
        let input = Endpoint::input(input)?;
        let output = Endpoint::output(output)?;

        let tensor = input.read_tensor()?;
        let samples = Stft::new(tensor.params())?.inverse(&tensor)?;
        let audio = WavAudio::new(tensor.sample_rate(), samples)?;
        output.write_audio(&audio, self.config.output.wav_format)?;

        log::info!(
            "Wrote {}ch audio: {} frames ({:.3}s) @ {}Hz -> {}",
            audio.channels(), audio.frames(), audio.duration(), audio.sample_rate(), output
        );
        Ok(())
    }

    /// Prints a description of a `.spx` stream or a WAV file to stdout.
    pub fn info(&self, input: Option<&str>, as_json: bool) -> Result<()> {
        let bytes = Endpoint::input(input)?.read_bytes()?;
        let value = if bytes.starts_with(MAGIC) {
            let t = codec::decode(&bytes)?;
            json!({
                "kind": "spectral",
                "sample_rate": t.sample_rate(),
                "channels": t.channels(),
                "frames": t.frames(),
                "bins": t.bins(),
                "n_fft": t.n_fft(),
                "hop_length": t.hop_length(),
                "window": t.window().name(),
                "original_frames": t.original_frames(),
                "duration": t.duration(),
            })
        } else {
            let a = WavAudio::from_reader(bytes.as_slice())?;
            json!({
                "kind": "audio",
                "sample_rate": a.sample_rate(),
                "channels": a.channels(),
                "frames": a.frames(),
                "duration": a.duration(),
            })
        };

        if as_json {
            println!("{}", serde_json::to_string(&value)?);
        } else if let Some(fields) = value.as_object() {
            for (key, v) in fields {
                match v.as_f64().filter(|_| key == "duration") {
                    Some(d) => println!("{:<16}: {:.3} s", key, d),
                    None => println!("{:<16}: {}", key, v.as_str().map(str::to_string).unwrap_or(v.to_string())),
                }
            }
        }
        Ok(())
    }

    pub fn transpose(&self, semitones: &str, input: Option<&str>, output: Option<&str>) -> Result<()> {
        let st = ops::parse_semitones(semitones)?;
        let input = Endpoint::input(input)?;
        let tensor = input.read_tensor()?;
        let result = ops::transpose(&tensor, st)?;

        let sign = if st >= 0.0 { "+" } else { "" };
        let output = derived_output(output, &input, &format!("_t{}{}.spx", sign, st));
        output.write_tensor(&result)?;
        log::info!("Transposed {}{} semitones -> {}", sign, st, output);
        Ok(())
    }

    pub fn stretch(&self, factor: f64, input: Option<&str>, output: Option<&str>) -> Result<()> {
        let input = Endpoint::input(input)?;
        let tensor = input.read_tensor()?;
        let result = ops::stretch(&tensor, factor)?;

        let output = derived_output(output, &input, &format!("_s{}x.spx", factor));
        output.write_tensor(&result)?;
        log::info!(
            "Stretched x{} ({:.3}s -> {:.3}s) -> {}",
            factor, tensor.duration(), result.duration(), output
        );
        Ok(())
    }

    pub fn morph(&self, first: &str, second: &str, output: Option<&str>, blend_start: f32, blend_end: f32) -> Result<()> {
        let first = Endpoint::parse(first);
        let a = first.read_tensor()?;
        let b = Endpoint::parse(second).read_tensor()?;
        let result = ops::morph(&a, &b, blend_start, blend_end)?;

        let output = derived_output(output, &first, "_morph.spx");
        output.write_tensor(&result)?;
        log::info!("Morphed {:.2} -> {:.2} over {} frames -> {}", blend_start, blend_end, result.frames(), output);
        Ok(())
    }

    pub fn denoise(&self, input: Option<&str>, output: Option<&str>) -> Result<()> {
        let settings = &self.config.denoise;
        let input = Endpoint::input(input)?;
        let tensor = input.read_tensor()?;

        let total = tensor.duration();
        let start = settings.noise_start.resolve(total);
        let end = settings.noise_end.resolve(total);
        let region = NoiseRegion::from_seconds(&tensor, start, end)?;
        let result = ops::denoise(&tensor, region, settings.oversubtract)?;

        let output = derived_output(output, &input, "_denoise.spx");
        output.write_tensor(&result)?;
        log::info!(
            "Denoised using {:.3}s-{:.3}s (frames {}..{}), oversubtract {} -> {}",
            start, end, region.start_frame, region.end_frame, settings.oversubtract, output
        );
        Ok(())
    }

    pub fn gate(&self, input: Option<&str>, output: Option<&str>) -> Result<()> {
        let threshold = self.config.gate.threshold_db;
        let input = Endpoint::input(input)?;
        let tensor = input.read_tensor()?;
        let result = ops::gate(&tensor, threshold)?;

        let output = derived_output(output, &input, "_gate.spx");
        output.write_tensor(&result)?;
        log::info!(
            "Gated at {} dB ({} of {} bins kept) -> {}",
            threshold,
            ops::gate::count_nonzero(&result),
            result.data().len(),
            output
        );
        Ok(())
    }

    pub fn decompose(&self, input: Option<&str>, output_dir: Option<&Path>) -> Result<()> {
        let options = &self.config.decompose;
        let input = Endpoint::input(input)?;
        let tensor = input.read_tensor()?;

        let out_dir = output_dir.map(Path::to_path_buf).unwrap_or_else(|| input.dir());
        if !out_dir.as_os_str().is_empty() {
            std::fs::create_dir_all(&out_dir)?;
        }

        let decomposition = ops::decompose(&tensor, options)?;
        if decomposition.components.is_empty() {
            return Err(SpectralError::parameter(
                "prominence",
                "no prominent peaks detected; try lowering --prominence",
            ));
        }

        let stem = input.stem();
        let named = decomposition.named(&stem);
        for (name, part) in &named {
            let path = out_dir.join(name);
            codec::save(part, &path)?;
            log::info!("  {} (mean energy {:.4})", path.display(), mean_energy(part));
        }
        log::info!("Wrote {} file(s) to {}/", named.len(), out_dir.display());
        Ok(())
    }

    pub fn join(&self, inputs: &[String], output: &str, strict: bool) -> Result<()> {
        let mut parts = Vec::with_capacity(inputs.len());
        for name in inputs {
            let endpoint = Endpoint::parse(name);
            let tensor = endpoint.read_tensor()?;
            let label = match endpoint_file_name(&endpoint).as_deref().and_then(ComponentFile::parse) {
                Some(ComponentFile::Component { frequency_hz, .. }) => format!("{:.1} Hz component", frequency_hz),
                Some(ComponentFile::Remainder { .. }) => "remainder".to_string(),
                None => "spectral".to_string(),
            };
            log::info!("  Loaded {} [{}] ({} frames, {:.3}s)", endpoint, label, tensor.frames(), tensor.duration());
            parts.push(tensor);
        }

        log::info!("Joining {} file(s)...", parts.len());
        let result = ops::join(&parts, strict)?;

        let output = Endpoint::parse(output);
        output.write_tensor(&result)?;
        log::info!(
            "Wrote {}ch spectral: {} frames ({:.3}s) -> {}",
            result.channels(), result.frames(), result.duration(), output
        );
        Ok(())
    }
}

/// The explicit output, or `{input stem}{suffix}` next to the input.
fn derived_output(output: Option<&str>, input: &Endpoint, suffix: &str) -> Endpoint {
    match output {
        Some(o) => Endpoint::parse(o),
        None => input.sibling(suffix),
    }
}

fn endpoint_file_name(endpoint: &Endpoint) -> Option<String> {
    match endpoint {
        Endpoint::File(path) => path.file_name().map(|n| n.to_string_lossy().into_owned()),
        Endpoint::Std => None,
    }
}

fn mean_energy(tensor: &SpectralTensor) -> f64 {
    let n = tensor.data().len();
    if n == 0 {
        return 0.0;
    }
    tensor.data().iter().map(|c| c.norm() as f64).sum::<f64>() / n as f64
}
