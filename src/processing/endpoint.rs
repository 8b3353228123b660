//! Where a tool reads from and writes to: a file, or stdin/stdout.

use std::fmt;
use std::io::{self, BufReader, BufWriter, Cursor, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use crate::audio::{AudioFormat, WavAudio};
use crate::error::{Result, SpectralError};
use crate::spectral::{codec, SpectralTensor};

/// Command-line name for the standard streams.
pub const STD_STREAM: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Std,
    File(PathBuf),
}

impl Endpoint {
    pub fn parse(arg: &str) -> Self {
        if arg == STD_STREAM { Endpoint::Std } else { Endpoint::File(PathBuf::from(arg)) }
    }

    /// A missing input argument means stdin, provided stdin is not a terminal.
    pub fn input(arg: Option<&str>) -> Result<Self> {
        match arg {
            Some(a) => Ok(Self::parse(a)),
            None if !io::stdin().is_terminal() => Ok(Endpoint::Std),
            None => Err(SpectralError::parameter("input", "no input: provide an INPUT file or pipe via stdin")),
        }
    }

    /// A missing output argument means stdout, provided stdout is not a terminal.
    pub fn output(arg: Option<&str>) -> Result<Self> {
        match arg {
            Some(a) => Ok(Self::parse(a)),
            None if !io::stdout().is_terminal() => Ok(Endpoint::Std),
            None => Err(SpectralError::parameter("output", "no output: provide an OUTPUT file or pipe via stdout")),
        }
    }

    /// File stem used to derive output names; `stdin` for the standard stream.
    pub fn stem(&self) -> String {
        match self {
            Endpoint::Std => "stdin".to_string(),
            Endpoint::File(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".to_string()),
        }
    }

    /// Directory derived outputs are written next to.
    pub fn dir(&self) -> PathBuf {
        match self {
            Endpoint::File(path) => path.parent().map(Path::to_path_buf).unwrap_or_default(),
            Endpoint::Std => PathBuf::new(),
        }
    }

    /// `{dir}/{stem}{suffix}`
    pub fn sibling(&self, suffix: &str) -> Endpoint {
        Endpoint::File(self.dir().join(format!("{}{}", self.stem(), suffix)))
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        match self {
            Endpoint::Std => {
                io::stdin().lock().read_to_end(&mut bytes)?;
            }
            Endpoint::File(path) => {
                bytes = std::fs::read(path)
                    .map_err(|e| SpectralError::io(format!("Cannot read {}: {}", path.display(), e)))?;
            }
        }
        Ok(bytes)
    }

    pub fn read_tensor(&self) -> Result<SpectralTensor> {
        match self {
            Endpoint::Std => codec::read_from(BufReader::new(io::stdin().lock())),
            Endpoint::File(path) => codec::load(path),
        }
    }

    pub fn write_tensor(&self, tensor: &SpectralTensor) -> Result<()> {
        match self {
            Endpoint::Std => codec::write_to(tensor, BufWriter::new(io::stdout().lock())),
            Endpoint::File(path) => {
                ensure_parent(path)?;
                codec::save(tensor, path)
            }
        }
    }

    pub fn read_audio(&self) -> Result<WavAudio> {
        match self {
            Endpoint::Std => WavAudio::from_reader(BufReader::new(io::stdin().lock())),
            Endpoint::File(path) => WavAudio::from_file(path),
        }
    }

    /// WAV headers are patched on finalize, so stdout output is built in
    /// memory first.
    pub fn write_audio(&self, audio: &WavAudio, format: AudioFormat) -> Result<()> {
        match self {
            Endpoint::Std => {
                let mut buf = Cursor::new(Vec::new());
                audio.write_to(&mut buf, format)?;
                let mut out = io::stdout().lock();
                out.write_all(buf.get_ref())?;
                out.flush()?;
                Ok(())
            }
            Endpoint::File(path) => audio.save_to_file(path, format),
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Std => f.write_str("<stdio>"),
            Endpoint::File(path) => write!(f, "{}", path.display()),
        }
    }
}
