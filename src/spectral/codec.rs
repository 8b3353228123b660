//! `.spx` binary encoding.
//!
//! ```text
//! offset 0   : 4 bytes  magic "SPXF"
//! offset 4   : 4 bytes  little-endian u32, header byte length L
//! offset 8   : L bytes  UTF-8 JSON header
//! offset 8+L : payload  little-endian f32, C-order (channels, frames, bins, 2)
//! ```
//!
//! Reading and writing are strictly sequential so the same code serves
//! files and pipes.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use ndarray::Array3;
use rustfft::num_complex::Complex32;
use serde::{Deserialize, Serialize};

use super::tensor::{SpectralTensor, StftParams};
use super::window::WindowKind;
use crate::error::{Result, SpectralError};

pub const MAGIC: &[u8; 4] = b"SPXF";
pub const FORMAT_VERSION: u32 = 1;

/// Payload bytes per complex bin (real + imag f32).
const BYTES_PER_BIN: usize = 8;

/// JSON header. Field order is the on-disk key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpxHeader {
    pub version: u32,
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    pub window: String,
    pub original_frames: usize,
    pub channels: usize,
    pub frames: usize,
    pub bins: usize,
}

impl SpxHeader {
    pub fn from_tensor(tensor: &SpectralTensor) -> Self {
        Self {
            version: FORMAT_VERSION,
            sample_rate: tensor.sample_rate(),
            n_fft: tensor.n_fft(),
            hop_length: tensor.hop_length(),
            window: tensor.window().name().to_string(),
            original_frames: tensor.original_frames(),
            channels: tensor.channels(),
            frames: tensor.frames(),
            bins: tensor.bins(),
        }
    }

    /// Checks every field that does not depend on the payload and returns
    /// the STFT parameters it describes.
    pub fn validate(&self) -> Result<StftParams> {
        if self.version != FORMAT_VERSION {
            return Err(SpectralError::format(
                "version",
                format!("unsupported version {} (expected {})", self.version, FORMAT_VERSION),
            ));
        }
        if self.sample_rate == 0 {
            return Err(SpectralError::format("sample_rate", "must be greater than 0"));
        }
        let window = WindowKind::from_name(&self.window).ok_or_else(|| {
            SpectralError::format("window", format!("unsupported window '{}'", self.window))
        })?;
        if self.n_fft < 2 {
            return Err(SpectralError::format("n_fft", format!("must be at least 2, got {}", self.n_fft)));
        }
        if self.hop_length == 0 || self.hop_length > self.n_fft {
            return Err(SpectralError::format(
                "hop_length",
                format!("{} is outside 1..={}", self.hop_length, self.n_fft),
            ));
        }
        if self.channels == 0 {
            return Err(SpectralError::format("channels", "must be greater than 0"));
        }
        if self.bins != self.n_fft / 2 + 1 {
            return Err(SpectralError::format(
                "bins",
                format!("{} does not match n_fft {} (expected {})", self.bins, self.n_fft, self.n_fft / 2 + 1),
            ));
        }
        Ok(StftParams::new(self.n_fft, self.hop_length, window))
    }

    /// Expected payload length in bytes.
    pub fn payload_len(&self) -> Result<usize> {
        self.channels
            .checked_mul(self.frames)
            .and_then(|v| v.checked_mul(self.bins))
            .and_then(|v| v.checked_mul(BYTES_PER_BIN))
            .ok_or_else(|| SpectralError::format("frames", "payload size overflows"))
    }
}

/// Header JSON with `", "` and `": "` separators, matching existing `.spx` files byte for byte.
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

fn header_bytes(header: &SpxHeader) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(256);
    let mut ser = serde_json::Serializer::with_formatter(&mut out, SpacedFormatter);
    header
        .serialize(&mut ser)
        .map_err(|e| SpectralError::format("header", format!("cannot serialize header: {}", e)))?;
    Ok(out)
}

/// Writes `tensor` to `writer` without seeking.
pub fn write_to<W: Write>(tensor: &SpectralTensor, mut writer: W) -> Result<()> {
    let header = header_bytes(&SpxHeader::from_tensor(tensor))?;
    let header_len = u32::try_from(header.len())
        .map_err(|_| SpectralError::format("header", "header longer than 4 GiB"))?;

    writer.write_all(MAGIC)?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(&header)?;

    let mut chunk = Vec::with_capacity(tensor.bins() * BYTES_PER_BIN);
    for lane in tensor.data().lanes(ndarray::Axis(2)) {
        chunk.clear();
        for c in lane.iter() {
            chunk.extend_from_slice(&c.re.to_le_bytes());
            chunk.extend_from_slice(&c.im.to_le_bytes());
        }
        writer.write_all(&chunk)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads one tensor from `reader`, consuming exactly its bytes.
pub fn read_from<R: Read>(mut reader: R) -> Result<SpectralTensor> {
    let mut prefix = [0u8; 8];
    read_exact_or(&mut reader, &mut prefix, "magic", "stream shorter than the 8-byte prefix")?;
    if &prefix[..4] != MAGIC {
        return Err(SpectralError::format(
            "magic",
            format!("not a .spx stream (magic={:?})", String::from_utf8_lossy(&prefix[..4])),
        ));
    }
    let header_len = u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]) as usize;

    let header_buf = read_sized(
        &mut reader,
        header_len,
        "header",
        &format!("truncated header (expected {} bytes)", header_len),
    )?;
    let header: SpxHeader = serde_json::from_slice(&header_buf)
        .map_err(|e| SpectralError::format("header", format!("invalid JSON header: {}", e)))?;
    let params = header.validate()?;

    let payload_len = header.payload_len()?;
    let payload = read_sized(
        &mut reader,
        payload_len,
        "payload",
        &format!("truncated payload (expected {} bytes)", payload_len),
    )?;

    let values: Vec<Complex32> = payload
        .chunks_exact(BYTES_PER_BIN)
        .map(|b| {
            Complex32::new(
                f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
                f32::from_le_bytes([b[4], b[5], b[6], b[7]]),
            )
        })
        .collect();
    let data = Array3::from_shape_vec((header.channels, header.frames, header.bins), values)
        .map_err(|e| SpectralError::format("payload", e.to_string()))?;

    log::debug!(
        "Decoded .spx: {} ch x {} frames x {} bins, {} Hz",
        header.channels, header.frames, header.bins, header.sample_rate
    );

    SpectralTensor::new(header.sample_rate, params, header.original_frames, data)
        .map_err(|e| SpectralError::format("header", e.to_string()))
}

fn read_exact_or<R: Read>(reader: &mut R, buf: &mut [u8], field: &str, message: &str) -> Result<()> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(SpectralError::format(field, message)),
        Err(e) => Err(e.into()),
    }
}

/// Reads `len` bytes without trusting `len` for the allocation; the buffer
/// only grows as bytes actually arrive.
fn read_sized<R: Read>(reader: &mut R, len: usize, field: &str, message: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(SpectralError::format(field, message));
    }
    Ok(buf)
}

/// Encodes into an in-memory buffer.
pub fn encode(tensor: &SpectralTensor) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(64 + tensor.data().len() * BYTES_PER_BIN);
    write_to(tensor, &mut out)?;
    Ok(out)
}

pub fn decode(bytes: &[u8]) -> Result<SpectralTensor> {
    read_from(bytes)
}

pub fn save<P: AsRef<Path>>(tensor: &SpectralTensor, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .map_err(|e| SpectralError::io(format!("Cannot create {}: {}", path.display(), e)))?;
    write_to(tensor, BufWriter::new(file))
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<SpectralTensor> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| SpectralError::io(format!("Cannot open {}: {}", path.display(), e)))?;
    read_from(BufReader::new(file))
}
