//! Spectral Engine Core
//!
//! The tensor data model, the STFT pair that moves audio in and out of it,
//! and the `.spx` codec.

pub mod codec;
pub mod tensor;
pub mod transform;
pub mod window;

pub use rustfft::num_complex::Complex32;

pub use codec::{SpxHeader, FORMAT_VERSION, MAGIC};
pub use tensor::{SpectralTensor, StftParams};
pub use transform::{forward, inverse, Stft};
pub use window::WindowKind;
