//! Spectral Operators
//!
//! Pure functions over [`SpectralTensor`](crate::spectral::SpectralTensor)s.
//! Each returns a new tensor and leaves its inputs untouched.

pub mod decompose;
pub mod denoise;
pub mod gate;
pub mod join;
pub mod morph;
pub mod peaks;
pub mod stretch;
pub mod transpose;

pub use decompose::{
    component_file_name, decompose, remainder_file_name, ComponentFile, DecomposeOptions, Decomposition,
};
pub use denoise::{denoise, NoiseRegion};
pub use gate::gate;
pub use join::join;
pub use morph::morph;
pub use stretch::stretch;
pub use transpose::{parse_semitones, transpose};
