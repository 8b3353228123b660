//! spectrakit - Spectral Audio Toolkit
//!
//! Converts audio to a complex STFT tensor, edits it with pure spectral
//! operators and converts it back. Tensors travel between tools as `.spx`
//! streams.

pub mod audio;
pub mod config;
pub mod error;
pub mod ops;
pub mod processing;
pub mod spectral;
pub mod timespec;

pub use config::{Args, Command, Config};
pub use error::{Result, SpectralError};
pub use spectral::{SpectralTensor, StftParams, WindowKind};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Logs go to stderr; `RUST_LOG` overrides the default level.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .try_init()
        .ok();
}
