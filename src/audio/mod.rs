//! Audio Module
//!
//! WAV reading and writing at the waveform boundary of the toolkit.

pub mod wav;

pub use wav::{AudioFormat, WavAudio};
