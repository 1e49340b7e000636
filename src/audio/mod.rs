pub mod decoder;
pub mod resample;
pub mod slicer;

pub use decoder::load_waveform;
