//! Dataset assembly: index resolution, image acquisition and resampling.

mod loader;
mod sample;
mod sampler;
mod stats;
mod synset_dataset;

pub use loader::*;
pub use sample::*;
pub use sampler::*;
pub use stats::*;
pub use synset_dataset::*;
