//! Triplet sample generator for object localization on synset-organized
//! image corpora.
//!
//! A flat sample index is resolved to a synset and one of its annotated
//! objects. The image is read from the local store, or fetched remotely when
//! missing, and turned into an anchor crop, a rotated positive crop, a
//! perturbed negative crop and bounding box regression targets.

mod common;
pub mod annotation;
pub mod config;
pub mod dataset;
pub mod error;
pub mod fetch;
pub mod processor;
pub mod synset;
pub mod updater;

pub use config::DatasetConfig;
pub use dataset::{AugmentedSample, SynsetDataset, SynsetDatasetInit};
pub use error::{FetchError, SampleError};
