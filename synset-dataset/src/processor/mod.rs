//! Image loading, augmentation and patch conversion building blocks.

pub mod augment;
pub mod bbox_target;
pub mod image_loader;
pub mod transform;

pub use augment::*;
pub use bbox_target::*;
pub use image_loader::*;
pub use transform::*;
