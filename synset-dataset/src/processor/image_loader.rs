//! The image decoding collaborator.

use crate::common::*;

/// Decode an image file into RGB pixels.
pub trait ImageLoader
where
    Self: Debug + Send + Sync,
{
    /// Fails if the file is missing or cannot be decoded.
    fn load(&self, path: &Path) -> Result<RgbImage>;
}

/// Load images from the file system with the `image` crate.
///
/// The format is guessed from the file content, not the extension.
#[derive(Debug, Clone, Default)]
pub struct FsImageLoader;

impl ImageLoader for FsImageLoader {
    fn load(&self, path: &Path) -> Result<RgbImage> {
        let image = image::io::Reader::open(path)
            .with_context(|| format!("failed to open image '{}'", path.display()))?
            .with_guessed_format()?
            .decode()
            .with_context(|| format!("failed to decode image '{}'", path.display()))?;
        Ok(image.to_rgb8())
    }
}
