//! Conversion of image patches to numeric arrays.

use crate::common::*;

/// Turn an image patch into the representation handed to the consumer.
pub trait PatchTransform
where
    Self: Send + Sync,
{
    type Output;

    fn transform(&self, patch: &RgbImage) -> Result<Self::Output>;
}

/// Convert a patch to a CHW float array with values in `[0, 1]`.
#[derive(Debug, Clone, Default)]
pub struct ToTensor;

impl PatchTransform for ToTensor {
    type Output = Array3<f32>;

    fn transform(&self, patch: &RgbImage) -> Result<Self::Output> {
        let (width, height) = patch.dimensions();
        let array = Array3::from_shape_fn(
            (3, height as usize, width as usize),
            |(channel, row, col)| {
                let Rgb(pixel) = *patch.get_pixel(col as u32, row as u32);
                pixel[channel] as f32 / 255.0
            },
        );
        Ok(array)
    }
}

/// Resize a patch to a fixed size before converting it with [ToTensor].
#[derive(Debug, Clone)]
pub struct ResizedTensor {
    height: u32,
    width: u32,
    filter: FilterType,
}

impl ResizedTensor {
    pub fn new(height: u32, width: u32) -> Result<Self> {
        ensure!(height > 0 && width > 0, "output size must be positive");
        Ok(Self {
            height,
            width,
            filter: FilterType::Triangle,
        })
    }
}

impl PatchTransform for ResizedTensor {
    type Output = Array3<f32>;

    fn transform(&self, patch: &RgbImage) -> Result<Self::Output> {
        let resized = image::imageops::resize(patch, self.width, self.height, self.filter);
        ToTensor.transform(&resized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn to_tensor_layout() {
        let mut patch = RgbImage::new(3, 2);
        patch.put_pixel(2, 1, Rgb([255, 0, 51]));

        let tensor = ToTensor.transform(&patch).unwrap();
        assert_eq!(tensor.shape(), &[3, 2, 3]);
        assert_abs_diff_eq!(tensor[[0, 1, 2]], 1.0);
        assert_abs_diff_eq!(tensor[[1, 1, 2]], 0.0);
        assert_abs_diff_eq!(tensor[[2, 1, 2]], 0.2);
        assert_abs_diff_eq!(tensor[[0, 0, 0]], 0.0);
    }

    #[test]
    fn resized_tensor_shape() {
        let patch = RgbImage::from_pixel(17, 31, Rgb([128, 128, 128]));
        let transform = ResizedTensor::new(8, 12).unwrap();
        let tensor = transform.transform(&patch).unwrap();
        assert_eq!(tensor.shape(), &[3, 8, 12]);
        assert!(ResizedTensor::new(0, 12).is_err());
    }
}
