//! The triplet patch augmentation algorithm.

use super::BBoxTarget;
use crate::{annotation::ObjectAnnotation, common::*, config::AugmentConfig, error::SampleError};
use imageproc::geometric_transformations::{rotate, Interpolation};

/// The range of admissible scale factors of a square crop around an object.
///
/// Scaling the longer box side by a factor in this range gives a patch that
/// is not smaller than the minimum extent and stays inside the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleRange {
    pub min: f64,
    pub max: f64,
}

impl ScaleRange {
    /// Compute the range for `object` inside an image of `image_size`.
    pub fn new(
        object: &TLBR<f64>,
        image_size: &HW<f64>,
        min_extent: f64,
    ) -> Result<Self, SampleError> {
        let width = object.w();
        let height = object.h();
        if !(width >= min_extent && height >= min_extent) {
            return Err(SampleError::degenerate(format!(
                "box {}x{} is smaller than {} pixels",
                width, height, min_extent
            )));
        }

        let side_len = width.max(height);
        let xmid = object.cx();
        let ymid = object.cy();

        let min = (min_extent / width).max(min_extent / height);
        let max_x = xmid.min(image_size.w() - xmid) * 2.0 / side_len;
        let max_y = ymid.min(image_size.h() - ymid) * 2.0 / side_len;
        let max = max_x.min(max_y);

        Ok(Self { min, max })
    }

    /// Intersect a preferred `(lower, upper)` range with the admissible one.
    ///
    /// The lower bound becomes `max(min(lower, self.max), self.min)` and the
    /// upper bound `min(upper, self.max)`. Returns `None` if the result is
    /// empty, which happens for boxes touching or leaving the image border.
    pub fn clip(&self, (lower, upper): (f64, f64)) -> Option<(f64, f64)> {
        let lower = lower.min(self.max).max(self.min);
        let upper = upper.min(self.max);
        (lower.is_finite() && upper.is_finite() && lower <= upper).then(|| (lower, upper))
    }
}

/// The geometry of one augmented sample, computed before touching pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct CropPlan {
    pub image_size: HW<f64>,
    pub flipped: bool,
    /// The object box, mirrored if `flipped` is set.
    pub object: TLBR<f64>,
    pub scale_range: ScaleRange,
    pub scale_factor: f64,
    /// The square anchor patch centered on the object.
    pub anchor: TLBR<f64>,
    /// The rotation of the positive patch in degrees, counterclockwise.
    pub rotate_degrees: f64,
    /// The shifted and rescaled negative patch.
    pub negative: TLBR<f64>,
    pub target: BBoxTarget,
}

/// The three image patches of a sample.
#[derive(Debug, Clone)]
pub struct Patches {
    pub anchor: RgbImage,
    pub positive: RgbImage,
    pub negative: RgbImage,
}

/// The triplet augmentation processor.
#[derive(Debug, Clone)]
pub struct Augmenter {
    min_extent: f64,
    anchor_scale: (f64, f64),
    negative_scale: (f64, f64),
    negative_jitter: f64,
    rotate_degrees: f64,
    flip_prob: f64,
    max_crop_pixels: usize,
}

impl Augmenter {
    pub fn new(config: &AugmentConfig) -> Result<Self> {
        let AugmentConfig {
            min_extent,
            anchor_scale,
            negative_scale,
            negative_jitter,
            rotate_degrees,
            flip_prob,
            max_crop_pixels,
        } = *config;

        ensure!(min_extent > 0.0, "min_extent must be positive");
        let check_scale = |(lower, upper): (R64, R64), name: &str| -> Result<_> {
            ensure!(lower > 0.0, "{} min must be positive", name);
            ensure!(lower <= upper, "{} min must not exceed {} max", name, name);
            Ok((lower.raw(), upper.raw()))
        };
        let anchor_scale = check_scale(anchor_scale, "anchor_scale")?;
        let negative_scale = check_scale(negative_scale, "negative_scale")?;
        ensure!(negative_jitter >= 0.0, "negative_jitter must be non-negative");
        ensure!(rotate_degrees >= 0.0, "rotate_degrees must be non-negative");
        ensure!(
            (0.0..=1.0).contains(&flip_prob.raw()),
            "flip_prob must be within [0, 1]"
        );
        ensure!(max_crop_pixels > 0, "max_crop_pixels must be positive");

        Ok(Self {
            min_extent: min_extent.raw(),
            anchor_scale,
            negative_scale,
            negative_jitter: negative_jitter.raw(),
            rotate_degrees: rotate_degrees.raw(),
            flip_prob: flip_prob.raw(),
            max_crop_pixels,
        })
    }

    /// Sample the crop geometry for `object` in an image of `image_size`.
    pub fn plan<R>(
        &self,
        image_size: &HW<f64>,
        object: &ObjectAnnotation,
        rng: &mut R,
    ) -> Result<CropPlan, SampleError>
    where
        R: Rng + ?Sized,
    {
        let object = object
            .try_to_tlbr()
            .map_err(|err| SampleError::degenerate(format!("{:#}", err)))?;
        let scale_range = ScaleRange::new(&object, image_size, self.min_extent)?;
        let (lower, upper) = scale_range.clip(self.anchor_scale).ok_or_else(|| {
            SampleError::degenerate(format!("empty anchor scale range {:?}", scale_range))
        })?;
        let scale_factor = rng.gen_range(lower..=upper);

        // mirror before deriving the patch so that box and patch agree
        let flipped = rng.gen_bool(self.flip_prob);
        let object = if flipped {
            object.hflip(image_size.w())
        } else {
            object
        };

        let side_len = object.w().max(object.h());
        let anchor = TLBR::try_square(object.cy(), object.cx(), side_len * scale_factor)
            .map_err(|err| SampleError::degenerate(format!("{:#}", err)))?;
        let patch_size = anchor.w();
        let target = BBoxTarget::encode(&object, &anchor);

        let rotate_degrees = if self.rotate_degrees > 0.0 {
            rng.gen_range(-self.rotate_degrees..=self.rotate_degrees)
        } else {
            0.0
        };

        let negative = {
            let (lower, upper) = scale_range.clip(self.negative_scale).ok_or_else(|| {
                SampleError::degenerate(format!("empty negative scale range {:?}", scale_range))
            })?;
            let size = side_len * rng.gen_range(lower..=upper);
            let jitter = self.negative_jitter;
            let dx = patch_size * rng.gen_range(-jitter..=jitter);
            let dy = patch_size * rng.gen_range(-jitter..=jitter);
            TLBR::try_from_tlhw([anchor.t() + dy, anchor.l() + dx, size, size])
                .map_err(|err| SampleError::degenerate(format!("{:#}", err)))?
                .clamp_origin(image_size)
        };

        Ok(CropPlan {
            image_size: image_size.clone(),
            flipped,
            object,
            scale_range,
            scale_factor,
            anchor,
            rotate_degrees,
            negative,
            target,
        })
    }

    /// Cut the anchor, positive and negative patches out of `image`.
    pub fn render(&self, image: &RgbImage, plan: &CropPlan) -> Result<Patches> {
        let (width, height) = image.dimensions();
        ensure!(
            width as f64 == plan.image_size.w() && height as f64 == plan.image_size.h(),
            "image size {}x{} differs from the planned {}x{}",
            width,
            height,
            plan.image_size.w(),
            plan.image_size.h()
        );

        let flipped_image;
        let image = if plan.flipped {
            flipped_image = image::imageops::flip_horizontal(image);
            &flipped_image
        } else {
            image
        };

        let anchor = crop_patch(image, &plan.anchor, self.max_crop_pixels)?;
        let positive = {
            let center = (plan.object.cx() as f32, plan.object.cy() as f32);
            // rotate() turns clockwise in image coordinates
            let theta = -(plan.rotate_degrees.to_radians() as f32);
            let rotated = rotate(
                image,
                center,
                theta,
                Interpolation::Bilinear,
                Rgb([0, 0, 0]),
            );
            crop_patch(&rotated, &plan.anchor, self.max_crop_pixels)?
        };
        let negative = crop_patch(image, &plan.negative, self.max_crop_pixels)?;

        Ok(Patches {
            anchor,
            positive,
            negative,
        })
    }
}

/// Crop `rect` out of `image` after rounding its edges to whole pixels.
///
/// Pixels outside the image are black.
pub fn crop_patch(image: &RgbImage, rect: &TLBR<f64>, max_pixels: usize) -> Result<RgbImage> {
    ensure!(rect.is_finite(), "non-finite crop rectangle {:?}", rect);
    let [t, l, b, r] = rect
        .round()
        .try_cast::<i64>()
        .ok_or_else(|| format_err!("crop rectangle {:?} is out of range", rect))?
        .tlbr();
    let patch_h = b - t;
    let patch_w = r - l;
    ensure!(
        patch_h > 0 && patch_w > 0,
        "crop rectangle {:?} is empty",
        rect
    );
    ensure!(
        (patch_h as u64).saturating_mul(patch_w as u64) <= max_pixels as u64,
        "crop of {}x{} pixels exceeds the limit of {} pixels",
        patch_w,
        patch_h,
        max_pixels
    );

    let (img_w, img_h) = image.dimensions();
    let (img_w, img_h) = (img_w as i64, img_h as i64);
    let patch = RgbImage::from_fn(u32::try_from(patch_w)?, u32::try_from(patch_h)?, |x, y| {
        let sx = l + x as i64;
        let sy = t + y as i64;
        if (0..img_w).contains(&sx) && (0..img_h).contains(&sy) {
            *image.get_pixel(sx as u32, sy as u32)
        } else {
            Rgb([0, 0, 0])
        }
    });

    Ok(patch)
}
