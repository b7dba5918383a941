//! Dataset configuration format.

use crate::common::*;
use std::num::NonZeroUsize;

pub const DEFAULT_MAPPING_API: &str =
    "http://www.image-net.org/api/text/imagenet.synset.geturls.getmapping?wnid=";
pub const DEFAULT_ARCHIVE_API: &str =
    "http://www.image-net.org/api/download/imagenet.bbox.synset?wnid=";

/// The main dataset configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// The directory containing `Annotation/` and `Image/`.
    pub data_dir: PathBuf,
    /// The synset list file, one synset per line.
    pub synsets_file: PathBuf,
    /// The maximum number of indices tried per request before giving up.
    #[serde(default = "default_max_resample_attempts")]
    pub max_resample_attempts: NonZeroUsize,
    #[serde(default)]
    pub augment: AugmentConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl DatasetConfig {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config = json5::from_str(&text)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
        Ok(config)
    }
}

/// Geometric augmentation options.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    /// The minimum box side in pixels. Smaller objects are rejected.
    pub min_extent: R64,
    /// The preferred scale range of the anchor patch relative to the box side.
    pub anchor_scale: (R64, R64),
    /// The preferred scale range of the negative patch relative to the box side.
    pub negative_scale: (R64, R64),
    /// The maximum shift of the negative patch origin in anchor patch units.
    pub negative_jitter: R64,
    /// The maximum rotation of the positive patch in degrees.
    pub rotate_degrees: R64,
    /// The probability to mirror the image horizontally.
    pub flip_prob: R64,
    /// Crops larger than this number of pixels are treated as corrupt.
    pub max_crop_pixels: usize,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            min_extent: r64(7.0),
            anchor_scale: (r64(0.75), r64(1.25)),
            negative_scale: (r64(0.5), r64(1.5)),
            negative_jitter: r64(0.5),
            rotate_degrees: r64(15.0),
            flip_prob: r64(0.5),
            max_crop_pixels: 1 << 28,
        }
    }
}

/// Remote image fetching options.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// If unset, missing local images are rejected without network access.
    pub enabled: bool,
    /// The URL prefix to which a synset id is appended to get its
    /// `filename url` listing.
    pub mapping_api: String,
    /// Timeout of a single request in seconds.
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mapping_api: DEFAULT_MAPPING_API.to_owned(),
            timeout_secs: 30,
        }
    }
}

/// Bulk annotation update options.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// The URL prefix to which a synset id is appended to get its annotation archive.
    pub archive_api: String,
    /// The maximum number of concurrent archive downloads.
    pub num_workers: NonZeroUsize,
    /// Where archives are stored before extraction. Defaults to the system
    /// temporary directory.
    pub tmp_dir: Option<PathBuf>,
    /// Timeout of a single request in seconds.
    pub timeout_secs: u64,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            archive_api: DEFAULT_ARCHIVE_API.to_owned(),
            num_workers: NonZeroUsize::new(32).unwrap(),
            tmp_dir: None,
            timeout_secs: 300,
        }
    }
}

fn default_max_resample_attempts() -> NonZeroUsize {
    NonZeroUsize::new(64).unwrap()
}
