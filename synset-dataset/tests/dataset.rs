use anyhow::Result;
use approx::assert_abs_diff_eq;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rand::{prelude::*, rngs::StdRng};
use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use synset_dataset::{
    config::{AugmentConfig, DatasetConfig, FetchConfig},
    dataset::{IndexSampler, SynsetDataset, SynsetDatasetInit},
    error::{FetchError, SampleError},
    fetch::{store_image, RemoteFetcher},
    processor::ToTensor,
};
use tempfile::TempDir;

const FISH: &str = "n01440764";
const DOG: &str = "n02085620";

struct Corpus {
    dir: TempDir,
}

impl Corpus {
    fn new(synsets: &[&str]) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("Annotation"))?;
        fs::create_dir_all(dir.path().join("Image"))?;
        let listing: String = synsets
            .iter()
            .map(|synset| format!("{} some description\n", synset))
            .collect();
        fs::write(dir.path().join("synsets.txt"), listing)?;
        Ok(Self { dir })
    }

    fn data_dir(&self) -> &Path {
        self.dir.path()
    }

    fn image_path(&self, synset: &str, name: &str) -> PathBuf {
        self.data_dir()
            .join("Image")
            .join(synset)
            .join(format!("{}.JPEG", name))
    }

    /// Add an annotation with one object box given as `[xmin, ymin, xmax, ymax]`.
    fn annotate(&self, synset: &str, name: &str, label: &str, bbox: [u32; 4]) -> Result<()> {
        let [xmin, ymin, xmax, ymax] = bbox;
        let dir = self.data_dir().join("Annotation").join(synset);
        fs::create_dir_all(&dir)?;
        let xml = format!(
            "<annotation>\
               <folder>{synset}</folder>\
               <filename>{name}</filename>\
               <size><width>100</width><height>100</height><depth>3</depth></size>\
               <object>\
                 <name>{label}</name>\
                 <bndbox><xmin>{xmin}</xmin><ymin>{ymin}</ymin><xmax>{xmax}</xmax><ymax>{ymax}</ymax></bndbox>\
               </object>\
             </annotation>",
            synset = synset,
            name = name,
            label = label,
            xmin = xmin,
            ymin = ymin,
            xmax = xmax,
            ymax = ymax,
        );
        fs::write(dir.join(format!("{}.xml", name)), xml)?;
        Ok(())
    }

    fn add_image(&self, synset: &str, name: &str) -> Result<()> {
        let path = self.image_path(synset, name);
        fs::create_dir_all(path.parent().unwrap())?;
        fs::write(path, jpeg_bytes()?)?;
        Ok(())
    }

    fn config(&self) -> DatasetConfig {
        DatasetConfig {
            data_dir: self.data_dir().to_owned(),
            synsets_file: self.data_dir().join("synsets.txt"),
            max_resample_attempts: NonZeroUsize::new(16).unwrap(),
            augment: AugmentConfig::default(),
            fetch: FetchConfig {
                enabled: false,
                ..Default::default()
            },
        }
    }
}

/// A gray 100x100 image with a bright 20x20 square in the middle.
fn jpeg_bytes() -> Result<Vec<u8>> {
    let image = RgbImage::from_fn(100, 100, |x, y| {
        if (40..60).contains(&x) && (40..60).contains(&y) {
            Rgb([230, 230, 230])
        } else {
            Rgb([40, 40, 40])
        }
    });
    let mut bytes = std::io::Cursor::new(vec![]);
    DynamicImage::ImageRgb8(image).write_to(&mut bytes, ImageFormat::Jpeg)?;
    Ok(bytes.into_inner())
}

#[derive(Debug)]
struct FixedSampler(usize);

impl IndexSampler for FixedSampler {
    fn sample_index(&self, _rng: &mut dyn RngCore, _len: usize) -> usize {
        self.0
    }
}

/// Serves every requested image from memory.
#[derive(Debug, Default)]
struct MemoryFetcher {
    downloads: AtomicUsize,
}

fn url_listing(synset: &str) -> String {
    format!(
        "{s}_1 http://images.test/{s}_1.jpg\n{s}_2 http://images.test/{s}_2.jpg\n",
        s = synset
    )
}

impl RemoteFetcher for MemoryFetcher {
    fn url_mapping(&self, synset: &str) -> Result<String, FetchError> {
        Ok(url_listing(synset))
    }

    fn download(&self, _url: &str, dest_dir: &Path, filename: &str) -> Result<(), FetchError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let bytes = jpeg_bytes().map_err(|err| FetchError::Unavailable(err.to_string()))?;
        store_image(&bytes, dest_dir, filename)?;
        Ok(())
    }
}

/// Downloads succeed but store bytes that are not an image.
#[derive(Debug, Default)]
struct CorruptFetcher {
    downloads: AtomicUsize,
}

impl RemoteFetcher for CorruptFetcher {
    fn url_mapping(&self, synset: &str) -> Result<String, FetchError> {
        Ok(url_listing(synset))
    }

    fn download(&self, _url: &str, dest_dir: &Path, filename: &str) -> Result<(), FetchError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        store_image(b"still not a jpeg", dest_dir, filename)?;
        Ok(())
    }
}

fn build(init: SynsetDatasetInit<ToTensor>) -> SynsetDataset<ToTensor> {
    let _ = pretty_env_logger::try_init();
    init.build().unwrap()
}

#[test]
fn generate_triplet_samples() -> Result<()> {
    let corpus = Corpus::new(&[FISH, DOG])?;
    for name in ["n01440764_1", "n01440764_2"] {
        corpus.annotate(FISH, name, FISH, [40, 40, 60, 60])?;
        corpus.add_image(FISH, name)?;
    }
    corpus.annotate(DOG, "n02085620_1", DOG, [40, 40, 60, 60])?;
    corpus.add_image(DOG, "n02085620_1")?;

    let dataset = build(SynsetDatasetInit::new(corpus.config(), ToTensor));
    assert_eq!(dataset.len(), 3);
    assert_eq!(dataset.num_classes(), 2);
    assert_eq!(dataset.table().cumulative_counts(), &[2, 3]);
    assert_eq!(dataset.description(FISH), Some("some description"));

    let mut rng = StdRng::seed_from_u64(7);
    let first = dataset.item_at_with_rng(0, &mut rng)?;
    let second = dataset.item_at_with_rng(1, &mut rng)?;
    let third = dataset.item_at_with_rng(2, &mut rng)?;

    assert_eq!(first.class_id, 0);
    assert_eq!(second.class_id, 0);
    assert_eq!(third.class_id, 1);
    assert_eq!(first.class_labels.to_vec(), vec![1.0, 0.0]);
    assert_eq!(third.class_labels.to_vec(), vec![0.0, 1.0]);

    for sample in [&first, &second, &third] {
        assert_eq!(sample.bbox_target, sample.bbox_target_dup);
        let target = sample.bbox_target.to_vec();
        assert_abs_diff_eq!(target[0], 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(target[1], 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(target[2], target[3], epsilon = 1e-5);
        assert!((-0.21..=0.34).contains(&target[2]));

        let (channels, height, width) = sample.anchor.dim();
        assert_eq!(channels, 3);
        assert_eq!(height, width);
        assert_eq!(sample.positive.dim(), sample.anchor.dim());
        assert_eq!(sample.negative.dim().0, 3);
    }

    let (_, _, _, labels, target, target_dup) = first.into_tuple();
    assert_eq!(labels.len(), 2);
    assert_eq!(target, target_dup);
    assert_eq!(dataset.stats().total_rejections(), 0);
    Ok(())
}

#[test]
fn fetch_missing_image() -> Result<()> {
    let corpus = Corpus::new(&[FISH])?;
    corpus.annotate(FISH, "n01440764_1", FISH, [40, 40, 60, 60])?;

    let fetcher = Arc::new(MemoryFetcher::default());
    let mut init = SynsetDatasetInit::new(corpus.config(), ToTensor);
    init.fetcher = Some(fetcher.clone());
    let dataset = build(init);

    let sample = dataset.item_at_with_rng(0, &mut StdRng::seed_from_u64(1))?;
    assert_eq!(sample.class_id, 0);
    assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 1);
    assert!(corpus.image_path(FISH, "n01440764_1").is_file());

    // the stored copy is used from now on
    dataset.item_at_with_rng(0, &mut StdRng::seed_from_u64(2))?;
    assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn unavailable_image_falls_back_to_another_class() -> Result<()> {
    let corpus = Corpus::new(&[FISH, DOG])?;
    corpus.annotate(FISH, "n01440764_1", FISH, [40, 40, 60, 60])?;
    corpus.annotate(DOG, "n02085620_1", DOG, [40, 40, 60, 60])?;
    corpus.add_image(DOG, "n02085620_1")?;

    let mut init = SynsetDatasetInit::new(corpus.config(), ToTensor);
    init.sampler = Some(Arc::new(FixedSampler(1)));
    let dataset = build(init);

    let sample = dataset.item_at_with_rng(0, &mut StdRng::seed_from_u64(3))?;
    assert_eq!(sample.class_id, 1);
    assert_eq!(sample.class_labels.to_vec(), vec![0.0, 1.0]);

    let stats = dataset.stats();
    assert_eq!(stats.image_unavailable, 1);
    assert_eq!(stats.per_class, vec![1, 0]);
    Ok(())
}

#[test]
fn undecodable_image_is_refetched_then_resampled() -> Result<()> {
    let corpus = Corpus::new(&[FISH, DOG])?;
    corpus.annotate(FISH, "n01440764_1", FISH, [40, 40, 60, 60])?;
    let corrupt_path = corpus.image_path(FISH, "n01440764_1");
    fs::create_dir_all(corrupt_path.parent().unwrap())?;
    fs::write(&corrupt_path, b"truncated jpeg")?;
    corpus.annotate(DOG, "n02085620_1", DOG, [40, 40, 60, 60])?;
    corpus.add_image(DOG, "n02085620_1")?;

    let fetcher = Arc::new(CorruptFetcher::default());
    let mut init = SynsetDatasetInit::new(corpus.config(), ToTensor);
    init.fetcher = Some(fetcher.clone());
    init.sampler = Some(Arc::new(FixedSampler(1)));
    let dataset = build(init);

    let sample = dataset.item_at_with_rng(0, &mut StdRng::seed_from_u64(9))?;
    assert_eq!(sample.class_id, 1);
    assert_eq!(sample.class_labels.to_vec(), vec![0.0, 1.0]);

    // the corrupt local copy triggered exactly one download
    assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 1);
    assert_eq!(fs::read(&corrupt_path)?, b"still not a jpeg");

    let stats = dataset.stats();
    assert_eq!(stats.image_unavailable, 1);
    assert_eq!(stats.per_class, vec![1, 0]);
    Ok(())
}

#[test]
fn degenerate_box_is_resampled() -> Result<()> {
    let corpus = Corpus::new(&[FISH])?;
    corpus.annotate(FISH, "n01440764_1", FISH, [40, 40, 43, 43])?;
    corpus.annotate(FISH, "n01440764_2", FISH, [40, 40, 60, 60])?;
    corpus.add_image(FISH, "n01440764_1")?;
    corpus.add_image(FISH, "n01440764_2")?;

    let mut init = SynsetDatasetInit::new(corpus.config(), ToTensor);
    init.sampler = Some(Arc::new(FixedSampler(1)));
    let dataset = build(init);

    dataset.item_at_with_rng(0, &mut StdRng::seed_from_u64(4))?;
    assert_eq!(dataset.stats().degenerate_box, 1);
    Ok(())
}

#[test]
fn unmatched_annotation_is_resampled() -> Result<()> {
    let corpus = Corpus::new(&[FISH])?;
    corpus.annotate(FISH, "n01440764_1", DOG, [40, 40, 60, 60])?;
    corpus.annotate(FISH, "n01440764_2", FISH, [40, 40, 60, 60])?;
    corpus.add_image(FISH, "n01440764_1")?;
    corpus.add_image(FISH, "n01440764_2")?;

    let mut init = SynsetDatasetInit::new(corpus.config(), ToTensor);
    init.sampler = Some(Arc::new(FixedSampler(1)));
    let dataset = build(init);

    dataset.item_at_with_rng(0, &mut StdRng::seed_from_u64(5))?;
    assert_eq!(dataset.stats().missing_annotation_match, 1);
    Ok(())
}

#[test]
fn give_up_after_max_attempts() -> Result<()> {
    let corpus = Corpus::new(&[FISH])?;
    corpus.annotate(FISH, "n01440764_1", FISH, [40, 40, 60, 60])?;

    let mut config = corpus.config();
    config.max_resample_attempts = NonZeroUsize::new(5).unwrap();
    let dataset = build(SynsetDatasetInit::new(config, ToTensor));

    let err = dataset
        .item_at_with_rng(0, &mut StdRng::seed_from_u64(6))
        .unwrap_err();
    assert!(matches!(err, SampleError::SampleUnavailable { attempts: 5 }));

    let stats = dataset.stats();
    assert_eq!(stats.image_unavailable, 5);
    assert_eq!(stats.exhausted, 1);
    Ok(())
}

#[test]
fn crop_failure_refetches_image() -> Result<()> {
    let corpus = Corpus::new(&[FISH])?;
    corpus.annotate(FISH, "n01440764_1", FISH, [40, 40, 60, 60])?;
    corpus.add_image(FISH, "n01440764_1")?;

    let mut config = corpus.config();
    config.max_resample_attempts = NonZeroUsize::new(3).unwrap();
    config.augment.max_crop_pixels = 1;

    let fetcher = Arc::new(MemoryFetcher::default());
    let mut init = SynsetDatasetInit::new(config, ToTensor);
    init.fetcher = Some(fetcher.clone());
    let dataset = build(init);

    let err = dataset
        .item_at_with_rng(0, &mut StdRng::seed_from_u64(8))
        .unwrap_err();
    assert!(matches!(err, SampleError::SampleUnavailable { attempts: 3 }));
    assert_eq!(dataset.stats().crop_decode_failure, 3);
    assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 3);
    Ok(())
}

#[test]
fn index_out_of_range() -> Result<()> {
    let corpus = Corpus::new(&[FISH])?;
    corpus.annotate(FISH, "n01440764_1", FISH, [40, 40, 60, 60])?;
    let dataset = build(SynsetDatasetInit::new(corpus.config(), ToTensor));

    let err = dataset.item_at(1).unwrap_err();
    assert!(matches!(
        err,
        SampleError::IndexOutOfRange { index: 1, len: 1 }
    ));
    Ok(())
}

#[test]
fn missing_synset_directory_is_empty_class() -> Result<()> {
    let corpus = Corpus::new(&[FISH, DOG])?;
    corpus.annotate(DOG, "n02085620_1", DOG, [40, 40, 60, 60])?;
    corpus.add_image(DOG, "n02085620_1")?;

    let dataset = build(SynsetDatasetInit::new(corpus.config(), ToTensor));
    assert_eq!(dataset.table().cumulative_counts(), &[0, 1]);

    let sample = dataset.item_at(0)?;
    assert_eq!(sample.class_id, 1);
    Ok(())
}

#[test]
fn concurrent_requests() -> Result<()> {
    let corpus = Corpus::new(&[FISH, DOG])?;
    for (synset, name) in [(FISH, "n01440764_1"), (DOG, "n02085620_1")] {
        corpus.annotate(synset, name, synset, [40, 40, 60, 60])?;
        corpus.add_image(synset, name)?;
    }
    let dataset = build(SynsetDatasetInit::new(corpus.config(), ToTensor));

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let dataset = &dataset;
                scope.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(worker);
                    (0..8)
                        .map(|step| -> Result<bool> {
                            let index = (worker as usize + step) % dataset.len();
                            let sample = dataset.item_at_with_rng(index, &mut rng)?;
                            Ok(sample.class_id == index)
                        })
                        .collect::<Result<Vec<bool>>>()
                })
            })
            .collect();

        for handle in handles {
            let matches = handle.join().unwrap()?;
            assert!(matches.into_iter().all(|matched| matched));
        }
        Ok(())
    })
}
