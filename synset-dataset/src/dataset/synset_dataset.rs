use super::{
    one_hot, AugmentedSample, IndexSampler, ResampleStats, ResampleSummary, SampleLoader,
    UniformIndexSampler,
};
use crate::{
    common::*,
    config::DatasetConfig,
    error::SampleError,
    fetch::{HttpFetcher, OfflineFetcher, RemoteFetcher},
    processor::{Augmenter, FsImageLoader, ImageLoader, PatchTransform},
    synset::{load_synsets_file, SynsetTable},
};

/// The builder of [SynsetDataset].
///
/// Collaborators left unset get the file system loader, the HTTP fetcher
/// (or the offline one when fetching is disabled) and the uniform sampler.
#[derive(Debug)]
pub struct SynsetDatasetInit<T> {
    pub config: DatasetConfig,
    pub transform: T,
    pub image_loader: Option<Arc<dyn ImageLoader>>,
    pub fetcher: Option<Arc<dyn RemoteFetcher>>,
    pub sampler: Option<Arc<dyn IndexSampler>>,
}

impl<T> SynsetDatasetInit<T>
where
    T: PatchTransform,
{
    pub fn new(config: DatasetConfig, transform: T) -> Self {
        Self {
            config,
            transform,
            image_loader: None,
            fetcher: None,
            sampler: None,
        }
    }

    pub fn build(self) -> Result<SynsetDataset<T>> {
        let Self {
            config,
            transform,
            image_loader,
            fetcher,
            sampler,
        } = self;
        let DatasetConfig {
            ref data_dir,
            ref synsets_file,
            max_resample_attempts,
            ref augment,
            ref fetch,
        } = config;

        let descriptions = load_synsets_file(synsets_file)?;
        let synsets: IndexSet<_> = descriptions.keys().cloned().collect();
        let table = SynsetTable::build(data_dir, synsets)?;
        let augmenter = Augmenter::new(augment)?;

        let image_loader = image_loader.unwrap_or_else(|| Arc::new(FsImageLoader));
        let fetcher: Arc<dyn RemoteFetcher> = match fetcher {
            Some(fetcher) => fetcher,
            None if fetch.enabled => Arc::new(HttpFetcher::new(fetch)?),
            None => Arc::new(OfflineFetcher),
        };
        let sampler = sampler.unwrap_or_else(|| Arc::new(UniformIndexSampler));
        let loader = SampleLoader::new(data_dir, image_loader, fetcher);

        info!(
            "loaded {} annotated samples across {} synsets from '{}'",
            table.total_count(),
            table.num_classes(),
            data_dir.display()
        );
        (0..table.num_classes())
            .filter(|&class_id| table.class_count(class_id) == 0)
            .filter_map(|class_id| table.synset(class_id))
            .for_each(|synset| warn!("synset {} has no annotations", synset));

        let stats = ResampleStats::new(table.num_classes());

        Ok(SynsetDataset {
            descriptions,
            table,
            loader,
            augmenter,
            transform,
            sampler,
            max_attempts: max_resample_attempts.get(),
            stats,
        })
    }
}

/// The triplet sample generator.
///
/// The dataset is immutable after construction apart from its statistics
/// counters, so one instance can serve many threads.
#[derive(Debug)]
pub struct SynsetDataset<T> {
    descriptions: IndexMap<String, String>,
    table: SynsetTable,
    loader: SampleLoader,
    augmenter: Augmenter,
    transform: T,
    sampler: Arc<dyn IndexSampler>,
    max_attempts: usize,
    stats: ResampleStats,
}

impl<T> SynsetDataset<T>
where
    T: PatchTransform,
{
    /// The total number of annotation files.
    pub fn len(&self) -> usize {
        self.table.total_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_classes(&self) -> usize {
        self.table.num_classes()
    }

    pub fn table(&self) -> &SynsetTable {
        &self.table
    }

    /// The description of `synset` listed in the synsets file.
    pub fn description(&self, synset: &str) -> Option<&str> {
        self.descriptions.get(synset).map(String::as_str)
    }

    pub fn stats(&self) -> ResampleSummary {
        self.stats.summary()
    }

    /// Generate the sample at `index` with a freshly seeded generator.
    pub fn item_at(&self, index: usize) -> Result<AugmentedSample<T::Output>, SampleError> {
        let mut rng = StdRng::from_entropy();
        self.item_at_with_rng(index, &mut rng)
    }

    /// Generate the sample at `index`.
    ///
    /// A recoverable failure replaces the index with one drawn by the
    /// sampler. The returned sample may therefore belong to another class
    /// than `index` does.
    pub fn item_at_with_rng<R>(
        &self,
        index: usize,
        rng: &mut R,
    ) -> Result<AugmentedSample<T::Output>, SampleError>
    where
        R: Rng,
    {
        let len = self.len();
        if index >= len {
            return Err(SampleError::IndexOutOfRange { index, len });
        }

        let mut index = index;
        for attempt in 1..=self.max_attempts {
            match self.try_item_at(index, rng) {
                Ok(sample) => return Ok(sample),
                Err(err) if err.is_recoverable() => {
                    self.stats.record(self.table.class_of(index), &err);
                    debug!(
                        "rejected index {} (attempt {}/{}): {}",
                        index, attempt, self.max_attempts, err
                    );
                    index = self.sampler.sample_index(&mut *rng, len);
                }
                Err(err) => return Err(err),
            }
        }

        self.stats.record_exhausted();
        warn!(
            "giving up after {} rejected indices, the corpus may be mostly unusable",
            self.max_attempts
        );
        Err(SampleError::SampleUnavailable {
            attempts: self.max_attempts,
        })
    }

    fn try_item_at<R>(
        &self,
        index: usize,
        rng: &mut R,
    ) -> Result<AugmentedSample<T::Output>, SampleError>
    where
        R: Rng,
    {
        let (class_id, position) =
            self.table
                .locate(index)
                .ok_or(SampleError::IndexOutOfRange {
                    index,
                    len: self.len(),
                })?;
        let sample = self.loader.resolve(&self.table, class_id, position)?;
        let image = self.loader.acquire(&sample)?;

        let (width, height) = image.dimensions();
        let image_size = HW::from_hw([height as f64, width as f64]);
        let plan = self.augmenter.plan(&image_size, &sample.object, rng)?;

        // A crop failure gets one more chance with a freshly downloaded image.
        let patches = match self.augmenter.render(&image, &plan) {
            Ok(patches) => patches,
            Err(err) => {
                debug!(
                    "crop failed on '{}', refetching: {:#}",
                    sample.image_path.display(),
                    err
                );
                let crop_failure = |reason: String| SampleError::CropDecodeFailure {
                    path: sample.image_path.clone(),
                    reason,
                };
                let image = self
                    .loader
                    .refetch(&sample)
                    .map_err(|refetch_err| crop_failure(format!("{:#}; {}", err, refetch_err)))?;
                self.augmenter
                    .render(&image, &plan)
                    .map_err(|err| crop_failure(format!("{:#}", err)))?
            }
        };

        let transform = |patch: &RgbImage| {
            self.transform
                .transform(patch)
                .map_err(SampleError::Transform)
        };
        let anchor = transform(&patches.anchor)?;
        let positive = transform(&patches.positive)?;
        let negative = transform(&patches.negative)?;
        let bbox_target = plan.target.to_tensor();

        Ok(AugmentedSample {
            class_id,
            anchor,
            positive,
            negative,
            class_labels: one_hot(self.num_classes(), class_id),
            bbox_target_dup: bbox_target.clone(),
            bbox_target,
        })
    }
}
