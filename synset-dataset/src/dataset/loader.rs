use crate::{
    annotation::{parse_annotation, ImageAnnotation, ObjectAnnotation},
    common::*,
    error::{FetchError, SampleError},
    fetch::{find_image_url, RemoteFetcher},
    processor::ImageLoader,
    synset::SynsetTable,
};

/// An index resolved to its annotation, object and image location.
#[derive(Debug, Clone)]
pub struct ResolvedSample {
    pub class_id: usize,
    pub synset: String,
    pub annotation_path: PathBuf,
    pub annotation: ImageAnnotation,
    /// The first object in the annotation labeled with `synset`.
    pub object: ObjectAnnotation,
    pub image_path: PathBuf,
}

/// Resolve annotations and acquire images, locally or from the remote source.
#[derive(Debug, Clone)]
pub struct SampleLoader {
    image_dir: PathBuf,
    image_loader: Arc<dyn ImageLoader>,
    fetcher: Arc<dyn RemoteFetcher>,
}

impl SampleLoader {
    pub fn new(
        data_dir: &Path,
        image_loader: Arc<dyn ImageLoader>,
        fetcher: Arc<dyn RemoteFetcher>,
    ) -> Self {
        Self {
            image_dir: data_dir.join("Image"),
            image_loader,
            fetcher,
        }
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Parse the annotation at `position` of `class_id` and pick its object.
    pub fn resolve(
        &self,
        table: &SynsetTable,
        class_id: usize,
        position: usize,
    ) -> Result<ResolvedSample, SampleError> {
        let (synset, annotation_path) = table
            .synset(class_id)
            .zip(table.annotation_path(class_id, position))
            .ok_or(SampleError::IndexOutOfRange {
                index: position,
                len: table.class_count(class_id),
            })?;

        let annotation =
            parse_annotation(&annotation_path).map_err(|source| SampleError::Annotation {
                path: annotation_path.clone(),
                source,
            })?;
        let object = annotation
            .find_object(synset)
            .cloned()
            .ok_or_else(|| SampleError::MissingAnnotationMatch {
                synset: synset.to_owned(),
                annotation: annotation_path.clone(),
            })?;
        let image_path = annotation.image_path(&self.image_dir);

        Ok(ResolvedSample {
            class_id,
            synset: synset.to_owned(),
            annotation_path,
            annotation,
            object,
            image_path,
        })
    }

    /// Load the image of `sample`, fetching it if the local copy is unusable.
    pub fn acquire(&self, sample: &ResolvedSample) -> Result<RgbImage, SampleError> {
        match self.image_loader.load(&sample.image_path) {
            Ok(image) => Ok(image),
            Err(err) => {
                debug!(
                    "local image '{}' is unusable: {:#}",
                    sample.image_path.display(),
                    err
                );
                self.refetch(sample)
            }
        }
    }

    /// Download the image of `sample` again and load the fresh copy.
    pub fn refetch(&self, sample: &ResolvedSample) -> Result<RgbImage, SampleError> {
        let unavailable = || SampleError::ImageUnavailable {
            path: sample.image_path.clone(),
        };

        self.fetch(sample).map_err(|err| {
            warn!(
                "unable to fetch image '{}' of synset {}: {}",
                sample.annotation.filename, sample.synset, err
            );
            unavailable()
        })?;

        self.image_loader.load(&sample.image_path).map_err(|err| {
            warn!(
                "fetched image '{}' is unusable: {:#}",
                sample.image_path.display(),
                err
            );
            unavailable()
        })
    }

    fn fetch(&self, sample: &ResolvedSample) -> Result<(), FetchError> {
        let ImageAnnotation {
            folder, filename, ..
        } = &sample.annotation;

        let mapping = self.fetcher.url_mapping(&sample.synset)?;
        let url = find_image_url(&mapping, filename).ok_or_else(|| {
            FetchError::Unavailable(format!(
                "no URL for '{}' in the listing of synset {}",
                filename, sample.synset
            ))
        })?;
        info!("fetching image '{}' from {}", filename, url);
        self.fetcher
            .download(url, &self.image_dir.join(folder), filename)
    }
}
