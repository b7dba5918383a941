//! Bulk refresh of the bounding box annotations.
//!
//! Each synset has a gzipped tar archive laid out as
//! `Annotation/<synset>/<name>.xml`. Archives are downloaded to a temporary
//! directory and unpacked over the data directory.

use crate::{common::*, config::UpdaterConfig};
use futures::Future;

/// The outcome of an update run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    pub updated: Vec<String>,
    pub failed: Vec<String>,
}

/// Refresh the annotations of `synsets` from the archive API.
///
/// Failures of individual synsets are logged and reported in the summary.
/// Only setup failures, such as `data_dir` being a file, return an error.
pub async fn update_annotations<P>(
    data_dir: P,
    synsets: &[String],
    config: &UpdaterConfig,
) -> Result<UpdateSummary>
where
    P: AsRef<Path>,
{
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    update_annotations_with(data_dir, synsets, config, |url| {
        let client = client.clone();
        async move {
            let bytes = client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            Ok::<_, Error>(bytes.to_vec())
        }
    })
    .await
}

/// Refresh the annotations of a single synset.
pub async fn update_synset_annotations<P>(
    data_dir: P,
    synset: &str,
    config: &UpdaterConfig,
) -> Result<()>
where
    P: AsRef<Path>,
{
    let summary = update_annotations(data_dir, &[synset.to_owned()], config).await?;
    ensure!(
        summary.failed.is_empty(),
        "failed to update annotations of synset {}",
        synset
    );
    Ok(())
}

/// Same as [update_annotations] with a custom archive download function.
///
/// `fetch_archive` receives the archive URL and returns the archive bytes.
pub async fn update_annotations_with<P, F, Fut>(
    data_dir: P,
    synsets: &[String],
    config: &UpdaterConfig,
    fetch_archive: F,
) -> Result<UpdateSummary>
where
    P: AsRef<Path>,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Vec<u8>>>,
{
    let UpdaterConfig {
        ref archive_api,
        num_workers,
        ref tmp_dir,
        ..
    } = *config;
    let num_workers = num_workers.get();

    let data_dir = data_dir.as_ref();
    ensure!(
        !data_dir.is_file(),
        "data directory '{}' is a file",
        data_dir.display()
    );
    tokio::fs::create_dir_all(data_dir)
        .await
        .with_context(|| format!("failed to create directory '{}'", data_dir.display()))?;

    let tmp_dir = {
        let mut builder = tempfile::Builder::new();
        builder.prefix("annotation-update");
        match tmp_dir {
            Some(dir) => {
                tokio::fs::create_dir_all(dir)
                    .await
                    .with_context(|| format!("failed to create directory '{}'", dir.display()))?;
                builder.tempdir_in(dir)?
            }
            None => builder.tempdir()?,
        }
    };

    let total = synsets.len();
    info!(
        "updating annotations of {} synsets with {} workers",
        total, num_workers
    );

    let outcomes: Vec<(String, Result<()>)> = stream::iter(synsets)
        .map(|synset| {
            let fetch_archive = &fetch_archive;
            let tmp_dir = tmp_dir.path();
            async move {
                let result = async {
                    let bytes = fetch_archive(format!("{}{}", archive_api, synset)).await?;
                    let archive_path = tmp_dir.join(format!("{}.tar.gz", synset));
                    install_archive(bytes, archive_path, data_dir.to_owned()).await
                }
                .await;
                (synset.clone(), result)
            }
        })
        .buffer_unordered(num_workers)
        .enumerate()
        .map(|(index, outcome)| {
            let done = index + 1;
            if done % num_workers == 0 || done == total {
                info!("processed {}/{}", done, total);
            }
            outcome
        })
        .collect()
        .await;

    let mut summary = UpdateSummary::default();
    for (synset, result) in outcomes {
        match result {
            Ok(()) => summary.updated.push(synset),
            Err(err) => {
                warn!("failed to update annotations of {}: {:#}", synset, err);
                summary.failed.push(synset);
            }
        }
    }

    Ok(summary)
}

async fn install_archive(bytes: Vec<u8>, archive_path: PathBuf, dest: PathBuf) -> Result<()> {
    tokio::fs::write(&archive_path, &bytes)
        .await
        .with_context(|| format!("failed to write '{}'", archive_path.display()))?;

    let result = {
        let archive_path = archive_path.clone();
        tokio::task::spawn_blocking(move || extract_archive(&archive_path, &dest)).await?
    };

    if let Err(err) = tokio::fs::remove_file(&archive_path).await {
        warn!(
            "failed to remove archive '{}': {}",
            archive_path.display(),
            err
        );
    }

    result
}

/// Unpack a `.tar.gz` archive into `dest`.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let file = fs::File::open(archive)
        .with_context(|| format!("failed to open archive '{}'", archive.display()))?;
    tar::Archive::new(flate2::read::GzDecoder::new(file))
        .unpack(dest)
        .with_context(|| format!("failed to extract archive '{}'", archive.display()))?;
    Ok(())
}
