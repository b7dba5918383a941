//! Remote image retrieval.

use crate::{common::*, config::FetchConfig, error::FetchError};
use std::io::Write as _;

/// Access to the remote image source.
///
/// Implementations must tolerate concurrent downloads of the same file.
pub trait RemoteFetcher
where
    Self: Debug + Send + Sync,
{
    /// Get the `filename url` listing of a synset.
    fn url_mapping(&self, synset: &str) -> Result<String, FetchError>;

    /// Download `url` to `<dest_dir>/<filename>.JPEG`.
    fn download(&self, url: &str, dest_dir: &Path, filename: &str) -> Result<(), FetchError>;
}

/// Find the URL of `filename` in a `filename url` listing.
///
/// Lines without exactly two fields are skipped.
pub fn find_image_url<'a>(mapping: &'a str, filename: &str) -> Option<&'a str> {
    mapping.lines().find_map(|line| {
        let (name, url) = line.split_whitespace().collect_tuple()?;
        (name == filename).then(|| url)
    })
}

/// Write `bytes` to `<dest_dir>/<filename>.JPEG`.
///
/// The content goes to a temporary file first and is renamed into place, so
/// readers never see a partial image and the last writer wins.
pub fn store_image(bytes: &[u8], dest_dir: &Path, filename: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(dest_dir)?;
    let path = dest_dir.join(format!("{}.JPEG", filename));

    let mut file = tempfile::NamedTempFile::new_in(dest_dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.persist(&path).map_err(|err| err.error)?;

    Ok(path)
}

/// The HTTP implementation of [RemoteFetcher].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    mapping_api: String,
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let FetchConfig {
            ref mapping_api,
            timeout_secs,
            ..
        } = *config;
        ensure!(timeout_secs > 0, "timeout_secs must be positive");

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            mapping_api: mapping_api.clone(),
            client,
        })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, FetchError> {
        let response = self.client.get(url).send()?.error_for_status()?;
        Ok(response)
    }
}

impl RemoteFetcher for HttpFetcher {
    fn url_mapping(&self, synset: &str) -> Result<String, FetchError> {
        let url = format!("{}{}", self.mapping_api, synset);
        let text = self.get(&url)?.text()?;
        Ok(text)
    }

    fn download(&self, url: &str, dest_dir: &Path, filename: &str) -> Result<(), FetchError> {
        let bytes = self.get(url)?.bytes()?;
        if bytes.is_empty() {
            return Err(FetchError::Unavailable(format!("empty response from {}", url)));
        }
        store_image(&bytes, dest_dir, filename)?;
        Ok(())
    }
}

/// The fetcher that never finds anything, used when remote access is disabled.
#[derive(Debug, Clone, Default)]
pub struct OfflineFetcher;

impl RemoteFetcher for OfflineFetcher {
    fn url_mapping(&self, synset: &str) -> Result<String, FetchError> {
        Err(FetchError::Unavailable(format!(
            "remote fetching is disabled, cannot list synset {}",
            synset
        )))
    }

    fn download(&self, url: &str, _dest_dir: &Path, _filename: &str) -> Result<(), FetchError> {
        Err(FetchError::Unavailable(format!(
            "remote fetching is disabled, cannot download {}",
            url
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_url_in_mapping() {
        let mapping = "n01440764_18 http://example.com/a.jpg\n\
                       malformed line here\n\
                       \n\
                       n01440764_36 http://example.com/b.jpg\n";
        assert_eq!(
            find_image_url(mapping, "n01440764_36"),
            Some("http://example.com/b.jpg")
        );
        assert_eq!(find_image_url(mapping, "malformed"), None);
        assert_eq!(find_image_url(mapping, "n01440764_99"), None);
    }

    #[test]
    fn store_image_replaces_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let dest = dir.path().join("n01440764");

        let path = store_image(b"first", &dest, "n01440764_18")?;
        assert_eq!(path, dest.join("n01440764_18.JPEG"));
        store_image(b"second", &dest, "n01440764_18")?;

        assert_eq!(fs::read(&path)?, b"second");
        assert_eq!(fs::read_dir(&dest)?.count(), 1);
        Ok(())
    }

    #[test]
    fn offline_fetcher_fails() {
        let fetcher = OfflineFetcher;
        assert!(matches!(
            fetcher.url_mapping("n01440764"),
            Err(FetchError::Unavailable(_))
        ));
    }
}
