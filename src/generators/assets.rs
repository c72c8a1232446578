//! Static invoice assets: logo and template source.

use async_trait::async_trait;
use moka::future::Cache;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::common::data_url;
use super::traits::AssetProvider;
use super::InvoiceError;

/// Reads assets from a directory on disk.
#[derive(Debug, Clone)]
pub struct FsAssetProvider {
    root: PathBuf,
}

impl FsAssetProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl AssetProvider for FsAssetProvider {
    async fn load(&self, name: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.root.join(name)).await
    }
}

/// Process-wide cache of the logo, encoded once as a `data:` URL.
pub struct LogoCache {
    assets: Arc<dyn AssetProvider>,
    file: String,
    cache: Cache<String, Arc<String>>,
}

impl LogoCache {
    pub fn new(assets: Arc<dyn AssetProvider>, file: impl Into<String>) -> Self {
        Self {
            assets,
            file: file.into(),
            cache: Cache::builder().max_capacity(1).build(),
        }
    }

    /// Encoded logo. Concurrent first calls share a single load.
    pub async fn data_url(&self) -> Result<Arc<String>, InvoiceError> {
        let assets = self.assets.clone();
        let file = self.file.clone();

        self.cache
            .try_get_with(self.file.clone(), async move {
                let bytes = assets.load(&file).await?;
                let mime = mime_guess::from_path(&file).first_or_octet_stream();
                log::info!("Loaded logo '{}' ({} bytes, {})", file, bytes.len(), mime);
                Ok::<_, io::Error>(Arc::new(data_url(mime.essence_str(), &bytes)))
            })
            .await
            .map_err(|e: Arc<io::Error>| InvoiceError::AssetLoadFailure {
                name: self.file.clone(),
                source: io::Error::new(e.kind(), e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAssets {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl AssetProvider for CountingAssets {
        async fn load(&self, name: &str) -> io::Result<Vec<u8>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if name == "logo.png" {
                Ok(vec![1, 2, 3])
            } else {
                Err(io::Error::new(io::ErrorKind::NotFound, name.to_string()))
            }
        }
    }

    #[tokio::test]
    async fn test_logo_is_loaded_once() {
        let assets = Arc::new(CountingAssets {
            loads: AtomicUsize::new(0),
        });
        let logo = LogoCache::new(assets.clone(), "logo.png");

        let first = logo.data_url().await.unwrap();
        let second = logo.data_url().await.unwrap();

        assert_eq!(first.as_str(), "data:image/png;base64,AQID");
        assert_eq!(first, second);
        assert_eq!(assets.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_logo_is_asset_failure() {
        let assets = Arc::new(CountingAssets {
            loads: AtomicUsize::new(0),
        });
        let logo = LogoCache::new(assets, "missing.png");

        match logo.data_url().await {
            Err(InvoiceError::AssetLoadFailure { name, source }) => {
                assert_eq!(name, "missing.png");
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fs_provider_reads_from_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("factura.hbs"), "<p>{{total}}</p>").unwrap();

        let provider = FsAssetProvider::new(dir.path());
        let bytes = provider.load("factura.hbs").await.unwrap();
        assert_eq!(bytes, b"<p>{{total}}</p>");
        assert!(provider.load("absent.hbs").await.is_err());
    }
}
