use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use super::client::{ServiceDirectory, ServiceMetadata};
use crate::session::SessionError;

#[derive(Clone, Debug, Default, Serialize)]
pub struct CatalogSnapshot {
    pub services: Vec<ServiceMetadata>,
    // Set when the directory could not be reached
    pub warning: Option<String>,
}

/// Search service metadata shared by every session in the process.
/// Fetched once on first use and kept until `invalidate` is called. A
/// failed fetch is cached as an empty list with a warning.
pub struct ServiceCatalog {
    directory: Arc<dyn ServiceDirectory>,
    cache: RwLock<Option<CatalogSnapshot>>,
}

impl ServiceCatalog {
    pub fn new(directory: Arc<dyn ServiceDirectory>) -> Self {
        Self {
            directory,
            cache: RwLock::new(None),
        }
    }

    async fn fetch(&self) -> Result<CatalogSnapshot, SessionError> {
        match self.directory.list_services().await {
            Ok(services) => {
                tracing::debug!("Loaded {} search services", services.len());
                Ok(CatalogSnapshot {
                    services,
                    warning: None,
                })
            }
            Err(e) => {
                tracing::warn!("Failed to list search services: {:#}", e);
                Err(SessionError::MetadataUnavailable {
                    message: format!("{:#}", e),
                })
            }
        }
    }

    /// Load into the cache, returning the directory error if it failed.
    /// With `force` the cached value is replaced under the same lock.
    async fn load(&self, force: bool) -> Result<CatalogSnapshot, SessionError> {
        let mut cache = self.cache.write().await;
        // Another caller may have filled it while we waited on the lock
        if let Some(snapshot) = cache.as_ref().filter(|_| !force) {
            return Ok(snapshot.clone());
        }
        let result = self.fetch().await;
        let snapshot = match &result {
            Ok(snapshot) => snapshot.clone(),
            Err(e) => CatalogSnapshot {
                services: Vec::new(),
                warning: Some(e.to_string()),
            },
        };
        *cache = Some(snapshot);
        result
    }

    pub async fn snapshot(&self) -> CatalogSnapshot {
        if let Some(snapshot) = self.cache.read().await.as_ref() {
            return snapshot.clone();
        }
        match self.load(false).await {
            Ok(snapshot) => snapshot,
            Err(e) => CatalogSnapshot {
                services: Vec::new(),
                warning: Some(e.to_string()),
            },
        }
    }

    pub async fn services(&self) -> Vec<ServiceMetadata> {
        self.snapshot().await.services
    }

    pub async fn find(&self, name: &str) -> Option<ServiceMetadata> {
        self.services().await.into_iter().find(|s| s.name == name)
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    /// Fetch the list again, replacing whatever is cached. Readers
    /// never see the gap between the old and the new value.
    pub async fn refresh(&self) -> Result<Vec<ServiceMetadata>, SessionError> {
        self.load(true).await.map(|s| s.services)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Error, anyhow};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingDirectory {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl ServiceDirectory for CountingDirectory {
        async fn list_services(&self) -> anyhow::Result<Vec<ServiceMetadata>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(anyhow!("connection refused"));
            }
            Ok(vec![ServiceMetadata {
                name: "alerts_search".into(),
                search_column: "chunk".into(),
            }])
        }
    }

    fn directory(fail: bool) -> Arc<CountingDirectory> {
        Arc::new(CountingDirectory {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(fail),
        })
    }

    #[tokio::test]
    async fn test_fetches_once_until_invalidated() {
        let dir = directory(false);
        let catalog = ServiceCatalog::new(dir.clone());

        assert_eq!(catalog.services().await.len(), 1);
        assert!(catalog.find("alerts_search").await.is_some());
        assert!(catalog.find("missing").await.is_none());
        assert_eq!(dir.calls.load(Ordering::SeqCst), 1);

        catalog.invalidate().await;
        catalog.services().await;
        assert_eq!(dir.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_empty_with_warning() {
        let dir = directory(true);
        let catalog = ServiceCatalog::new(dir.clone());

        let snapshot = catalog.snapshot().await;
        assert!(snapshot.services.is_empty());
        let warning = snapshot.warning.unwrap();
        assert!(warning.contains("connection refused"));

        // The failure is cached like any other result
        catalog.snapshot().await;
        assert_eq!(dir.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_reports_metadata_error() {
        let catalog = ServiceCatalog::new(directory(true));
        let err = catalog.refresh().await.unwrap_err();
        assert_eq!(err.kind(), "metadata_unavailable");
    }

    #[tokio::test]
    async fn test_refresh_replaces_a_cached_failure() {
        let dir = directory(true);
        let catalog = ServiceCatalog::new(dir.clone());
        assert!(catalog.snapshot().await.warning.is_some());

        dir.fail.store(false, Ordering::SeqCst);
        let services = catalog.refresh().await.unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(dir.calls.load(Ordering::SeqCst), 2);

        let snapshot = catalog.snapshot().await;
        assert_eq!(snapshot.services.len(), 1);
        assert!(snapshot.warning.is_none());
    }

    #[tokio::test]
    async fn test_refresh_fetches_even_when_cached() {
        let dir = directory(false);
        let catalog = ServiceCatalog::new(dir.clone());
        catalog.services().await;

        catalog.refresh().await.unwrap();
        catalog.refresh().await.unwrap();
        assert_eq!(dir.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_one_fetch() {
        let dir = directory(false);
        let catalog = Arc::new(ServiceCatalog::new(dir.clone()));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let catalog = Arc::clone(&catalog);
            tasks.spawn(async move { catalog.services().await.len() });
        }
        while let Some(res) = tasks.join_next().await {
            assert_eq!(res.unwrap(), 1);
        }
        assert_eq!(dir.calls.load(Ordering::SeqCst), 1);
    }
}
