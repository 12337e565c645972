use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use crate::core::{
    Asset, AssetKind, AssetReference, ObjectStore, ProgressFn, UploadError, UploadProgress, UploadTask,
};
use crate::storage::{canonical_public_url, destination_key};

/// Uploads assets and turns the stored object into a public reference.
#[derive(Clone)]
pub struct UploadCoordinator {
    store: Arc<dyn ObjectStore>,
    public_prefix: String,
}

impl UploadCoordinator {
    pub fn new(store: Arc<dyn ObjectStore>, public_prefix: impl Into<String>) -> Self {
        Self {
            store,
            public_prefix: public_prefix.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        self.store.bucket()
    }

    /// Uploads `asset` under the prefix of `kind`.
    ///
    /// `on_progress` sees percentages that never decrease and always ends on
    /// 100 when the upload succeeds. Nothing is retried: a failed upload has
    /// to be started again by the caller.
    pub async fn upload<F>(&self, kind: AssetKind, asset: &Asset, on_progress: F) -> Result<AssetReference, UploadError>
    where
        F: Fn(UploadProgress) + Send + Sync + 'static,
    {
        if asset.is_empty() {
            return Err(UploadError::EmptyAsset(asset.name.clone()));
        }

        let key = destination_key(kind, &asset.name)?;
        let task = Arc::new(Mutex::new(UploadTask {
            kind,
            asset: asset.clone(),
            destination_key: key.clone(),
            transferred_bytes: 0,
            total_bytes: asset.len(),
        }));
        let reporter = MonotonicReporter::new(on_progress);

        let progress_fn: ProgressFn = {
            let task = task.clone();
            let reporter = reporter.clone();
            Arc::new(move |transferred, total| {
                let progress = match task.lock() {
                    Ok(mut task) => {
                        task.transferred_bytes = task.transferred_bytes.max(transferred);
                        task.total_bytes = total;
                        UploadProgress {
                            kind: task.kind,
                            transferred_bytes: task.transferred_bytes,
                            total_bytes: task.total_bytes,
                            percentage: task.percentage(),
                        }
                    }
                    Err(_) => return,
                };
                reporter.report(progress);
            })
        };

        info!(%key, bytes = asset.len(), "Uploading asset");
        let stored = match self.store.put(&key, asset, progress_fn).await {
            Ok(stored) => stored,
            Err(err) => {
                warn!(%key, error = %err, "Upload failed");
                return Err(err);
            }
        };

        reporter.report(UploadProgress {
            kind,
            transferred_bytes: asset.len(),
            total_bytes: asset.len(),
            percentage: 100,
        });

        let name = key
            .split_once('/')
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| asset.name.clone());
        let public_url = canonical_public_url(&stored.url, &self.public_prefix);
        info!(%key, %public_url, "Upload complete");

        Ok(AssetReference {
            name,
            key,
            raw_url: stored.url,
            public_url,
        })
    }
}

/// Forwards progress only when the percentage goes up.
struct MonotonicReporter<F> {
    last: AtomicU8,
    report: F,
}

impl<F: Fn(UploadProgress)> MonotonicReporter<F> {
    fn new(report: F) -> Arc<Self> {
        Arc::new(Self {
            last: AtomicU8::new(0),
            report,
        })
    }

    fn report(&self, progress: UploadProgress) {
        let previous = self.last.fetch_max(progress.percentage, Ordering::SeqCst);
        if progress.percentage > previous {
            (self.report)(progress);
        }
    }
}
