//! Download Coordinator: deduplicated, bounded, retrying media downloads.
//!
//! `schedule` is synchronous so the Document Rewriter can call it mid-walk;
//! the actual transfer runs on the tokio runtime the coordinator was built
//! with. `wait_all` is the completion barrier.
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use wpmigrate_core::DownloadScheduler;
use wpmigrate_logging::{migrate_debug, migrate_warn};

use crate::fetch::{FetchSettings, MediaBody, MediaFetcher, ReqwestFetcher};
use crate::{
    DownloadSummary, DownloadTask, FailedDownload, FailureKind, FetchError, TaskState,
};

pub const DEFAULT_CONCURRENCY: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt that follows attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }
}

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub concurrency: usize,
    pub fetch: FetchSettings,
    pub retry: RetryPolicy,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            fetch: FetchSettings::default(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Default)]
struct Registry {
    tasks: HashMap<String, DownloadTask>,
    /// Destination path -> URL that owns it.
    claims: HashMap<PathBuf, String>,
}

struct Shared {
    fetcher: Arc<dyn MediaFetcher>,
    retry: RetryPolicy,
    slots: Arc<Semaphore>,
    registry: Mutex<Registry>,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, url: &str, apply: impl FnOnce(&mut DownloadTask)) {
        if let Some(task) = self.registry().tasks.get_mut(url) {
            apply(task);
        }
    }
}

pub struct DownloadCoordinator {
    runtime: Handle,
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl DownloadCoordinator {
    pub fn new(runtime: Handle, settings: &DownloadSettings, fetcher: Arc<dyn MediaFetcher>) -> Self {
        let concurrency = settings.concurrency.max(1);
        Self {
            runtime,
            shared: Arc::new(Shared {
                fetcher,
                retry: settings.retry.clone(),
                slots: Arc::new(Semaphore::new(concurrency)),
                registry: Mutex::new(Registry::default()),
            }),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Coordinator backed by the HTTP fetcher built from `settings.fetch`.
    pub fn with_http(runtime: Handle, settings: &DownloadSettings) -> Result<Self, FetchError> {
        let fetcher = ReqwestFetcher::new(&settings.fetch)?;
        Ok(Self::new(runtime, settings, Arc::new(fetcher)))
    }

    /// Starts a download unless `url` was scheduled before. Returns whether a
    /// new task was created; the destination of a repeated call is ignored.
    ///
    /// A destination already owned by another URL is refused, so no two tasks
    /// ever write the same file.
    pub fn schedule(&self, url: &str, destination: &Path) -> bool {
        {
            let mut registry = self.shared.registry();
            if registry.tasks.contains_key(url) {
                return false;
            }
            if let Some(owner) = registry.claims.get(destination) {
                migrate_warn!(
                    "skipping {url}: {} is already the destination of {owner}",
                    destination.display()
                );
                return false;
            }
            registry
                .claims
                .insert(destination.to_path_buf(), url.to_string());
            registry.tasks.insert(
                url.to_string(),
                DownloadTask {
                    url: url.to_string(),
                    destination: destination.to_path_buf(),
                    state: TaskState::Pending,
                    attempts: 0,
                },
            );
        }

        let shared = Arc::clone(&self.shared);
        let url = url.to_string();
        let destination = destination.to_path_buf();
        let handle = self
            .runtime
            .spawn(async move { run_task(shared, url, destination).await });
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        true
    }

    pub fn task(&self, url: &str) -> Option<DownloadTask> {
        self.shared.registry().tasks.get(url).cloned()
    }

    /// Waits until every task scheduled so far, including ones scheduled while
    /// waiting, has reached a terminal state.
    pub async fn wait_all(&self) -> DownloadSummary {
        loop {
            let pending: Vec<JoinHandle<()>> = self
                .handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .drain(..)
                .collect();
            if pending.is_empty() {
                break;
            }
            for handle in pending {
                if let Err(err) = handle.await {
                    migrate_warn!("download task aborted: {err}");
                }
            }
        }
        self.summary()
    }

    fn summary(&self) -> DownloadSummary {
        let registry = self.shared.registry();
        let mut summary = DownloadSummary::default();
        for task in registry.tasks.values() {
            match &task.state {
                TaskState::Succeeded => summary.succeeded += 1,
                TaskState::Failed(reason) => summary.failed.push(FailedDownload {
                    url: task.url.clone(),
                    destination: task.destination.clone(),
                    attempts: task.attempts,
                    reason: reason.clone(),
                }),
                TaskState::Pending | TaskState::InFlight => {}
            }
        }
        summary.failed.sort_by(|a, b| a.url.cmp(&b.url));
        summary
    }
}

impl DownloadScheduler for DownloadCoordinator {
    fn schedule(&self, url: &str, destination: &Path) -> bool {
        DownloadCoordinator::schedule(self, url, destination)
    }
}

async fn run_task(shared: Arc<Shared>, url: String, destination: PathBuf) {
    let _permit = match Arc::clone(&shared.slots).acquire_owned().await {
        Ok(permit) => permit,
        Err(err) => {
            let reason = FetchError::new(FailureKind::Network, err.to_string());
            shared.update(&url, |task| task.state = TaskState::Failed(reason));
            return;
        }
    };
    shared.update(&url, |task| task.state = TaskState::InFlight);

    let mut attempt = 0;
    let outcome = loop {
        attempt += 1;
        shared.update(&url, |task| task.attempts = attempt);

        match download_once(shared.fetcher.as_ref(), &url, &destination).await {
            Ok(bytes) => break Ok(bytes),
            Err(err) => {
                if !err.is_retryable() || attempt >= shared.retry.max_attempts {
                    break Err(err);
                }
                let delay = shared.retry.delay_after(attempt);
                migrate_warn!(
                    "download {url} attempt {attempt} failed ({err}); retrying in {delay:?}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    };

    match outcome {
        Ok(bytes) => {
            migrate_debug!("downloaded {url} -> {} ({bytes} bytes)", destination.display());
            shared.update(&url, |task| task.state = TaskState::Succeeded);
        }
        Err(err) => {
            migrate_warn!(
                "download failed: {url} -> {} after {attempt} attempt(s): {err}",
                destination.display()
            );
            shared.update(&url, |task| task.state = TaskState::Failed(err));
        }
    }
}

async fn download_once(
    fetcher: &dyn MediaFetcher,
    url: &str,
    destination: &Path,
) -> Result<u64, FetchError> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }

    let body = fetcher.open(url).await?;
    let file = tokio::fs::File::create(destination)
        .await
        .map_err(io_error)?;

    // Only a file this attempt created is removed on failure.
    let result = copy_body(body, file).await;
    if result.is_err() {
        discard_partial(destination).await;
    }
    result
}

async fn copy_body(mut body: MediaBody, mut file: tokio::fs::File) -> Result<u64, FetchError> {
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(io_error)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(io_error)?;
    Ok(written)
}

async fn discard_partial(destination: &Path) {
    match tokio::fs::remove_file(destination).await {
        Ok(()) => migrate_debug!("removed partial file {}", destination.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => migrate_warn!(
            "could not remove partial file {}: {err}",
            destination.display()
        ),
    }
}

fn io_error(err: io::Error) -> FetchError {
    FetchError::new(FailureKind::Io, err.to_string())
}
