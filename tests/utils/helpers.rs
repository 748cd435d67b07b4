/// Helpers wiring queue services over fakes
use super::fakes::{FakeCatalog, FakeEnhancer, FakeObjectStore};
use enhance_queue::modules::catalog::SubjectRecord;
use enhance_queue::modules::image_queue::{
    ImageProcessingWorker, InMemoryQueueRepository, QueueRepository, QueueService,
};
use enhance_queue::shared::config::{QueueConfig, WorkerConfig};
use std::sync::Arc;
use std::time::Duration;

pub struct TestRig {
    pub repository: Arc<InMemoryQueueRepository>,
    pub catalog: Arc<FakeCatalog>,
    pub enhancer: Arc<FakeEnhancer>,
    pub store: Arc<FakeObjectStore>,
    pub queue: Arc<QueueService>,
    pub worker: Arc<ImageProcessingWorker>,
}

/// Worker timings short enough for tests
pub fn fast_worker_config() -> WorkerConfig {
    WorkerConfig {
        sweep_interval: Duration::from_millis(50),
        reschedule_delay: Duration::from_millis(5),
        stale_after: Duration::from_secs(60),
    }
}

pub fn rig(subjects: Vec<SubjectRecord>, enhancer: FakeEnhancer) -> TestRig {
    let repository = Arc::new(InMemoryQueueRepository::new());
    let catalog = Arc::new(FakeCatalog::with_subjects(subjects));
    let enhancer = Arc::new(enhancer);
    let store = Arc::new(FakeObjectStore::default());

    let queue = Arc::new(QueueService::new(
        Arc::clone(&repository) as Arc<dyn QueueRepository>,
        catalog.clone(),
        QueueConfig::default(),
    ));
    let worker = Arc::new(ImageProcessingWorker::new(
        Arc::clone(&queue),
        catalog.clone(),
        enhancer.clone(),
        store.clone(),
        fast_worker_config(),
    ));

    TestRig {
        repository,
        catalog,
        enhancer,
        store,
        queue,
        worker,
    }
}

/// Poll until `check` holds or the timeout expires
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check().await
}
