/// In-process stand-ins for the catalog and the external image services
use async_trait::async_trait;
use enhance_queue::modules::catalog::{SourceRecords, SubjectRecord};
use enhance_queue::modules::imaging::{EnhanceMetadata, ImageEnhancer, ObjectStore};
use enhance_queue::shared::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeCatalog {
    subjects: Mutex<HashMap<i64, SubjectRecord>>,
}

impl FakeCatalog {
    pub fn with_subjects(subjects: impl IntoIterator<Item = SubjectRecord>) -> Self {
        let catalog = Self::default();
        for subject in subjects {
            catalog.insert(subject);
        }
        catalog
    }

    pub fn insert(&self, subject: SubjectRecord) {
        self.subjects.lock().unwrap().insert(subject.id, subject);
    }

    pub fn image_url(&self, subject_id: i64) -> Option<String> {
        self.subjects
            .lock()
            .unwrap()
            .get(&subject_id)
            .and_then(|s| s.image_url.clone())
    }
}

#[async_trait]
impl SourceRecords for FakeCatalog {
    async fn get(&self, subject_id: i64) -> AppResult<Option<SubjectRecord>> {
        Ok(self.subjects.lock().unwrap().get(&subject_id).cloned())
    }

    async fn update_image(&self, subject_id: i64, new_url: &str) -> AppResult<()> {
        let mut subjects = self.subjects.lock().unwrap();
        let subject = subjects
            .get_mut(&subject_id)
            .ok_or_else(|| AppError::NotFound(format!("Article {} not found", subject_id)))?;
        subject.image_url = Some(new_url.to_string());
        Ok(())
    }
}

pub enum EnhancerBehavior {
    Succeed,
    Fail(String),
    Unconfigured,
}

pub struct FakeEnhancer {
    behavior: EnhancerBehavior,
    calls: AtomicUsize,
}

impl FakeEnhancer {
    pub fn succeeding() -> Self {
        Self::new(EnhancerBehavior::Succeed)
    }

    pub fn failing(message: &str) -> Self {
        Self::new(EnhancerBehavior::Fail(message.to_string()))
    }

    pub fn unconfigured() -> Self {
        Self::new(EnhancerBehavior::Unconfigured)
    }

    fn new(behavior: EnhancerBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageEnhancer for FakeEnhancer {
    fn is_configured(&self) -> bool {
        !matches!(self.behavior, EnhancerBehavior::Unconfigured)
    }

    async fn enhance(&self, image: Vec<u8>, _metadata: &EnhanceMetadata) -> AppResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            EnhancerBehavior::Succeed => {
                let mut enhanced = b"enhanced:".to_vec();
                enhanced.extend(image);
                Ok(enhanced)
            }
            EnhancerBehavior::Fail(message) => Err(AppError::TransformError(message.clone())),
            EnhancerBehavior::Unconfigured => Err(AppError::ConfigurationError(
                "enhancer has no credentials".to_string(),
            )),
        }
    }
}

/// Object store keeping uploads in memory
#[derive(Default)]
pub struct FakeObjectStore {
    uploads: Mutex<Vec<(String, Vec<u8>)>>,
    deleted: Mutex<Vec<String>>,
}

impl FakeObjectStore {
    pub fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn put(&self, bytes: Vec<u8>, folder: &str) -> AppResult<String> {
        let mut uploads = self.uploads.lock().unwrap();
        let url = format!(
            "https://res.cloudinary.com/demo/image/upload/v2/{}/articulo_enhanced_{}.jpg",
            folder,
            uploads.len() + 1
        );
        uploads.push((url.clone(), bytes));
        Ok(url)
    }

    async fn delete(&self, url: &str) -> AppResult<()> {
        self.deleted.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn fetch(&self, url: &str) -> AppResult<Vec<u8>> {
        Ok(format!("original:{}", url).into_bytes())
    }

    fn default_folder(&self) -> String {
        "inventario-3g/articulos".to_string()
    }
}
