/// Test data factories using builder pattern
///
/// Provides convenient methods to create catalog subjects with sensible defaults
use enhance_queue::modules::catalog::SubjectRecord;

pub struct SubjectFactory {
    id: i64,
    name: String,
    description: Option<String>,
    unit: Option<String>,
    image_url: Option<String>,
    active: bool,
}

impl SubjectFactory {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            name: format!("Articulo {}", id),
            description: Some("Herramienta de ferretería".to_string()),
            unit: Some("pieza".to_string()),
            image_url: Some(format!(
                "https://res.cloudinary.com/demo/image/upload/v1/inventario-3g/articulos/articulo_{}.jpg",
                id
            )),
            active: true,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn without_image(mut self) -> Self {
        self.image_url = None;
        self
    }

    pub fn with_image(mut self, url: &str) -> Self {
        self.image_url = Some(url.to_string());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn build(self) -> SubjectRecord {
        SubjectRecord {
            id: self.id,
            name: self.name,
            description: self.description,
            unit: self.unit,
            image_url: self.image_url,
            active: self.active,
        }
    }
}
