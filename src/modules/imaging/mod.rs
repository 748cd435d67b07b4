//! External image capabilities consumed by the queue worker
//!
//! - Domain: `ImageEnhancer` and `ObjectStore` contracts
//! - Infrastructure: Gemini image generation and Cloudinary hosting clients

pub mod domain;
pub mod infrastructure;

pub use domain::{
    enhancer::{EnhanceMetadata, ImageEnhancer},
    object_store::ObjectStore,
};
pub use infrastructure::{CloudinaryStore, GeminiEnhancer};
