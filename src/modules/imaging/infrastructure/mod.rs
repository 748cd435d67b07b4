pub mod cloudinary;
pub mod gemini;

pub use cloudinary::CloudinaryStore;
pub use gemini::GeminiEnhancer;
