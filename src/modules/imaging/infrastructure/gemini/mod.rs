pub mod client;
pub mod dto;
pub mod prompt;

pub use client::GeminiEnhancer;
