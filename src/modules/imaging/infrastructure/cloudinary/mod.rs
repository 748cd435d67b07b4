pub mod client;
pub mod signature;

pub use client::CloudinaryStore;
