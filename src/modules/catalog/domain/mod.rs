pub mod entities;
pub mod repository;
