pub mod memory;
pub mod models;
pub mod repository;

pub use memory::InMemoryQueueRepository;
pub use repository::QueueRepositoryImpl;
