// Shared Kernel
// Cross-cutting pieces used by every bounded context

pub mod application; // Shared application layer patterns
pub mod config; // Environment-driven configuration
pub mod database; // Connection pool and migrations
pub mod errors; // Shared error types
pub mod utils; // Logging and retry helpers

// Re-exports for convenience
pub use config::AppConfig;
pub use database::Database;
pub use errors::{AppError, AppResult};
