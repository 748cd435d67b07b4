//! Article catalog access used by the image queue
//!
//! The catalog itself is owned elsewhere; this context only reads a subject's
//! current image snapshot at enqueue time and writes back the enhanced image
//! URL once processing succeeds.

pub mod domain;
pub mod infrastructure;

pub use domain::{entities::SubjectRecord, repository::SourceRecords};
pub use infrastructure::ArticleRecordsImpl;
