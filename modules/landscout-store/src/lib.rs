pub mod batch;
pub mod error;
pub mod identifier;
pub mod ingest_log;
pub mod store;
mod table;

pub use batch::RawBatch;
pub use error::{Result, StoreError};
pub use identifier::{validate_uniqueness, IdentifierAllocator};
pub use ingest_log::IngestLog;
pub use store::{IngestReport, RecordStore};
