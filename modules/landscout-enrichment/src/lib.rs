pub mod census;
pub mod cooldown;
pub mod distance;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod retry;
pub mod verifier;

#[cfg(feature = "test-support")]
pub mod testing;

pub use census::{CensusAdapter, CensusExtract, CensusSource};
pub use distance::{DistanceAdapter, DistanceApi, NearestLandmark};
pub use error::{EnrichError, Result};
pub use orchestrator::{EnrichmentOrchestrator, EnrichmentTask, TaskState};
pub use report::{CensusRunReport, DistanceRunReport};
pub use retry::RetryPolicy;
pub use verifier::{audit, classify, missing_fields, AuditReport, Completeness};
