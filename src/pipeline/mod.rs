//! The ingestion pipeline: normalization, validation, deduplication,
//! drift detection, the writer, and the worker state machine.

pub mod ballistics;
pub mod dedup;
pub mod drift;
pub mod normalize;
pub mod validate;
pub mod worker;
pub mod writer;

pub use dedup::RunDedupStore;
pub use drift::{BlockDecision, DriftConfig, DriftDetector};
pub use validate::{DropReason, QuarantineReason, Verdict};
pub use worker::{JobOutcome, ScrapeWorker, WorkerPool};
pub use writer::{OfferWriter, WriteError, WriteSuccess};
