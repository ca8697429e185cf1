//! Domain entities and store seams for the scrape ingestion pipeline.

pub mod offer;
pub mod quarantine;
pub mod run;
pub mod stores;
pub mod target;

pub use offer::{Availability, BallisticFields, NormalizedScrapeOffer, PriceCents, RawScrapeOffer};
pub use quarantine::QuarantinedRecord;
pub use run::{MetricsSnapshot, RunMetrics, RunStatus, RunSummary, ScrapeRun};
pub use stores::{
    JobQueue, JobTrigger, PriceObservation, ResolverContext, ResolverJob, ResolverQueue,
    ResolverTrigger, RunType, ScrapeJob, ScrapeStore,
};
pub use target::{AttemptStatus, ScrapeSource, ScrapeTarget, TargetStatus};
