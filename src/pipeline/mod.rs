// Outreach pipeline: ingestion, processing, dedup and orchestration

pub mod dedup;
pub mod ingestion;
pub mod pipeline;
pub mod processing;

pub use pipeline::{Pipeline, RecordPreview, RunSummary};
