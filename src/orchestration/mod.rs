//! Orchestration layer for package publishing
//!
//! `PublishPipeline` drives the stages; `PackagePublisher` owns the
//! external command sequence.

pub mod package_publisher;
pub mod pipeline;

// Re-export main types for convenience
pub use package_publisher::{PackagePublisher, PublishOutcome, PublishSummary, StepRecord};
pub use pipeline::{CheckReport, PublishPipeline, PublishReport};
