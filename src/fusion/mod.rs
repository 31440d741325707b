pub mod client;
pub mod scheduler;
pub mod types;

pub use client::{FusionBackend, FusionError, FusionFuture, HttpFusionClient};
pub use scheduler::{FusionScheduler, PlannedFusion};
pub use types::{FusionRequest, FusionResponse, PassiveInput, VisualInput, DEFAULT_STRATEGY};
