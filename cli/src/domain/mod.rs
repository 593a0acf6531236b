//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod agent;
pub mod config;
pub mod error;
pub mod publish;

pub use agent::{AgentState, AttemptTracker, CycleOutcome, InstallLayout, ServiceStatus};
pub use config::{AgentConfig, PublisherConfig};
pub use error::{ConfigError, InstallError, InstallStep, PublishError, UpdateError};
pub use publish::{PackageSpec, artifacts_to_prune, dirty_paths, hex_encode};
