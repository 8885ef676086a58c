//! App layer - combines the queue, registry, limiter and ports into a miner.
//!
//! # Components
//! - **Orchestrator**: discovered task -> job, job events -> submit / retry
//! - **DiscoveryLoop**: periodic chain polling
//! - **AppBuilder**: wiring and fail-fast startup checks

pub mod builder;
pub mod discovery_loop;
pub mod orchestrator;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::discovery_loop::{DiscoveryLoop, DiscoveryReport};
pub use self::orchestrator::{Discovery, Orchestrator, OrchestratorConfig, OrchestratorStats};
