//! miner-core
//!
//! Scheduling core of an off-chain task miner: tasks submitted on chain are
//! discovered, rate limited, matched to a model template, queued with bounded
//! concurrency, executed, and their results handed back for submission.
//!
//! # Modules
//! - **domain**: ids, chain tasks, model templates, job records, lifecycle events
//! - **ports**: ChainReader, ExecutionDelegate, ResultSubmitter, Clock, IdGenerator
//! - **queue**: JobQueue (concurrency cap, wait / execution timeouts) + RetryPolicy
//! - **rate_limit**: sliding-window admission limiter
//! - **registry**: model id -> template
//! - **app**: Orchestrator, DiscoveryLoop, AppBuilder
//! - **impls**: in-memory chain, echo delegate, logging submitter
//! - **config**: environment configuration

pub mod app;
pub mod background;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod queue;
pub mod rate_limit;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_support;
