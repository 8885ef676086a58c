//! AppBuilder - wires the components together and fails fast at startup.
//!
//! # Fail-fast
//! - every collaborator must be supplied before `build()`
//! - `expect_models()` lists model ids that must be in the registry;
//!   `build()` checks expected ⊆ registered and reports what is missing

use std::sync::{Arc, OnceLock};

use tracing::info;

use super::discovery_loop::DiscoveryLoop;
use super::orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorStats};
use crate::background::BackgroundTask;
use crate::config::MinerConfig;
use crate::domain::ModelId;
use crate::ports::{ChainReader, ExecutionDelegate, ResultSubmitter};
use crate::queue::{JobQueue, QueueStats};
use crate::rate_limit::RateLimiter;
use crate::registry::ModelRegistry;

/// # Example
/// ```ignore
/// let app = AppBuilder::new(MinerConfig::from_env()?)
///     .registry(registry)
///     .delegate(Arc::new(EchoDelegate::default()))
///     .chain(Arc::new(InMemoryChain::new()))
///     .submitter(Arc::new(LoggingSubmitter))
///     .expect_models(&[model_id])
///     .build()?;
/// app.start();
/// ```
pub struct AppBuilder {
    config: MinerConfig,
    registry: Option<ModelRegistry>,
    delegate: Option<Arc<dyn ExecutionDelegate>>,
    chain: Option<Arc<dyn ChainReader>>,
    submitter: Option<Arc<dyn ResultSubmitter>>,
    expected_models: Vec<ModelId>,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("missing models: {0:?}. These models were expected but not registered.")]
    MissingModels(Vec<ModelId>),

    #[error("no {0} was configured")]
    MissingComponent(&'static str),
}

impl AppBuilder {
    pub fn new(config: MinerConfig) -> Self {
        Self {
            config,
            registry: None,
            delegate: None,
            chain: None,
            submitter: None,
            expected_models: Vec::new(),
        }
    }

    pub fn registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn delegate(mut self, delegate: Arc<dyn ExecutionDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn chain(mut self, chain: Arc<dyn ChainReader>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn submitter(mut self, submitter: Arc<dyn ResultSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    pub fn expect_models(mut self, model_ids: &[ModelId]) -> Self {
        self.expected_models = model_ids.to_vec();
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        let registry = self.registry.ok_or(BuildError::MissingComponent("model registry"))?;
        let delegate = self.delegate.ok_or(BuildError::MissingComponent("execution delegate"))?;
        let chain = self.chain.ok_or(BuildError::MissingComponent("chain reader"))?;
        let submitter = self.submitter.ok_or(BuildError::MissingComponent("result submitter"))?;

        let missing: Vec<ModelId> = self
            .expected_models
            .iter()
            .filter(|id| !registry.contains(id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(BuildError::MissingModels(missing));
        }

        let config = self.config;
        let queue = Arc::new(JobQueue::new(config.queue.clone(), delegate));
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit.max_requests,
            config.rate_limit.window,
        ));
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&queue),
            Arc::new(registry),
            Arc::clone(&limiter),
            submitter,
            OrchestratorConfig {
                retry: config.retry.clone(),
                min_fee: config.min_fee,
                retention: config.queue.retention,
                drain_timeout: config.queue.job_timeout,
            },
        ));
        let discovery = Arc::new(DiscoveryLoop::new(
            chain,
            Arc::clone(&orchestrator),
            config.discovery_interval,
        ));

        Ok(App {
            config,
            queue,
            limiter,
            orchestrator,
            discovery,
            discovery_task: OnceLock::new(),
        })
    }
}

/// A wired miner. Nothing runs until `start()`.
pub struct App {
    config: MinerConfig,
    queue: Arc<JobQueue>,
    limiter: Arc<RateLimiter>,
    orchestrator: Arc<Orchestrator>,
    discovery: Arc<DiscoveryLoop>,
    discovery_task: OnceLock<BackgroundTask>,
}

impl App {
    /// Start the queue, limiter pruning, the event loop and discovery.
    /// Calling it again is a no-op.
    pub fn start(&self) {
        self.queue.start_maintenance();
        self.limiter.start_pruning(self.config.rate_limit.window);
        self.orchestrator.start();
        self.discovery_task
            .get_or_init(|| Arc::clone(&self.discovery).spawn());
        info!(
            max_concurrent = self.config.queue.max_concurrent,
            discovery_interval_ms = self.config.discovery_interval.as_millis() as u64,
            "miner started"
        );
    }

    /// Stop everything, discovery first. The queue stops admitting, then
    /// running jobs get up to `job_timeout` to finish and have their results
    /// submitted. Safe to call more than once.
    pub async fn shutdown(&self) {
        if let Some(discovery) = self.discovery_task.get() {
            discovery.shutdown().await;
        }
        self.queue.shutdown().await;
        self.orchestrator.shutdown().await;
        self.limiter.shutdown();
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn discovery(&self) -> &Arc<DiscoveryLoop> {
        &self.discovery
    }

    pub async fn queue_stats(&self) -> QueueStats {
        self.queue.get_queue_stats().await
    }

    pub fn orchestrator_stats(&self) -> OrchestratorStats {
        self.orchestrator.stats()
    }
}
