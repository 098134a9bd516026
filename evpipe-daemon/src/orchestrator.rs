//! Pipeline orchestration -- registry population, graph wiring, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `evpipe-daemon`.
//! It validates configuration, builds every configured stage through the
//! component registry, starts the stage tasks, and runs the main signal loop.
//!
//! # Signals
//!
//! - `SIGHUP`: deliver `reload` to every stage (LPM re-reads its prefix file)
//! - `SIGTERM` / `SIGINT`: request stop, wait `shutdown_grace_secs`, abort the rest
//!
//! When every stage returns on its own (for example a source reached the end
//! of its input), the daemon exits without waiting for a signal.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use evpipe_core::config::EvpipeConfig;
use evpipe_core::graph::{GraphOptions, PipelineGraph};
use evpipe_core::registry::Registry;

use crate::metrics_server;

/// Control message delivered to every stage on `SIGHUP`.
pub const RELOAD_SIGNAL: &str = "reload";

/// Build a registry holding every stage type shipped with the daemon.
pub fn default_registry() -> Registry {
    let mut registry = Registry::new();
    evpipe_proc::register_components(&mut registry);
    evpipe_io::register_components(&mut registry);
    registry
}

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: EvpipeConfig,
    /// Constructed stage graph.
    graph: PipelineGraph,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read, parsed or validated
    /// - A stage module is unknown or its constructor fails
    pub async fn build(config_path: &Path, registry: &Registry) -> Result<Self> {
        let config = EvpipeConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config, registry)
    }

    /// Build from an already-loaded configuration.
    ///
    /// Every stage is constructed here, before any task starts, so a missing
    /// prefix file or a bad option fails startup instead of a running pipeline.
    pub fn build_from_config(config: EvpipeConfig, registry: &Registry) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install metrics recorder before stage construction
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let options = GraphOptions {
            channel_capacity: config.general.channel_capacity,
            stats_every: config.general.stats_every,
        };
        let graph = PipelineGraph::build(registry, &config.stages, options)
            .map_err(|e| anyhow::anyhow!("failed to build pipeline: {}", e))?;

        tracing::info!(stages = ?graph.tags(), "orchestrator initialized");
        Ok(Self { config, graph })
    }

    /// Start all stages and enter the main signal loop.
    ///
    /// Returns when a shutdown signal has been handled or every stage has finished.
    pub async fn run(&mut self) -> Result<()> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;
        let mut sighup = signal(SignalKind::hangup())
            .map_err(|e| anyhow::anyhow!("failed to install SIGHUP handler: {}", e))?;

        self.start()?;

        tracing::info!("entering main signal loop");
        loop {
            tokio::select! {
                _ = self.graph.finished() => {
                    tracing::info!("all stages finished");
                    return self.wait().await;
                }
                _ = sigterm.recv() => return self.stop("SIGTERM").await,
                _ = sigint.recv() => return self.stop("SIGINT").await,
                _ = sighup.recv() => {
                    tracing::info!(signal = "SIGHUP", "reload requested");
                    self.reload().await;
                }
            }
        }
    }

    /// Spawn one task per stage.
    pub fn start(&mut self) -> Result<()> {
        self.graph
            .start()
            .map_err(|e| anyhow::anyhow!("failed to start pipeline: {}", e))
    }

    /// Deliver the reload control message to every running stage.
    pub async fn reload(&self) {
        self.graph.signal(RELOAD_SIGNAL).await;
    }

    /// Request stop on every stage and wait up to the configured grace period.
    pub async fn stop(&mut self, reason: &str) -> Result<()> {
        tracing::info!(reason, "shutdown requested");
        let grace = Duration::from_secs(self.config.general.shutdown_grace_secs);
        self.graph
            .shutdown(grace)
            .await
            .map_err(|e| anyhow::anyhow!("pipeline shutdown reported an error: {}", e))
    }

    /// Wait for every stage to finish on its own.
    pub async fn wait(&mut self) -> Result<()> {
        self.graph.finished().await;
        self.graph
            .join()
            .await
            .map_err(|e| anyhow::anyhow!("pipeline finished with an error: {}", e))
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &EvpipeConfig {
        &self.config
    }

    /// Get a reference to the stage graph.
    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("graph", &self.graph)
            .finish()
    }
}
