use anyhow::Result;
use clap::Parser;

use evpipe_core::config::EvpipeConfig;
use evpipe_core::registry;
use evpipe_daemon::cli::DaemonCli;
use evpipe_daemon::logging;
use evpipe_daemon::orchestrator::{Orchestrator, default_registry};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // 설정 로드: 파일 → 환경변수 → CLI 플래그 순으로 덮어씁니다.
    let mut config = EvpipeConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    if cli.validate {
        println!(
            "configuration OK: {} ({} stages)",
            cli.config.display(),
            config.stages.len()
        );
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(config = %cli.config.display(), "evpipe-daemon starting");

    // 레지스트리는 스테이지 태스크를 띄우기 전에 고정합니다.
    let registry = registry::install(default_registry())
        .map_err(|e| anyhow::anyhow!("failed to install component registry: {}", e))?;

    let mut orchestrator = Orchestrator::build_from_config(config, registry)?;
    orchestrator.run().await?;

    tracing::info!("evpipe-daemon shut down");
    Ok(())
}
