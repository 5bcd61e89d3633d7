//! Router assembly for applications.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use modelrelay_core::llm::registry::ProviderRegistry;
use modelrelay_core::llm::router::Router;
use modelrelay_core::metrics::MetricsRecorder;
use modelrelay_types::config::RouterConfig;

use crate::config::{layer_router_config, load_router_config, resolve_config_path, ENV_PREFIX};
use crate::llm::build_registry;

/// Load configuration and build a router.
///
/// `config_path` overrides the usual lookup (`MODELRELAY_CONFIG`, then the
/// platform config dir). `adapters` must hold an adapter for every `hosted`
/// provider in the configuration.
pub async fn build_router(
    config_path: Option<&Path>,
    adapters: ProviderRegistry,
    recorder: Arc<dyn MetricsRecorder>,
) -> anyhow::Result<Router> {
    let config = match resolve_config_path(config_path) {
        Some(path) => load_router_config(&path)
            .await
            .with_context(|| format!("failed to load router config from {}", path.display()))?,
        None => {
            tracing::debug!("No config location available, using defaults");
            let config = layer_router_config(None, ENV_PREFIX)
                .context("failed to apply environment overrides")?;
            config.validate().context("invalid router config")?;
            config
        }
    };
    build_router_from_config(config, adapters, recorder)
}

/// Build a router from an already loaded configuration.
pub fn build_router_from_config(
    config: RouterConfig,
    adapters: ProviderRegistry,
    recorder: Arc<dyn MetricsRecorder>,
) -> anyhow::Result<Router> {
    let registry =
        build_registry(&config, adapters).context("failed to resolve provider adapters")?;
    let router = Router::new(config, registry, recorder).context("failed to build router")?;
    tracing::info!(chain = ?router.chain(), "Router ready");
    Ok(router)
}
