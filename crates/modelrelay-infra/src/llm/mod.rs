//! Provider adapter construction.
//!
//! Turns each configured [`ProviderSettings`] into a [`BoxLlmProvider`]:
//! built-in kinds are constructed here, while `hosted` providers must be
//! supplied by the embedding application before the router is built.

pub mod echo;

use modelrelay_core::llm::box_provider::BoxLlmProvider;
use modelrelay_core::llm::registry::ProviderRegistry;
use modelrelay_types::config::{ProviderKind, ProviderSettings, RouterConfig};
use modelrelay_types::error::ConfigError;

use self::echo::EchoProvider;

/// Construct the built-in adapter for `settings`, if its kind has one.
pub fn create_provider(settings: &ProviderSettings) -> Option<BoxLlmProvider> {
    match settings.kind {
        ProviderKind::Echo => Some(BoxLlmProvider::new(EchoProvider::new(
            settings.id.as_str(),
            settings.model.clone(),
        ))),
        ProviderKind::Hosted => None,
    }
}

/// Build the registry for `config`.
///
/// Adapters in `supplied` take precedence over built-in construction. A
/// configured provider with neither is a [`ConfigError::MissingAdapter`].
pub fn build_registry(
    config: &RouterConfig,
    mut supplied: ProviderRegistry,
) -> Result<ProviderRegistry, ConfigError> {
    let mut registry = ProviderRegistry::new();
    for settings in &config.providers {
        let provider = match supplied.remove(&settings.id) {
            Some(provider) => provider,
            None => create_provider(settings)
                .ok_or_else(|| ConfigError::MissingAdapter(settings.id.clone()))?,
        };
        tracing::debug!(
            provider = %settings.id,
            kind = %settings.kind,
            adapter = provider.name(),
            "Registered provider adapter"
        );
        registry.register(settings.id.clone(), provider);
    }

    for id in supplied.ids() {
        tracing::warn!(provider = %id, "Supplied adapter has no matching provider config, ignoring");
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelrelay_core::llm::scripted::ScriptedProvider;
    use modelrelay_types::llm::ProviderId;

    fn config(kinds: &[(&str, ProviderKind)]) -> RouterConfig {
        RouterConfig {
            providers: kinds
                .iter()
                .map(|(id, kind)| ProviderSettings::new(*id, *kind))
                .collect(),
            ..RouterConfig::default()
        }
    }

    #[test]
    fn test_create_provider_echo() {
        let settings = ProviderSettings::new("local", ProviderKind::Echo);
        let provider = create_provider(&settings).unwrap();
        assert_eq!(provider.name(), "local");
    }

    #[test]
    fn test_create_provider_hosted_has_no_builtin() {
        let settings = ProviderSettings::new("remote", ProviderKind::Hosted);
        assert!(create_provider(&settings).is_none());
    }

    #[test]
    fn test_build_registry_uses_supplied_adapters() {
        let config = config(&[("local", ProviderKind::Echo), ("remote", ProviderKind::Hosted)]);
        let mut supplied = ProviderRegistry::new();
        supplied.register(
            "remote",
            BoxLlmProvider::new(ScriptedProvider::replying("remote-adapter", "hi")),
        );

        let registry = build_registry(&config, supplied).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get(&ProviderId::from("remote")).unwrap().name(),
            "remote-adapter"
        );
    }

    #[test]
    fn test_build_registry_missing_hosted_adapter() {
        let config = config(&[("remote", ProviderKind::Hosted)]);
        let err = build_registry(&config, ProviderRegistry::new()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingAdapter(id) if id.as_str() == "remote"));
    }
}
