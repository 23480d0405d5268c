use personalens_core::config::{provider_for_model, Config};
use personalens_core::{Error, Result};
use std::sync::Arc;

use crate::{AnthropicService, GeminiService, VisionService};

/// Build the vision service the configured model calls for.
pub fn create_service(config: &Config) -> Result<Arc<dyn VisionService>> {
    let model = &config.session.model;
    let provider = provider_for_model(model).ok_or_else(|| {
        Error::Config(format!("cannot infer provider for model '{model}'"))
    })?;
    let provider_config = config.get_provider(provider).ok_or_else(|| {
        Error::Config(format!("providers.{provider} is not configured"))
    })?;

    let service: Arc<dyn VisionService> = match provider {
        "gemini" => Arc::new(GeminiService::new(
            &provider_config.api_key,
            provider_config.api_base.as_deref(),
            model,
            config.session.max_tokens,
            config.session.temperature,
        )),
        "anthropic" => Arc::new(AnthropicService::new(
            &provider_config.api_key,
            provider_config.api_base.as_deref(),
            model,
            config.session.max_tokens,
            config.session.temperature,
        )),
        other => {
            return Err(Error::Config(format!("unsupported provider '{other}'")));
        }
    };
    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use personalens_core::config::ProviderConfig;

    #[test]
    fn builds_service_for_configured_provider() {
        let mut config = Config::default();
        config.providers.insert(
            "gemini".to_string(),
            ProviderConfig {
                api_key: "k".to_string(),
                api_base: None,
            },
        );
        assert!(create_service(&config).is_ok());
    }

    #[test]
    fn missing_provider_section_is_a_config_error() {
        let config = Config::default();
        let err = create_service(&config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn unknown_model_family_is_rejected() {
        let mut config = Config::default();
        config.session.model = "gpt-4o".to_string();
        let err = create_service(&config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
