use std::sync::Arc;
use kn_core::{Config, Error, LanguageModel, Result};

pub mod dummy;
pub mod openai;

pub use dummy::DummyModel;
pub use openai::OpenAiModel;

/// Builds the language model named by `llm.provider`.
pub fn create_model(config: &Config) -> Result<Arc<dyn LanguageModel>> {
    match config.llm.provider.as_str() {
        "openai" => {
            let api_key = config
                .openai_api_key
                .clone()
                .ok_or_else(|| Error::Configuration("Missing required configuration: openai_api_key".to_string()))?;
            tracing::info!("🤖 Using OpenAI model {}", config.model);
            Ok(Arc::new(
                OpenAiModel::new(api_key, config.model.clone())
                    .with_base_url(config.llm.base_url.clone())
                    .with_temperature(config.llm.temperature),
            ))
        }
        "dummy" => {
            tracing::info!("🤖 Using offline dummy model");
            Ok(Arc::new(DummyModel::new()))
        }
        other => Err(Error::Configuration(format!("Unknown LLM provider: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#""news_api_key":"n","note_email":"e","note_password":"p""#;

    #[test]
    fn test_create_openai_model() {
        let config = Config::from_json(&format!(r#"{{"openai_api_key":"sk",{}}}"#, BASE)).unwrap();
        let model = create_model(&config).unwrap();
        assert_eq!(model.name(), "gpt-4o");
    }

    #[test]
    fn test_create_dummy_model() {
        let config = Config::from_json(&format!(r#"{{"llm":{{"provider":"dummy"}},{}}}"#, BASE)).unwrap();
        let model = create_model(&config).unwrap();
        assert_eq!(model.name(), "Dummy");
    }

    #[test]
    fn test_unknown_provider() {
        let config =
            Config::from_json(&format!(r#"{{"openai_api_key":"sk","llm":{{"provider":"nope"}},{}}}"#, BASE)).unwrap();
        assert!(matches!(create_model(&config), Err(Error::Configuration(_))));
    }
}
