use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";
pub const CONFIG_PATH_ENV: &str = "JOVANES_CONFIG";

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BotConfig {
    pub discord_token: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_prefix")]
    pub default_prefix: String,
    #[serde(default)]
    pub owner_ids: Vec<u64>,
    #[serde(default = "default_log_directory")]
    pub log_directory: String,
    pub completion: CompletionConfig,
}

/// OpenAI-compatible endpoint used by `chat` and `draw`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CompletionConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
}

fn default_database_path() -> String {
    "database/database.db".to_string()
}

fn default_prefix() -> String {
    "fn ".to_string()
}

fn default_log_directory() -> String {
    "logs/".to_string()
}

fn default_chat_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_image_model() -> String {
    "dall-e-2".to_string()
}

impl BotConfig {
    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_optional_keys_fall_back_to_defaults() {
        let config = BotConfig::from_yaml(
            "discord_token: abc\ncompletion:\n  base_url: http://localhost:8080/v1\n",
        )
        .unwrap();
        assert_eq!(config.default_prefix, "fn ");
        assert_eq!(config.database_path, "database/database.db");
        assert!(config.owner_ids.is_empty());
        assert_eq!(config.completion.chat_model, "gpt-3.5-turbo");
    }

    #[test]
    fn example_config_parses() {
        let config = BotConfig::from_yaml(include_str!("../config/config.example.yaml")).unwrap();
        assert_eq!(config.owner_ids.len(), 1);
        assert!(config.completion.base_url.starts_with("https://"));
    }

    #[test]
    fn token_is_required() {
        assert!(BotConfig::from_yaml("completion:\n  base_url: x\n").is_err());
    }
}
