// Configuration management module
// Handles the TOML settings file and the interactive editor

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    CacheConfig, Config, ConfigError, CorpusConfig, EmbeddingConfig, HashConfig, OllamaConfig,
    ProviderKind, RetrievalConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
