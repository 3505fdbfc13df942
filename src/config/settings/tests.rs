use super::*;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.embedding.provider, ProviderKind::Ollama);
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.model, "paraphrase-multilingual:latest");
    assert_eq!(config.ollama.batch_size, 32);
    assert_eq!(config.hash.dimensions, 384);
    assert_eq!(config.retrieval.top_k, 15);
    assert!((config.retrieval.threshold - 0.1).abs() < f32::EPSILON);
    assert_eq!(config.retrieval.max_context_chars, 3000);
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.ollama.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.batch_size = 1001;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.hash.dimensions = 8;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.threshold = 1.5;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.threshold = f32::NAN;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.top_k = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.corpus.collection_key = Some("  ".to_string());
    assert!(invalid_config.validate().is_err());
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn toml_serialization() {
    let mut config = Config::default();
    config.embedding.provider = ProviderKind::Hash;
    config.corpus.collection_key = Some("places".to_string());
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_config_uses_defaults() {
    let partial_toml = r#"
        [embedding]
        provider = "hash"

        [retrieval]
        top_k = 5
    "#;

    let config: Config = toml::from_str(partial_toml).expect("should parse partial toml");
    assert_eq!(config.embedding.provider, ProviderKind::Hash);
    assert_eq!(config.retrieval.top_k, 5);
    assert_eq!(config.retrieval.max_context_chars, 3000);
    assert_eq!(config.ollama.port, 11434);
}

#[test]
fn unknown_provider_is_rejected() {
    let toml_str = r#"
        [embedding]
        provider = "openai"
    "#;

    let result: Result<Config, toml::de::Error> = toml::from_str(toml_str);
    assert!(result.is_err());
}

#[test]
fn setter_validation() {
    let mut config = OllamaConfig::default();

    assert!(config.set_protocol("https".to_string()).is_ok());
    assert!(config.set_host("example.com".to_string()).is_ok());
    assert!(config.set_port(8080).is_ok());
    assert!(config.set_model("new-model".to_string()).is_ok());
    assert!(config.set_batch_size(128).is_ok());

    assert!(config.set_protocol("ftp".to_string()).is_err());
    assert!(config.set_protocol("HTTP".to_string()).is_err());
    assert!(config.set_port(0).is_err());
    assert!(config.set_model(String::new()).is_err());
    assert!(config.set_batch_size(0).is_err());
    assert!(config.set_batch_size(1001).is_err());

    let mut retrieval = RetrievalConfig::default();
    assert!(retrieval.set_threshold(0.0).is_ok());
    assert!(retrieval.set_threshold(1.0).is_ok());
    assert!(retrieval.set_threshold(-0.1).is_err());
    assert!(retrieval.set_top_k(1).is_ok());
    assert!(retrieval.set_top_k(0).is_err());
}

#[test]
fn load_missing_config_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load_from(temp_dir.path()).expect("should load default config");
    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert_eq!(config.ollama, OllamaConfig::default());
    assert_eq!(
        config.corpus_path(),
        temp_dir.path().join("data/unesco_cleaned_data.json")
    );
    assert_eq!(config.cache_dir_path(), temp_dir.path().join("cache"));
}

#[test]
fn save_and_reload_roundtrip() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let mut config = Config::load_from(temp_dir.path()).expect("should load default config");
    config.embedding.provider = ProviderKind::Hash;
    config.corpus.path = Some(PathBuf::from("antep.json"));
    config.cache.dir = Some(PathBuf::from("antep_cache"));
    config.save().expect("should save config");

    let reloaded = Config::load_from(temp_dir.path()).expect("should reload config");
    assert_eq!(config, reloaded);
    assert_eq!(reloaded.corpus_path(), temp_dir.path().join("antep.json"));
    assert_eq!(reloaded.cache_dir_path(), temp_dir.path().join("antep_cache"));
}

#[test]
fn absolute_corpus_path_is_kept() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let corpus = temp_dir.path().join("elsewhere").join("sites.json");

    let config = Config {
        corpus: CorpusConfig {
            path: Some(corpus.clone()),
            collection_key: None,
        },
        base_dir: PathBuf::from("/unused/base"),
        ..Default::default()
    };

    assert_eq!(config.corpus_path(), corpus);
}

#[test]
fn invalid_file_fails_validation_on_load() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[retrieval]\nthreshold = 2.0\n",
    )
    .expect("should write config file");

    assert!(Config::load_from(temp_dir.path()).is_err());
}

#[test]
fn https_url_generation() {
    let mut config = Config::default();
    config.ollama.protocol = "https".to_string();
    config.ollama.host = "secure.example.com".to_string();
    config.ollama.port = 443;

    let url = config
        .ollama_url()
        .expect("should generate https url successfully");
    assert_eq!(url.as_str(), "https://secure.example.com/");
}
