//! Configuration file support for research-resolve.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables named `RESEARCH_RESOLVE__<SECTION>__<KEY>`.
//!
//! # Configuration File Format
//!
//! ```toml
//! [http]
//! contact = "you@example.org"
//! timeout_secs = 30
//!
//! [arxiv]
//! base_url = "http://export.arxiv.org/api/query"
//! politeness_delay_ms = 3000
//! max_attempts = 3
//!
//! [semantic]
//! base_url = "https://api.semanticscholar.org/graph/v1"
//! politeness_delay_ms = 1000
//! max_attempts = 3
//! api_key = "your-api-key"
//!
//! [resolver]
//! doi_priority = ["biorxiv", "openalex", "semantic"]
//! title_priority = ["arxiv", "openalex", "semantic", "biorxiv"]
//! default_search_source = "arxiv"
//! dispatch = "sequential"
//!
//! [cache]
//! enabled = true
//! max_entries = 256
//! ttl_seconds = 3600
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use std::path::{Path, PathBuf};

use super::{Config, ConfigError};

const ENV_PREFIX: &str = "RESEARCH_RESOLVE";
const FILE_NAME: &str = "research-resolve.toml";

/// Load configuration from defaults, an optional file and the environment.
///
/// The result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut builder =
        config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

    if let Some(path) = path {
        tracing::debug!("Loading config file: {}", path.display());
        builder = builder.add_source(config::File::from(path).format(config::FileFormat::Toml));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("resolver.doi_priority")
                .with_list_parse_key("resolver.title_priority"),
        )
        .build()?;

    let mut config: Config = settings.try_deserialize()?;
    config.apply_env_fallbacks();
    config.validate()?;
    Ok(config)
}

/// Look for a configuration file in the conventional locations.
///
/// Checks `./research-resolve.toml`, then
/// `<config dir>/research-resolve/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("research-resolve").join("config.toml"))
        .filter(|path| path.is_file())
}

/// Write a configuration as TOML
pub fn save_config(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::Serialize(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// A configuration file read on its own, without defaults from the
/// environment layered on top.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub path: PathBuf,
    pub config: Config,
}

impl ConfigFile {
    /// Parse a TOML file; missing sections take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content).map_err(|e| ConfigError::Invalid {
            field: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        save_config(&self.config, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DispatchMode, LogFormat};
    use tempfile::tempdir;

    #[test]
    fn test_config_file_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let toml_content = r#"
[http]
contact = "lab@example.org"

[semantic]
base_url = "http://localhost:9000"
politeness_delay_ms = 250
max_attempts = 5
api_key = "test-key"

[resolver]
doi_priority = ["openalex", "biorxiv"]
dispatch = "concurrent"

[cache]
enabled = true
max_entries = 10

[logging]
level = "debug"
format = "json"
"#;
        std::fs::write(&path, toml_content).unwrap();

        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config.http.contact.as_deref(), Some("lab@example.org"));
        assert_eq!(config.semantic.api_key.as_deref(), Some("test-key"));
        assert_eq!(config.semantic.max_attempts, 5);
        assert_eq!(config.semantic.politeness_delay_ms, 250);
        assert_eq!(config.resolver.doi_priority, ["openalex", "biorxiv"]);
        assert_eq!(config.resolver.dispatch, DispatchMode::Concurrent);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.max_entries, 10);
        assert_eq!(config.logging.format, LogFormat::Json);

        // untouched sections keep their defaults
        assert_eq!(config.arxiv.base_url, "http://export.arxiv.org/api/query");
    }

    #[test]
    fn test_config_without_file_uses_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.biorxiv.base_url, "https://api.biorxiv.org");
        assert_eq!(config.resolver.default_search_source, "arxiv");
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[resolver]\ntitle_limit = 3\n").unwrap();

        std::env::set_var("RESEARCH_RESOLVE__RESOLVER__TITLE_LIMIT", "8");
        let config = load_config(Some(&path));
        std::env::remove_var("RESEARCH_RESOLVE__RESOLVER__TITLE_LIMIT");

        assert_eq!(config.unwrap().resolver.title_limit, 8);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[resolver]\ntitle_priority = [\"arxiv\", \"scopus\"]\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_config_file_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.semantic.api_key = Some("saved-key".to_string());
        config.cache.ttl_seconds = 60;
        save_config(&config, &path).unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded.config, config);
        assert_eq!(loaded.path, path);
    }

    #[test]
    fn test_config_file_nonexistent() {
        let result = ConfigFile::load(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_config_file_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid.toml");
        std::fs::write(&path, "invalid = toml = content").unwrap();

        assert!(ConfigFile::load(&path).is_err());
    }
}
