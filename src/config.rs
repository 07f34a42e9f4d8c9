use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::fetch::RepoId;

/// Configuration file looked up in the working directory when no explicit
/// path is given.
pub const DEFAULT_CONFIG_FILE: &str = ".pr-dataset.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Please set GITHUB_TOKEN in your environment or github.token in the config file")]
    MissingToken,

    #[error("Invalid repository identifier '{0}', expected owner/name")]
    InvalidRepo(String),
}

/// Top-level configuration loaded from `.pr-dataset.toml`.
///
/// Every field has a default, so the pipeline runs with zero config as long
/// as a GitHub token is available for the fetch stage.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub dataset: DatasetConfig,

    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Base URL of the REST API; the GraphQL endpoint is `{api_url}/graphql`.
    pub api_url: String,
    /// Repositories to collect, as `owner/name`.
    pub repos: Vec<String>,
    /// Concurrent diff downloads per repository.
    pub diff_workers: usize,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: "https://api.github.com".to_string(),
            repos: vec!["django/django".to_string(), "numpy/numpy".to_string()],
            diff_workers: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    pub db: PathBuf,
    pub small_dataset: PathBuf,
    /// Directory receiving train.csv, dev.csv and test.csv.
    pub splits_dir: PathBuf,
    pub comments_dir: PathBuf,
    pub comments_csv: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            db: PathBuf::from("data/prs.db"),
            small_dataset: PathBuf::from("data/small_prs.csv"),
            splits_dir: PathBuf::from("data"),
            comments_dir: PathBuf::from("data/raw/kaggle-comments"),
            comments_csv: PathBuf::from("data/raw/kaggle-comments/pr_comments.csv"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub sample_size: usize,
    pub seed: u64,
    /// Diffs must be strictly shorter than this many characters.
    pub max_diff_chars: usize,
    pub comment_cap: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            sample_size: 1000,
            seed: 42,
            max_diff_chars: 10_000,
            comment_cap: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Hugging Face model used by the fine-tuning stages.
    pub id: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            id: "google/flan-t5-small".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from `.pr-dataset.toml` in the
    /// current directory when no path is given.
    ///
    /// A missing default file yields `Config::default()`; a missing explicit
    /// file is an error. `github.token` is filled from GITHUB_TOKEN when the
    /// file does not set it.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from(default_path)?
                } else {
                    Config::default()
                }
            }
        };

        if config.github.token.is_none() {
            if let Ok(token) = std::env::var("GITHUB_TOKEN") {
                config.github.token = Some(token);
            }
        }

        Ok(config)
    }

    /// Load from a specific path without consulting the environment.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// The GitHub token, or `MissingToken` if none was configured.
    /// Empty strings count as missing.
    pub fn require_token(&self) -> Result<String, ConfigError> {
        self.github
            .token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingToken)
    }

    /// Parse every configured repository, failing on the first malformed one.
    pub fn repositories(&self) -> Result<Vec<RepoId>, ConfigError> {
        self.github
            .repos
            .iter()
            .map(|full| RepoId::parse(full).ok_or_else(|| ConfigError::InvalidRepo(full.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.github.token.is_none());
        assert_eq!(config.github.repos, vec!["django/django", "numpy/numpy"]);
        assert_eq!(config.github.diff_workers, 8);
        assert_eq!(config.paths.db, PathBuf::from("data/prs.db"));
        assert_eq!(config.dataset.seed, 42);
        assert_eq!(config.dataset.max_diff_chars, 10_000);
        assert_eq!(config.model.id, "google/flan-t5-small");
    }

    #[test]
    fn test_parse_partial_config_toml() {
        let toml_str = r#"
[github]
repos = ["rust-lang/cargo"]

[dataset]
sample_size = 50
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.github.repos, vec!["rust-lang/cargo"]);
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.dataset.sample_size, 50);
        assert_eq!(config.dataset.seed, 42);
        assert_eq!(config.paths.splits_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_load_from_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[github]\ntoken = \"abc\"\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.require_token().unwrap(), "abc");
    }

    #[test]
    fn test_require_token_rejects_blank() {
        let mut config = Config::default();
        config.github.token = Some("  ".to_string());
        assert!(matches!(config.require_token(), Err(ConfigError::MissingToken)));
    }

    #[test]
    fn test_repositories_rejects_malformed_entry() {
        let mut config = Config::default();
        config.github.repos = vec!["django/django".to_string(), "not-a-repo".to_string()];
        match config.repositories() {
            Err(ConfigError::InvalidRepo(repo)) => assert_eq!(repo, "not-a-repo"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_token_is_not_serialized() {
        let mut config = Config::default();
        config.github.token = Some("secret".to_string());
        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("secret"));
    }
}
