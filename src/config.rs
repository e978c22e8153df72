use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use secrecy::SecretString;
use url::Url;

use crate::jobs::JobRegistry;

/// The job registry file: where the CI host lives and which jobs it runs.
#[derive(Debug, Default, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ci: CiConfig,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
    /// Sent as a bearer token with every poll request. Only ever set from
    /// the environment, never from the file.
    #[serde(skip)]
    pub api_token: Option<SecretString>,
}

#[derive(PartialEq, Eq, Debug, Default, serde::Deserialize)]
pub struct CiConfig {
    /// Base URL of the CI host, e.g. `https://ci.example.com/`.
    pub url: Option<String>,
}

#[derive(PartialEq, Eq, Debug, serde::Deserialize)]
pub struct JobConfig {
    pub name: String,
    #[serde(default)]
    pub disabled: bool,
    pub scm: Option<ScmConfig>,
    pub trigger: Option<TriggerConfig>,
}

#[derive(PartialEq, Eq, Debug, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScmConfig {
    Subversion {
        #[serde(default)]
        locations: Vec<LocationConfig>,
    },
    #[serde(other)]
    Other,
}

#[derive(PartialEq, Eq, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LocationConfig {
    pub remote: String,
    #[serde(default = "default_local")]
    pub local: String,
    pub repository_root: Option<String>,
}

fn default_local() -> String {
    ".".to_string()
}

#[derive(PartialEq, Eq, Debug, Default, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TriggerConfig {
    #[serde(default)]
    pub ignore_post_commit_hooks: bool,
    /// Overrides the default `{ci.url}/job/{name}/polling`.
    pub poll_url: Option<String>,
}

impl Config {
    pub fn parse(contents: &str) -> Result<Config, ConfigurationError> {
        toml::from_str(contents).map_err(ConfigurationError::Toml)
    }

    pub fn load(path: &Path) -> Result<Config, ConfigurationError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigurationError::Io {
            path: path.to_path_buf(),
            error: Arc::new(e),
        })?;
        let config = Config::parse(&contents)?;
        tracing::debug!(
            "loaded {} jobs from {}",
            config.jobs.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn with_ci_url(mut self, url: Option<String>) -> Config {
        if url.is_some() {
            self.ci.url = url;
        }
        self
    }

    pub fn with_api_token(mut self, token: Option<SecretString>) -> Config {
        self.api_token = token;
        self
    }

    /// Where polling of `job` is requested.
    pub fn poll_url(&self, job: &str, trigger: &TriggerConfig) -> Result<Url, ConfigurationError> {
        let invalid = |input: &str, e: url::ParseError| ConfigurationError::InvalidPollUrl {
            job: job.to_string(),
            url: input.to_string(),
            reason: e.to_string(),
        };
        if let Some(url) = &trigger.poll_url {
            return Url::parse(url).map_err(|e| invalid(url, e));
        }
        let Some(base) = &self.ci.url else {
            return Err(ConfigurationError::MissingCiUrl(job.to_string()));
        };
        let base = if base.ends_with('/') {
            base.clone()
        } else {
            format!("{base}/")
        };
        Url::parse(&base)
            .and_then(|b| b.join(&format!("job/{}/polling", urlencoding::encode(job))))
            .map_err(|e| invalid(&base, e))
    }

    pub fn registry(&self) -> Result<JobRegistry, ConfigurationError> {
        JobRegistry::from_config(self)
    }
}

#[derive(Clone, Debug)]
pub enum ConfigurationError {
    Io {
        path: PathBuf,
        error: Arc<std::io::Error>,
    },
    Toml(toml::de::Error),
    MissingCiUrl(String),
    InvalidPollUrl {
        job: String,
        url: String,
        reason: String,
    },
}

impl std::error::Error for ConfigurationError {}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigurationError::Io { path, error } => {
                write!(f, "Failed to read job registry `{}`: {}", path.display(), error)
            }
            ConfigurationError::Toml(e) => write!(f, "Malformed job registry.\n{}", e),
            ConfigurationError::MissingCiUrl(job) => write!(
                f,
                "Job `{}` has a trigger but no CI URL is known.\n\
                 Set `url` in the `[ci]` section, pass `--ci-url`, \
                 or give the trigger a `poll-url`.",
                job
            ),
            ConfigurationError::InvalidPollUrl { job, url, reason } => {
                write!(f, "Invalid poll URL `{}` for job `{}`: {}", url, job, reason)
            }
        }
    }
}
