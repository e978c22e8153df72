//! CI JOBS
//!
//! The notification handler only ever sees jobs through the traits in this
//! module. `JobRegistry` is the production `JobProvider`, built from the
//! `[[jobs]]` entries of the registry file (see `config`); tests substitute
//! their own providers.
//!
//! A job is eligible for post-commit polling when it is enabled, checks out
//! from Subversion and has an `ScmTrigger` that does not opt out of
//! post-commit hooks.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::config::{Config, ConfigurationError, JobConfig, ScmConfig};
use crate::svn::{ConfiguredSubversion, ModuleLocation, SubversionScm};
use crate::trigger::HttpPollTrigger;

/// The source code management a job is configured with.
pub enum Scm<'a> {
    Subversion(&'a dyn SubversionScm),
    /// Anything that is not Subversion; such jobs are never polled from here.
    Other,
}

/// A revision the poll should compare against, so that a commit which lands
/// while polling is still in flight is not missed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RevisionHint {
    pub url: String,
    pub revision: u64,
}

impl fmt::Display for RevisionHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.url, self.revision)
    }
}

/// The SCM polling trigger of a job.
pub trait ScmTrigger: Send + Sync {
    /// Whether the job asked to be left alone by post-commit hooks and only
    /// polled on its own schedule. Triggers without that setting never opt
    /// out.
    fn ignores_post_commit_hooks(&self) -> bool {
        false
    }

    /// Requests an immediate poll of `job`. Must not block on the poll
    /// itself; `hints` may be empty.
    fn run(&self, job: &str, hints: &[RevisionHint]);
}

pub trait Job: Send + Sync {
    fn name(&self) -> &str;
    fn is_disabled(&self) -> bool;
    fn scm(&self) -> Option<Scm<'_>>;
    fn scm_trigger(&self) -> Option<&dyn ScmTrigger>;
}

/// Supplies the current set of jobs.
pub trait JobProvider: Send + Sync {
    fn all_jobs(&self) -> Vec<Arc<dyn Job>>;
}

/// A job described in the registry file.
pub struct ConfiguredJob {
    name: String,
    disabled: bool,
    scm: Option<ConfiguredScm>,
    trigger: Option<HttpPollTrigger>,
}

enum ConfiguredScm {
    Subversion(ConfiguredSubversion),
    Other,
}

impl ConfiguredJob {
    fn from_config(
        job: &JobConfig,
        config: &Config,
        client: &reqwest::Client,
    ) -> Result<ConfiguredJob, ConfigurationError> {
        let scm = job.scm.as_ref().map(|scm| match scm {
            ScmConfig::Subversion { locations } => ConfiguredScm::Subversion(ConfiguredSubversion {
                locations: locations
                    .iter()
                    .map(|loc| {
                        let location = ModuleLocation::new(&loc.remote, &loc.local);
                        match &loc.repository_root {
                            Some(root) => location.with_repository_root(root),
                            None => location,
                        }
                    })
                    .collect(),
            }),
            ScmConfig::Other => ConfiguredScm::Other,
        });
        let trigger = match &job.trigger {
            Some(trigger) => Some(HttpPollTrigger::new(
                client.clone(),
                config.poll_url(&job.name, trigger)?,
                config.api_token.clone(),
                trigger.ignore_post_commit_hooks,
            )),
            None => None,
        };
        Ok(ConfiguredJob {
            name: job.name.clone(),
            disabled: job.disabled,
            scm,
            trigger,
        })
    }
}

impl Job for ConfiguredJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn scm(&self) -> Option<Scm<'_>> {
        self.scm.as_ref().map(|scm| match scm {
            ConfiguredScm::Subversion(svn) => Scm::Subversion(svn),
            ConfiguredScm::Other => Scm::Other,
        })
    }

    fn scm_trigger(&self) -> Option<&dyn ScmTrigger> {
        self.trigger.as_ref().map(|t| t as &dyn ScmTrigger)
    }
}

/// The jobs of the registry file, in file order.
pub struct JobRegistry {
    jobs: Vec<Arc<dyn Job>>,
}

impl JobRegistry {
    pub fn from_config(config: &Config) -> Result<JobRegistry, ConfigurationError> {
        let client = reqwest::Client::new();
        let jobs = config
            .jobs
            .iter()
            .map(|job| {
                ConfiguredJob::from_config(job, config, &client).map(|j| Arc::new(j) as Arc<dyn Job>)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(JobRegistry { jobs })
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl JobProvider for JobRegistry {
    fn all_jobs(&self) -> Vec<Arc<dyn Job>> {
        self.jobs.clone()
    }
}
