//! CloudForge commit notifications.
//!
//! CloudForge's post-commit hook POSTs a form with these fields:
//!
//! * `service`: `svn` for Subversion services.
//! * `author`: login of the committer (unused).
//! * `project`: short name of the project committed to.
//! * `organization`: short name of the organization owning the project.
//! * `youngest`: the newest revision in the repository.
//! * `log`: the commit message (unused).
//! * `changed`: the changed paths, one per line.
//!
//! The repository is not sent as a URL; it follows from the naming
//! convention `https://{organization}.{service}.{provider}/{project}`.

use std::collections::HashSet;

use crate::errors::NotifyError;
use crate::svn::{SvnError, SvnUrl};

pub mod webhook;

/// The name of the route this service is reachable under.
pub const URL_NAME: &str = "subversion4cloudforge";
pub const DISPLAY_NAME: &str = "Subversion4CloudForge";

/// The raw request parameters, before validation.
///
/// Missing parameters stay `None`; only `changed` is mandatory and that is
/// checked in [`CommitNotification::parse`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NotifyParams {
    pub service: Option<String>,
    pub project: Option<String>,
    pub organization: Option<String>,
    pub youngest: Option<String>,
    pub changed: Option<String>,
}

impl NotifyParams {
    /// Collects the known parameters from `(name, value)` pairs. When a name
    /// occurs more than once the first value wins, so pairs from the query
    /// string should come before pairs from the body.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> NotifyParams
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = NotifyParams::default();
        for (name, value) in pairs {
            let slot = match name.as_ref() {
                "service" => &mut params.service,
                "project" => &mut params.project,
                "organization" => &mut params.organization,
                "youngest" => &mut params.youngest,
                "changed" => &mut params.changed,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into());
            }
        }
        params
    }
}

/// A validated notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitNotification {
    pub service: String,
    pub project: String,
    pub organization: String,
    /// The newest revision, when one was sent and it parsed.
    pub youngest: Option<u64>,
    /// Changed paths without a leading `/`.
    pub changed: HashSet<String>,
}

impl CommitNotification {
    pub fn parse(params: &NotifyParams) -> Result<CommitNotification, NotifyError> {
        let Some(changed) = &params.changed else {
            return Err(NotifyError::MissingChanged);
        };
        Ok(CommitNotification {
            service: params.service.clone().unwrap_or_default(),
            project: params.project.clone().unwrap_or_default(),
            organization: params.organization.clone().unwrap_or_default(),
            youngest: params.youngest.as_deref().and_then(parse_revision),
            changed: parse_changed(changed),
        })
    }

    /// The root URL of the repository the commit landed in.
    pub fn repository_root(&self, provider_domain: &str) -> Result<SvnUrl, SvnError> {
        let host = format!("{}.{}.{}", self.organization, self.service, provider_domain);
        SvnUrl::create("https", &host, &self.project)
    }
}

fn parse_revision(revision: &str) -> Option<u64> {
    match revision.trim().parse::<u64>() {
        Ok(rev) => Some(rev),
        Err(e) => {
            tracing::info!("ignoring bad revision {revision:?}: {e}");
            None
        }
    }
}

fn parse_changed(changed: &str) -> HashSet<String> {
    changed
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty())
        .map(|line| line.strip_prefix('/').unwrap_or(line).to_string())
        .collect()
}
