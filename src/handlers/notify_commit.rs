//! Polls the jobs affected by a commit notification.
//!
//! A job is polled when it is enabled, uses Subversion, has a trigger that
//! accepts post-commit hooks, and one of its module locations lives in the
//! notified repository and contains a changed path. Everything else about a
//! job (its other locations, failures resolving them) only affects that job.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::cloudforge::{CommitNotification, NotifyParams};
use crate::errors::NotifyError;
use crate::handlers::Context;
use crate::jobs::{RevisionHint, Scm};
use crate::svn::{SubversionScm, SvnError, SvnUrl};
use crate::utils::pluralize;

#[derive(Debug, PartialEq, Eq)]
pub struct NotifyOutcome {
    pub repository_root: SvnUrl,
    /// Names of the jobs whose trigger was run, in provider order.
    pub triggered: Vec<String>,
}

pub fn notify_commit(
    ctx: &Context,
    provider_domain: &str,
    params: &NotifyParams,
) -> Result<NotifyOutcome, NotifyError> {
    let notification = CommitNotification::parse(params)?;
    let root = notification
        .repository_root(provider_domain)
        .map_err(|e| {
            warn!("failed to handle Subversion commit notification: {e}");
            NotifyError::InvalidRepositoryUrl(e)
        })?;

    let mut status = MatchStatus::default();
    let mut triggered = Vec::new();
    for job in ctx.jobs.all_jobs() {
        if job.is_disabled() {
            continue;
        }
        let Some(Scm::Subversion(svn)) = job.scm() else {
            continue;
        };
        status.scm_found = true;

        let Some(trigger) = job
            .scm_trigger()
            .filter(|trigger| !trigger.ignores_post_commit_hooks())
        else {
            continue;
        };
        status.trigger_found = true;

        match match_job(svn, &root, &notification, &mut status) {
            Ok(JobMatch {
                matches: true,
                hints,
            }) => {
                if hints.is_empty() {
                    debug!("scheduling the immediate polling of {}", job.name());
                } else {
                    let pinned: Vec<String> = hints.iter().map(ToString::to_string).collect();
                    debug!(
                        "scheduling the immediate polling of {} at {}",
                        job.name(),
                        pinned.join(", ")
                    );
                }
                trigger.run(job.name(), &hints);
                triggered.push(job.name().to_string());
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    "failed to handle Subversion commit notification for {}: {e}",
                    job.name()
                );
            }
        }
    }

    status.report(&root, triggered.len());
    Ok(NotifyOutcome {
        repository_root: root,
        triggered,
    })
}

#[derive(Debug, Default)]
struct JobMatch {
    matches: bool,
    hints: Vec<RevisionHint>,
}

fn match_job(
    svn: &dyn SubversionScm,
    root: &SvnUrl,
    notification: &CommitNotification,
    status: &mut MatchStatus,
) -> Result<JobMatch, SvnError> {
    let root_path = root.path();
    let mut job_match = JobMatch::default();
    for location in svn.module_locations()? {
        if svn.repository_root(&location)? != *root {
            continue;
        }
        status.root_found = true;

        let module_url = location.svn_url()?;
        let module_path = module_url.path();
        let Some(relative) = module_relative_path(&module_path, &root_path) else {
            continue;
        };

        if let Some(revision) = notification.youngest {
            job_match.hints.push(RevisionHint {
                url: location.url().to_string(),
                revision,
            });
        }

        if location_affected(relative, &notification.changed) {
            job_match.matches = true;
            status.path_found = true;
        }
    }
    Ok(job_match)
}

/// The path of a module inside its repository, without a leading `/`.
/// `None` if `module_path` is not inside `root_path`.
fn module_relative_path<'a>(module_path: &'a str, root_path: &str) -> Option<&'a str> {
    let rest = module_path.strip_prefix(root_path)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }
    Some(rest.strip_prefix('/').unwrap_or(rest))
}

/// Whether a module checked out from `relative` sees any of `changed`.
fn location_affected(relative: &str, changed: &HashSet<String>) -> bool {
    // The whole repository is checked out.
    if relative.is_empty() {
        return true;
    }
    let dir = format!("{relative}/");
    changed
        .iter()
        .any(|path| path == relative || path.starts_with(&dir))
}

/// What was found across all jobs, for the one diagnostic line logged per
/// notification.
#[derive(Debug, Default)]
struct MatchStatus {
    scm_found: bool,
    trigger_found: bool,
    root_found: bool,
    path_found: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Unmet {
    NoSubversionJob,
    NoTrigger,
    NoRepository,
    NoPath,
}

impl MatchStatus {
    /// The first condition, in order, that no job met.
    fn first_unmet(&self) -> Option<Unmet> {
        if !self.scm_found {
            Some(Unmet::NoSubversionJob)
        } else if !self.trigger_found {
            Some(Unmet::NoTrigger)
        } else if !self.root_found {
            Some(Unmet::NoRepository)
        } else if !self.path_found {
            Some(Unmet::NoPath)
        } else {
            None
        }
    }

    fn report(&self, root: &SvnUrl, triggered: usize) {
        match self.first_unmet() {
            Some(Unmet::NoSubversionJob) => warn!("no Subversion jobs found"),
            Some(Unmet::NoTrigger) => warn!(
                "no Subversion jobs using SCM polling, \
                 or all jobs using SCM polling are ignoring post-commit hooks"
            ),
            Some(Unmet::NoRepository) => warn!("no Subversion jobs using repository: {root}"),
            Some(Unmet::NoPath) => debug!("no jobs found matching the modified files"),
            None => debug!(
                "scheduled polling of {triggered} {}",
                pluralize("job", triggered)
            ),
        }
    }
}
