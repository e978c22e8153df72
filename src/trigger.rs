//! Requests polls from the CI host over HTTP.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use url::Url;

use crate::jobs::{RevisionHint, ScmTrigger};

/// An `ScmTrigger` that asks the CI host to poll a job by POSTing to its
/// polling endpoint.
///
/// The request is sent from a spawned task, so `run` returns immediately;
/// the outcome only shows up in the logs.
pub struct HttpPollTrigger {
    client: reqwest::Client,
    poll_url: Url,
    token: Option<SecretString>,
    ignore_post_commit_hooks: bool,
}

#[derive(Debug, Serialize)]
pub struct PollRequest<'a> {
    pub job: &'a str,
    pub revisions: &'a [RevisionHint],
}

impl HttpPollTrigger {
    pub fn new(
        client: reqwest::Client,
        poll_url: Url,
        token: Option<SecretString>,
        ignore_post_commit_hooks: bool,
    ) -> HttpPollTrigger {
        HttpPollTrigger {
            client,
            poll_url,
            token,
            ignore_post_commit_hooks,
        }
    }

    fn request(&self, job: &str, hints: &[RevisionHint]) -> reqwest::RequestBuilder {
        let req = self.client.post(self.poll_url.clone()).json(&PollRequest {
            job,
            revisions: hints,
        });
        match &self.token {
            Some(token) => req.bearer_auth(token.expose_secret()),
            None => req,
        }
    }
}

impl ScmTrigger for HttpPollTrigger {
    fn ignores_post_commit_hooks(&self) -> bool {
        self.ignore_post_commit_hooks
    }

    fn run(&self, job: &str, hints: &[RevisionHint]) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("cannot poll {job}: no async runtime to send the request from");
            return;
        };
        let req = self.request(job, hints);
        let job = job.to_string();
        let url = self.poll_url.clone();
        runtime.spawn(async move {
            match req.send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::debug!("poll of {job} requested at {url}");
                }
                Ok(resp) => {
                    tracing::warn!(
                        "poll of {job} rejected by {url}: {}",
                        resp.status()
                    );
                }
                Err(e) => {
                    tracing::warn!("failed to request poll of {job} at {url}: {e:?}");
                }
            }
        });
    }
}
