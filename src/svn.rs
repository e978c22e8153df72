//! Subversion URLs and module locations.
//!
//! This is the small part of a Subversion client that matching a commit
//! notification against job configuration needs: canonical repository URLs
//! and the locations a job checks out.

use std::borrow::Cow;
use std::fmt;

use url::Url;

/// A canonical Subversion URL.
///
/// Two `SvnUrl`s are equal when they name the same location: scheme and host
/// are compared case-insensitively, default ports (including 3690 for `svn:`
/// and 22 for `svn+ssh:`) are elided, and a trailing `/` on the path is
/// ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SvnUrl(Url);

impl SvnUrl {
    /// Parses a URL as found in job configuration, e.g.
    /// `https://testing.svn.cloudforge.com/test/trunk`.
    pub fn parse(input: &str) -> Result<SvnUrl, SvnError> {
        let url = Url::parse(input).map_err(|e| SvnError::InvalidUrl {
            url: input.to_string(),
            reason: e.to_string(),
        })?;
        SvnUrl::from_url(url)
    }

    /// Builds a URL from its parts. `path` is taken verbatim and
    /// percent-encoded where needed; no port is set.
    pub fn create(scheme: &str, host: &str, path: &str) -> Result<SvnUrl, SvnError> {
        let invalid = |reason: String| SvnError::InvalidUrl {
            url: format!("{scheme}://{host}/{path}"),
            reason,
        };
        // `set_host` validates the host on its own, so an input like
        // `evil.com/x` is rejected instead of silently becoming a path.
        let mut url =
            Url::parse(&format!("{scheme}://localhost")).map_err(|e| invalid(e.to_string()))?;
        url.set_host(Some(host)).map_err(|e| invalid(e.to_string()))?;
        url.set_path(path);
        SvnUrl::from_url(url)
    }

    fn from_url(mut url: Url) -> Result<SvnUrl, SvnError> {
        let scheme = url.scheme().to_string();
        let tunneled = scheme.starts_with("svn+");
        let supported = matches!(scheme.as_str(), "svn" | "http" | "https" | "file") || tunneled;
        if !supported {
            return Err(SvnError::UnsupportedScheme(url.to_string()));
        }
        if url.cannot_be_a_base() || (scheme != "file" && url.host_str().is_none()) {
            return Err(SvnError::InvalidUrl {
                url: url.to_string(),
                reason: "missing host".to_string(),
            });
        }
        // `url` only normalizes hosts and ports of the schemes it knows.
        if scheme == "svn" || tunneled {
            if let Some(host) = url.host_str().map(str::to_ascii_lowercase) {
                url.set_host(Some(&host)).map_err(|e| SvnError::InvalidUrl {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            }
            let default_port = match scheme.as_str() {
                "svn" => Some(3690),
                "svn+ssh" => Some(22),
                _ => None,
            };
            if default_port.is_some() && url.port() == default_port {
                // Cannot fail: the URL has a host and is not `file:`.
                let _ = url.set_port(None);
            }
        }
        url.set_query(None);
        url.set_fragment(None);
        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(&trimmed);
        Ok(SvnUrl(url))
    }

    /// The percent-decoded path, without a trailing `/`. The repository
    /// root of a server (`https://host/`) has the empty path.
    pub fn path(&self) -> Cow<'_, str> {
        let raw = match self.0.path() {
            "/" => "",
            p => p,
        };
        urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
    }
}

impl fmt::Display for SvnUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0.as_str();
        if self.0.path() == "/" {
            f.write_str(s.strip_suffix('/').unwrap_or(s))
        } else {
            f.write_str(s)
        }
    }
}

/// One repository subtree a job checks out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleLocation {
    /// The configured checkout URL, possibly with a peg revision
    /// (`...@123`).
    pub remote: String,
    /// Directory in the workspace the location is checked out into.
    pub local: String,
    /// Root of the repository `remote` lives in, when known.
    pub repository_root: Option<String>,
}

impl ModuleLocation {
    pub fn new(remote: impl Into<String>, local: impl Into<String>) -> ModuleLocation {
        ModuleLocation {
            remote: remote.into(),
            local: local.into(),
            repository_root: None,
        }
    }

    pub fn with_repository_root(mut self, root: impl Into<String>) -> ModuleLocation {
        self.repository_root = Some(root.into());
        self
    }

    /// The checkout URL without a trailing peg revision.
    pub fn url(&self) -> &str {
        let remote = self.remote.trim();
        match remote.rsplit_once('@') {
            Some((url, peg))
                if peg == "HEAD" || (!peg.is_empty() && peg.bytes().all(|b| b.is_ascii_digit())) =>
            {
                url
            }
            _ => remote,
        }
    }

    pub fn svn_url(&self) -> Result<SvnUrl, SvnError> {
        SvnUrl::parse(self.url())
    }
}

/// Access to the Subversion configuration of a single job.
pub trait SubversionScm: Send + Sync {
    /// The locations the job checks out, in configuration order.
    fn module_locations(&self) -> Result<Vec<ModuleLocation>, SvnError>;

    /// Resolves the repository root of `location`.
    fn repository_root(&self, location: &ModuleLocation) -> Result<SvnUrl, SvnError> {
        match &location.repository_root {
            Some(root) => SvnUrl::parse(root),
            None => Err(SvnError::UnknownRepositoryRoot(location.remote.clone())),
        }
    }
}

/// Subversion configuration read from the job registry file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfiguredSubversion {
    pub locations: Vec<ModuleLocation>,
}

impl SubversionScm for ConfiguredSubversion {
    fn module_locations(&self) -> Result<Vec<ModuleLocation>, SvnError> {
        Ok(self.locations.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SvnError {
    InvalidUrl { url: String, reason: String },
    UnsupportedScheme(String),
    UnknownRepositoryRoot(String),
    Other(String),
}

impl std::error::Error for SvnError {}

impl fmt::Display for SvnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SvnError::InvalidUrl { url, reason } => {
                write!(f, "invalid Subversion URL `{url}`: {reason}")
            }
            SvnError::UnsupportedScheme(url) => {
                write!(f, "`{url}` does not use a Subversion URL scheme")
            }
            SvnError::UnknownRepositoryRoot(remote) => write!(
                f,
                "no repository root configured for `{remote}`; \
                 set `repository-root` on the location"
            ),
            SvnError::Other(msg) => f.write_str(msg),
        }
    }
}
