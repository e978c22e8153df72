use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use secrecy::SecretString;
use tokio::net::TcpListener;

use subversion4cloudforge::{config::Config, handlers::Context, logger};

/// Receives CloudForge commit notifications and asks the CI host to poll
/// the Subversion jobs they affect.
#[derive(Parser, Debug)]
struct Opt {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Job registry file.
    #[arg(long, env = "JOBS_CONFIG", default_value = "jobs.toml")]
    jobs: PathBuf,

    /// Base URL of the CI host; overrides `[ci] url` from the job registry.
    #[arg(long, env = "CI_URL")]
    ci_url: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logger::init();

    let opt = Opt::parse();
    let token = std::env::var("CI_API_TOKEN").ok().map(SecretString::from);
    let config = Config::load(&opt.jobs)?
        .with_ci_url(opt.ci_url)
        .with_api_token(token);
    let registry = config.registry().context("failed to set up jobs")?;
    if registry.is_empty() {
        tracing::warn!("no jobs in {}; notifications will not poll anything", opt.jobs.display());
    } else {
        tracing::info!("watching {} jobs from {}", registry.len(), opt.jobs.display());
    }

    let ctx = Arc::new(Context::new(Arc::new(registry)));
    let app = subversion4cloudforge::app(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], opt.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await.context("server failed")?;
    Ok(())
}
