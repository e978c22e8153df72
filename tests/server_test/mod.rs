//! Tests that run the `subversion4cloudforge` binary.
//!
//! Each test writes a job registry, starts the server with `CI_URL` pointing
//! at a [`FakeCi`], posts CloudForge notifications, and checks the response
//! together with the poll requests the CI host received.


use super::common::FakeCi;
use std::fs::File;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

static TEST_COUNTER: AtomicU32 = AtomicU32::new(1);

const NOTIFY_PATH: &str = "subversion4cloudforge/cloudforge.com/notifyCommit";

#[derive(Default)]
struct TestBuilder {
    jobs: String,
    ci_status: Option<u16>,
}

/// A running server and the CI host it polls.
struct ServerTestCtx {
    child: Child,
    dir: PathBuf,
    addr: SocketAddr,
    ci: FakeCi,
}

impl TestBuilder {
    fn new() -> TestBuilder {
        TestBuilder::default()
    }

    /// Contents of the job registry. The CI URL comes from the environment,
    /// so no `[ci]` section is needed.
    fn jobs(mut self, jobs: &str) -> Self {
        self.jobs = jobs.to_string();
        self
    }

    /// Status the CI host answers poll requests with; 200 by default.
    fn ci_status(mut self, status: u16) -> Self {
        self.ci_status = Some(status);
        self
    }

    fn build(self) -> ServerTestCtx {
        let n = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join(format!("server-{n}"));
        if dir.exists() {
            std::fs::remove_dir_all(&dir).unwrap();
        }
        std::fs::create_dir_all(&dir).unwrap();
        let jobs_path = dir.join("jobs.toml");
        std::fs::write(&jobs_path, &self.jobs).unwrap();

        let ci = FakeCi::start(self.ci_status.unwrap_or(200));
        let addr = free_addr();
        let child = Command::new(env!("CARGO_BIN_EXE_subversion4cloudforge"))
            .env("PORT", addr.port().to_string())
            .env("JOBS_CONFIG", &jobs_path)
            .env("CI_URL", ci.url())
            .env("CI_API_TOKEN", "ci-token")
            .env("RUST_LOG", "subversion4cloudforge=debug")
            .current_dir(&dir)
            .stdout(File::create(dir.join("stdout.log")).unwrap())
            .stderr(File::create(dir.join("stderr.log")).unwrap())
            .spawn()
            .unwrap();

        let ctx = ServerTestCtx {
            child,
            dir,
            addr,
            ci,
        };
        ctx.wait_until_listening();
        ctx
    }
}

/// Asks the OS for an unused port. Another process could still take it
/// before the server binds it.
fn free_addr() -> SocketAddr {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
}

impl ServerTestCtx {
    fn wait_until_listening(&self) {
        for _ in 0..100 {
            if TcpStream::connect(self.addr).is_ok() {
                return;
            }
            thread::sleep(Duration::from_millis(100));
        }
        panic!("server did not start listening on {}", self.addr);
    }

    /// Posts a form-encoded notification for the `cloudforge.com` provider.
    fn notify(&self, form: &str) -> reqwest::blocking::Response {
        reqwest::blocking::Client::new()
            .post(format!("http://{}/{NOTIFY_PATH}", self.addr))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(form.to_string())
            .send()
            .unwrap()
    }

    fn get(&self, path: &str) -> reqwest::blocking::Response {
        reqwest::blocking::get(format!("http://{}/{path}", self.addr)).unwrap()
    }
}

impl Drop for ServerTestCtx {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        // Shown by the test harness only when the test failed.
        for log in ["stdout.log", "stderr.log"] {
            if let Ok(s) = std::fs::read_to_string(self.dir.join(log)) {
                eprintln!("--- {log}\n{s}");
            }
        }
    }
}
