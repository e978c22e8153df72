//! A fake CI host for the integration tests.
//!
//! [`FakeCi`] accepts every request, answers it with a fixed status, and
//! records it. Poll requests are sent by the server after the notification
//! has been answered, so wait with [`FakeCi::wait_for`] before asserting.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Method {
    GET,
    POST,
}

/// One request the CI host received.
#[derive(Clone, Debug)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    /// Lowercase header names.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    /// The job name of a `/job/{name}/polling` request.
    pub fn job(&self) -> Option<String> {
        let name = self.path.strip_prefix("/job/")?.strip_suffix("/polling")?;
        urlencoding::decode(name).ok().map(|n| n.into_owned())
    }
}

pub struct FakeCi {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
    stopped: Arc<AtomicBool>,
}

impl FakeCi {
    /// Starts a host answering every request with `status`.
    pub fn start(status: u16) -> FakeCi {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let stopped = Arc::new(AtomicBool::new(false));

        let (log, stop) = (requests.clone(), stopped.clone());
        thread::spawn(move || {
            for stream in listener.incoming() {
                if stop.load(Ordering::SeqCst) {
                    return;
                }
                let Ok(stream) = stream else { continue };
                match serve(stream, status) {
                    Ok(Some(request)) => log.lock().unwrap().push(request),
                    Ok(None) => {}
                    Err(e) => eprintln!("fake CI host: {e}"),
                }
            }
        });

        FakeCi {
            addr,
            requests,
            stopped,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Waits until `count` requests arrived, giving up after ten seconds.
    pub fn wait_for(&self, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while self.requests.lock().unwrap().len() < count && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
    }

    /// Leaves time for stray poll requests, for tests expecting none.
    pub fn settle(&self) {
        thread::sleep(Duration::from_millis(300));
    }

    /// Asserts the exact sequence of requests received so far.
    #[track_caller]
    pub fn assert_requests(&self, expected: &[(Method, &str)]) {
        let actual: Vec<(Method, String)> = self
            .requests()
            .into_iter()
            .map(|r| (r.method, r.path))
            .collect();
        let expected: Vec<(Method, String)> = expected
            .iter()
            .map(|(m, p)| (*m, p.to_string()))
            .collect();
        assert_eq!(actual, expected, "requests received by the CI host");
    }
}

impl Drop for FakeCi {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        // Wake up the accept loop so it sees the flag.
        let _ = TcpStream::connect(self.addr);
    }
}

/// Reads one HTTP/1.1 request and answers it. `None` for connections that
/// close before sending a request line.
fn serve(stream: TcpStream, status: u16) -> io::Result<Option<Recorded>> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let mut parts = line.split_ascii_whitespace();
    let method = match parts.next() {
        Some("GET") => Method::GET,
        Some("POST") => Method::POST,
        other => panic!("unexpected request line {other:?}"),
    };
    let path = parts.next().unwrap_or("/").to_string();

    let mut headers = HashMap::new();
    loop {
        line.clear();
        reader.read_line(&mut line)?;
        let header = line.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }
    let len = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = vec![0; len];
    reader.read_exact(&mut body)?;

    let stream = reader.get_mut();
    write!(
        stream,
        "HTTP/1.1 {status} Fake\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
    )?;
    stream.flush()?;

    Ok(Some(Recorded {
        method,
        path,
        headers,
        body,
    }))
}
