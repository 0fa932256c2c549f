//! Fake cluster control plane for binary-level tests.
//!
//! Answers the bootstrap endpoint with a fixed credential and accepts any
//! token on the node listing. Connections that close without sending a
//! request (readiness probes) are ignored.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

pub const ACCESSOR_ID: &str = "3f0c1e5a-accessor";
pub const SECRET_ID: &str = "9b7d2c41-secret";

pub struct FakeCluster {
    port: u16,
    paths: Arc<Mutex<Vec<String>>>,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FakeCluster {
    pub fn spawn() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind fake cluster")?;
        listener.set_nonblocking(true).context("nonblocking listener")?;
        let port = listener.local_addr().context("local addr")?.port();
        let paths = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let paths = Arc::clone(&paths);
            let stop = Arc::clone(&stop);
            thread::spawn(move || serve(&listener, &paths, &stop))
        };
        Ok(Self {
            port,
            paths,
            stop,
            handle: Some(handle),
        })
    }

    pub fn address(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Request paths in arrival order.
    pub fn paths(&self) -> Vec<String> {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for FakeCluster {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            drop(handle.join());
        }
    }
}

fn serve(listener: &TcpListener, paths: &Mutex<Vec<String>>, stop: &AtomicBool) {
    while !stop.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                if let Ok(Some(path)) = exchange(stream) {
                    paths
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(path);
                }
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(5));
            }
            Err(_) => return,
        }
    }
}

fn exchange(stream: TcpStream) -> Result<Option<String>> {
    stream.set_nonblocking(false).context("blocking stream")?;
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .context("read timeout")?;
    let mut reader = BufReader::new(stream.try_clone().context("clone stream")?);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).context("request line")? == 0 {
        return Ok(None);
    }
    let path = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or_default()
        .to_owned();

    let mut content_length = 0_usize;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).context("header")? == 0 || header.trim().is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':')
            && name.eq_ignore_ascii_case("content-length")
        {
            content_length = value.trim().parse().context("content length")?;
        }
    }
    let mut body = vec![0_u8; content_length];
    reader.read_exact(&mut body).context("request body")?;

    let (status, body) = match path.as_str() {
        "/v1/acl/bootstrap" => (
            "200 OK",
            format!(r#"{{"AccessorID":"{ACCESSOR_ID}","SecretID":"{SECRET_ID}","Type":"management"}}"#),
        ),
        "/v1/nodes" => ("200 OK", String::from("[]")),
        _ => ("404 Not Found", String::from("not found")),
    };
    let mut writer = stream;
    write!(
        writer,
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
    .context("write response")?;
    writer.flush().context("flush response")?;
    Ok(Some(path))
}
