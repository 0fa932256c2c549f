//! Minimal HTTP/1.1 server standing in for the Nomad API.
//!
//! Responses are scripted per path and consumed in order; once a path's
//! script runs out its last response repeats. Every connection is closed
//! after one exchange. A truncated response advertises a longer
//! `Content-Length` than the body it sends.

use std::collections::{BTreeMap, VecDeque};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

/// One request received by the fake server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
struct Scripted {
    status: u16,
    body: String,
    declared_length: usize,
}

type Script = BTreeMap<String, VecDeque<Scripted>>;

/// Fake Nomad server on an ephemeral local port.
pub(crate) struct FakeNomad {
    port: u16,
    script: Arc<Mutex<Script>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FakeNomad {
    pub(crate) fn spawn() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind fake nomad")?;
        listener
            .set_nonblocking(true)
            .context("fake nomad nonblocking")?;
        let port = listener.local_addr().context("local addr")?.port();
        let script: Arc<Mutex<Script>> = Arc::new(Mutex::new(BTreeMap::new()));
        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let script = Arc::clone(&script);
            let requests = Arc::clone(&requests);
            let stop = Arc::clone(&stop);
            thread::spawn(move || Self::serve(&listener, &script, &requests, &stop))
        };
        Ok(Self {
            port,
            script,
            requests,
            stop,
            handle: Some(handle),
        })
    }

    pub(crate) fn address(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Appends a response to the script for `path`.
    pub(crate) fn respond(&self, path: &str, status: u16, body: &str) {
        self.push(path, Scripted {
            status,
            body: body.to_owned(),
            declared_length: body.len(),
        });
    }

    /// Appends a response that closes the connection before its body is
    /// complete.
    pub(crate) fn respond_truncated(&self, path: &str, status: u16, body: &str, declared: usize) {
        self.push(path, Scripted {
            status,
            body: body.to_owned(),
            declared_length: declared,
        });
    }

    fn push(&self, path: &str, response: Scripted) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_owned())
            .or_default()
            .push_back(response);
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.path == path)
            .collect()
    }

    fn serve(
        listener: &TcpListener,
        script: &Mutex<Script>,
        requests: &Mutex<Vec<RecordedRequest>>,
        stop: &AtomicBool,
    ) {
        while !stop.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _)) => {
                    // A broken client connection only affects that exchange.
                    drop(Self::exchange(stream, script, requests));
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(5));
                }
                Err(_) => return,
            }
        }
    }

    fn exchange(
        stream: TcpStream,
        script: &Mutex<Script>,
        requests: &Mutex<Vec<RecordedRequest>>,
    ) -> Result<()> {
        stream
            .set_nonblocking(false)
            .context("blocking client stream")?;
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .context("client read timeout")?;
        let mut reader = BufReader::new(stream.try_clone().context("clone stream")?);
        let request = Self::read_request(&mut reader)?;
        let response = Self::next_response(script, &request.path);
        requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let mut writer = stream;
        write!(
            writer,
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            response.status,
            reason(response.status),
            response.declared_length,
            response.body
        )
        .context("write response")?;
        writer.flush().context("flush response")?;
        Ok(())
    }

    fn read_request(reader: &mut impl BufRead) -> Result<RecordedRequest> {
        let mut line = String::new();
        reader.read_line(&mut line).context("read request line")?;
        let mut parts = line.split_whitespace();
        let method = parts.next().ok_or_else(|| anyhow!("missing method"))?.to_owned();
        let path = parts.next().ok_or_else(|| anyhow!("missing path"))?.to_owned();

        let mut token = None;
        let mut content_length = 0_usize;
        loop {
            let mut header = String::new();
            if reader.read_line(&mut header).context("read header")? == 0 {
                break;
            }
            let header = header.trim_end();
            if header.is_empty() {
                break;
            }
            let Some((name, value)) = header.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if name.eq_ignore_ascii_case("x-nomad-token") {
                token = Some(value.to_owned());
            } else if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().context("content length")?;
            }
        }
        let mut body = vec![0_u8; content_length];
        reader.read_exact(&mut body).context("read body")?;
        Ok(RecordedRequest {
            method,
            path,
            token,
        })
    }

    fn next_response(script: &Mutex<Script>, path: &str) -> Scripted {
        let fallback = |status: u16, body: &str| Scripted {
            status,
            body: body.to_owned(),
            declared_length: body.len(),
        };
        let mut script = script.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(responses) = script.get_mut(path) else {
            return fallback(404, "not found");
        };
        let next = if responses.len() > 1 {
            responses.pop_front()
        } else {
            responses.front().cloned()
        };
        next.unwrap_or_else(|| fallback(500, ""))
    }
}

impl Drop for FakeNomad {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            // A panicked server thread already failed the test that owns it.
            drop(handle.join());
        }
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
