//! Minimal receiving end for tremor reports.
//!
//! Accepts `POST /tremor` with a JSON report, stamps the arrival time as
//! `HH:MM` and logs the record. One request per connection, HTTP/1.0 style.

use std::{
    io::{self, ErrorKind, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::{
    detector::{local_wall_clock, WallClock},
    report::{TremorReport, TREMOR_ROUTE},
};

const HTTP_HEADER_MAX: usize = 2048;
const HTTP_BODY_MAX: usize = 4096;
const SOCKET_TIMEOUT: Duration = Duration::from_secs(20);
const ACCEPT_RETRY_PAUSE: Duration = Duration::from_millis(40);
const RECEIVED_BODY: &[u8] = br#"{"message":"Tremor data received"}"#;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectedReport {
    pub intensity: u8,
    pub situation: String,
    /// Arrival time, `HH:MM` local.
    pub time: String,
}

pub struct Collector {
    listener: TcpListener,
    wall_clock: WallClock,
}

impl Collector {
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let listener = TcpListener::bind(addr).context("collector bind failed")?;
        Ok(Self {
            listener,
            wall_clock: local_wall_clock,
        })
    }

    pub fn with_wall_clock(mut self, wall_clock: WallClock) -> Self {
        self.wall_clock = wall_clock;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves connections until the listener fails.
    ///
    /// Accept errors tied to a single aborted connection are retried after a
    /// short pause; any other accept error ends the loop and is returned.
    pub fn run(&self) -> Result<()> {
        info!("collector: listening on {}", self.local_addr()?);
        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(err) if is_transient_accept_error(&err) => {
                    warn!("collector: accept err={err}");
                    thread::sleep(ACCEPT_RETRY_PAUSE);
                    continue;
                }
                Err(err) => return Err(err).context("collector accept failed"),
            };
            match self.serve_stream(stream, peer) {
                Ok(Some(report)) => info!(
                    "collector: received intensity={} situation={:?} time={}",
                    report.intensity, report.situation, report.time
                ),
                Ok(None) => {}
                Err(err) => warn!("collector: peer={peer} err={err:#}"),
            }
        }
    }

    /// Accepts and answers one connection. `Ok(None)` covers requests that
    /// were answered but carried no report (health checks, 4xx).
    pub fn serve_one(&self) -> Result<Option<CollectedReport>> {
        let (stream, peer) = self.listener.accept().context("accept failed")?;
        self.serve_stream(stream, peer)
    }

    fn serve_stream(
        &self,
        mut stream: TcpStream,
        peer: SocketAddr,
    ) -> Result<Option<CollectedReport>> {
        stream.set_read_timeout(Some(SOCKET_TIMEOUT))?;
        stream.set_write_timeout(Some(SOCKET_TIMEOUT))?;

        let result = handle_connection(&mut stream, self.wall_clock);
        let _ = stream.flush();
        match result {
            Ok(report) => Ok(report),
            Err(err) => {
                warn!("collector: peer={peer} err={err}");
                Ok(None)
            }
        }
    }
}

fn is_transient_accept_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset | ErrorKind::Interrupted
    )
}

fn handle_connection(
    stream: &mut TcpStream,
    wall_clock: WallClock,
) -> Result<Option<CollectedReport>, &'static str> {
    let mut header_buf = [0u8; HTTP_HEADER_MAX];
    let mut filled = 0usize;
    let header_end = loop {
        if filled == header_buf.len() {
            write_response(stream, "413 Payload Too Large", b"header too large");
            return Err("header too large");
        }

        let n = stream.read(&mut header_buf[filled..]).map_err(|_| "read")?;
        if n == 0 {
            return Err("eof");
        }
        filled += n;

        if let Some(end) = find_header_end(&header_buf[..filled]) {
            break end;
        }
    };

    let header = core::str::from_utf8(&header_buf[..header_end]).map_err(|_| "header utf8")?;
    let (method, target) = parse_request_line(header).ok_or("bad request line")?;
    let content_length = parse_content_length(header).unwrap_or(0);
    let body_start = header_end + 4;

    match (method, target_path(target)) {
        ("GET", "/health") => {
            write_response(stream, "200 OK", b"ok");
            Ok(None)
        }
        ("POST", TREMOR_ROUTE) => {
            if content_length > HTTP_BODY_MAX {
                write_response(stream, "413 Payload Too Large", b"body too large");
                return Err("body too large");
            }
            let mut body = header_buf[body_start..filled].to_vec();
            read_remaining_body(stream, &mut body, content_length)?;
            body.truncate(content_length);

            let report: TremorReport = match serde_json::from_slice(&body) {
                Ok(report) => report,
                Err(_) => {
                    write_response(stream, "400 Bad Request", b"invalid tremor json");
                    return Err("invalid tremor json");
                }
            };
            let collected = CollectedReport {
                intensity: report.intensity,
                situation: report.situation,
                time: wall_clock().format("%H:%M").to_string(),
            };
            write_json_response(stream, "200 OK", RECEIVED_BODY);
            Ok(Some(collected))
        }
        _ => {
            write_response(stream, "404 Not Found", b"not found");
            Ok(None)
        }
    }
}

fn read_remaining_body(
    stream: &mut TcpStream,
    body: &mut Vec<u8>,
    content_length: usize,
) -> Result<(), &'static str> {
    let mut chunk = [0u8; 256];
    while body.len() < content_length {
        let want = (content_length - body.len()).min(chunk.len());
        let n = stream.read(&mut chunk[..want]).map_err(|_| "body read")?;
        if n == 0 {
            return Err("body eof");
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Ok(())
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}

fn parse_request_line(header: &str) -> Option<(&str, &str)> {
    let first_line = header.lines().next()?;
    let mut parts = first_line.split_ascii_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    let _version = parts.next()?;
    Some((method, target))
}

fn parse_content_length(header: &str) -> Option<usize> {
    header.lines().skip(1).find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse::<usize>().ok()
        } else {
            None
        }
    })
}

fn target_path(target: &str) -> &str {
    target.split('?').next().unwrap_or(target)
}

fn write_response(stream: &mut TcpStream, status: &str, body: &[u8]) {
    write_with_type(stream, status, "text/plain", body);
}

fn write_json_response(stream: &mut TcpStream, status: &str, body: &[u8]) {
    write_with_type(stream, status, "application/json", body);
}

fn write_with_type(stream: &mut TcpStream, status: &str, content_type: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.0 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\
         Connection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}
