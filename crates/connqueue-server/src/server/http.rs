//! A minimal HTTP/1.0 static-file handler.
//!
//! Only `GET` is served. The request head is consumed up to the blank line,
//! the target is resolved inside the serve directory, and the file is streamed
//! back with `Content-Type` and `Content-Length`. Anything that cannot be
//! served as a regular file is answered `404 Not Found`.

use crate::server::mime;
use connqueue::{ConnectionGuard, RequestHandler};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Maximum bytes read per request-head line. Longer lines are consumed in
/// pieces of this size.
pub const MAX_LINE: usize = 512;

/// Chunk size used when streaming a file to the client.
pub const CHUNK_BYTES: usize = 512;

#[derive(Error, Debug)]
pub enum HttpError {
    /// The request line could not be parsed.
    #[error("malformed request: {reason}")]
    BadRequest { reason: String },

    /// A method other than `GET`.
    #[error("unsupported method: {method}")]
    UnsupportedMethod { method: String },

    /// The peer stalled past the socket read or write timeout.
    #[error("request timed out")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of one exchange, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Served {
    Ok { bytes: u64 },
    NotFound,
    /// The peer closed before sending a request.
    Empty,
    /// The peer reset the connection mid-response.
    Reset,
}

/// Serves files below a fixed root directory.
#[derive(Debug, Clone)]
pub struct StaticFileHandler {
    root: PathBuf,
}

impl StaticFileHandler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Runs one request/response exchange over `stream`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] for malformed or non-`GET` requests and for I/O
    /// failures other than a peer reset. A read or write that hits the socket
    /// timeout is [`HttpError::Timeout`].
    pub fn serve<S: Read + Write>(&self, stream: &mut S) -> Result<Served, HttpError> {
        self.exchange(stream).map_err(|e| match e {
            HttpError::Io(e) if is_timeout(&e) => HttpError::Timeout,
            e => e,
        })
    }

    fn exchange<S: Read + Write>(&self, stream: &mut S) -> Result<Served, HttpError> {
        let request_line = {
            let mut reader = BufReader::new(&mut *stream);
            read_request_head(&mut reader)?
        };
        let Some(request_line) = request_line else {
            return Ok(Served::Empty);
        };

        let target = parse_get_target(&request_line)?;
        let served = match self.resolve(target) {
            Some(path) => write_file_response(stream, &path)?,
            None => write_not_found(stream)?,
        };

        tracing::debug!("GET {target} -> {served:?}");
        Ok(served)
    }

    /// Maps a request target to a path inside the root.
    ///
    /// Returns `None` for targets that would leave the root.
    pub fn resolve(&self, target: &str) -> Option<PathBuf> {
        let path = target.split(['?', '#']).next().unwrap_or_default();
        let relative = Path::new(path.trim_start_matches('/'));

        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return None;
                }
            }
        }
        Some(resolved)
    }
}

impl RequestHandler<TcpStream> for StaticFileHandler {
    type Error = HttpError;

    fn handle(&self, conn: &mut ConnectionGuard<TcpStream>) -> Result<(), HttpError> {
        self.serve(conn.get_mut()).map(|_| ())
    }
}

/// Consumes the request head and returns its first line, or `None` if the
/// peer sent nothing before closing.
///
/// Lines are read in pieces of at most [`MAX_LINE`] bytes. Only a piece that
/// starts a line and is itself `\r\n` or `\n` ends the head.
fn read_request_head<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut first = None;
    let mut piece = Vec::with_capacity(MAX_LINE);
    let mut at_line_start = true;

    loop {
        piece.clear();
        let n = reader
            .by_ref()
            .take(MAX_LINE as u64)
            .read_until(b'\n', &mut piece)?;
        if n == 0 {
            break;
        }
        if first.is_none() {
            first = Some(String::from_utf8_lossy(&piece).into_owned());
        }
        if at_line_start && (piece == b"\r\n" || piece == b"\n") {
            break;
        }
        at_line_start = piece.ends_with(b"\n");
    }

    Ok(first)
}

fn parse_get_target(request_line: &str) -> Result<&str, HttpError> {
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| HttpError::BadRequest {
        reason: String::from("empty request line"),
    })?;
    if method != "GET" {
        return Err(HttpError::UnsupportedMethod {
            method: method.to_owned(),
        });
    }
    parts.next().ok_or_else(|| HttpError::BadRequest {
        reason: String::from("missing request target"),
    })
}

fn write_file_response<W: Write>(out: &mut W, path: &Path) -> Result<Served, HttpError> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => return write_not_found(out),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return write_not_found(out),
        Err(e) => return Err(e.into()),
    };
    let Ok(mut file) = File::open(path) else {
        return write_not_found(out);
    };

    let header = format!(
        "HTTP/1.0 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
        mime::content_type(path),
        metadata.len()
    );
    if let Some(served) = reset_as_served(out.write_all(header.as_bytes()))? {
        return Ok(served);
    }

    let mut buf = [0_u8; CHUNK_BYTES];
    let mut bytes = 0_u64;
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if let Some(served) = reset_as_served(out.write_all(&buf[..n]))? {
            return Ok(served);
        }
        bytes += n as u64;
    }
    if let Some(served) = reset_as_served(out.flush())? {
        return Ok(served);
    }

    Ok(Served::Ok { bytes })
}

fn write_not_found<W: Write>(out: &mut W) -> Result<Served, HttpError> {
    let header = b"HTTP/1.0 404 Not Found\r\nContent-Length: 0\r\n\r\n";
    let res = out.write_all(header).and_then(|()| out.flush());
    Ok(reset_as_served(res)?.unwrap_or(Served::NotFound))
}

/// A client that disconnects mid-response is not a server error.
fn reset_as_served(res: io::Result<()>) -> io::Result<Option<Served>> {
    match res {
        Ok(()) => Ok(None),
        Err(e) if is_reset(&e) => {
            tracing::warn!("Connection reset by peer");
            Ok(Some(Served::Reset))
        }
        Err(e) => Err(e),
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

fn is_reset(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionAborted
    )
}
