//! Incremental HTTP request parsing.
//!
//! Bytes arrive in arbitrary chunks. [`RequestParser`] buffers them and walks
//! a small state machine:
//!
//! ```text
//! AwaitingRequestLine -> AwaitingHeaders -> Dispatching -> Done
//!          |                                                ^
//!          +------------- malformed / not GET --------------+
//! ```
//!
//! A parser hands out at most one [`ParsedRequest`]. Once it has left
//! `AwaitingHeaders` every further `feed` is ignored, so overlapping
//! readiness notifications can never dispatch the same connection twice.
//! Header lines are consumed and discarded without validation; bodies are
//! never read.

use tracing::debug;

use crate::error::HostError;

/// Upper bound on request line plus headers.
pub const MAX_HEAD_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    AwaitingRequestLine,
    AwaitingHeaders,
    /// A request was handed out and is being answered.
    Dispatching,
    /// Terminal. Either answered or rejected.
    Done,
}

/// The parts of a request the host cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    /// HTTP method, always `GET` for a parsed request
    pub method: String,
    /// Raw request target including any query string. Decoding happens in
    /// the router.
    pub path: String,
    /// Number of header lines consumed and discarded
    pub headers_discarded: usize,
}

#[derive(Debug)]
pub enum ParseStatus {
    /// No complete line yet; wait for the next chunk.
    NeedMore,
    /// A request is ready. Returned exactly once per parser.
    Ready(ParsedRequest),
    /// Drop the connection without answering.
    Rejected(HostError),
    /// The parser already dispatched or rejected; input is ignored.
    Finished,
}

#[derive(Debug)]
pub struct RequestParser {
    state: ParseState,
    buf: Vec<u8>,
    pending: Option<ParsedRequest>,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::AwaitingRequestLine,
            buf: Vec::with_capacity(1024),
            pending: None,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Feed the next chunk read from the socket.
    pub fn feed(&mut self, chunk: &[u8]) -> ParseStatus {
        match self.state {
            ParseState::Dispatching | ParseState::Done => return ParseStatus::Finished,
            _ => {}
        }
        self.buf.extend_from_slice(chunk);
        let status = self.advance();
        if matches!(status, ParseStatus::NeedMore) && self.buf.len() > MAX_HEAD_BYTES {
            return self.reject(format!("request head exceeds {MAX_HEAD_BYTES} bytes"));
        }
        status
    }

    /// The peer closed its write side.
    ///
    /// A complete request line is enough to dispatch even if the blank line
    /// terminating the headers never came.
    pub fn finish(&mut self) -> ParseStatus {
        match self.state {
            ParseState::AwaitingRequestLine => {
                self.reject("connection closed before a request line".to_string())
            }
            ParseState::AwaitingHeaders => self.dispatch(),
            ParseState::Dispatching | ParseState::Done => ParseStatus::Finished,
        }
    }

    /// Mark the dispatched request as answered.
    pub fn complete(&mut self) {
        self.state = ParseState::Done;
        self.buf.clear();
    }

    fn advance(&mut self) -> ParseStatus {
        loop {
            let Some(line) = self.take_line() else {
                return ParseStatus::NeedMore;
            };
            match self.state {
                ParseState::AwaitingRequestLine => match parse_request_line(&line) {
                    Ok(request) => {
                        debug!(method = %request.method, path = %request.path, "Request line parsed");
                        self.pending = Some(request);
                        self.state = ParseState::AwaitingHeaders;
                    }
                    Err(e) => {
                        self.state = ParseState::Done;
                        self.buf.clear();
                        return ParseStatus::Rejected(e);
                    }
                },
                ParseState::AwaitingHeaders => {
                    if line == b"\r\n" || line == b"\n" {
                        return self.dispatch();
                    }
                    if let Some(request) = self.pending.as_mut() {
                        request.headers_discarded += 1;
                    }
                }
                ParseState::Dispatching | ParseState::Done => return ParseStatus::Finished,
            }
        }
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        Some(self.buf.drain(..=pos).collect())
    }

    fn dispatch(&mut self) -> ParseStatus {
        match self.pending.take() {
            Some(request) => {
                self.state = ParseState::Dispatching;
                ParseStatus::Ready(request)
            }
            None => self.reject("no request line".to_string()),
        }
    }

    fn reject(&mut self, reason: String) -> ParseStatus {
        self.state = ParseState::Done;
        self.buf.clear();
        self.pending = None;
        ParseStatus::Rejected(HostError::MalformedRequest(reason))
    }
}

/// Split a request line into method and raw path. Only `GET` is accepted.
pub fn parse_request_line(line: &[u8]) -> Result<ParsedRequest, HostError> {
    let text = std::str::from_utf8(line)
        .map_err(|_| HostError::MalformedRequest("request line is not UTF-8".into()))?;
    let mut tokens = text
        .trim_end_matches(['\r', '\n'])
        .split(' ')
        .filter(|t| !t.is_empty());
    let (method, path) = match (tokens.next(), tokens.next()) {
        (Some(method), Some(path)) => (method, path),
        _ => {
            return Err(HostError::MalformedRequest(format!(
                "expected `METHOD PATH`, got {:?}",
                text.trim_end()
            )))
        }
    };
    if method != "GET" {
        return Err(HostError::MalformedRequest(format!("unsupported method {method}")));
    }
    Ok(ParsedRequest {
        method: method.to_string(),
        path: path.to_string(),
        headers_discarded: 0,
    })
}
