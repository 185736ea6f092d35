use std::io::{self, Write};

use tracing::warn;

use crate::router::RouteResult;

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        302 => "Found",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

/// A fully framed response. Every response closes the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn json(value: &serde_json::Value) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_else(|e| {
            warn!(error = %e, "JSON encode failed");
            b"null".to_vec()
        });
        Self::ok("application/json", body)
    }

    pub fn ok(mime: &str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            headers: vec![
                ("Access-Control-Allow-Origin", "*".to_string()),
                ("Content-Type", mime.to_string()),
            ],
            body,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self {
            status: 302,
            headers: vec![("Location", location.to_string())],
            body: Vec::new(),
        }
    }

    /// Serialize status line, headers and body. `Content-Length` and
    /// `Connection: close` are always added here.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, status_reason(self.status));
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        head.push_str("Connection: close\r\n\r\n");
        let mut out = head.into_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}

impl From<RouteResult> for Response {
    fn from(result: RouteResult) -> Self {
        match result {
            RouteResult::ApiJson(value) => Response::json(&value),
            RouteResult::StaticFile { body, mime } => Response::ok(mime, body),
            RouteResult::NotFound => Response::not_found(),
            RouteResult::Redirect(location) => Response::redirect(&location),
        }
    }
}

/// Write `result` to `w` and flush. Returns the status that was sent.
pub fn write_route_result<W: Write>(w: &mut W, result: RouteResult) -> io::Result<u16> {
    let response = Response::from(result);
    w.write_all(&response.to_bytes())?;
    w.flush()?;
    Ok(response.status)
}
