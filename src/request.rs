//! Incoming request: raw bytes plus the parsed request line.

use bytes::Bytes;

use crate::error::Error;

/// An incoming request, captured by a single bounded read off the TCP stream.
///
/// Only the request line is parsed. Header lines and any body bytes that
/// arrived in the same read stay raw; the application sees them through the
/// environment's input stream.
pub struct Request {
    raw: Bytes,
    method: String,
    path: String,
    version: String,
}

impl Request {
    /// Parses the first line of `raw` into `(method, path, version)`.
    ///
    /// The line is split on whitespace and must produce exactly three tokens.
    /// The method token is not validated against a known set: `BREW /pot
    /// HTCPCP/1.0` parses fine and reaches the application as-is.
    pub(crate) fn parse(raw: Bytes) -> Result<Self, Error> {
        let text = String::from_utf8_lossy(&raw);
        let line = text.lines().next().unwrap_or("");
        let mut tokens = line.split_whitespace();
        match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
            (Some(method), Some(path), Some(version), None) => {
                let method = method.to_owned();
                let path = path.to_owned();
                let version = version.to_owned();
                drop(text);
                Ok(Self { raw, method, path, version })
            }
            _ => Err(Error::MalformedRequestLine(line.to_owned())),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The protocol version token from the request line, e.g. `"HTTP/1.1"`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Everything the single read captured, request line included.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }
}
