//! Response declaration, body chunks, and serialization.
//!
//! The application declares its status and headers exactly once through the
//! [`Responder`] handle, then returns a [`Body`]. The server turns the frozen
//! [`Declaration`] plus the body into one contiguous byte buffer and sends it
//! with a single write. There is no streaming: either the whole response
//! reaches the wire, or nothing does.

use std::fmt;
use std::time::SystemTime;

use bytes::{Bytes, BytesMut};
use tracing::error;

use crate::error::{BoxError, Error};

/// The `Server` response header value.
const SERVER_SIGNATURE: &str = concat!("kado/", env!("CARGO_PKG_VERSION"));

// ── Responder ────────────────────────────────────────────────────────────────

/// The response-declaration handle passed to the application.
///
/// Call [`declare`](Responder::declare) exactly once, before returning the
/// body. Skipping the call makes the request cycle fail with
/// [`Error::MissingResponseDeclaration`]; calling twice fails with
/// [`AlreadyDeclared`].
pub struct Responder {
    declaration: Option<Declaration>,
}

impl Responder {
    pub(crate) fn new() -> Self {
        Self { declaration: None }
    }

    /// Declares the response status and headers.
    ///
    /// `status` is the full status string as it appears on the wire after
    /// `HTTP/1.1 `, e.g. `"200 OK"` or `"404 Not Found"`. Headers are emitted
    /// in the given order, followed by the fixed `Date` and `Server` headers.
    /// Application headers are never overwritten: declaring your own `Server`
    /// header puts both on the wire, yours first.
    ///
    /// # Errors
    ///
    /// Fails with [`AlreadyDeclared`] on a second call in the same request
    /// cycle.
    pub fn declare(
        &mut self,
        status: impl Into<String>,
        headers: Vec<(String, String)>,
    ) -> Result<(), AlreadyDeclared> {
        self.declare_with_error_info(status, headers, None)
    }

    /// Like [`declare`](Responder::declare), with an optional error the
    /// application wants reported alongside its declaration.
    ///
    /// The error does not change the response. It is routed to the server's
    /// error-reporting hook — a `tracing` record under `kado::application` —
    /// never silently dropped.
    pub fn declare_with_error_info(
        &mut self,
        status: impl Into<String>,
        headers: Vec<(String, String)>,
        error_info: Option<BoxError>,
    ) -> Result<(), AlreadyDeclared> {
        if let Some(info) = error_info {
            error!(
                target: "kado::application",
                error = %info,
                "application reported an error with its declaration"
            );
        }
        if self.declaration.is_some() {
            return Err(AlreadyDeclared);
        }
        let mut headers = headers;
        headers.push(("Date".to_owned(), httpdate::fmt_http_date(SystemTime::now())));
        headers.push(("Server".to_owned(), SERVER_SIGNATURE.to_owned()));
        self.declaration = Some(Declaration { status: status.into(), headers });
        Ok(())
    }

    pub(crate) fn into_declaration(self) -> Option<Declaration> {
        self.declaration
    }
}

/// Error returned when [`Responder::declare`] is called a second time.
#[derive(Debug)]
pub struct AlreadyDeclared;

impl fmt::Display for AlreadyDeclared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("response already declared for this request")
    }
}

impl std::error::Error for AlreadyDeclared {}

// ── Declaration ──────────────────────────────────────────────────────────────

/// An immutable per-request record of the declared status and headers.
///
/// Created by the responder, consumed exactly once by the writer. Nothing is
/// shared with the server or with other requests.
#[derive(Debug)]
pub struct Declaration {
    status: String,
    headers: Vec<(String, String)>,
}

impl Declaration {
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Declared headers in wire order: application headers first, then the
    /// fixed `Date` and `Server` pair.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Serializes the full response: status line, one line per header, a
    /// blank-line terminator, then every body chunk concatenated in order.
    ///
    /// A chunk failure aborts serialization before anything is transmitted.
    pub(crate) fn render(self, body: Body) -> Result<Bytes, Error> {
        let mut buf = BytesMut::with_capacity(256);
        buf.extend_from_slice(format!("HTTP/1.1 {}\r\n", self.status).as_bytes());
        for (name, value) in &self.headers {
            buf.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        buf.extend_from_slice(b"\r\n");
        for chunk in body {
            let chunk = chunk.map_err(Error::Application)?;
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}

// ── Body ─────────────────────────────────────────────────────────────────────

/// The response body: a sequence of byte chunks.
///
/// Chunks are pulled lazily by the writer, after the declaration is in place.
/// A producer may fail mid-sequence; the request cycle then ends with
/// [`Error::Application`] and the connection closes without a response.
pub struct Body {
    chunks: Box<dyn Iterator<Item = Result<Bytes, BoxError>> + Send>,
}

impl Body {
    /// A body with no chunks.
    pub fn empty() -> Self {
        Self { chunks: Box::new(std::iter::empty()) }
    }

    /// A single-chunk body.
    pub fn once(chunk: impl Into<Bytes>) -> Self {
        let chunk = chunk.into();
        Self { chunks: Box::new(std::iter::once(Ok(chunk))) }
    }

    /// A body drawn from an iterator of chunks.
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Bytes>,
        I::IntoIter: Send + 'static,
    {
        let chunks = chunks.into_iter().map(|c| Ok::<Bytes, BoxError>(c.into()));
        Self { chunks: Box::new(chunks) }
    }

    /// A body drawn from an iterator of fallible chunks.
    pub fn try_from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Result<Bytes, BoxError>>,
        I::IntoIter: Send + 'static,
    {
        Self { chunks: Box::new(chunks.into_iter()) }
    }
}

impl Iterator for Body {
    type Item = Result<Bytes, BoxError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.chunks.next()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Body")
    }
}

// ── IntoBody ─────────────────────────────────────────────────────────────────

/// Conversion into a response [`Body`].
///
/// Lets applications return plain values instead of building a [`Body`] by
/// hand: a `String`, a `Vec<u8>`, a chunk list, or `()` for an empty body.
pub trait IntoBody {
    fn into_body(self) -> Body;
}

impl IntoBody for Body {
    fn into_body(self) -> Body {
        self
    }
}

impl IntoBody for Bytes {
    fn into_body(self) -> Body {
        Body::once(self)
    }
}

impl IntoBody for Vec<u8> {
    fn into_body(self) -> Body {
        Body::once(self)
    }
}

impl IntoBody for &'static str {
    fn into_body(self) -> Body {
        Body::once(self)
    }
}

impl IntoBody for String {
    fn into_body(self) -> Body {
        Body::once(self)
    }
}

impl IntoBody for Vec<Bytes> {
    fn into_body(self) -> Body {
        Body::from_chunks(self)
    }
}

impl IntoBody for () {
    fn into_body(self) -> Body {
        Body::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared(headers: Vec<(String, String)>) -> Declaration {
        let mut responder = Responder::new();
        responder.declare("200 OK", headers).unwrap();
        responder.into_declaration().unwrap()
    }

    #[test]
    fn declaration_happens_at_most_once() {
        let mut responder = Responder::new();
        responder.declare("200 OK", Vec::new()).unwrap();
        assert!(responder.declare("500 Oops", Vec::new()).is_err());
    }

    #[test]
    fn undeclared_responder_yields_no_declaration() {
        assert!(Responder::new().into_declaration().is_none());
    }

    #[test]
    fn fixed_headers_follow_application_headers() {
        let declaration = declared(vec![("Content-Type".to_owned(), "text/plain".to_owned())]);
        let names: Vec<&str> = declaration.headers().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["Content-Type", "Date", "Server"]);
    }

    #[test]
    fn application_headers_are_never_overwritten() {
        let declaration = declared(vec![("Server".to_owned(), "mine".to_owned())]);
        let servers: Vec<&str> = declaration
            .headers()
            .iter()
            .filter(|(n, _)| n == "Server")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(servers, ["mine", SERVER_SIGNATURE]);
    }

    #[test]
    fn renders_status_line_header_block_blank_line_body() {
        let declaration = declared(vec![("Content-Type".to_owned(), "text/plain".to_owned())]);
        let bytes = declaration.render(Body::once("Hello")).unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n"));
        let (head, body) = text.split_once("\r\n\r\n").unwrap();
        assert_eq!(body, "Hello");
        assert!(!head.contains("\r\n\r\n"));
    }

    #[test]
    fn chunks_concatenate_in_order() {
        let declaration = declared(Vec::new());
        let body = Body::from_chunks(vec![b"He".to_vec(), b"llo".to_vec()]);
        let bytes = declaration.render(body).unwrap();
        assert!(std::str::from_utf8(&bytes).unwrap().ends_with("\r\n\r\nHello"));
    }

    #[test]
    fn chunk_failure_aborts_the_render() {
        let declaration = declared(Vec::new());
        let body = Body::try_from_chunks(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(BoxError::from("chunk producer failed")),
        ]);
        assert!(matches!(declaration.render(body), Err(Error::Application(_))));
    }

    #[test]
    fn error_info_is_reported_without_changing_the_declaration() {
        let mut responder = Responder::new();
        responder
            .declare_with_error_info(
                "500 Internal Server Error",
                Vec::new(),
                Some("handler gave up".into()),
            )
            .unwrap();
        let declaration = responder.into_declaration().unwrap();
        assert_eq!(declaration.status(), "500 Internal Server Error");
    }
}
