//! The per-request environment handed to the application.
//!
//! The environment is the entire contract surface between kado and the
//! application: a string-keyed mapping of protocol and transport metadata,
//! built fresh for every request and moved into the application. It carries
//! exactly eleven keys — the calling-convention group (`kado.*`) and the
//! CGI-shaped request/identity group — enumerated in [`keys`].

use std::collections::HashMap;
use std::io::{self, Read, Write};

use bytes::buf::Reader;
use bytes::{Buf, Bytes};
use tracing::error;

use crate::request::Request;

/// Version of the server/application calling convention, exposed under
/// [`keys::VERSION`].
pub const GATEWAY_PROTOCOL_VERSION: (u8, u8) = (1, 0);

/// The environment's key constants.
///
/// An environment always holds all of these and nothing else.
pub mod keys {
    /// Calling-convention version tuple, `(1, 0)`.
    pub const VERSION: &str = "kado.version";
    /// Always the string `"http"`.
    pub const URL_SCHEME: &str = "kado.url_scheme";
    /// Readable stream over the raw request bytes.
    pub const INPUT: &str = "kado.input";
    /// Writable error-output stream.
    pub const ERRORS: &str = "kado.errors";
    /// `false`: requests are never handled on multiple threads.
    pub const MULTITHREAD: &str = "kado.multithread";
    /// `false`: requests are never handled in multiple processes.
    pub const MULTIPROCESS: &str = "kado.multiprocess";
    /// `false`: the application will be invoked again for later requests.
    pub const RUN_ONCE: &str = "kado.run_once";
    /// The method token from the request line.
    pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
    /// The path token from the request line.
    pub const PATH_INFO: &str = "PATH_INFO";
    /// Reverse-DNS name of the bound host.
    pub const SERVER_NAME: &str = "SERVER_NAME";
    /// The bound port, rendered as a string.
    pub const SERVER_PORT: &str = "SERVER_PORT";
}

/// A single environment value.
#[derive(Debug)]
pub enum Value {
    /// Calling-convention version tuple.
    Version(u8, u8),
    Str(String),
    Bool(bool),
    Input(Input),
    Errors(Errors),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// The per-request environment mapping.
///
/// Built by the server from the parsed request and its own identity, then
/// moved into [`Application::call`](crate::Application::call). Key order is
/// irrelevant; lookups go by the constants in [`keys`], or through the typed
/// accessors for the common ones.
#[derive(Debug)]
pub struct Environ {
    entries: HashMap<&'static str, Value>,
}

impl Environ {
    pub(crate) fn build(request: &Request, server_name: &str, server_port: u16) -> Self {
        let mut entries = HashMap::with_capacity(11);
        entries.insert(
            keys::VERSION,
            Value::Version(GATEWAY_PROTOCOL_VERSION.0, GATEWAY_PROTOCOL_VERSION.1),
        );
        entries.insert(keys::URL_SCHEME, Value::Str("http".to_owned()));
        entries.insert(keys::INPUT, Value::Input(Input::new(request.raw().clone())));
        entries.insert(keys::ERRORS, Value::Errors(Errors::new()));
        entries.insert(keys::MULTITHREAD, Value::Bool(false));
        entries.insert(keys::MULTIPROCESS, Value::Bool(false));
        entries.insert(keys::RUN_ONCE, Value::Bool(false));
        entries.insert(keys::REQUEST_METHOD, Value::Str(request.method().to_owned()));
        entries.insert(keys::PATH_INFO, Value::Str(request.path().to_owned()));
        entries.insert(keys::SERVER_NAME, Value::Str(server_name.to_owned()));
        entries.insert(keys::SERVER_PORT, Value::Str(server_port.to_string()));
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// The method token, e.g. `"GET"`.
    pub fn request_method(&self) -> &str {
        self.str_value(keys::REQUEST_METHOD)
    }

    /// The path token, e.g. `"/index.html"`.
    pub fn path_info(&self) -> &str {
        self.str_value(keys::PATH_INFO)
    }

    pub fn server_name(&self) -> &str {
        self.str_value(keys::SERVER_NAME)
    }

    pub fn server_port(&self) -> &str {
        self.str_value(keys::SERVER_PORT)
    }

    /// Takes the request input stream out of the environment.
    ///
    /// The stream exists once per request, so a second call returns `None`.
    pub fn take_input(&mut self) -> Option<Input> {
        if let Some(Value::Input(input)) = self.entries.remove(keys::INPUT) {
            return Some(input);
        }
        None
    }

    /// The error-output stream, for applications that want to write to it.
    pub fn errors_mut(&mut self) -> Option<&mut Errors> {
        match self.entries.get_mut(keys::ERRORS) {
            Some(Value::Errors(errors)) => Some(errors),
            _ => None,
        }
    }

    // The builder always sets the string-valued keys.
    fn str_value(&self, key: &'static str) -> &str {
        match self.entries.get(key) {
            Some(Value::Str(s)) => s.as_str(),
            _ => "",
        }
    }
}

// ── Input ────────────────────────────────────────────────────────────────────

/// The environment's input stream (`kado.input`): a readable view over the
/// raw request bytes, request line included.
///
/// The server performs exactly one bounded read per request, so this stream
/// holds everything the server will ever see of the request. There is no
/// second read behind it.
#[derive(Debug)]
pub struct Input {
    reader: Reader<Bytes>,
}

impl Input {
    fn new(raw: Bytes) -> Self {
        Self { reader: raw.reader() }
    }

    /// The bytes not yet consumed through [`io::Read`].
    pub fn remaining(&self) -> &[u8] {
        self.reader.get_ref()
    }
}

impl Read for Input {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// The environment's error-output stream (`kado.errors`).
///
/// Whatever the application writes here surfaces as `tracing` error records
/// under the `kado::application` target, one record per line. Partial lines
/// are held back until a newline, an explicit flush, or drop.
#[derive(Debug, Default)]
pub struct Errors {
    pending: Vec<u8>,
}

impl Errors {
    fn new() -> Self {
        Self::default()
    }
}

impl Write for Errors {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end();
            if !text.is_empty() {
                error!(target: "kado::application", "{text}");
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let text = String::from_utf8_lossy(&self.pending).trim_end().to_owned();
            self.pending.clear();
            if !text.is_empty() {
                error!(target: "kado::application", "{text}");
            }
        }
        Ok(())
    }
}

impl Drop for Errors {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
