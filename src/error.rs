//! Unified error type.

use std::fmt;

/// Boxed error returned by applications, either from the call itself or from
/// a body chunk produced later.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The error type returned by kado's fallible operations.
///
/// [`Error::Bind`] is the only fatal kind: it surfaces from
/// [`listen`](crate::Builder::listen) and means the server never started.
/// Every other kind is caught at the accept-loop boundary, logged with
/// request context, and resolved by closing the connection — the loop then
/// moves on to the next accept.
#[derive(Debug)]
pub enum Error {
    /// The request line did not split into exactly three tokens.
    MalformedRequestLine(String),
    /// The application failed, either during invocation or while its body
    /// chunks were being consumed.
    Application(BoxError),
    /// The writer ran before the application called
    /// [`declare`](crate::Responder::declare).
    MissingResponseDeclaration,
    /// Accept, read, or write failed at the transport layer.
    Io(std::io::Error),
    /// The listener could not bind or listen on the configured address.
    Bind(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedRequestLine(line) => write!(f, "malformed request line: {line:?}"),
            Self::Application(e) => write!(f, "application: {e}"),
            Self::MissingResponseDeclaration => f.write_str("response was never declared"),
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Bind(e) => write!(f, "bind: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Application(e) => {
                let source: &(dyn std::error::Error + 'static) = e.as_ref();
                Some(source)
            }
            Self::Io(e) | Self::Bind(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
