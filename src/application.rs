//! The application contract and how plain functions satisfy it.
//!
//! # The calling convention
//!
//! kado serves exactly one application, registered by passing it to
//! [`Server::serve`](crate::Server::serve). The contract is a single entry
//! point with a fixed shape:
//!
//! ```text
//! (Environ, &mut Responder) -> Result<Body, BoxError>
//! ```
//!
//! The environment carries the request and transport metadata in; the
//! responder records the one-time status/header declaration; the returned
//! body supplies the response chunks. The declaration must happen before the
//! body is consumed — kado enforces the ordering by checking for it before it
//! pulls a single chunk.
//!
//! There is no registry and no lookup-by-name: the application object itself
//! is the plugin. Anything that implements [`Application`] qualifies, and a
//! blanket impl covers ordinary functions and closures with the matching
//! signature, so the common case needs no trait ceremony at all.

use crate::environ::Environ;
use crate::error::BoxError;
use crate::response::{Body, IntoBody, Responder};

/// The pluggable application served by [`Server`](crate::Server).
///
/// Implemented automatically for any `Fn(Environ, &mut Responder) ->
/// Result<B, BoxError>` where `B` converts into a [`Body`]:
///
/// ```rust
/// use kado::{Body, BoxError, Environ, Responder};
///
/// fn hello(_environ: Environ, responder: &mut Responder) -> Result<Body, BoxError> {
///     responder.declare("200 OK", vec![("Content-Type".into(), "text/plain".into())])?;
///     Ok(Body::once("Hello"))
/// }
/// ```
///
/// Implement the trait directly when the application needs state of its own
/// (a template cache, a counter, a downstream client).
pub trait Application: Send + Sync + 'static {
    /// Handles one request.
    ///
    /// Returning `Err` aborts the request cycle: the error is logged at the
    /// accept loop and the connection closes without a response on the wire.
    fn call(&self, environ: Environ, responder: &mut Responder) -> Result<Body, BoxError>;
}

impl<F, B> Application for F
where
    F: Fn(Environ, &mut Responder) -> Result<B, BoxError> + Send + Sync + 'static,
    B: IntoBody,
{
    fn call(&self, environ: Environ, responder: &mut Responder) -> Result<Body, BoxError> {
        (self)(environ, responder).map(IntoBody::into_body)
    }
}
