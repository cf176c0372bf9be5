//! # kado
//!
//! A minimal gateway server: raw TCP in, one pluggable application out.
//! Nothing more. Nothing less.
//!
//! ## The contract
//!
//! kado owns the socket work — bind, listen, accept, one bounded read, parse
//! the request line, write the response, close. The application owns
//! everything else. The boundary between the two is a fixed calling
//! convention:
//!
//! ```text
//! (Environ, &mut Responder) -> Result<Body, BoxError>
//! ```
//!
//! The [`Environ`] is a per-request mapping of protocol and transport
//! metadata (method, path, server identity, an input stream over the raw
//! request bytes). The [`Responder`] records the status and headers, exactly
//! once, before the body is consumed. The [`Body`] is a sequence of byte
//! chunks. That is the whole interface — any function with that signature is
//! a servable application.
//!
//! What kado deliberately skips:
//!
//! - **Keep-alive** — every response is followed by a close.
//! - **Header parsing** — only the request line is parsed; everything else
//!   reaches the application raw, through the environment's input stream.
//! - **Concurrency** — one connection at a time, accept to close.
//! - **Timeouts** — a silent client stalls the server; front it with a proxy.
//! - **Error pages** — a failed request closes the connection; no synthetic
//!   400/500 is written on the application's behalf.
//!
//! Each of these is a documented limitation, not an accident. What kado does
//! guarantee: a failed request never takes the server down, the connection
//! always closes exactly once per request, and every failure leaves a log
//! record with request context.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use kado::{Body, BoxError, Environ, Responder, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     tracing_subscriber::fmt::init();
//!
//!     let server = Server::bind("0.0.0.0:8888")
//!         .listen()
//!         .await
//!         .expect("bind failed");
//!
//!     server.serve(hello).await.expect("server error");
//! }
//!
//! fn hello(_environ: Environ, responder: &mut Responder) -> Result<Body, BoxError> {
//!     responder.declare("200 OK", vec![("Content-Type".into(), "text/plain".into())])?;
//!     Ok(Body::once("Hello"))
//! }
//! ```

mod application;
mod environ;
mod error;
mod request;
mod response;
mod server;

pub use application::Application;
pub use environ::{Environ, Errors, GATEWAY_PROTOCOL_VERSION, Input, Value, keys};
pub use error::{BoxError, Error};
pub use request::Request;
pub use response::{AlreadyDeclared, Body, Declaration, IntoBody, Responder};
pub use server::{Builder, Server};
