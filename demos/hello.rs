//! Minimal kado example — one application, one port.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example hello
//!
//! Try:
//!   curl -v http://localhost:8888/
//!   printf 'BADLINE\r\n\r\n' | nc localhost 8888   # logged, server stays up

use kado::{Body, BoxError, Environ, Responder, Server};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    // Binding is the only fatal failure: report it and exit nonzero.
    let server = match Server::bind("0.0.0.0:8888").listen().await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    server.serve(hello).await.expect("server error");
}

// The whole application: declare once, hand back the body.
fn hello(environ: Environ, responder: &mut Responder) -> Result<Body, BoxError> {
    responder.declare(
        "200 OK",
        vec![("Content-Type".to_owned(), "text/plain".to_owned())],
    )?;
    Ok(Body::once(format!(
        "Hello, {} {}\n",
        environ.request_method(),
        environ.path_info()
    )))
}
