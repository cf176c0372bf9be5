//! Full-lifecycle tests over real sockets.
//!
//! Each test binds an ephemeral port, runs the serve loop in a background
//! task, and drives it with plain `TcpStream` clients — one connection per
//! request, exactly as the wire protocol demands.

use std::net::SocketAddr;

use bytes::Bytes;
use kado::{Application, Body, BoxError, Environ, Error, Responder, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

async fn spawn<A: Application>(application: A) -> (SocketAddr, JoinHandle<()>) {
    let server = Server::bind("127.0.0.1:0")
        .backlog(1)
        .listen()
        .await
        .expect("listen failed");
    let addr = server.local_addr();
    let handle = tokio::spawn(async move {
        let _ = server.serve(application).await;
    });
    (addr, handle)
}

/// Sends one request and reads until the server closes the connection.
///
/// The server closes as soon as it has written (or given up); when the
/// request was larger than the read window, that close can arrive as a reset
/// rather than a clean EOF. Either way, whatever bytes made it across are
/// the observable response.
async fn roundtrip(addr: SocketAddr, payload: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.expect("connect failed");
    stream.write_all(payload).await.expect("write failed");
    let mut response = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => response.extend_from_slice(&chunk[..n]),
        }
    }
    response
}

fn hello(_environ: Environ, responder: &mut Responder) -> Result<Body, BoxError> {
    responder.declare(
        "200 OK",
        vec![("Content-Type".to_owned(), "text/plain".to_owned())],
    )?;
    Ok(Body::once("Hello"))
}

#[tokio::test]
async fn serves_a_well_formed_request() {
    let (addr, server) = spawn(hello).await;

    let response = roundtrip(addr, b"GET / HTTP/1.1\r\n\r\n").await;
    let text = String::from_utf8(response).unwrap();

    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"), "got: {text}");
    assert!(text.contains("Content-Type: text/plain\r\n"));
    assert!(text.contains("\r\nDate: "));
    assert!(text.contains("\r\nServer: kado/"));

    let (_, body) = text.split_once("\r\n\r\n").unwrap();
    assert_eq!(body, "Hello");

    server.abort();
}

#[tokio::test]
async fn malformed_request_line_does_not_kill_the_server() {
    let (addr, server) = spawn(hello).await;

    // One token: the request fails, the connection closes with nothing on it.
    let response = roundtrip(addr, b"BADLINE\r\n\r\n").await;
    assert!(response.is_empty());

    // The loop must still be accepting: a well-formed request succeeds.
    let response = roundtrip(addr, b"GET /after HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with(b"HTTP/1.1 200 OK\r\n"));

    server.abort();
}

#[tokio::test]
async fn body_failure_closes_the_connection_and_the_loop_continues() {
    fn exploding_body(_environ: Environ, responder: &mut Responder) -> Result<Body, BoxError> {
        responder.declare("200 OK", Vec::new())?;
        Ok(Body::try_from_chunks(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(BoxError::from("chunk producer failed")),
        ]))
    }

    let (addr, server) = spawn(exploding_body).await;

    // Serialization aborts on the failing chunk, so nothing reaches the wire,
    // not even the declared status line.
    let response = roundtrip(addr, b"GET / HTTP/1.1\r\n\r\n").await;
    assert!(response.is_empty());

    // And the server is still alive for the next connection.
    let response = roundtrip(addr, b"GET / HTTP/1.1\r\n\r\n").await;
    assert!(response.is_empty());

    server.abort();
}

#[tokio::test]
async fn application_errors_do_not_kill_the_server() {
    fn refuses(_environ: Environ, _responder: &mut Responder) -> Result<Body, BoxError> {
        Err("application exploded".into())
    }

    let (addr, server) = spawn(refuses).await;

    let response = roundtrip(addr, b"GET / HTTP/1.1\r\n\r\n").await;
    assert!(response.is_empty());

    let response = roundtrip(addr, b"GET / HTTP/1.1\r\n\r\n").await;
    assert!(response.is_empty());

    server.abort();
}

#[tokio::test]
async fn missing_declaration_sends_nothing() {
    fn never_declares(_environ: Environ, _responder: &mut Responder) -> Result<Body, BoxError> {
        Ok(Body::once("ignored"))
    }

    let (addr, server) = spawn(never_declares).await;

    let response = roundtrip(addr, b"GET / HTTP/1.1\r\n\r\n").await;
    assert!(response.is_empty());

    server.abort();
}

#[tokio::test]
async fn environment_reflects_request_and_server_identity() {
    fn echo_environ(mut environ: Environ, responder: &mut Responder) -> Result<Body, BoxError> {
        responder.declare("200 OK", Vec::new())?;
        let mut input = environ.take_input().ok_or("input stream missing")?;
        let mut raw = Vec::new();
        std::io::Read::read_to_end(&mut input, &mut raw)?;
        Ok(Body::from_chunks(vec![
            format!("method={}\n", environ.request_method()).into_bytes(),
            format!("path={}\n", environ.path_info()).into_bytes(),
            format!("port={}\n", environ.server_port()).into_bytes(),
            format!("raw_len={}\n", raw.len()).into_bytes(),
        ]))
    }

    let (addr, server) = spawn(echo_environ).await;

    let payload = b"POST /submit HTTP/1.1\r\n\r\nhello";
    let response = roundtrip(addr, payload).await;
    let text = String::from_utf8(response).unwrap();
    let (_, body) = text.split_once("\r\n\r\n").unwrap();

    assert!(body.contains("method=POST\n"), "got: {body}");
    assert!(body.contains("path=/submit\n"));
    assert!(body.contains(&format!("port={}\n", addr.port())));
    assert!(body.contains(&format!("raw_len={}\n", payload.len())));

    server.abort();
}

#[tokio::test]
async fn read_is_bounded_by_the_configured_buffer_size() {
    fn raw_len(mut environ: Environ, responder: &mut Responder) -> Result<Body, BoxError> {
        responder.declare("200 OK", Vec::new())?;
        let input = environ.take_input().ok_or("input stream missing")?;
        Ok(Body::once(format!("raw_len={}", input.remaining().len())))
    }

    // An 8-byte window truncates "GET /a HTTP/1.1" to "GET /a H" — still
    // three tokens, so it parses, and the application sees exactly 8 bytes.
    let server = Server::bind("127.0.0.1:0")
        .read_buffer_size(8)
        .listen()
        .await
        .expect("listen failed");
    let addr = server.local_addr();
    let handle = tokio::spawn(async move {
        let _ = server.serve(raw_len).await;
    });

    let response = roundtrip(addr, b"GET /a HTTP/1.1\r\n\r\n").await;
    let text = String::from_utf8(response).unwrap();
    assert!(text.ends_with("\r\n\r\nraw_len=8"), "got: {text}");

    handle.abort();
}

#[tokio::test]
async fn binding_an_occupied_address_is_a_bind_error() {
    let first = Server::bind("127.0.0.1:0").listen().await.expect("listen failed");
    let addr = first.local_addr().to_string();

    let err = Server::bind(&addr)
        .listen()
        .await
        .err()
        .expect("second bind should fail");
    assert!(matches!(err, Error::Bind(_)), "got: {err}");
}
