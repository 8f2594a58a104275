//! A real socket, a real HTTP/1.1 exchange, then a graceful shutdown.

use std::rc::Rc;

use minihttpd::renderer::Json;
use minihttpd::{ApplicationContext, Data, Request, Routes, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// Serves one raw request on a fresh port, shuts down, returns the raw answer.
async fn exchange(configure: impl FnOnce(Server) -> Server, request: &[u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let routes = Routes::new()
        .on("/api/task/get", |_req| async { Data(["task1", "task2"]) })
        .on("/echo", |req: Request| async move { Data(String::from_utf8_lossy(req.body()).into_owned()) });
    let app = ApplicationContext::builder()
        .routes(routes)
        .default_renderer(Rc::new(Json))
        .build()
        .unwrap();
    let pipeline = minihttpd::default_stack(app).unwrap();

    let (stop, stopped) = oneshot::channel::<()>();
    let server = configure(Server::from_listener(listener)).serve_with_shutdown(pipeline, async move {
        let _ = stopped.await;
    });

    let client = async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request).await.unwrap();
        // The server may close before reading everything; keep what arrived.
        let mut answer = Vec::new();
        let mut buf = [0u8; 4096];
        while let Ok(n) = stream.read(&mut buf).await {
            if n == 0 {
                break;
            }
            answer.extend_from_slice(&buf[..n]);
        }
        stop.send(()).unwrap();
        String::from_utf8(answer).unwrap()
    };

    let (served, answer) = tokio::join!(server, client);
    served.unwrap();
    answer
}

#[tokio::test]
async fn serves_until_shutdown() {
    let answer = exchange(
        |server| server,
        b"GET /api/task/get HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(answer.starts_with("HTTP/1.1 200 OK\r\n"), "{answer}");
    assert!(answer.to_ascii_lowercase().contains("content-type: application/json"));
    assert!(answer.ends_with(r#"["task1","task2"]"#), "{answer}");
}

#[tokio::test]
async fn body_within_the_limit_reaches_the_handler() {
    let answer = exchange(
        |server| server.max_body_size(16),
        b"POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
    )
    .await;

    assert!(answer.starts_with("HTTP/1.1 200 OK\r\n"), "{answer}");
    assert!(answer.ends_with(r#""hello""#), "{answer}");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let mut request =
        b"POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 64\r\nConnection: close\r\n\r\n".to_vec();
    request.extend_from_slice(&[b'x'; 64]);
    let answer = exchange(|server| server.max_body_size(16), &request).await;

    assert!(answer.starts_with("HTTP/1.1 413 Payload Too Large\r\n"), "{answer}");
}

#[test]
fn bind_rejects_malformed_addresses() {
    assert!(matches!(Server::bind("localhost"), Err(minihttpd::Error::Config(_))));
    assert!(Server::bind("127.0.0.1:8080").is_ok());
    assert_eq!(minihttpd::DEFAULT_MAX_BODY_SIZE, 10 * 1024 * 1024);
}
