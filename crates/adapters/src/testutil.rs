//! Single-shot localhost HTTP fixtures for adapter tests.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Serves exactly one request with a canned response and hands the raw
/// request text back through the join handle.
pub(crate) async fn mock_server(
    status: u16,
    extra_headers: &str,
    body: &str,
) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let url = format!("http://127.0.0.1:{port}");

    let body = body.to_string();
    let extra_headers = extra_headers.to_string();
    let handle = tokio::spawn(async move {
        let mut captured = String::new();
        if let Ok((mut stream, _)) = listener.accept().await {
            captured = read_request(&mut stream).await;

            let response = format!(
                "HTTP/1.1 {status} Mock\r\nContent-Type: application/json\r\n{extra_headers}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
        captured
    });

    (url, handle)
}

pub(crate) async fn mock_json_server(body: &str) -> (String, JoinHandle<String>) {
    mock_server(200, "", body).await
}

/// Reads until the headers and the Content-Length body are both in.
async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut scratch = [0u8; 8192];

    loop {
        match stream.read(&mut scratch).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&scratch[..n]),
        }

        if let Some(end) = buf.windows(4).position(|window| window == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}

pub(crate) fn request_line(raw: &str) -> &str {
    raw.lines().next().unwrap_or("")
}

pub(crate) fn request_body(raw: &str) -> &str {
    raw.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or("")
}

/// Case-insensitive lookup of a request header's value.
pub(crate) fn header_value<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    let head = raw.split_once("\r\n\r\n").map(|(head, _)| head).unwrap_or(raw);
    head.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.eq_ignore_ascii_case(name).then(|| value.trim())
    })
}
