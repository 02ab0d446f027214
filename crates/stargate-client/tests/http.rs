use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;

use http::{Method, Request, StatusCode};
use stargate_client::{ClientError, Connection, ConnectionConfig, HttpCall, UreqCall};

/// A one-shot gateway: answers the first connection with `response` and
/// sends the raw request it received back over the channel.
fn start_stub(response: &'static str) -> (String, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let request = read_request(&mut stream);
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
        tx.send(request).unwrap();
    });

    (addr, rx)
}

fn read_request(stream: &mut impl Read) -> String {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&raw);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if raw.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8(raw).unwrap()
}

#[test]
fn ureq_call_sends_headers_and_body() {
    let (addr, seen) = start_stub(
        "HTTP/1.1 201 Created\r\nLocation: /users/scanner/abc\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
    );

    let request = Request::builder()
        .method(Method::PUT)
        .uri(format!("http://{addr}/users/scanner"))
        .header("Accept", "application/json")
        .header("Content-Type", "application/json; charset=UTF-8")
        .body(br#"{"batch":10}"#.to_vec())
        .unwrap();
    let response = UreqCall::default().call(&request).unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "/users/scanner/abc"
    );

    let raw = seen.recv().unwrap();
    assert!(raw.starts_with("PUT /users/scanner HTTP/1.1\r\n"));
    assert!(raw.to_ascii_lowercase().contains("accept: application/json"));
    assert!(raw.ends_with(r#"{"batch":10}"#));
}

#[test]
fn error_statuses_are_responses() {
    let (addr, _seen) = start_stub(
        "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\nConnection: close\r\n\r\nbusy",
    );

    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("http://{addr}/version"))
        .body(Vec::new())
        .unwrap();
    let response = UreqCall::default().call(&request).unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body(), b"busy");
}

#[test]
fn refused_connection_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("http://{addr}/version"))
        .body(Vec::new())
        .unwrap();
    let err = UreqCall::default().call(&request).unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}

#[test]
fn connection_reads_json_over_the_wire() {
    let (addr, seen) = start_stub(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 36\r\nConnection: close\r\n\r\n{\"table\":[{\"name\":\"users\"},{\"a\":1}]}",
    );
    let (host, port) = addr.rsplit_once(':').unwrap();
    let config = ConnectionConfig::new(host, port.parse().unwrap());

    let conn = Connection::new(config).unwrap();
    assert_eq!(conn.tables().unwrap(), vec!["users"]);

    let raw = seen.recv().unwrap();
    assert!(raw.starts_with("GET / HTTP/1.1\r\n"));
}
