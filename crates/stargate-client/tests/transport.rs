mod common;

use std::sync::Arc;
use std::time::Duration;

use http::{Method, Response, StatusCode};
use serde_json::json;
use stargate_client::{ClientError, Payload, RetryPolicy, RetryingTransport};

use common::{MockGateway, RecordingSleep, refused, reply};

fn policy(max_retries: u32, fail_silently: bool) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(1),
        retriable: [502, 503, 504].into(),
        fail_silently,
    }
}

fn transport(
    gateway: &Arc<MockGateway>,
    policy: RetryPolicy,
) -> (RetryingTransport<Arc<MockGateway>>, RecordingSleep) {
    let sleeper = RecordingSleep::default();
    let transport = RetryingTransport::new(Arc::clone(gateway), "http://gw:8000/", "application/json")
        .with_policy(policy)
        .with_sleeper(sleeper.clone());
    (transport, sleeper)
}

fn millis(values: &[u64]) -> Vec<Duration> {
    values.iter().copied().map(Duration::from_millis).collect()
}

#[test]
fn backs_off_exponentially_then_gives_up_quietly() {
    let gateway = MockGateway::scripted(vec![
        reply(503, None),
        reply(503, None),
        reply(503, None),
        reply(503, None),
    ]);
    let (transport, sleeper) = transport(&gateway, policy(3, true));

    let response = transport
        .send(Method::GET, "t/row1/", &Payload::Empty)
        .unwrap();

    assert!(response.is_none());
    assert_eq!(gateway.requests().len(), 4);
    assert_eq!(sleeper.delays(), millis(&[1, 2, 4]));
}

#[test]
fn recovers_after_transient_failures() {
    let gateway = MockGateway::scripted(vec![
        refused(),
        reply(502, None),
        reply(200, Some(json!({ "ok": true }))),
    ]);
    let (transport, sleeper) = transport(&gateway, policy(3, true));

    let response = transport
        .send(Method::GET, "version", &Payload::Empty)
        .unwrap()
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, Some(json!({ "ok": true })));
    assert_eq!(sleeper.delays(), millis(&[1, 2]));
}

#[test]
fn zero_retries_makes_one_attempt() {
    let gateway = MockGateway::scripted(vec![reply(504, None), reply(200, None)]);
    let (transport, sleeper) = transport(&gateway, policy(0, true));

    assert!(transport.send(Method::GET, "t", &Payload::Empty).unwrap().is_none());
    assert_eq!(gateway.requests().len(), 1);
    assert!(sleeper.delays().is_empty());
}

#[test]
fn non_retriable_status_is_handed_back() {
    let gateway = MockGateway::scripted(vec![reply(404, None)]);
    let (transport, sleeper) = transport(&gateway, policy(3, true));

    let response = transport
        .send(Method::GET, "t/missing/", &Payload::Empty)
        .unwrap()
        .unwrap();

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body.is_none());
    assert_eq!(gateway.requests().len(), 1);
    assert!(sleeper.delays().is_empty());
}

#[test]
fn strict_mode_reports_exhaustion() {
    let gateway = MockGateway::scripted(vec![reply(503, None), refused(), reply(503, None)]);
    let (transport, _) = transport(&gateway, policy(2, false));

    let err = transport
        .send(Method::GET, "t/row1/", &Payload::Empty)
        .unwrap_err();

    match err {
        ClientError::Exhausted { attempts, url } => {
            assert_eq!(attempts, 3);
            assert_eq!(url, "http://gw:8000/t/row1/");
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[test]
fn strict_mode_rejects_terminal_errors() {
    let gateway = MockGateway::scripted(vec![reply(500, None)]);
    let (transport, sleeper) = transport(&gateway, policy(3, false));

    let err = transport
        .send(Method::DELETE, "t/schema", &Payload::Empty)
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::Status { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR
    ));
    assert!(sleeper.delays().is_empty());
}

#[test]
fn strict_mode_still_returns_success() {
    let gateway = MockGateway::scripted(vec![reply(201, None)]);
    let (transport, _) = transport(&gateway, policy(3, false));

    let response = transport
        .send(Method::PUT, "t/schema", &Payload::Json(json!({ "name": "t" })))
        .unwrap()
        .unwrap();
    assert_eq!(response.status, StatusCode::CREATED);
}

#[test]
fn other_errors_are_not_retried() {
    let gateway = MockGateway::scripted(vec![Err(ClientError::InvalidArguments(
        "unsupported method".into(),
    ))]);
    let (transport, sleeper) = transport(&gateway, policy(3, true));

    let err = transport
        .send(Method::GET, "t", &Payload::Empty)
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidArguments(_)));
    assert!(sleeper.delays().is_empty());
}

#[test]
fn non_json_body_reads_as_none() {
    let gateway = MockGateway::scripted(vec![Ok(Response::builder()
        .status(200)
        .body(b"<html>gateway</html>".to_vec())
        .unwrap())]);
    let (transport, _) = transport(&gateway, policy(3, true));

    let response = transport
        .send(Method::GET, "version", &Payload::Empty)
        .unwrap()
        .unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.is_none());
}

#[test]
fn sets_negotiation_headers() {
    let gateway = MockGateway::scripted(vec![reply(200, None)]);
    let (transport, _) = transport(&gateway, policy(0, true));

    let payload = Payload::Json(json!({ "Row": [] }));
    transport.send(Method::POST, "t/cm93MQ==", &payload).unwrap();

    let request = &gateway.requests()[0];
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.path, "t/cm93MQ==");
    assert_eq!(request.header("accept"), Some("application/json"));
    assert_eq!(
        request.header("content-type"),
        Some("application/json; charset=UTF-8")
    );
    assert_eq!(request.header("authorization"), None);
    assert_eq!(request.json(), json!({ "Row": [] }));
}

#[test]
fn xml_payload_goes_out_verbatim() {
    let gateway = MockGateway::scripted(vec![reply(201, None)]);
    let (transport, _) = transport(&gateway, policy(0, true));

    let payload = Payload::from_text("<Scanner batch=\"5\"/>");
    transport.send(Method::PUT, "t/scanner", &payload).unwrap();

    let request = &gateway.requests()[0];
    assert_eq!(request.header("content-type"), Some("text/xml"));
    assert_eq!(request.body, b"<Scanner batch=\"5\"/>");
}

#[test]
fn basic_auth_header() {
    let gateway = MockGateway::scripted(vec![reply(200, None)]);
    let (transport, _) = transport(&gateway, policy(0, true));
    let transport = transport.with_basic_auth("admin", "secret");

    transport.send(Method::GET, "version", &Payload::Empty).unwrap();

    assert_eq!(
        gateway.requests()[0].header("authorization"),
        Some("Basic YWRtaW46c2VjcmV0")
    );
}

#[test]
fn delete_never_carries_a_body() {
    let gateway = MockGateway::scripted(vec![reply(200, None)]);
    let (transport, _) = transport(&gateway, policy(0, true));

    transport
        .send(Method::DELETE, "t/row1", &Payload::Json(json!({ "ignored": true })))
        .unwrap();

    let request = &gateway.requests()[0];
    assert_eq!(request.method, Method::DELETE);
    assert!(request.body.is_empty());
}
