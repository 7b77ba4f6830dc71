use std::net::SocketAddr;
use std::sync::Arc;

use critterlog::server::{self, AppState};
use critterlog::{AccessGate, FlatFileStore};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

struct Response {
    status: u16,
    head: String,
    body: Value,
}

impl Response {
    fn session_cookie(&self) -> Option<String> {
        self.head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .filter(|(name, _)| name.eq_ignore_ascii_case("set-cookie"))
            .filter_map(|(_, value)| value.trim().split(';').next())
            .find(|pair| pair.starts_with("critterlog_session="))
            .map(str::to_string)
    }
}

async fn spawn_server(gate: AccessGate) -> (tempfile::TempDir, SocketAddr) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FlatFileStore::open(dir.path().join("sightings.txt")).expect("open store");
    let state = AppState::new(Arc::new(store), gate);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let _server = tokio::spawn(server::run(listener, state, std::future::pending()));
    (dir, addr)
}

async fn send_raw(
    method: &str,
    addr: SocketAddr,
    path: &str,
    headers: &[(&str, &str)],
    body: &[u8],
) -> Response {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    for (k, v) in headers {
        req.push_str(&format!("{k}: {v}\r\n"));
    }
    req.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request head");
    stream.write_all(body).await.expect("write request body");

    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response must have separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("http status");
    let body = serde_json::from_str(body).expect("json body");
    Response {
        status,
        head: head.to_string(),
        body,
    }
}

async fn post(addr: SocketAddr, action: &str, cookie: Option<&str>, body: Value) -> Response {
    let payload = serde_json::to_vec(&body).expect("encode body");
    let mut headers = vec![("Content-Type", "application/json")];
    if let Some(cookie) = cookie {
        headers.push(("Cookie", cookie));
    }
    send_raw("POST", addr, &format!("/api?action={action}"), &headers, &payload).await
}

async fn get(addr: SocketAddr, action: &str, cookie: Option<&str>) -> Response {
    let mut headers = Vec::new();
    if let Some(cookie) = cookie {
        headers.push(("Cookie", cookie));
    }
    send_raw("GET", addr, &format!("/api?action={action}"), &headers, b"").await
}

async fn login(addr: SocketAddr) -> String {
    let response = post(addr, "login", None, json!({"password": "christmas"})).await;
    assert_eq!(response.status, 200);
    response.session_cookie().expect("session cookie")
}

#[tokio::test]
async fn deer_sighting_round_trip() {
    let (_dir, addr) = spawn_server(AccessGate::new("christmas")).await;
    let cookie = login(addr).await;

    let added = post(
        addr,
        "add_sighting",
        Some(&cookie),
        json!({"lat": 46.43, "lng": -95.63, "category": "deer", "note": "3 bucks"}),
    )
    .await;
    assert_eq!(added.status, 200);
    assert_eq!(added.body["status"], "success");

    let listed = get(addr, "get_sightings", Some(&cookie)).await;
    assert_eq!(listed.status, 200);
    assert_eq!(listed.body["status"], "success");
    let records = listed.body["data"].as_array().expect("data array");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["lat"], 46.43);
    assert_eq!(records[0]["lng"], -95.63);
    assert_eq!(records[0]["category"], "deer");
    assert_eq!(records[0]["note"], "3 bucks");
    assert!(!records[0]["time"].as_str().expect("time").is_empty());
}

#[tokio::test]
async fn anonymous_requests_are_unauthorized() {
    let (_dir, addr) = spawn_server(AccessGate::new("christmas")).await;

    let listed = get(addr, "get_sightings", None).await;
    assert_eq!(listed.status, 401);
    assert_eq!(listed.body["status"], "unauthorized");

    let added = post(addr, "add_sighting", None, json!({"lat": 1.0, "lng": 2.0})).await;
    assert_eq!(added.status, 401);
    assert_eq!(added.body["status"], "unauthorized");
}

#[tokio::test]
async fn wrong_password_gets_no_cookie() {
    let (_dir, addr) = spawn_server(AccessGate::new("christmas")).await;
    let response = post(addr, "login", None, json!({"password": "Christmas"})).await;
    assert_eq!(response.status, 400);
    assert_eq!(response.body["status"], "error");
    assert_eq!(response.body["message"], "Invalid password.");
    assert!(response.session_cookie().is_none());
}

#[tokio::test]
async fn logout_clears_the_cookie() {
    let (_dir, addr) = spawn_server(AccessGate::new("christmas")).await;
    let response = post(addr, "logout", None, json!({})).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["message"], "Logged out.");
    assert!(response.head.contains("Max-Age=0"));
}

#[tokio::test]
async fn missing_action_is_invalid_request() {
    let (_dir, addr) = spawn_server(AccessGate::new("christmas")).await;
    let response = send_raw("GET", addr, "/", &[], b"").await;
    assert_eq!(response.status, 400);
    assert_eq!(response.body["message"], "Invalid Request");
}

#[tokio::test]
async fn delete_and_mass_delete() {
    let gate = AccessGate::new("christmas").with_mass_delete_password("wipe");
    let (_dir, addr) = spawn_server(gate).await;
    let cookie = login(addr).await;

    for note in ["first", "second"] {
        let added = post(
            addr,
            "add_sighting",
            Some(&cookie),
            json!({"lat": "46.5", "lng": "-95.5", "category": "FISH ", "note": note}),
        )
        .await;
        assert_eq!(added.body["status"], "success");
    }

    let listed = get(addr, "get_sightings", Some(&cookie)).await;
    let records = listed.body["data"].as_array().expect("data array").clone();
    assert!(!records.is_empty());
    assert_eq!(records[0]["category"], "fish");
    assert_eq!(records[0]["lat"], 46.5);

    let time = records[0]["time"].as_str().expect("time").to_string();
    let deleted = post(addr, "delete_sighting", Some(&cookie), json!({"time": time})).await;
    assert_eq!(deleted.status, 200);
    assert_eq!(deleted.body["message"], "Sighting deleted.");

    let again = post(addr, "delete_sighting", Some(&cookie), json!({"time": time})).await;
    assert_eq!(again.status, 404);
    assert_eq!(again.body["message"], "Sighting not found.");

    let refused = post(
        addr,
        "mass_delete_sightings",
        Some(&cookie),
        json!({"password": "christmas"}),
    )
    .await;
    assert_eq!(refused.status, 401);

    let cleared = post(
        addr,
        "mass_delete_sightings",
        Some(&cookie),
        json!({"password": "wipe"}),
    )
    .await;
    assert_eq!(cleared.status, 200);
    assert_eq!(cleared.body["message"], "All sightings deleted.");

    let listed = get(addr, "get_sightings", Some(&cookie)).await;
    assert_eq!(listed.body["data"], json!([]));
}

#[tokio::test]
async fn root_path_serves_the_api_too() {
    let (_dir, addr) = spawn_server(AccessGate::disabled()).await;
    let response = send_raw("GET", addr, "/?action=get_sightings", &[], b"").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!({"status": "success", "data": []}));
}
