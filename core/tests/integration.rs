//! Transfers over real HTTP against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port, then drives the client
//! with the libcurl engine. Validates that the options the client assembles
//! have the intended effect on the wire, and that engine failures come back
//! as transfer errors.

use std::net::SocketAddr;

use fluent_curl::{AuthType, ClientConfig, CurlClient, CurlEngine, HttpMethod, OptionSet, Params};
use mock_server::Echo;

/// Start the mock server on a random port and return its address.
fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn client_for(addr: SocketAddr) -> CurlClient {
    let config = ClientConfig {
        base_url: Some(format!("http://{addr}")),
        ..ClientConfig::default()
    };
    CurlClient::with_engine(CurlEngine::new(), config).unwrap()
}

fn echo(body: &[u8]) -> Echo {
    serde_json::from_slice(body).expect("echo response is JSON")
}

#[test]
fn get_sends_params_in_the_query() {
    let mut client = client_for(start_server());

    let response = client
        .simple_call(HttpMethod::Get, "/echo", [("q", "x"), ("lang", "rust lang")], &OptionSet::new())
        .unwrap();
    assert_eq!(response.status(), 200);

    let seen = echo(&response.body);
    assert_eq!(seen.method, "GET");
    assert_eq!(seen.query.as_deref(), Some("q=x&lang=rust+lang"));
    assert!(seen.body.is_empty());
}

#[test]
fn post_sends_form_body() {
    let mut client = client_for(start_server());

    let response = client
        .simple_call(HttpMethod::Post, "/echo", [("q", "x")], &OptionSet::new())
        .unwrap();

    let seen = echo(&response.body);
    assert_eq!(seen.method, "POST");
    assert!(seen.query.is_none());
    assert_eq!(seen.body, "q=x");
    assert_eq!(
        seen.headers.get("content-type").map(String::as_str),
        Some("application/x-www-form-urlencoded")
    );
}

#[test]
fn put_sends_body_and_method_override() {
    let mut client = client_for(start_server());

    let response = client
        .simple_call(HttpMethod::Put, "/echo", [("a", "1")], &OptionSet::new())
        .unwrap();

    let seen = echo(&response.body);
    assert_eq!(seen.method, "PUT");
    assert_eq!(seen.body, "a=1");
    assert_eq!(
        seen.headers.get("x-http-method-override").map(String::as_str),
        Some("PUT")
    );
}

#[test]
fn delete_uses_the_delete_verb() {
    let mut client = client_for(start_server());

    let response = client
        .simple_call(HttpMethod::Delete, "/echo", "id=9", &OptionSet::new())
        .unwrap();

    let seen = echo(&response.body);
    assert_eq!(seen.method, "DELETE");
    assert_eq!(seen.body, "id=9");
}

#[test]
fn error_status_is_a_transfer_error() {
    let mut client = client_for(start_server());

    let err = client
        .simple_call(HttpMethod::Get, "/status/500", Params::none(), &OptionSet::new())
        .unwrap_err();

    let transfer = err.as_transfer().expect("transfer error");
    assert_eq!(transfer.code, 22);
    assert_eq!(client.error_code(), Some(22));
    assert!(!client.error_string().is_empty());
    assert!(client.last_response().is_none());
    assert_eq!(client.info().map(|i| i.http_code), Some(500));
}

#[test]
fn error_status_is_returned_when_fail_on_error_is_off() {
    let mut client = client_for(start_server());

    client
        .create("/status/500")
        .set_option("failonerror", false)
        .unwrap();
    let response = client.execute().unwrap();

    assert_eq!(response.status(), 500);
    assert_eq!(response.text(), "status 500");
    assert!(client.last_error().is_none());
}

#[test]
fn redirects_are_followed_by_default() {
    let mut client = client_for(start_server());

    let response = client.create("/redirect").execute().unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.info.redirect_count, 1);
    assert!(response.info.url.ends_with("/echo"), "{}", response.info.url);
    assert_eq!(echo(&response.body).path, "/echo");
}

#[test]
fn restricted_mode_does_not_follow_redirects() {
    let addr = start_server();
    let config = ClientConfig {
        base_url: Some(format!("http://{addr}")),
        restricted_mode: true,
        ..ClientConfig::default()
    };
    let mut client = CurlClient::with_engine(CurlEngine::new(), config).unwrap();

    let response = client.create("/redirect").execute().unwrap();

    assert_eq!(response.status(), 303);
    assert_eq!(response.info.redirect_count, 0);
}

#[test]
fn basic_login_reaches_protected_resource() {
    let mut client = client_for(start_server());

    let err = client.create("/protected").execute().unwrap_err();
    assert_eq!(err.as_transfer().map(|e| e.code), Some(22));

    let response = client
        .create("/protected")
        .http_login(mock_server::USERNAME, mock_server::PASSWORD, AuthType::Basic)
        .execute()
        .unwrap();
    assert_eq!(response.text(), "welcome");
}

#[test]
fn cookies_and_headers_reach_the_server() {
    let mut client = client_for(start_server());

    let response = client
        .create("/echo")
        .set_cookies([("session", "abc"), ("theme", "dark")])
        .http_header("X-Request-Id", Some("42"))
        .execute()
        .unwrap();

    let seen = echo(&response.body);
    assert_eq!(
        seen.headers.get("cookie").map(String::as_str),
        Some("session=abc; theme=dark")
    );
    assert_eq!(seen.headers.get("x-request-id").map(String::as_str), Some("42"));
}

#[test]
fn sequential_calls_do_not_share_state() {
    let mut client = client_for(start_server());

    client
        .create("/echo")
        .http_header("X-Once", Some("1"))
        .set_option("useragent", "first-call")
        .unwrap();
    let first = echo(&client.execute().unwrap().body);
    assert_eq!(first.headers.get("x-once").map(String::as_str), Some("1"));
    assert_eq!(first.headers.get("user-agent").map(String::as_str), Some("first-call"));

    let second = echo(&client.create("/echo").execute().unwrap().body);
    assert!(!second.headers.contains_key("x-once"));
    assert_ne!(second.headers.get("user-agent").map(String::as_str), Some("first-call"));
}

#[test]
fn timeout_is_reported_as_a_transfer_error() {
    let mut client = client_for(start_server());

    client.create("/slow").set_option("timeout", 1).unwrap();
    let err = client.execute().unwrap_err();

    assert_eq!(err.as_transfer().map(|e| e.code), Some(28));
    assert_eq!(client.error_code(), Some(28));
}

#[test]
fn refused_connection_is_a_transfer_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let mut client = client_for(addr);

    let err = client.create("/echo").execute().unwrap_err();

    assert_eq!(err.as_transfer().map(|e| e.code), Some(7));
    assert!(client.debug().contains("Code: 7"));
    assert_eq!(client.debug_request(), Some(format!("http://{addr}/echo").as_str()));
}
