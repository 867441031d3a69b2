use std::{collections::BTreeMap, time::Duration};

use axum::{
    extract::Path,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    routing::{any, get},
    Json, Router,
};
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// Credentials accepted by `/protected`.
pub const USERNAME: &str = "user";
pub const PASSWORD: &str = "secret";
const EXPECTED_AUTHORIZATION: &str = "Basic dXNlcjpzZWNyZXQ=";

/// How long `/slow` waits before answering.
pub const SLOW_DELAY: Duration = Duration::from_secs(3);

/// Everything the server saw of a request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/redirect", any(redirect))
        .route("/protected", get(protected))
        .route("/slow", get(slow))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Json<Echo> {
    debug!("echo {method} {uri}");
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    })
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, String), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, format!("status {code}")))
}

async fn redirect() -> Redirect {
    Redirect::to("/echo")
}

async fn protected(headers: HeaderMap) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .is_some_and(|value| value == EXPECTED_AUTHORIZATION);
    if authorized {
        (StatusCode::OK, "welcome").into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic realm=\"mock\"")],
            "unauthorized",
        )
            .into_response()
    }
}

async fn slow() -> &'static str {
    tokio::time::sleep(SLOW_DELAY).await;
    "late"
}
